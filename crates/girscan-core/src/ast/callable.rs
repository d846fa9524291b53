//! Parameters, return values and the callable signature shared by
//! functions, callbacks, virtual methods and signals.

use super::node::Metadata;
use super::types::Type;
use std::fmt;

/// Parameter direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Caller to callee
    #[default]
    In,
    /// Callee to caller
    Out,
    /// Both ways
    InOut,
}

impl Direction {
    /// GIR spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::InOut => "inout",
        }
    }

    /// Parse the GIR spelling
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in" => Some(Direction::In),
            "out" => Some(Direction::Out),
            "inout" => Some(Direction::InOut),
            _ => None,
        }
    }

    /// Out or inout
    pub fn is_out(&self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }
}

/// Ownership transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transfer {
    /// No ownership changes hands
    None,
    /// The container but not its elements
    Container,
    /// The value and everything it holds
    Full,
}

impl Transfer {
    /// GIR spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Transfer::None => "none",
            Transfer::Container => "container",
            Transfer::Full => "full",
        }
    }

    /// Parse the GIR spelling; `floating` is the annotation-only alias of `none`
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" | "floating" => Some(Transfer::None),
            "container" => Some(Transfer::Container),
            "full" => Some(Transfer::Full),
            _ => None,
        }
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifetime of a callback argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Valid for the duration of the call
    Call,
    /// Valid until invoked once
    Async,
    /// Valid until the destroy notify runs
    Notified,
    /// Valid forever
    Forever,
}

impl Scope {
    /// GIR spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Call => "call",
            Scope::Async => "async",
            Scope::Notified => "notified",
            Scope::Forever => "forever",
        }
    }

    /// Parse the GIR spelling
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "call" => Some(Scope::Call),
            "async" => Some(Scope::Async),
            "notified" => Some(Scope::Notified),
            "forever" => Some(Scope::Forever),
            _ => None,
        }
    }
}

/// A callable parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Argument name (`...` for varargs)
    pub argname: String,
    /// Parameter type; absent for untyped macro parameters
    pub typ: Option<Type>,
    /// Direction
    pub direction: Direction,
    /// Transfer, `None` until inferred or annotated
    pub transfer: Option<Transfer>,
    /// Accepts or yields NULL
    pub nullable: bool,
    /// Explicitly non-nullable
    pub not_nullable: bool,
    /// Out argument the caller may pass as NULL
    pub optional: bool,
    /// Out argument whose storage the caller provides
    pub caller_allocates: bool,
    /// Callback scope
    pub scope: Option<Scope>,
    /// Name of the user-data parameter for this callback (or own name)
    pub closure_name: Option<String>,
    /// Name of the destroy-notify parameter for this callback
    pub destroy_name: Option<String>,
    /// Doc, version, skip, attributes
    pub meta: Metadata,
}

impl Parameter {
    /// A new `in` parameter
    pub fn new(argname: impl Into<String>, typ: Option<Type>) -> Self {
        let transfer = match &typ {
            Some(t) if t.is_const => Some(Transfer::None),
            _ => None,
        };
        Parameter {
            argname: argname.into(),
            typ,
            direction: Direction::In,
            transfer,
            nullable: false,
            not_nullable: false,
            optional: false,
            caller_allocates: false,
            scope: None,
            closure_name: None,
            destroy_name: None,
            meta: Metadata::default(),
        }
    }

    /// The parameter type, with varargs standing in for untyped parameters
    pub fn typ(&self) -> &Type {
        static UNTYPED: once_cell::sync::Lazy<Type> = once_cell::sync::Lazy::new(Type::varargs);
        self.typ.as_ref().unwrap_or(&UNTYPED)
    }
}

/// A callable return value
#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    /// Return type
    pub typ: Type,
    /// Transfer, `None` until inferred or annotated
    pub transfer: Option<Transfer>,
    /// May return NULL
    pub nullable: bool,
    /// Explicitly non-nullable
    pub not_nullable: bool,
    /// Doc, skip, attributes
    pub meta: Metadata,
}

impl Return {
    /// A new return value
    pub fn new(typ: Type) -> Self {
        let transfer = if typ.is_const {
            Some(Transfer::None)
        } else {
            None
        };
        Return {
            typ,
            transfer,
            nullable: false,
            not_nullable: false,
            meta: Metadata::default(),
        }
    }
}

/// A borrowed view of either a parameter or the return value
pub enum TypeContainer<'a> {
    /// A parameter
    Param(&'a Parameter),
    /// The return value
    Return(&'a Return),
}

impl TypeContainer<'_> {
    /// The held type
    pub fn typ(&self) -> &Type {
        match self {
            TypeContainer::Param(p) => p.typ(),
            TypeContainer::Return(r) => &r.typ,
        }
    }

    /// The transfer, if set
    pub fn transfer(&self) -> Option<Transfer> {
        match self {
            TypeContainer::Param(p) => p.transfer,
            TypeContainer::Return(r) => r.transfer,
        }
    }

    /// The container's metadata
    pub fn meta(&self) -> &Metadata {
        match self {
            TypeContainer::Param(p) => &p.meta,
            TypeContainer::Return(r) => &r.meta,
        }
    }
}

/// Signature shared by every callable node kind
#[derive(Debug, Clone, PartialEq)]
pub struct Callable {
    /// Return value
    pub retval: Return,
    /// Parameters, without the instance parameter
    pub parameters: Vec<Parameter>,
    /// Instance parameter of methods and virtual methods
    pub instance_parameter: Option<Parameter>,
    /// Takes a trailing `GError**`
    pub throws: bool,
    /// `glib:finish-func`
    pub finish_func: Option<String>,
    /// `glib:sync-func`
    pub sync_func: Option<String>,
    /// `glib:async-func`
    pub async_func: Option<String>,
}

impl Callable {
    /// A new signature
    pub fn new(retval: Return, parameters: Vec<Parameter>, throws: bool) -> Self {
        Callable {
            retval,
            parameters,
            instance_parameter: None,
            throws,
            finish_func: None,
            sync_func: None,
            async_func: None,
        }
    }

    /// All parameters, the instance parameter first
    pub fn all_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.instance_parameter.iter().chain(self.parameters.iter())
    }

    /// Mutable iterator over all parameters, the instance parameter first
    pub fn all_parameters_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.instance_parameter
            .iter_mut()
            .chain(self.parameters.iter_mut())
    }

    /// Index of a parameter among the regular parameters
    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.argname == name)
    }

    /// Look up a parameter, including the instance parameter
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.all_parameters().find(|p| p.argname == name)
    }

    /// Mutable lookup of a parameter, including the instance parameter
    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.all_parameters_mut().find(|p| p.argname == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Callable {
        let mut callable = Callable::new(
            Return::new(Type::none()),
            vec![
                Parameter::new("name", Some(Type::string())),
                Parameter::new("len", Some(Type::fundamental("gint"))),
            ],
            false,
        );
        callable.instance_parameter = Some(Parameter::new("self", Some(Type::any())));
        callable
    }

    #[test]
    fn test_parameter_lookup_includes_instance() {
        let callable = sample();
        assert_eq!(callable.parameter_index("len"), Some(1));
        assert_eq!(callable.parameter_index("self"), None);
        assert!(callable.parameter("self").is_some());
        assert_eq!(callable.all_parameters().count(), 3);
    }

    #[test]
    fn test_const_types_default_to_transfer_none() {
        let mut typ = Type::string();
        typ.is_const = true;
        assert_eq!(Return::new(typ.clone()).transfer, Some(Transfer::None));
        assert_eq!(Parameter::new("s", Some(typ)).transfer, Some(Transfer::None));
        assert_eq!(Return::new(Type::string()).transfer, None);
    }

    #[test]
    fn test_transfer_floating_parses_as_none() {
        assert_eq!(Transfer::parse("floating"), Some(Transfer::None));
        assert_eq!(Transfer::parse("bogus"), None);
    }
}
