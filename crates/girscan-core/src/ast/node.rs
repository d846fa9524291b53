//! Introspectable entities
//!
//! Every entity lives in the [`super::Model`] arena and is addressed by a
//! [`NodeId`]. Containers reference their children by id; the child keeps a
//! `parent` back-reference.

use super::callable::{Callable, Parameter, Transfer};
use super::types::Type;
use super::NamespaceId;
use crate::position::SourcePosition;
use std::collections::BTreeSet;

/// Handle to a node in the model arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Arena index
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Generic metadata carried by every node, parameter and return value
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// Cleared by the introspectability passes
    pub introspectable: bool,
    /// Set by `(skip)`
    pub skip: bool,
    /// `Since:` version
    pub version: Option<String>,
    /// `Since:` description
    pub version_doc: Option<String>,
    /// `Deprecated:` version
    pub deprecated: Option<String>,
    /// `Deprecated:` description
    pub deprecated_doc: Option<String>,
    /// `Stability:` value
    pub stability: Option<String>,
    /// `Stability:` description
    pub stability_doc: Option<String>,
    /// Free-form attributes in insertion order
    pub attributes: Vec<(String, String)>,
    /// Documentation text
    pub doc: Option<String>,
    /// Where the documentation came from
    pub doc_position: Option<SourcePosition>,
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata {
            introspectable: true,
            skip: false,
            version: None,
            version_doc: None,
            deprecated: None,
            deprecated_doc: None,
            stability: None,
            stability_doc: None,
            attributes: Vec::new(),
            doc: None,
            doc_position: None,
        }
    }
}

impl Metadata {
    /// Set an attribute, replacing an existing value but keeping its place
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
    }
}

// ========================================================================
// Per-kind payloads
// ========================================================================

/// Child collections of registered types
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contents {
    /// Constructors
    pub constructors: Vec<NodeId>,
    /// Instance methods
    pub methods: Vec<NodeId>,
    /// Functions in the type's symbol namespace without an instance
    pub static_methods: Vec<NodeId>,
    /// Virtual methods
    pub virtual_methods: Vec<NodeId>,
    /// Fields
    pub fields: Vec<NodeId>,
    /// Properties
    pub properties: Vec<NodeId>,
    /// Signals
    pub signals: Vec<NodeId>,
}

/// Runtime type registration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registration {
    /// Runtime type name
    pub gtype_name: Option<String>,
    /// `*_get_type` symbol, or `intern`
    pub get_type: Option<String>,
    /// Lowercase symbol prefix for functions of this type
    pub c_symbol_prefix: Option<String>,
}

/// `typedef` of another type
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    /// Aliased type
    pub target: Type,
    /// C typedef name
    pub ctype: Option<String>,
}

/// Constant value
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    /// Value type
    pub value_type: Type,
    /// Value as written to GIR
    pub value: String,
    /// C identifier
    pub ctype: Option<String>,
}

/// Free function, method, constructor or error-quark function
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Signature
    pub callable: Callable,
    /// C symbol
    pub symbol: String,
    /// Paired as a method
    pub is_method: bool,
    /// Paired as a constructor
    pub is_constructor: bool,
    /// Name of the function that replaces this one
    pub shadowed_by: Option<String>,
    /// Name of the function this one replaces
    pub shadows: Option<String>,
    /// Where a back-compat copy lives now
    pub moved_to: Option<String>,
    /// Never written
    pub internal_skipped: bool,
    /// Property this function sets
    pub set_property: Option<String>,
    /// Property this function reads
    pub get_property: Option<String>,
    /// `static inline`
    pub is_inline: bool,
    /// Error domain of an error-quark function
    pub error_domain: Option<String>,
}

impl Function {
    /// A plain function
    pub fn new(callable: Callable, symbol: impl Into<String>) -> Self {
        Function {
            callable,
            symbol: symbol.into(),
            is_method: false,
            is_constructor: false,
            shadowed_by: None,
            shadows: None,
            moved_to: None,
            internal_skipped: false,
            set_property: None,
            get_property: None,
            is_inline: false,
            error_domain: None,
        }
    }
}

/// Function-like macro; never introspectable
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionMacro {
    /// Untyped parameters
    pub parameters: Vec<Parameter>,
    /// Macro name
    pub symbol: String,
}

/// Function pointer type
#[derive(Debug, Clone, PartialEq)]
pub struct Callback {
    /// Signature
    pub callable: Callable,
    /// C typedef name
    pub ctype: Option<String>,
}

/// Class or interface virtual method
#[derive(Debug, Clone, PartialEq)]
pub struct VFunction {
    /// Signature
    pub callable: Callable,
    /// Name of the method that invokes it
    pub invoker: Option<String>,
}

/// Object signal
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Signature
    pub callable: Callable,
    /// Run stage: `first`, `last` or `cleanup`
    pub when: Option<String>,
    /// `G_SIGNAL_NO_RECURSE`
    pub no_recurse: bool,
    /// `G_SIGNAL_DETAILED`
    pub detailed: bool,
    /// `G_SIGNAL_ACTION`
    pub action: bool,
    /// `G_SIGNAL_NO_HOOKS`
    pub no_hooks: bool,
    /// Method that emits the signal
    pub emitter: Option<String>,
}

/// Object class
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Class {
    /// C type
    pub ctype: Option<String>,
    /// Runtime registration
    pub registration: Registration,
    /// Parent class
    pub parent_type: Option<Type>,
    /// All ancestors, nearest first
    pub parent_chain: Vec<Type>,
    /// Fundamental type (not derived from `GObject`)
    pub fundamental: bool,
    /// Abstract class
    pub is_abstract: bool,
    /// Final class
    pub is_final: bool,
    /// Fundamental ref function
    pub ref_func: Option<String>,
    /// Fundamental unref function
    pub unref_func: Option<String>,
    /// Fundamental `GValue` setter
    pub set_value_func: Option<String>,
    /// Fundamental `GValue` getter
    pub get_value_func: Option<String>,
    /// Class structure, `Ns.FooClass`
    pub glib_type_struct: Option<Type>,
    /// Implemented interfaces
    pub interfaces: Vec<Type>,
    /// Children
    pub contents: Contents,
}

/// Object interface
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interface {
    /// C type
    pub ctype: Option<String>,
    /// Runtime registration
    pub registration: Registration,
    /// Prerequisite types
    pub prerequisites: Vec<Type>,
    /// Interface structure, `Ns.FooInterface`
    pub glib_type_struct: Option<Type>,
    /// Children
    pub contents: Contents,
}

/// Struct or union
#[derive(Debug, Clone, PartialEq)]
pub struct Compound {
    /// C type
    pub ctype: Option<String>,
    /// Runtime registration, for boxed records
    pub registration: Registration,
    /// `typedef struct _Foo *Foo` or private layout
    pub disguised: bool,
    /// No visible fields
    pub opaque: bool,
    /// Typedef of a pointer
    pub pointer: bool,
    /// `(foreign)`
    pub foreign: bool,
    /// C struct tag
    pub tag_name: Option<String>,
    /// Class or interface this struct is the type structure for
    pub is_gtype_struct_for: Option<Type>,
    /// `(copy-func)`
    pub copy_func: Option<String>,
    /// `(free-func)`
    pub free_func: Option<String>,
    /// Children
    pub contents: Contents,
}

impl Compound {
    /// A record or union
    pub fn new(ctype: Option<String>) -> Self {
        Compound {
            ctype,
            registration: Registration::default(),
            disguised: false,
            opaque: false,
            pointer: false,
            foreign: false,
            tag_name: None,
            is_gtype_struct_for: None,
            copy_func: None,
            free_func: None,
            contents: Contents::default(),
        }
    }
}

/// Boxed or pointer type with no known structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Boxed {
    /// Runtime registration
    pub registration: Registration,
    /// Children
    pub contents: Contents,
}

/// Enumeration or flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enumeration {
    /// C type
    pub ctype: Option<String>,
    /// Runtime registration
    pub registration: Registration,
    /// Members in declaration order
    pub members: Vec<NodeId>,
    /// Associated error domain
    pub error_domain: Option<String>,
    /// Children; only static methods are used
    pub contents: Contents,
}

/// Enumeration member
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Integer value
    pub value: i64,
    /// C identifier
    pub symbol: String,
    /// Runtime nick
    pub nick: Option<String>,
    /// Name as reported by the dump
    pub dump_name: Option<String>,
}

/// Struct, union, class or interface field
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field type; absent for anonymous nodes
    pub typ: Option<Type>,
    /// Readable
    pub readable: bool,
    /// Writable
    pub writable: bool,
    /// Bit width
    pub bits: Option<u32>,
    /// Private field
    pub private: bool,
    /// Inline callback, struct or union
    pub anonymous_node: Option<NodeId>,
}

/// Object property
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property type
    pub typ: Type,
    /// Readable
    pub readable: bool,
    /// Writable
    pub writable: bool,
    /// Set at construction
    pub construct: bool,
    /// Only settable at construction
    pub construct_only: bool,
    /// Transfer
    pub transfer: Transfer,
    /// Setter method name
    pub setter: Option<String>,
    /// Getter method name
    pub getter: Option<String>,
    /// Default value
    pub default_value: Option<String>,
}

/// The closed set of node kinds
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Typedef
    Alias(Alias),
    /// Constant
    Constant(Constant),
    /// Function, including error-quark functions
    Function(Function),
    /// Function-like macro
    FunctionMacro(FunctionMacro),
    /// Callback type
    Callback(Callback),
    /// Virtual method
    VFunction(VFunction),
    /// Signal
    Signal(Signal),
    /// Class
    Class(Class),
    /// Interface
    Interface(Interface),
    /// Struct
    Record(Compound),
    /// Union
    Union(Compound),
    /// Boxed type without structure
    Boxed(Boxed),
    /// Pointer type without structure
    Pointer(Boxed),
    /// Enumeration
    Enum(Enumeration),
    /// Flags
    Bitfield(Enumeration),
    /// Enumeration member
    Member(Member),
    /// Field
    Field(Field),
    /// Property
    Property(Property),
    /// Standalone `SECTION:` documentation
    DocSection,
}

/// A node in the model
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Name within the namespace (or within the parent)
    pub name: String,
    /// Generic metadata
    pub meta: Metadata,
    /// Declared in an included namespace or marked `(foreign)`
    pub foreign: bool,
    /// Where the node was declared
    pub file_positions: BTreeSet<SourcePosition>,
    /// Owning namespace while tracked
    pub namespace: Option<NamespaceId>,
    /// Containing node for children
    pub parent: Option<NodeId>,
    /// Kind-specific payload
    pub kind: NodeKind,
}

impl Node {
    /// A detached node
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        let mut meta = Metadata::default();
        if matches!(kind, NodeKind::FunctionMacro(_)) {
            meta.introspectable = false;
        }
        Node {
            name: name.into(),
            meta,
            foreign: false,
            file_positions: BTreeSet::new(),
            namespace: None,
            parent: None,
            kind,
        }
    }

    /// Human readable kind
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Alias(_) => "Alias",
            NodeKind::Constant(_) => "Constant",
            NodeKind::Function(f) if f.error_domain.is_some() => "ErrorQuarkFunction",
            NodeKind::Function(_) => "Function",
            NodeKind::FunctionMacro(_) => "FunctionMacro",
            NodeKind::Callback(_) => "Callback",
            NodeKind::VFunction(_) => "VFunction",
            NodeKind::Signal(_) => "Signal",
            NodeKind::Class(_) => "Class",
            NodeKind::Interface(_) => "Interface",
            NodeKind::Record(_) => "Record",
            NodeKind::Union(_) => "Union",
            NodeKind::Boxed(_) => "Boxed",
            NodeKind::Pointer(_) => "Pointer",
            NodeKind::Enum(_) => "Enum",
            NodeKind::Bitfield(_) => "Bitfield",
            NodeKind::Member(_) => "Member",
            NodeKind::Field(_) => "Field",
            NodeKind::Property(_) => "Property",
            NodeKind::DocSection => "DocSection",
        }
    }

    /// Signature of callable kinds
    pub fn callable(&self) -> Option<&Callable> {
        match &self.kind {
            NodeKind::Function(f) => Some(&f.callable),
            NodeKind::Callback(c) => Some(&c.callable),
            NodeKind::VFunction(v) => Some(&v.callable),
            NodeKind::Signal(s) => Some(&s.callable),
            _ => None,
        }
    }

    /// Mutable signature of callable kinds
    pub fn callable_mut(&mut self) -> Option<&mut Callable> {
        match &mut self.kind {
            NodeKind::Function(f) => Some(&mut f.callable),
            NodeKind::Callback(c) => Some(&mut c.callable),
            NodeKind::VFunction(v) => Some(&mut v.callable),
            NodeKind::Signal(s) => Some(&mut s.callable),
            _ => None,
        }
    }

    /// Function payload
    pub fn function(&self) -> Option<&Function> {
        match &self.kind {
            NodeKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Mutable function payload
    pub fn function_mut(&mut self) -> Option<&mut Function> {
        match &mut self.kind {
            NodeKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Record or union payload
    pub fn compound(&self) -> Option<&Compound> {
        match &self.kind {
            NodeKind::Record(c) | NodeKind::Union(c) => Some(c),
            _ => None,
        }
    }

    /// Mutable record or union payload
    pub fn compound_mut(&mut self) -> Option<&mut Compound> {
        match &mut self.kind {
            NodeKind::Record(c) | NodeKind::Union(c) => Some(c),
            _ => None,
        }
    }

    /// Class payload
    pub fn class(&self) -> Option<&Class> {
        match &self.kind {
            NodeKind::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Mutable class payload
    pub fn class_mut(&mut self) -> Option<&mut Class> {
        match &mut self.kind {
            NodeKind::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Enum or bitfield payload
    pub fn enumeration(&self) -> Option<&Enumeration> {
        match &self.kind {
            NodeKind::Enum(e) | NodeKind::Bitfield(e) => Some(e),
            _ => None,
        }
    }

    /// Child collections of container kinds
    pub fn contents(&self) -> Option<&Contents> {
        match &self.kind {
            NodeKind::Class(c) => Some(&c.contents),
            NodeKind::Interface(i) => Some(&i.contents),
            NodeKind::Record(c) | NodeKind::Union(c) => Some(&c.contents),
            NodeKind::Boxed(b) | NodeKind::Pointer(b) => Some(&b.contents),
            NodeKind::Enum(e) | NodeKind::Bitfield(e) => Some(&e.contents),
            _ => None,
        }
    }

    /// Mutable child collections of container kinds
    pub fn contents_mut(&mut self) -> Option<&mut Contents> {
        match &mut self.kind {
            NodeKind::Class(c) => Some(&mut c.contents),
            NodeKind::Interface(i) => Some(&mut i.contents),
            NodeKind::Record(c) | NodeKind::Union(c) => Some(&mut c.contents),
            NodeKind::Boxed(b) | NodeKind::Pointer(b) => Some(&mut b.contents),
            NodeKind::Enum(e) | NodeKind::Bitfield(e) => Some(&mut e.contents),
            _ => None,
        }
    }

    /// Registration of registered kinds
    pub fn registration(&self) -> Option<&Registration> {
        match &self.kind {
            NodeKind::Class(c) => Some(&c.registration),
            NodeKind::Interface(i) => Some(&i.registration),
            NodeKind::Record(c) | NodeKind::Union(c) => Some(&c.registration),
            NodeKind::Boxed(b) | NodeKind::Pointer(b) => Some(&b.registration),
            NodeKind::Enum(e) | NodeKind::Bitfield(e) => Some(&e.registration),
            _ => None,
        }
    }

    /// Mutable registration of registered kinds
    pub fn registration_mut(&mut self) -> Option<&mut Registration> {
        match &mut self.kind {
            NodeKind::Class(c) => Some(&mut c.registration),
            NodeKind::Interface(i) => Some(&mut i.registration),
            NodeKind::Record(c) | NodeKind::Union(c) => Some(&mut c.registration),
            NodeKind::Boxed(b) | NodeKind::Pointer(b) => Some(&mut b.registration),
            NodeKind::Enum(e) | NodeKind::Bitfield(e) => Some(&mut e.registration),
            _ => None,
        }
    }

    /// Runtime type name, if registered
    pub fn gtype_name(&self) -> Option<&str> {
        self.registration().and_then(|r| r.gtype_name.as_deref())
    }

    /// Get-type symbol, if registered
    pub fn get_type(&self) -> Option<&str> {
        self.registration().and_then(|r| r.get_type.as_deref())
    }

    /// Symbol prefix of registered kinds
    pub fn c_symbol_prefix(&self) -> Option<&str> {
        self.registration()
            .and_then(|r| r.c_symbol_prefix.as_deref())
    }

    /// C type of kinds that have one
    pub fn ctype(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Alias(a) => a.ctype.as_deref(),
            NodeKind::Constant(c) => c.ctype.as_deref(),
            NodeKind::Callback(c) => c.ctype.as_deref(),
            NodeKind::Class(c) => c.ctype.as_deref(),
            NodeKind::Interface(i) => i.ctype.as_deref(),
            NodeKind::Record(c) | NodeKind::Union(c) => c.ctype.as_deref(),
            NodeKind::Enum(e) | NodeKind::Bitfield(e) => e.ctype.as_deref(),
            _ => None,
        }
    }

    /// C symbol of functions and macros
    pub fn symbol(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Function(f) => Some(&f.symbol),
            NodeKind::FunctionMacro(m) => Some(&m.symbol),
            NodeKind::Member(m) => Some(&m.symbol),
            _ => None,
        }
    }

    /// Whether this kind is a registered type that can be instantiated
    pub fn is_registered_type(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Class(_)
                | NodeKind::Interface(_)
                | NodeKind::Record(_)
                | NodeKind::Union(_)
                | NodeKind::Boxed(_)
                | NodeKind::Pointer(_)
                | NodeKind::Enum(_)
                | NodeKind::Bitfield(_)
        )
    }

    /// Record the declaration position
    pub fn add_file_position(&mut self, position: SourcePosition) {
        self.file_positions.insert(position);
    }

    /// Main position used for diagnostics
    pub fn main_position(&self) -> Option<&SourcePosition> {
        self.file_positions
            .iter()
            .find(|p| p.is_header())
            .or_else(|| self.file_positions.iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::callable::Return;

    #[test]
    fn test_function_macro_is_never_introspectable() {
        let node = Node::new(
            "MAX",
            NodeKind::FunctionMacro(FunctionMacro {
                parameters: Vec::new(),
                symbol: "FOO_MAX".to_string(),
            }),
        );
        assert!(!node.meta.introspectable);
    }

    #[test]
    fn test_accessors_by_kind() {
        let func = Node::new(
            "do_thing",
            NodeKind::Function(Function::new(
                Callable::new(Return::new(Type::none()), Vec::new(), false),
                "foo_do_thing",
            )),
        );
        assert!(func.callable().is_some());
        assert_eq!(func.symbol(), Some("foo_do_thing"));
        assert!(func.contents().is_none());
        assert_eq!(func.kind_name(), "Function");

        let record = Node::new("Rect", NodeKind::Record(Compound::new(Some("FooRect".into()))));
        assert_eq!(record.ctype(), Some("FooRect"));
        assert!(record.contents().is_some());
        assert!(record.is_registered_type());
    }

    #[test]
    fn test_set_attribute_keeps_order() {
        let mut meta = Metadata::default();
        meta.set_attribute("a", "1");
        meta.set_attribute("b", "2");
        meta.set_attribute("a", "3");
        assert_eq!(
            meta.attributes,
            vec![("a".to_string(), "3".to_string()), ("b".to_string(), "2".to_string())]
        );
    }
}
