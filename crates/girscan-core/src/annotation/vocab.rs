//! Tag and annotation vocabulary

/// Tags recognised in comment blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// `Deprecated:`
    Deprecated,
    /// `Returns:`
    Returns,
    /// `Since:`
    Since,
    /// `Stability:`
    Stability,
    /// `Description:` (deprecated)
    Description,
    /// `Return value:` (deprecated)
    ReturnValue,
    /// `Return:` (deprecated)
    Return,
    /// `Returns value:` (deprecated)
    ReturnsValue,
    /// `Attributes:` (deprecated annotation tag)
    Attributes,
    /// `Get value func:` (deprecated annotation tag)
    GetValueFunc,
    /// `Ref func:` (deprecated annotation tag)
    RefFunc,
    /// `Rename to:` (deprecated annotation tag)
    RenameTo,
    /// `Set value func:` (deprecated annotation tag)
    SetValueFunc,
    /// `Transfer:` (deprecated annotation tag)
    Transfer,
    /// `Type:` (deprecated annotation tag)
    Type,
    /// `Unref func:` (deprecated annotation tag)
    UnrefFunc,
    /// `Value:` (deprecated annotation tag)
    Value,
    /// `Virtual:` (deprecated annotation tag)
    Virtual,
}

/// Every tag, in the order the tag pattern tries them
pub const ALL_TAGS: &[Tag] = &[
    Tag::Deprecated,
    Tag::Returns,
    Tag::Since,
    Tag::Stability,
    Tag::Description,
    Tag::ReturnValue,
    Tag::Return,
    Tag::ReturnsValue,
    Tag::Attributes,
    Tag::GetValueFunc,
    Tag::RefFunc,
    Tag::RenameTo,
    Tag::SetValueFunc,
    Tag::Transfer,
    Tag::Type,
    Tag::UnrefFunc,
    Tag::Value,
    Tag::Virtual,
];

impl Tag {
    /// Lowercase tag name
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Deprecated => "deprecated",
            Tag::Returns => "returns",
            Tag::Since => "since",
            Tag::Stability => "stability",
            Tag::Description => "description",
            Tag::ReturnValue => "return value",
            Tag::Return => "return",
            Tag::ReturnsValue => "returns value",
            Tag::Attributes => "attributes",
            Tag::GetValueFunc => "get value func",
            Tag::RefFunc => "ref func",
            Tag::RenameTo => "rename to",
            Tag::SetValueFunc => "set value func",
            Tag::Transfer => "transfer",
            Tag::Type => "type",
            Tag::UnrefFunc => "unref func",
            Tag::Value => "value",
            Tag::Virtual => "virtual",
        }
    }

    /// Parse a tag name, ignoring case and collapsing inner whitespace
    pub fn from_name(name: &str) -> Option<Tag> {
        let normalized = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        ALL_TAGS.iter().copied().find(|t| t.as_str() == normalized)
    }

    /// Tags that used to stand in for identifier annotations
    pub fn is_annotation_tag(&self) -> bool {
        matches!(
            self,
            Tag::Attributes
                | Tag::GetValueFunc
                | Tag::RefFunc
                | Tag::RenameTo
                | Tag::SetValueFunc
                | Tag::Transfer
                | Tag::Type
                | Tag::UnrefFunc
                | Tag::Value
                | Tag::Virtual
        )
    }

    /// Spellings of the return value tag
    pub fn is_returns(&self) -> bool {
        matches!(
            self,
            Tag::Return | Tag::Returns | Tag::ReturnValue | Tag::ReturnsValue
        )
    }
}

/// Annotations understood by the transformer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Annotation {
    /// `(allow-none)`
    AllowNone,
    /// `(array ...)`
    Array,
    /// `(async-func name)`
    AsyncFunc,
    /// `(attributes key=value ...)`
    Attributes,
    /// `(closure [param])`
    Closure,
    /// `(constructor)`
    Constructor,
    /// `(copy-func name)`
    CopyFunc,
    /// `(default-value value)`
    DefaultValue,
    /// `(destroy param)`
    Destroy,
    /// `(element-type type [type])`
    ElementType,
    /// `(emitter method)`
    Emitter,
    /// `(finish-func name)`
    FinishFunc,
    /// `(foreign)`
    Foreign,
    /// `(free-func name)`
    FreeFunc,
    /// `(get-property name)`
    GetProperty,
    /// `(get-value-func name)`
    GetValueFunc,
    /// `(getter method)`
    Getter,
    /// `(in)`
    In,
    /// `(inout)`
    InOut,
    /// `(method)`
    Method,
    /// `(nullable)`
    Nullable,
    /// `(optional)`
    Optional,
    /// `(not nullable|optional)`
    Not,
    /// `(out [caller-allocates|callee-allocates])`
    Out,
    /// `(ref-func name)`
    RefFunc,
    /// `(rename-to name)`
    RenameTo,
    /// `(scope call|async|notified|forever)`
    Scope,
    /// `(set-property name)`
    SetProperty,
    /// `(set-value-func name)`
    SetValueFunc,
    /// `(setter method)`
    Setter,
    /// `(skip)`
    Skip,
    /// `(sync-func name)`
    SyncFunc,
    /// `(transfer none|container|full|floating)`
    Transfer,
    /// `(type name)`
    Type,
    /// `(unref-func name)`
    UnrefFunc,
    /// `(virtual slot)`
    Virtual,
    /// `(value value)`
    Value,
    /// `(attribute key value)` (deprecated)
    Attribute,
    /// `(in-out)` (deprecated)
    InOutAlt,
}

const ALL_ANNOTATIONS: &[Annotation] = &[
    Annotation::AllowNone,
    Annotation::Array,
    Annotation::AsyncFunc,
    Annotation::Attributes,
    Annotation::Closure,
    Annotation::Constructor,
    Annotation::CopyFunc,
    Annotation::DefaultValue,
    Annotation::Destroy,
    Annotation::ElementType,
    Annotation::Emitter,
    Annotation::FinishFunc,
    Annotation::Foreign,
    Annotation::FreeFunc,
    Annotation::GetProperty,
    Annotation::GetValueFunc,
    Annotation::Getter,
    Annotation::In,
    Annotation::InOut,
    Annotation::Method,
    Annotation::Nullable,
    Annotation::Optional,
    Annotation::Not,
    Annotation::Out,
    Annotation::RefFunc,
    Annotation::RenameTo,
    Annotation::Scope,
    Annotation::SetProperty,
    Annotation::SetValueFunc,
    Annotation::Setter,
    Annotation::Skip,
    Annotation::SyncFunc,
    Annotation::Transfer,
    Annotation::Type,
    Annotation::UnrefFunc,
    Annotation::Virtual,
    Annotation::Value,
    Annotation::Attribute,
    Annotation::InOutAlt,
];

impl Annotation {
    /// Annotation name as written
    pub fn as_str(&self) -> &'static str {
        match self {
            Annotation::AllowNone => "allow-none",
            Annotation::Array => "array",
            Annotation::AsyncFunc => "async-func",
            Annotation::Attributes => "attributes",
            Annotation::Closure => "closure",
            Annotation::Constructor => "constructor",
            Annotation::CopyFunc => "copy-func",
            Annotation::DefaultValue => "default-value",
            Annotation::Destroy => "destroy",
            Annotation::ElementType => "element-type",
            Annotation::Emitter => "emitter",
            Annotation::FinishFunc => "finish-func",
            Annotation::Foreign => "foreign",
            Annotation::FreeFunc => "free-func",
            Annotation::GetProperty => "get-property",
            Annotation::GetValueFunc => "get-value-func",
            Annotation::Getter => "getter",
            Annotation::In => "in",
            Annotation::InOut => "inout",
            Annotation::Method => "method",
            Annotation::Nullable => "nullable",
            Annotation::Optional => "optional",
            Annotation::Not => "not",
            Annotation::Out => "out",
            Annotation::RefFunc => "ref-func",
            Annotation::RenameTo => "rename-to",
            Annotation::Scope => "scope",
            Annotation::SetProperty => "set-property",
            Annotation::SetValueFunc => "set-value-func",
            Annotation::Setter => "setter",
            Annotation::Skip => "skip",
            Annotation::SyncFunc => "sync-func",
            Annotation::Transfer => "transfer",
            Annotation::Type => "type",
            Annotation::UnrefFunc => "unref-func",
            Annotation::Virtual => "virtual",
            Annotation::Value => "value",
            Annotation::Attribute => "attribute",
            Annotation::InOutAlt => "in-out",
        }
    }

    /// Look up a known annotation name
    pub fn from_name(name: &str) -> Option<Annotation> {
        ALL_ANNOTATIONS.iter().copied().find(|a| a.as_str() == name)
    }

    /// Annotations whose options are `key[=value]` pairs
    pub fn takes_dict(&self) -> bool {
        matches!(self, Annotation::Array | Annotation::Attributes)
    }
}

/// Which comment block part an annotation set belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotatedPart {
    /// The identifier line
    Identifier,
    /// An `@param` part
    Parameter,
    /// A tag part
    Tag,
}

impl AnnotatedPart {
    /// Annotations valid on this part
    pub fn valid_annotations(&self) -> &'static [Annotation] {
        use Annotation::*;
        match self {
            AnnotatedPart::Identifier => &[
                Attributes, AsyncFunc, Constructor, CopyFunc, DefaultValue, Emitter, FinishFunc,
                Foreign, FreeFunc, GetProperty, GetValueFunc, Getter, Method, RefFunc, RenameTo,
                SetProperty, SetValueFunc, Setter, Skip, SyncFunc, Transfer, Type, UnrefFunc,
                Value, Virtual,
            ],
            AnnotatedPart::Parameter => &[
                AllowNone, Array, Attributes, Closure, Destroy, ElementType, In, InOut, Out,
                Scope, Skip, Transfer, Type, Optional, Nullable, Not,
            ],
            AnnotatedPart::Tag => &[
                AllowNone, Array, Attributes, ElementType, Skip, Transfer, Type, Nullable,
                Optional, Not,
            ],
        }
    }
}

/// How many options an annotation accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many
    Exact(usize),
    /// At most this many
    AtMost(usize),
    /// Between the bounds, inclusive
    Between(usize, usize),
    /// Free form
    Any,
}

/// Option count and allowed first option of a known annotation
pub fn option_rules(annotation: Annotation) -> (Arity, Option<&'static [&'static str]>) {
    use Annotation::*;
    match annotation {
        AllowNone | Constructor | Foreign | In | InOut | Method | Nullable | Optional | Skip => {
            (Arity::Exact(0), None)
        }
        AsyncFunc | CopyFunc | Destroy | Emitter | FinishFunc | FreeFunc | GetProperty
        | GetValueFunc | Getter | RefFunc | RenameTo | SetProperty | SetValueFunc | Setter
        | SyncFunc | Type | UnrefFunc | Value | Virtual => (Arity::Exact(1), None),
        Closure => (Arity::AtMost(1), None),
        ElementType => (Arity::Between(1, 2), None),
        Not => (Arity::Exact(1), Some(NOT_OPTIONS)),
        Out => (Arity::AtMost(1), Some(OUT_OPTIONS)),
        Scope => (Arity::Exact(1), Some(SCOPE_OPTIONS)),
        Transfer => (Arity::Exact(1), Some(TRANSFER_OPTIONS)),
        Array | Attributes | DefaultValue | Attribute | InOutAlt => (Arity::Any, None),
    }
}

/// `(array)` keys
pub const ARRAY_OPTIONS: &[&str] = &["fixed-size", "length", "zero-terminated"];
/// `(out)` options
pub const OUT_OPTIONS: &[&str] = &["callee-allocates", "caller-allocates"];
/// `(not)` options
pub const NOT_OPTIONS: &[&str] = &["nullable", "optional"];
/// `(scope)` options
pub const SCOPE_OPTIONS: &[&str] = &["async", "call", "notified", "forever"];
/// `(transfer)` options
pub const TRANSFER_OPTIONS: &[&str] = &["container", "floating", "full", "none"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_lookup_is_case_insensitive() {
        assert_eq!(Tag::from_name("Returns"), Some(Tag::Returns));
        assert_eq!(Tag::from_name("Return  Value"), Some(Tag::ReturnValue));
        assert_eq!(Tag::from_name("Rename to"), Some(Tag::RenameTo));
        assert_eq!(Tag::from_name("Note"), None);
        assert!(Tag::RenameTo.is_annotation_tag());
        assert!(Tag::ReturnsValue.is_returns());
    }

    #[test]
    fn test_annotation_names() {
        for annotation in ALL_ANNOTATIONS {
            assert_eq!(Annotation::from_name(annotation.as_str()), Some(*annotation));
        }
        assert!(Annotation::Array.takes_dict());
        assert!(!Annotation::Transfer.takes_dict());
    }

    #[test]
    fn test_part_vocabulary() {
        assert!(AnnotatedPart::Parameter
            .valid_annotations()
            .contains(&Annotation::Scope));
        assert!(!AnnotatedPart::Tag
            .valid_annotations()
            .contains(&Annotation::Scope));
        assert!(AnnotatedPart::Identifier
            .valid_annotations()
            .contains(&Annotation::RenameTo));
    }
}
