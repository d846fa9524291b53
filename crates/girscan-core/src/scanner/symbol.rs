//! Scan unit schema
//!
//! A scan unit is what the C front end hands us: the ordered declarations of
//! a set of headers and sources, plus every `/** ... */` comment found in
//! them. Units are JSON documents.

use crate::annotation::RawComment;
use crate::error::ScanError;
use crate::position::SourcePosition;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Declaration kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// Unparseable declaration
    Invalid,
    /// `...` in a parameter list
    Ellipsis,
    /// `#define FOO 1`
    Const,
    /// Variable declaration
    Object,
    /// Function prototype
    Function,
    /// Function-like macro
    FunctionMacro,
    /// Struct definition (tag namespace)
    Struct,
    /// Union definition (tag namespace)
    Union,
    /// Enum definition
    Enum,
    /// `typedef`
    Typedef,
    /// Struct/union member or function parameter
    Member,
}

impl SymbolKind {
    /// Lowercase name used in messages
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Invalid => "invalid",
            SymbolKind::Ellipsis => "ellipsis",
            SymbolKind::Const => "const",
            SymbolKind::Object => "object",
            SymbolKind::Function => "function",
            SymbolKind::FunctionMacro => "function_macro",
            SymbolKind::Struct => "struct",
            SymbolKind::Union => "union",
            SymbolKind::Enum => "enum",
            SymbolKind::Typedef => "typedef",
            SymbolKind::Member => "member",
        }
    }
}

/// C type constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CTypeKind {
    /// Unknown
    Invalid,
    /// `void`
    Void,
    /// Builtin arithmetic type
    Basic,
    /// Typedef name
    Typedef,
    /// `struct`
    Struct,
    /// `union`
    Union,
    /// `enum`
    Enum,
    /// Pointer to `base_type`
    Pointer,
    /// Array of `base_type`; dimensions in `child_list`
    Array,
    /// Function returning `base_type`; parameters in `child_list`
    Function,
}

impl CTypeKind {
    /// Lowercase name used in messages
    pub fn as_str(&self) -> &'static str {
        match self {
            CTypeKind::Invalid => "invalid",
            CTypeKind::Void => "void",
            CTypeKind::Basic => "basic",
            CTypeKind::Typedef => "typedef",
            CTypeKind::Struct => "struct",
            CTypeKind::Union => "union",
            CTypeKind::Enum => "enum",
            CTypeKind::Pointer => "pointer",
            CTypeKind::Array => "array",
            CTypeKind::Function => "function",
        }
    }
}

/// A C type expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceType {
    /// Type constructor
    pub kind: CTypeKind,
    /// Name of basic, typedef, struct, union and enum types
    #[serde(default)]
    pub name: Option<String>,
    /// Pointee, element or return type
    #[serde(default)]
    pub base_type: Option<Box<SourceType>>,
    /// Struct members, enum values, function parameters or array sizes
    #[serde(default)]
    pub child_list: Vec<Symbol>,
    /// `const` qualified
    #[serde(default)]
    pub is_const: bool,
    /// `volatile` qualified
    #[serde(default)]
    pub is_volatile: bool,
    /// `inline` function specifier
    #[serde(default)]
    pub is_inline: bool,
    /// Enum used as flags
    #[serde(default)]
    pub is_bitfield: bool,
}

impl SourceType {
    /// A type with no children or qualifiers
    pub fn new(kind: CTypeKind, name: Option<&str>) -> Self {
        SourceType {
            kind,
            name: name.map(str::to_string),
            base_type: None,
            child_list: Vec::new(),
            is_const: false,
            is_volatile: false,
            is_inline: false,
            is_bitfield: false,
        }
    }

    /// `name`
    pub fn basic(name: &str) -> Self {
        SourceType::new(CTypeKind::Basic, Some(name))
    }

    /// A typedef name
    pub fn typedef(name: &str) -> Self {
        SourceType::new(CTypeKind::Typedef, Some(name))
    }

    /// `void`
    pub fn void() -> Self {
        SourceType::new(CTypeKind::Void, None)
    }

    /// Pointer to `base`
    pub fn pointer(base: SourceType) -> Self {
        SourceType {
            base_type: Some(Box::new(base)),
            ..SourceType::new(CTypeKind::Pointer, None)
        }
    }

    /// Function returning `ret` and taking `params`
    pub fn function(ret: SourceType, params: Vec<Symbol>) -> Self {
        SourceType {
            base_type: Some(Box::new(ret)),
            child_list: params,
            ..SourceType::new(CTypeKind::Function, None)
        }
    }

    /// Builder: mark `const`
    pub fn constant(mut self) -> Self {
        self.is_const = true;
        self
    }

    /// Pointee or element kind
    pub fn base_kind(&self) -> Option<CTypeKind> {
        self.base_type.as_ref().map(|b| b.kind)
    }
}

/// A declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// Declaration kind
    pub kind: SymbolKind,
    /// Declared name; absent for unnamed parameters
    #[serde(default)]
    pub ident: Option<String>,
    /// Declared type
    #[serde(default)]
    pub base_type: Option<SourceType>,
    /// File of the declaration
    #[serde(default)]
    pub source_filename: Option<String>,
    /// Line of the declaration
    #[serde(default)]
    pub line: u32,
    /// Integer value (constants, enum values, bit widths, array sizes)
    #[serde(default)]
    pub const_int: Option<i64>,
    /// Floating point constant value
    #[serde(default)]
    pub const_double: Option<f64>,
    /// String constant value
    #[serde(default)]
    pub const_string: Option<String>,
    /// Boolean constant value
    #[serde(default)]
    pub const_boolean: Option<bool>,
    /// Marked private by a `/*< private >*/` section
    #[serde(default)]
    pub private: bool,
}

impl Symbol {
    /// A declaration without type or value
    pub fn new(kind: SymbolKind, ident: &str) -> Self {
        Symbol {
            kind,
            ident: Some(ident.to_string()),
            base_type: None,
            source_filename: None,
            line: 0,
            const_int: None,
            const_double: None,
            const_string: None,
            const_boolean: None,
            private: false,
        }
    }

    /// Builder: set the declared type
    pub fn with_type(mut self, base_type: SourceType) -> Self {
        self.base_type = Some(base_type);
        self
    }

    /// Builder: set the source location
    pub fn at(mut self, filename: &str, line: u32) -> Self {
        self.source_filename = Some(filename.to_string());
        self.line = line;
        self
    }

    /// The identifier, empty when unnamed
    pub fn ident(&self) -> &str {
        self.ident.as_deref().unwrap_or("")
    }

    /// Where the declaration is, if known
    pub fn position(&self) -> Option<SourcePosition> {
        self.source_filename
            .as_ref()
            .map(|f| SourcePosition::new(f.clone(), self.line))
    }

    /// Whether the declaration lives in a header
    pub fn in_header(&self) -> bool {
        self.source_filename
            .as_deref()
            .is_some_and(|f| f.ends_with(".h"))
    }

    /// Children of the declared type
    pub fn children(&self) -> &[Symbol] {
        self.base_type
            .as_ref()
            .map(|t| t.child_list.as_slice())
            .unwrap_or(&[])
    }
}

/// One front-end output file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanUnit {
    /// Declarations in source order
    #[serde(default)]
    pub symbols: Vec<Symbol>,
    /// Documentation comments
    #[serde(default)]
    pub comments: Vec<RawComment>,
}

impl ScanUnit {
    /// Parse a unit from JSON text
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Read a unit from disk
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ScanError::ScanUnit {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Concatenate several units, keeping their order
    pub fn merge(units: Vec<ScanUnit>) -> ScanUnit {
        let mut merged = ScanUnit::default();
        for unit in units {
            merged.symbols.extend(unit.symbols);
            merged.comments.extend(unit.comments);
        }
        merged
    }
}
