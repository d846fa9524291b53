//! From front-end declarations to model nodes
//!
//! - [`symbol`]: the scan unit schema
//! - [`names`]: namespace prefix splitting on [`crate::ast::Model`]
//! - [`resolve`]: C type spellings and type resolution
//! - [`traverse`]: symbol to node conversion

pub mod names;
pub mod resolve;
pub mod symbol;
pub mod traverse;

pub use resolve::{bare_container_type, type_from_ctype_string, type_from_source, TypeUse};
pub use symbol::{CTypeKind, ScanUnit, SourceType, Symbol, SymbolKind};
pub use traverse::{name_error_code, Transformer};
