//! Error types for fatal scanner failures
//!
//! Anything that can be recovered from goes to the diagnostics sink instead.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal failures that stop the pipeline
#[derive(Debug, Error)]
pub enum ScanError {
    /// Two distinct nodes claim the same name
    #[error("Namespace conflict for '{name}'")]
    NamespaceConflict {
        /// Conflicting name
        name: String,
    },

    /// Nothing was scanned into the namespace
    #[error(
        "Namespace is empty; likely causes are:\n\
         * Not including .h files to be scanned\n\
         * Broken identifier prefix"
    )]
    EmptyNamespace,

    /// An annotation names a parameter that does not exist
    #[error("can't find parameter {param} referenced by {origin} of '{callable}'")]
    UnknownParameterReference {
        /// Referenced parameter name
        param: String,
        /// Description of the annotated element
        origin: String,
        /// Owning callable
        callable: String,
    },

    /// An annotation names a field that does not exist
    #[error("can't find field {field} referenced by {origin} of '{parent}'")]
    UnknownFieldReference {
        /// Referenced field name
        field: String,
        /// Description of the annotated element
        origin: String,
        /// Owning compound
        parent: String,
    },

    /// A runtime type name cannot be mapped onto the namespace
    #[error(transparent)]
    Name(#[from] NameError),

    /// A dynamic type's get-type function leaves no type name
    #[error(
        "The GObject name '{type_name}' isn't compatible with the configured identifier prefixes: {prefixes:?}"
    )]
    IncompatibleTypeName {
        /// Runtime type name
        type_name: String,
        /// Configured identifier prefixes
        prefixes: Vec<String>,
    },

    /// The probe or its dump failed
    #[error(transparent)]
    Dump(#[from] DumpError),

    /// Reading or writing GIR failed
    #[error(transparent)]
    Gir(#[from] GirError),

    /// The written GIR does not survive a read/write cycle
    #[error("Failed to re-parse gir file; output differs at line {line}:\n  scanned:     {scanned}\n  passthrough: {passthrough}")]
    RoundTripMismatch {
        /// First differing line (1-based)
        line: usize,
        /// Line from the first write
        scanned: String,
        /// Line from the re-parsed write
        passthrough: String,
    },

    /// Warnings were configured as fatal
    #[error("warnings configured as fatal ({count} warnings)")]
    WarningsAsErrors {
        /// Number of warnings
        count: usize,
    },

    /// A scan unit could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// A scan unit is not valid JSON for the symbol schema
    #[error("invalid scan unit {}: {source}", path.display())]
    ScanUnit {
        /// File being read
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// An include could not be located on the include path
    #[error("Couldn't find include '{0}' (search path: {1:?})")]
    IncludeNotFound(String, Vec<PathBuf>),

    /// An include string is not `Name-Version`
    #[error("Malformed include '{0}'")]
    MalformedInclude(String),
}

/// Failures mapping C identifiers and symbols onto a namespace
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// No namespace prefix matches an identifier
    #[error("Unknown namespace for identifier '{0}'")]
    UnknownIdentifierNamespace(String),

    /// No namespace prefix matches a symbol
    #[error("Unknown namespace for symbol '{0}'")]
    UnknownSymbolNamespace(String),

    /// The identifier belongs to an included namespace
    #[error("Skipping foreign identifier '{identifier}' from namespace {namespace}")]
    ForeignIdentifier {
        /// The identifier
        identifier: String,
        /// Namespace it belongs to
        namespace: String,
    },

    /// The symbol belongs to an included namespace
    #[error("Skipping foreign symbol from namespace {0}")]
    ForeignSymbol(String),
}

/// Failures reading or writing GIR documents
#[derive(Debug, Error)]
pub enum GirError {
    /// Malformed XML
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Serializing the document failed
    #[error("XML write error: {0}")]
    Write(#[from] std::io::Error),

    /// Malformed attribute
    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// Repository version mismatch
    #[error("Incompatible version {found} (supported: {expected})")]
    IncompatibleVersion {
        /// Version in the document
        found: String,
        /// Version this reader understands
        expected: &'static str,
    },

    /// Required attribute missing
    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        /// Element name
        element: String,
        /// Attribute name
        attribute: &'static str,
    },

    /// Document without a namespace element
    #[error("GIR document has no <namespace> element")]
    MissingNamespace,

    /// Structurally invalid document
    #[error("invalid GIR: {0}")]
    Invalid(String),

    /// The writer met a type that never got resolved
    #[error("Caught unresolved type '{0}' while writing")]
    UnresolvedType(String),

    /// File access failed
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

/// Failures running the introspection probe or reading its dump
#[derive(Debug, Error)]
pub enum DumpError {
    /// Scratch files could not be written or read
    #[error("probe I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The probe could not be started
    #[error("failed to execute probe '{program}': {source}")]
    Spawn {
        /// Program path
        program: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// The probe exited unsuccessfully
    #[error("probe '{program}' exited with {status}")]
    ProbeFailed {
        /// Program path
        program: String,
        /// Exit status description
        status: String,
    },

    /// Malformed dump XML
    #[error("dump XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed dump attribute
    #[error("dump attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// Required dump attribute missing
    #[error("<{element}> in dump is missing attribute '{attribute}'")]
    MissingAttribute {
        /// Element name
        element: String,
        /// Attribute name
        attribute: &'static str,
    },

    /// Unexpected element at top level
    #[error("Unhandled introspection XML tag {0}")]
    UnknownElement(String),

    /// Numeric attribute that does not parse
    #[error("invalid value '{value}' for '{attribute}' in dump")]
    InvalidValue {
        /// Attribute name
        attribute: &'static str,
        /// Raw value
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message() {
        let err = ScanError::NamespaceConflict {
            name: "Widget".to_string(),
        };
        assert_eq!(err.to_string(), "Namespace conflict for 'Widget'");
    }

    #[test]
    fn test_name_error_converts() {
        let err: ScanError = NameError::UnknownSymbolNamespace("bar_baz".to_string()).into();
        assert!(err.to_string().contains("bar_baz"));
    }

    #[test]
    fn test_round_trip_message_shows_both_lines() {
        let err = ScanError::RoundTripMismatch {
            line: 4,
            scanned: "<a/>".to_string(),
            passthrough: "<b/>".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("line 4"));
        assert!(text.contains("<a/>") && text.contains("<b/>"));
    }
}
