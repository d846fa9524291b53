//! Diagnostic infrastructure for scanner warnings and errors
//!
//! Every pass receives a [`Diagnostics`] sink. Fatal conditions are not
//! recorded here; they are returned as [`crate::error::ScanError`] and stop
//! the pipeline. Warnings are always counted, but only the ones enabled by the
//! [`WarningConfig`] are reported.

use crate::position::SourcePosition;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Non-blocking; shown with `--warn-all`
    Warning,
    /// Pedantic warning; shown with `--strict`
    Strict,
    /// The current node or comment block was abandoned
    Error,
}

impl Severity {
    /// Label used when rendering
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Strict => "warning",
            Severity::Error => "error",
        }
    }
}

// ========================================================================
// Warning codes
// ========================================================================

/// Codes for configurable warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningCode {
    /// Broken comment start or end token (W1001)
    InvalidCommentBlock,
    /// Code before or after the comment on the same line (W1002)
    CodeInComment,
    /// First line is not an identifier (W1003)
    MissingIdentifier,
    /// Identifier, parameter or tag without ':' (W1004)
    MissingColon,
    /// Parameter documented twice (W1005)
    DuplicateParameter,
    /// Tag given twice (W1006)
    DuplicateTag,
    /// Historical tag or annotation spelling (W1007)
    DeprecatedSyntax,
    /// Bad version or stability value (W1008)
    InvalidTagValue,
    /// Variadic parameter spelling (W1009)
    VarargsParameter,
    /// Two comment blocks for one identifier (W1010)
    DuplicateBlock,
    /// Text before the leading '*' of a comment line (W1011)
    InvalidCommentText,
    /// Unbalanced or empty parentheses (W2001)
    MalformedAnnotation,
    /// Annotation name not in the vocabulary (W2002)
    UnknownAnnotation,
    /// Known annotation in the wrong place (W2003)
    UnexpectedAnnotation,
    /// Wrong option count or option value (W2004)
    InvalidAnnotationOptions,
    /// Mutually exclusive annotations (W2005)
    ConflictingAnnotations,
    /// Annotation not applicable to the annotated type (W2006)
    InvalidAnnotationTarget,
    /// Documented parameter that does not exist (W2007)
    UnknownDocParameter,
    /// Rename target missing or already shadowed (W2008)
    InvalidRename,
    /// Type string that could not be resolved (W3001)
    UnknownType,
    /// Identifier or symbol outside every known prefix (W3002)
    UnknownNamespace,
    /// Constructor or method heuristics rejected an annotated function (W3003)
    PairingMismatch,
    /// `(virtual)` names a slot that does not exist (W3004)
    VirtualSlotNotFound,
    /// Property accessor conflicts (W3005)
    AccessorConflict,
    /// Async function without its finish function (W3006)
    AsyncFinishNotFound,
    /// Error quark without an enumeration (W3007)
    ErrorQuarkUnpaired,
    /// Dump entry that does not match the scanned declarations (W3008)
    DumpMismatch,
    /// Declaration the symbol traversal could not convert (W3009)
    SymbolConversion,
    /// Reference through a deprecated spelling (W3010)
    DeprecatedReference,
    /// Type specification with extra parameters or trailing text (W3011)
    InvalidTypeSpec,
    /// Parameter or return of an unresolved type (W4001)
    UnresolvedType,
    /// Container without `(element-type)` (W4002)
    MissingElementType,
    /// Callback parameter without `(scope)` (W4003)
    MissingScope,
    /// Callback used as a return value (W4004)
    CallbackReturn,
    /// Non-boxed structure returned by value (W4005)
    BareStructReturn,
    /// Pointer value without `(transfer)` (W4006)
    MissingTransfer,
    /// Signal emitter that does not match the signal (W4007)
    EmitterMismatch,
    /// Property named like a method, vfunc or signal (W5001)
    NameCollision,
    /// Enumeration member starting with a digit (W5002)
    NumericMemberName,
    /// Questionable annotation on an instance parameter (W5003)
    InstanceParameterAnnotation,
}

impl WarningCode {
    /// Get the warning code string (e.g., "W1001")
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::InvalidCommentBlock => "W1001",
            WarningCode::CodeInComment => "W1002",
            WarningCode::MissingIdentifier => "W1003",
            WarningCode::MissingColon => "W1004",
            WarningCode::DuplicateParameter => "W1005",
            WarningCode::DuplicateTag => "W1006",
            WarningCode::DeprecatedSyntax => "W1007",
            WarningCode::InvalidTagValue => "W1008",
            WarningCode::VarargsParameter => "W1009",
            WarningCode::DuplicateBlock => "W1010",
            WarningCode::InvalidCommentText => "W1011",
            WarningCode::MalformedAnnotation => "W2001",
            WarningCode::UnknownAnnotation => "W2002",
            WarningCode::UnexpectedAnnotation => "W2003",
            WarningCode::InvalidAnnotationOptions => "W2004",
            WarningCode::ConflictingAnnotations => "W2005",
            WarningCode::InvalidAnnotationTarget => "W2006",
            WarningCode::UnknownDocParameter => "W2007",
            WarningCode::InvalidRename => "W2008",
            WarningCode::UnknownType => "W3001",
            WarningCode::UnknownNamespace => "W3002",
            WarningCode::PairingMismatch => "W3003",
            WarningCode::VirtualSlotNotFound => "W3004",
            WarningCode::AccessorConflict => "W3005",
            WarningCode::AsyncFinishNotFound => "W3006",
            WarningCode::ErrorQuarkUnpaired => "W3007",
            WarningCode::DumpMismatch => "W3008",
            WarningCode::SymbolConversion => "W3009",
            WarningCode::DeprecatedReference => "W3010",
            WarningCode::InvalidTypeSpec => "W3011",
            WarningCode::UnresolvedType => "W4001",
            WarningCode::MissingElementType => "W4002",
            WarningCode::MissingScope => "W4003",
            WarningCode::CallbackReturn => "W4004",
            WarningCode::BareStructReturn => "W4005",
            WarningCode::MissingTransfer => "W4006",
            WarningCode::EmitterMismatch => "W4007",
            WarningCode::NameCollision => "W5001",
            WarningCode::NumericMemberName => "W5002",
            WarningCode::InstanceParameterAnnotation => "W5003",
        }
    }

    /// Parse a warning code from a CLI flag name or a code string
    pub fn from_name(name: &str) -> Option<Self> {
        let code = match name {
            "invalid-comment-block" | "W1001" => WarningCode::InvalidCommentBlock,
            "code-in-comment" | "W1002" => WarningCode::CodeInComment,
            "missing-identifier" | "W1003" => WarningCode::MissingIdentifier,
            "missing-colon" | "W1004" => WarningCode::MissingColon,
            "duplicate-parameter" | "W1005" => WarningCode::DuplicateParameter,
            "duplicate-tag" | "W1006" => WarningCode::DuplicateTag,
            "deprecated-syntax" | "W1007" => WarningCode::DeprecatedSyntax,
            "invalid-tag-value" | "W1008" => WarningCode::InvalidTagValue,
            "varargs-parameter" | "W1009" => WarningCode::VarargsParameter,
            "duplicate-block" | "W1010" => WarningCode::DuplicateBlock,
            "invalid-comment-text" | "W1011" => WarningCode::InvalidCommentText,
            "malformed-annotation" | "W2001" => WarningCode::MalformedAnnotation,
            "unknown-annotation" | "W2002" => WarningCode::UnknownAnnotation,
            "unexpected-annotation" | "W2003" => WarningCode::UnexpectedAnnotation,
            "invalid-annotation-options" | "W2004" => WarningCode::InvalidAnnotationOptions,
            "conflicting-annotations" | "W2005" => WarningCode::ConflictingAnnotations,
            "invalid-annotation-target" | "W2006" => WarningCode::InvalidAnnotationTarget,
            "unknown-doc-parameter" | "W2007" => WarningCode::UnknownDocParameter,
            "invalid-rename" | "W2008" => WarningCode::InvalidRename,
            "unknown-type" | "W3001" => WarningCode::UnknownType,
            "unknown-namespace" | "W3002" => WarningCode::UnknownNamespace,
            "pairing-mismatch" | "W3003" => WarningCode::PairingMismatch,
            "virtual-slot-not-found" | "W3004" => WarningCode::VirtualSlotNotFound,
            "accessor-conflict" | "W3005" => WarningCode::AccessorConflict,
            "async-finish-not-found" | "W3006" => WarningCode::AsyncFinishNotFound,
            "error-quark-unpaired" | "W3007" => WarningCode::ErrorQuarkUnpaired,
            "dump-mismatch" | "W3008" => WarningCode::DumpMismatch,
            "symbol-conversion" | "W3009" => WarningCode::SymbolConversion,
            "deprecated-reference" | "W3010" => WarningCode::DeprecatedReference,
            "invalid-type-spec" | "W3011" => WarningCode::InvalidTypeSpec,
            "unresolved-type" | "W4001" => WarningCode::UnresolvedType,
            "missing-element-type" | "W4002" => WarningCode::MissingElementType,
            "missing-scope" | "W4003" => WarningCode::MissingScope,
            "callback-return" | "W4004" => WarningCode::CallbackReturn,
            "bare-struct-return" | "W4005" => WarningCode::BareStructReturn,
            "missing-transfer" | "W4006" => WarningCode::MissingTransfer,
            "emitter-mismatch" | "W4007" => WarningCode::EmitterMismatch,
            "name-collision" | "W5001" => WarningCode::NameCollision,
            "numeric-member-name" | "W5002" => WarningCode::NumericMemberName,
            "instance-parameter-annotation" | "W5003" => WarningCode::InstanceParameterAnnotation,
            _ => return None,
        };
        Some(code)
    }
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========================================================================
// Diagnostics
// ========================================================================

/// A single reported problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,
    /// Warning code, absent for errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<WarningCode>,
    /// Main message
    pub message: String,
    /// Where the problem was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<SourcePosition>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(position) = &self.position {
            write!(f, "{}: ", position)?;
        }
        write!(f, "{}", self.severity.label())?;
        if let Some(code) = self.code {
            write!(f, "[{}]", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Configuration for which warnings are reported
#[derive(Debug, Clone, Default)]
pub struct WarningConfig {
    /// Disabled warning codes (counted but never shown)
    pub disabled: HashSet<WarningCode>,
    /// Show regular warnings (`--warn-all`)
    pub warn_all: bool,
    /// Show and count strict warnings (`--strict`)
    pub strict: bool,
    /// Any warning fails the run (`--warn-error`)
    pub warn_error: bool,
}

impl WarningConfig {
    /// Everything enabled, used by tests and `doc-check`
    pub fn all() -> Self {
        WarningConfig {
            warn_all: true,
            strict: true,
            ..Self::default()
        }
    }

    /// Whether a recorded diagnostic should be shown to the user
    pub fn is_visible(&self, diagnostic: &Diagnostic) -> bool {
        if let Some(code) = diagnostic.code {
            if self.disabled.contains(&code) {
                return false;
            }
        }
        match diagnostic.severity {
            Severity::Error => true,
            Severity::Warning => self.warn_all,
            Severity::Strict => self.strict,
        }
    }
}

/// Accumulator threaded through every pass
#[derive(Debug, Default)]
pub struct Diagnostics {
    config: WarningConfig,
    entries: Vec<Diagnostic>,
    warning_count: usize,
    error_count: usize,
}

impl Diagnostics {
    /// Create a sink with the given visibility configuration
    pub fn new(config: WarningConfig) -> Self {
        Diagnostics {
            config,
            ..Self::default()
        }
    }

    /// The active configuration
    pub fn config(&self) -> &WarningConfig {
        &self.config
    }

    /// Record a warning
    pub fn warn(
        &mut self,
        code: WarningCode,
        message: impl Into<String>,
        position: Option<&SourcePosition>,
    ) {
        self.warning_count += 1;
        self.push(Severity::Warning, Some(code), message.into(), position);
    }

    /// Record a strict-mode warning; only counted when strict mode is on
    pub fn strict(
        &mut self,
        code: WarningCode,
        message: impl Into<String>,
        position: Option<&SourcePosition>,
    ) {
        if self.config.strict {
            self.warning_count += 1;
        }
        self.push(Severity::Strict, Some(code), message.into(), position);
    }

    /// Record an error; the caller abandons the current node or block
    pub fn error(&mut self, message: impl Into<String>, position: Option<&SourcePosition>) {
        self.error_count += 1;
        self.push(Severity::Error, None, message.into(), position);
    }

    /// Record an error that carries a warning code, so it can be filtered
    pub fn coded_error(
        &mut self,
        code: WarningCode,
        message: impl Into<String>,
        position: Option<&SourcePosition>,
    ) {
        self.error_count += 1;
        self.push(Severity::Error, Some(code), message.into(), position);
    }

    fn push(
        &mut self,
        severity: Severity,
        code: Option<WarningCode>,
        message: String,
        position: Option<&SourcePosition>,
    ) {
        tracing::trace!(severity = severity.label(), code = ?code, "{}", message);
        self.entries.push(Diagnostic {
            severity,
            code,
            message,
            position: position.cloned(),
        });
    }

    /// All recorded diagnostics, including suppressed ones
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Diagnostics the configuration allows to be shown
    pub fn visible(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| self.config.is_visible(d))
    }

    /// Whether any recorded diagnostic carries the given code
    pub fn has_code(&self, code: WarningCode) -> bool {
        self.entries.iter().any(|d| d.code == Some(code))
    }

    /// Number of counted warnings
    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Number of errors
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Warnings that were counted but not shown
    pub fn suppressed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning && !self.config.is_visible(d))
            .count()
    }

    /// Whether the warning configuration turns this run into a failure
    pub fn warnings_are_fatal(&self) -> bool {
        self.config.warn_error && self.warning_count > 0
    }

    /// Render the visible diagnostics as a JSON array
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let visible: Vec<&Diagnostic> = self.visible().collect();
        serde_json::to_string_pretty(&visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_codes_round_trip_through_names() {
        for code in [
            WarningCode::InvalidCommentBlock,
            WarningCode::MalformedAnnotation,
            WarningCode::UnknownType,
            WarningCode::MissingTransfer,
            WarningCode::NameCollision,
        ] {
            assert_eq!(WarningCode::from_name(code.as_str()), Some(code));
        }
        assert_eq!(
            WarningCode::from_name("missing-scope"),
            Some(WarningCode::MissingScope)
        );
        assert_eq!(WarningCode::from_name("nope"), None);
    }

    #[test]
    fn test_warnings_hidden_by_default_but_counted() {
        let mut diag = Diagnostics::new(WarningConfig::default());
        diag.warn(WarningCode::UnknownType, "Unknown type: 'Foo'", None);
        diag.error("broken", None);

        assert_eq!(diag.warning_count(), 1);
        assert_eq!(diag.error_count(), 1);
        assert_eq!(diag.suppressed_count(), 1);
        let visible: Vec<_> = diag.visible().collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].severity, Severity::Error);
    }

    #[test]
    fn test_strict_only_counted_in_strict_mode() {
        let mut lax = Diagnostics::new(WarningConfig::default());
        lax.strict(WarningCode::NameCollision, "collision", None);
        assert_eq!(lax.warning_count(), 0);

        let mut strict = Diagnostics::new(WarningConfig {
            strict: true,
            ..WarningConfig::default()
        });
        strict.strict(WarningCode::NameCollision, "collision", None);
        assert_eq!(strict.warning_count(), 1);
        assert_eq!(strict.visible().count(), 1);
    }

    #[test]
    fn test_warn_error_makes_warnings_fatal() {
        let mut diag = Diagnostics::new(WarningConfig {
            warn_error: true,
            ..WarningConfig::default()
        });
        assert!(!diag.warnings_are_fatal());
        diag.warn(WarningCode::MissingColon, "missing ':'", None);
        assert!(diag.warnings_are_fatal());
    }

    #[test]
    fn test_disabled_codes_are_not_visible() {
        let mut config = WarningConfig::all();
        config.disabled.insert(WarningCode::MissingColon);
        let mut diag = Diagnostics::new(config);
        diag.warn(WarningCode::MissingColon, "missing ':'", None);
        diag.warn(WarningCode::UnknownType, "Unknown type", None);
        let shown: Vec<_> = diag.visible().map(|d| d.code).collect();
        assert_eq!(shown, vec![Some(WarningCode::UnknownType)]);
    }

    #[test]
    fn test_display_and_json() {
        let mut diag = Diagnostics::new(WarningConfig::all());
        diag.warn(
            WarningCode::UnknownType,
            "Unknown type: 'Foo'",
            Some(&SourcePosition::new("foo.h", 3)),
        );
        let rendered = diag.entries()[0].to_string();
        assert_eq!(rendered, "foo.h:3: warning[W3001]: Unknown type: 'Foo'");

        let json = diag.to_json().unwrap();
        assert!(json.contains("\"severity\": \"warning\""));
        assert!(json.contains("\"UnknownType\""));
        assert!(json.contains("\"filename\": \"foo.h\""));
    }
}
