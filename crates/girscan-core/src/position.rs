//! Source positions attached to nodes, comment blocks and diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A location in a scanned source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourcePosition {
    /// File the declaration or comment came from
    pub filename: String,
    /// 1-based line number
    pub line: u32,
    /// 1-based column, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl SourcePosition {
    /// Create a position without column information
    pub fn new(filename: impl Into<String>, line: u32) -> Self {
        SourcePosition {
            filename: filename.into(),
            line,
            column: None,
        }
    }

    /// Create a position with a column
    pub fn with_column(filename: impl Into<String>, line: u32, column: u32) -> Self {
        SourcePosition {
            filename: filename.into(),
            line,
            column: Some(column),
        }
    }

    /// Position of a line relative to this one (same file)
    pub fn offset_line(&self, delta: u32) -> Self {
        SourcePosition {
            filename: self.filename.clone(),
            line: self.line + delta,
            column: None,
        }
    }

    /// Whether this position points into a header file
    pub fn is_header(&self) -> bool {
        self.filename.ends_with(".h")
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => write!(f, "{}:{}:{}", self.filename, self.line, column),
            None => write!(f, "{}:{}", self.filename, self.line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_and_without_column() {
        assert_eq!(SourcePosition::new("foo.h", 12).to_string(), "foo.h:12");
        assert_eq!(
            SourcePosition::with_column("foo.c", 3, 7).to_string(),
            "foo.c:3:7"
        );
    }

    #[test]
    fn test_ordering_by_file_then_line() {
        let a = SourcePosition::new("a.h", 20);
        let b = SourcePosition::new("b.h", 1);
        let c = SourcePosition::new("a.h", 3);
        let mut all = vec![a.clone(), b.clone(), c.clone()];
        all.sort();
        assert_eq!(all, vec![c, a, b]);
    }
}
