//! GIR documents: writing, reading and the write/read/write self-check

pub mod include;
pub mod reader;
pub mod writer;
pub mod xml;

pub use include::{find_include, gir_search_path, load_file, load_include};
pub use reader::GirReader;
pub use writer::{write_gir, GirWriter};

use crate::ast::Model;
use crate::error::ScanError;
use std::path::PathBuf;
use tracing::debug;

/// Repository version written and accepted
pub const COMPATIBLE_GIR_VERSION: &str = "1.2";

/// Re-read a written document, write it again and compare
///
/// Returns the first written document when both writes agree.
pub fn round_trip(model: &Model, sources_roots: &[PathBuf]) -> Result<String, ScanError> {
    let scanned = GirWriter::new(model)
        .with_sources_roots(sources_roots.to_vec())
        .write()?;
    let reparsed = GirReader::new().read_model(&scanned)?;
    let passthrough = GirWriter::new(&reparsed)
        .with_sources_roots(sources_roots.to_vec())
        .write()?;
    compare_documents(&scanned, &passthrough)?;
    debug!(bytes = scanned.len(), "round trip matched");
    Ok(scanned)
}

/// First differing line between two documents, as an error
pub fn compare_documents(scanned: &str, passthrough: &str) -> Result<(), ScanError> {
    let mut left = scanned.lines();
    let mut right = passthrough.lines();
    let mut line = 0;
    loop {
        line += 1;
        match (left.next(), right.next()) {
            (None, None) => return Ok(()),
            (a, b) if a == b => continue,
            (a, b) => {
                return Err(ScanError::RoundTripMismatch {
                    line,
                    scanned: a.unwrap_or_default().to_string(),
                    passthrough: b.unwrap_or_default().to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_identical() {
        assert!(compare_documents("<a>\n</a>\n", "<a>\n</a>\n").is_ok());
    }

    #[test]
    fn test_compare_reports_first_difference() {
        let err = compare_documents("<a>\n  <b/>\n</a>\n", "<a>\n  <c/>\n</a>\n").unwrap_err();
        match err {
            ScanError::RoundTripMismatch {
                line,
                scanned,
                passthrough,
            } => {
                assert_eq!(line, 2);
                assert_eq!(scanned, "  <b/>");
                assert_eq!(passthrough, "  <c/>");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_compare_missing_trailing_line() {
        let err = compare_documents("<a/>\n<b/>\n", "<a/>\n").unwrap_err();
        assert!(matches!(err, ScanError::RoundTripMismatch { line: 2, ref passthrough, .. } if passthrough.is_empty()));
    }
}
