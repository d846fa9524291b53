//! Running the introspection probe
//!
//! The probe is a binary linked against the scanned library. It reads a list
//! of `get-type:` and `error-quark:` requests and writes the runtime type
//! information it finds as dump XML.

use super::xml::DumpDocument;
use crate::error::DumpError;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// A probe invocation: optional launcher words followed by the program
#[derive(Debug, Clone, Default)]
pub struct IntrospectionBinary {
    /// Program and its leading arguments
    pub args: Vec<String>,
    /// Cross launcher prepended to `args`
    pub launcher: Vec<String>,
    /// Keep the scratch directory instead of deleting it
    pub keep_temps: bool,
}

/// Where the runtime type information comes from
#[derive(Debug, Clone)]
pub enum DumpSource {
    /// Run the probe with the collected functions
    Probe(IntrospectionBinary),
    /// Read a previously generated dump
    File(PathBuf),
}

/// Request file contents, one function per line
pub fn request_lines(get_type_functions: &[String], error_quark_functions: &[String]) -> String {
    let mut out = String::new();
    for func in get_type_functions {
        out.push_str("get-type:");
        out.push_str(func);
        out.push('\n');
    }
    for func in error_quark_functions {
        out.push_str("error-quark:");
        out.push_str(func);
        out.push('\n');
    }
    out
}

impl IntrospectionBinary {
    /// A probe without launcher
    pub fn new(args: Vec<String>) -> Self {
        IntrospectionBinary {
            args,
            ..Default::default()
        }
    }

    /// Run the probe and return the dump XML text
    pub fn run(
        &self,
        get_type_functions: &[String],
        error_quark_functions: &[String],
    ) -> Result<String, DumpError> {
        let tmpdir = tempfile::Builder::new().prefix("tmp-introspect").tempdir()?;
        let in_path = tmpdir.path().join("functions.txt");
        let out_path = tmpdir.path().join("dump.xml");
        fs::write(&in_path, request_lines(get_type_functions, error_quark_functions))?;

        let mut words = self.launcher.iter().chain(self.args.iter());
        let program = words.next().cloned().unwrap_or_default();
        let mut command = Command::new(&program);
        command.args(words);
        command.arg(format!(
            "--introspect-dump={},{}",
            in_path.display(),
            out_path.display()
        ));
        debug!(program = %program, functions = get_type_functions.len(), "running introspection probe");

        let status = command.status().map_err(|source| DumpError::Spawn {
            program: program.clone(),
            source,
        })?;
        if !status.success() {
            return Err(DumpError::ProbeFailed {
                program,
                status: status.to_string(),
            });
        }
        let text = fs::read_to_string(&out_path)?;
        if self.keep_temps {
            let kept = tmpdir.into_path();
            debug!(path = %kept.display(), "kept probe scratch directory");
        }
        Ok(text)
    }
}

impl DumpSource {
    /// Obtain and parse the dump
    pub fn load(
        &self,
        get_type_functions: &[String],
        error_quark_functions: &[String],
    ) -> Result<DumpDocument, DumpError> {
        let text = match self {
            DumpSource::Probe(binary) => binary.run(get_type_functions, error_quark_functions)?,
            DumpSource::File(path) => fs::read_to_string(path)?,
        };
        DumpDocument::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_lines() {
        let text = request_lines(
            &["foo_widget_get_type".to_string()],
            &["foo_error_quark".to_string()],
        );
        assert_eq!(text, "get-type:foo_widget_get_type\nerror-quark:foo_error_quark\n");
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let binary = IntrospectionBinary::new(vec!["/nonexistent/girscan-probe".to_string()]);
        let err = binary.run(&[], &[]).unwrap_err();
        assert!(matches!(err, DumpError::Spawn { .. }));
    }

    #[test]
    fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.xml");
        fs::write(&path, "<dump><boxed name=\"FooBox\" get-type=\"foo_box_get_type\"/></dump>").unwrap();
        let doc = DumpSource::File(path).load(&[], &[]).unwrap();
        assert_eq!(doc.entries.len(), 1);
    }
}
