//! Diagnostic rendering for CLI commands.
//!
//! Human output uses `termcolor` and respects `NO_COLOR` and `--color`;
//! machine output is a JSON array. Both go to stderr.

use clap::ValueEnum;
use girscan_core::{Diagnostic, Diagnostics, Severity};
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// How diagnostics are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DiagnosticFormat {
    /// Colored text on stderr
    #[default]
    Human,
    /// JSON array on stderr, keeping stdout for GIR
    Json,
}

/// Resolve `ColorChoice` from CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Error => Color::Red,
        Severity::Warning | Severity::Strict => Color::Yellow,
    }
}

/// Write one diagnostic as `position: label[code]: message`
pub fn write_diagnostic<W: WriteColor>(out: &mut W, diagnostic: &Diagnostic) -> io::Result<()> {
    if let Some(position) = &diagnostic.position {
        out.set_color(ColorSpec::new().set_bold(true))?;
        write!(out, "{}: ", position)?;
        out.reset()?;
    }
    out.set_color(
        ColorSpec::new()
            .set_fg(Some(severity_color(diagnostic.severity)))
            .set_bold(true),
    )?;
    write!(out, "{}", diagnostic.severity.label())?;
    if let Some(code) = diagnostic.code {
        write!(out, "[{}]", code)?;
    }
    out.reset()?;
    writeln!(out, ": {}", diagnostic.message)
}

/// Where and how diagnostics are shown
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    format: DiagnosticFormat,
    color: ColorChoice,
}

impl Reporter {
    pub fn new(format: DiagnosticFormat, color: ColorChoice) -> Self {
        Reporter { format, color }
    }

    /// Print every visible diagnostic followed by a summary line
    pub fn report(&self, diagnostics: &Diagnostics) -> io::Result<()> {
        match self.format {
            DiagnosticFormat::Json => {
                let json = diagnostics.to_json().map_err(io::Error::other)?;
                let mut stderr = io::stderr().lock();
                writeln!(stderr, "{}", json)
            }
            DiagnosticFormat::Human => {
                let mut stderr = StandardStream::stderr(self.color);
                for diagnostic in diagnostics.visible() {
                    write_diagnostic(&mut stderr, diagnostic)?;
                }
                write_summary(&mut stderr, diagnostics)
            }
        }
    }
}

fn write_summary<W: WriteColor>(out: &mut W, diagnostics: &Diagnostics) -> io::Result<()> {
    let suppressed = diagnostics.suppressed_count();
    if suppressed > 0 {
        out.set_color(ColorSpec::new().set_dimmed(true))?;
        writeln!(
            out,
            "{} warning{} suppressed, use --warn-all to see them",
            suppressed,
            if suppressed == 1 { "" } else { "s" }
        )?;
        out.reset()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use girscan_core::{SourcePosition, WarningCode, WarningConfig};
    use termcolor::NoColor;

    #[test]
    fn test_write_diagnostic_plain() {
        let mut diagnostics = Diagnostics::new(WarningConfig::all());
        diagnostics.warn(
            WarningCode::MissingColon,
            "missing ':' at column 20",
            Some(&SourcePosition::new("foo.c", 12)),
        );
        let mut out = NoColor::new(Vec::new());
        write_diagnostic(&mut out, &diagnostics.entries()[0]).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert_eq!(text, "foo.c:12: warning[W1004]: missing ':' at column 20\n");
    }

    #[test]
    fn test_summary_counts_suppressed() {
        let mut diagnostics = Diagnostics::new(WarningConfig::default());
        diagnostics.warn(WarningCode::MissingColon, "one", None);
        diagnostics.warn(WarningCode::MissingColon, "two", None);
        let mut out = NoColor::new(Vec::new());
        write_summary(&mut out, &diagnostics).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert_eq!(text, "2 warnings suppressed, use --warn-all to see them\n");
    }

    #[test]
    fn test_no_color_env_wins() {
        // only the flag path is deterministic across environments
        if std::env::var_os("NO_COLOR").is_none() {
            assert!(matches!(resolve_color_choice(Some("never")), ColorChoice::Never));
            assert!(matches!(resolve_color_choice(Some("always")), ColorChoice::Always));
        }
    }
}
