//! `girscan doc-check`: parse the comment blocks of one unit.

use crate::output::Reporter;
use anyhow::Context;
use girscan_core::annotation::CommentBlockWriter;
use girscan_core::{doc_check, Diagnostics, ScanUnit, WarningCode, WarningConfig};
use std::path::PathBuf;

pub fn execute(
    unit: PathBuf,
    rewrite: bool,
    disable: Vec<String>,
    reporter: &Reporter,
) -> anyhow::Result<()> {
    let mut config = WarningConfig::all();
    for name in &disable {
        let code = WarningCode::from_name(name)
            .with_context(|| format!("unknown warning '{}'", name))?;
        config.disabled.insert(code);
    }

    let scan_unit = ScanUnit::load(&unit)?;
    let mut diagnostics = Diagnostics::new(config);
    let blocks = doc_check(&scan_unit, &mut diagnostics);
    tracing::debug!(blocks = blocks.len(), "parsed comment blocks");

    if rewrite {
        let writer = CommentBlockWriter::new();
        let text: String = blocks
            .values()
            .map(|block| format!("{}\n\n", writer.write(block)))
            .collect();
        super::write_output(None, &text)?;
    }

    reporter.report(&diagnostics)?;
    let problems = diagnostics.visible().count();
    if problems > 0 {
        anyhow::bail!(
            "{} problem{} in {}",
            problems,
            if problems == 1 { "" } else { "s" },
            unit.display()
        );
    }
    Ok(())
}
