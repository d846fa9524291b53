//! `girscan passthrough`: read a GIR file and write it back.
//!
//! Output equal to the input means the reader and writer agree on it.

use anyhow::Context;
use std::path::PathBuf;

pub fn execute(gir: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&gir)
        .with_context(|| format!("failed to read {}", gir.display()))?;
    let written = girscan_core::passthrough(&text)
        .with_context(|| format!("failed to re-write {}", gir.display()))?;
    super::write_output(output.as_deref(), &written)
}
