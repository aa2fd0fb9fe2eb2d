//! `cur recover`: run structured-output recovery over saved generation output.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use curriculum_harness_core::recover::recover_object;

/// Read `path` (or stdin for `-`), recover the JSON object and print it.
pub fn run_recover(path: &Path, compact: bool) -> Result<()> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    let recovered = recover_object(&raw)?;
    info!(stage = ?recovered.stage, "recovered");
    if compact {
        println!("{}", recovered.to_json_string());
    } else {
        println!("{}", serde_json::to_string_pretty(&recovered.value)?);
    }
    Ok(())
}
