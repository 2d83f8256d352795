//! Configuration file to report: full runs through the public driver.

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use granula_core::{AnonymizationReport, Anonymizer};

use crate::fixtures::SyntheticDataset;

/// Loads `config`, anonymizes `dataset` and returns the serialized report.
pub fn run_from_file(config: &Path, dataset: &SyntheticDataset) -> anyhow::Result<String> {
    let anonymizer = Anonymizer::from_file(config)
        .with_context(|| format!("loading {}", config.display()))?;
    let manager = anonymizer
        .prepare(dataset.data.clone(), dataset.hierarchies.clone())
        .context("preparing data")?;
    let result = anonymizer.anonymize(&manager).context("anonymizing")?;
    tracing::info!(
        seed = dataset.seed,
        levels = ?result.report.levels,
        "end-to-end run finished"
    );
    Ok(result.report.to_json()?)
}

/// Writes `contents` to a temporary file with the given extension.
pub fn config_file(contents: &str, suffix: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}
