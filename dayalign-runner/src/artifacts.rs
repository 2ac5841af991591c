//! Output artifacts: the consolidated table in each configured encoding, a
//! `meta.json` sidecar, and optionally the integrity report.
//!
//! The sidecar records shape, date range, the series that went in, the ones
//! that were rejected, and a BLAKE3 hash of the table's CSV encoding so two
//! runs can be compared without opening the data.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use dayalign_core::data::{table_to_csv_string, write_csv_file, write_parquet};
use dayalign_core::ConsolidatedTable;

use crate::config::{OutputConfig, OutputFormat};
use crate::pipeline::PipelineOutcome;

/// Current schema version for the metadata sidecar.
pub const SCHEMA_VERSION: u32 = 1;

/// Metadata sidecar written beside the outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputMeta {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub rows: usize,
    pub columns: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub data_hash: String,
    pub sources: Vec<String>,
    #[serde(default)]
    pub rejected: Vec<String>,
    pub files: Vec<String>,
    pub generated_at: NaiveDateTime,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// BLAKE3 over the CSV encoding, which is canonical for a given table.
pub fn table_hash(table: &ConsolidatedTable) -> Result<String> {
    let csv = table_to_csv_string(table).context("failed to encode table for hashing")?;
    Ok(blake3::hash(csv.as_bytes()).to_hex().to_string())
}

/// Write every configured encoding plus the sidecar. Returns the paths written.
pub fn save_outputs(outcome: &PipelineOutcome, output: &OutputConfig) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(&output.dir)
        .with_context(|| format!("failed to create output dir: {}", output.dir.display()))?;

    let mut written = Vec::with_capacity(output.formats.len() + 2);
    for format in &output.formats {
        let path = output.path_for(*format);
        let result = match format {
            OutputFormat::Csv => write_csv_file(&outcome.table, &path),
            OutputFormat::Parquet => write_parquet(&outcome.table, &path),
        };
        result.with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }

    if let Some(report) = &outcome.integrity {
        let path = output.integrity_path();
        let file = fs::File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        report
            .write_csv(file)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }

    let info = outcome.table.info();
    let meta = OutputMeta {
        schema_version: SCHEMA_VERSION,
        rows: info.rows,
        columns: info.columns,
        start_date: info.start,
        end_date: info.end,
        data_hash: table_hash(&outcome.table)?,
        sources: outcome.included.clone(),
        rejected: outcome.rejected.iter().map(|r| r.series.clone()).collect(),
        files: written.iter().filter_map(|p| file_name(p)).collect(),
        generated_at: chrono::Local::now().naive_local(),
    };
    let meta_path = output.meta_path();
    let json = serde_json::to_string_pretty(&meta).context("failed to serialize output metadata")?;
    fs::write(&meta_path, json)
        .with_context(|| format!("failed to write {}", meta_path.display()))?;
    written.push(meta_path);

    Ok(written)
}

/// Read a sidecar back, rejecting unknown schema versions.
pub fn load_meta(path: &Path) -> Result<OutputMeta> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let meta: OutputMeta =
        serde_json::from_str(&json).context("failed to deserialize output metadata")?;
    if meta.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            meta.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(meta)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
