//! dayalign runner: config-driven orchestration on top of `dayalign-core`.
//!
//! This crate provides:
//! - TOML pipeline configuration (sources, spreads, calendars, outputs)
//! - Parallel per-series loading and preparation
//! - Consolidation with a halt/exclude policy for rejected series
//! - Integrity report of raw missing dates
//! - Output artifacts with a metadata sidecar

pub mod artifacts;
pub mod config;
pub mod pipeline;
pub mod report;

pub use artifacts::{load_meta, save_outputs, table_hash, OutputMeta};
pub use config::{
    CalendarConfig, ConfigError, OutputConfig, OutputFormat, PipelineConfig, RejectPolicy,
    SourceConfig, SpreadConfig,
};
pub use pipeline::{
    check_sources, integrity_report, load_all, prepare, run_pipeline, LoadedSeries,
    PipelineError, PipelineOutcome, Rejection, SourceCheck,
};
pub use report::{Absence, IntegrityEntry, IntegrityReport, RawSource};
