//! Serializable pipeline configuration.
//!
//! One TOML file describes every source, the derived spreads, the calendars
//! and where the consolidated table goes:
//!
//! ```toml
//! on_rejected = "exclude"
//!
//! [calendar]
//! kind = "us_federal"
//! closures = ["2025-01-09"]
//!
//! [output]
//! dir = "data/processed"
//! formats = ["csv", "parquet"]
//!
//! [[sources]]
//! name = "SPY"
//! path = "raw/SPY_1min.csv"
//! frequency = "intraday"
//! calendar = "us_equity"
//! reference = true
//!
//! [[sources]]
//! name = "DGS10"
//! path = "raw/DGS10.csv"
//! percent = true
//!
//! [[spreads]]
//! name = "curve_10y_2y"
//! left = "DGS10"
//! right = "DGS2"
//! percent = true
//! ```

use chrono::NaiveDate;
use dayalign_core::{AlignTarget, CalendarKind, DomainPolicy, Frequency, HolidayCalendar};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse pipeline TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no sources configured")]
    NoSources,

    #[error("no source is marked `reference = true`")]
    NoReference,

    #[error("more than one reference source: '{first}' and '{second}'")]
    MultipleReferences { first: String, second: String },

    #[error("name '{0}' is used by more than one source or spread")]
    DuplicateName(String),

    #[error("spread '{spread}' refers to unknown source '{input}'")]
    UnknownSpreadInput { spread: String, input: String },

    #[error("no output formats configured")]
    NoFormats,
}

/// What to do with a non-reference series that fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectPolicy {
    /// Stop the run on the first failure.
    #[default]
    Halt,
    /// Log the failure and consolidate without the series.
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

/// Default calendar plus ad-hoc closures shared by every calendar in the run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub kind: CalendarKind,
    /// One-off market closures (e.g. national days of mourning).
    #[serde(default)]
    pub closures: Vec<NaiveDate>,
}

impl CalendarConfig {
    /// Build the calendar for `kind`, or the default kind when `None`.
    pub fn build(&self, kind: Option<CalendarKind>) -> HolidayCalendar {
        kind.unwrap_or(self.kind)
            .calendar()
            .with_closures(self.closures.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// File name without extension.
    #[serde(default = "default_stem")]
    pub stem: String,
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,
    /// Also write `{stem}_integrity.csv`.
    #[serde(default)]
    pub integrity_report: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            stem: default_stem(),
            formats: default_formats(),
            integrity_report: false,
        }
    }
}

impl OutputConfig {
    pub fn path_for(&self, format: OutputFormat) -> PathBuf {
        self.dir.join(format!("{}.{}", self.stem, format.extension()))
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(format!("{}.meta.json", self.stem))
    }

    pub fn integrity_path(&self) -> PathBuf {
        self.dir.join(format!("{}_integrity.csv", self.stem))
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_stem() -> String {
    "consolidated".to_string()
}

fn default_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Csv, OutputFormat::Parquet]
}

fn default_frequency() -> Frequency {
    Frequency::Daily
}

/// One raw input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
    #[serde(default)]
    pub reference: bool,
    /// Overrides the pipeline's default calendar.
    #[serde(default)]
    pub calendar: Option<CalendarKind>,
    #[serde(default)]
    pub target: AlignTarget,
    /// Values are percentage points; convert to decimal fractions.
    #[serde(default)]
    pub percent: bool,
    /// Require the raw date set to match the calendar exactly. Defaults to
    /// on for daily and intraday sources, off for `irregular_macro`.
    #[serde(default)]
    pub check_gaps: Option<bool>,
    #[serde(default)]
    pub domain: DomainPolicy,
    /// Value columns to keep (all non-date columns when absent).
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

impl SourceConfig {
    pub fn check_gaps(&self) -> bool {
        self.check_gaps
            .unwrap_or(self.frequency != Frequency::IrregularMacro)
    }
}

/// A series derived as `left - right` from two configured sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadConfig {
    pub name: String,
    pub left: String,
    pub right: String,
    #[serde(default)]
    pub percent: bool,
    #[serde(default)]
    pub calendar: Option<CalendarKind>,
    #[serde(default)]
    pub target: AlignTarget,
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub on_rejected: RejectPolicy,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub spreads: Vec<SpreadConfig>,
}

impl PipelineConfig {
    /// Parse and validate a TOML string. Relative paths are kept as written.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file; relative source and output paths resolve against
    /// the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for source in &mut self.sources {
            if source.path.is_relative() {
                source.path = base.join(&source.path);
            }
        }
        if self.output.dir.is_relative() {
            self.output.dir = base.join(&self.output.dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        if self.output.formats.is_empty() {
            return Err(ConfigError::NoFormats);
        }

        let mut names = HashSet::new();
        let all_names = self
            .sources
            .iter()
            .map(|s| &s.name)
            .chain(self.spreads.iter().map(|s| &s.name));
        for name in all_names {
            if !names.insert(name.as_str()) {
                return Err(ConfigError::DuplicateName(name.clone()));
            }
        }

        let mut references = self.sources.iter().filter(|s| s.reference);
        let Some(first) = references.next() else {
            return Err(ConfigError::NoReference);
        };
        if let Some(second) = references.next() {
            return Err(ConfigError::MultipleReferences {
                first: first.name.clone(),
                second: second.name.clone(),
            });
        }

        for spread in &self.spreads {
            for input in [&spread.left, &spread.right] {
                if !self.sources.iter().any(|s| &s.name == input) {
                    return Err(ConfigError::UnknownSpreadInput {
                        spread: spread.name.clone(),
                        input: input.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn reference(&self) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.reference)
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}
