//! Sweep configuration loading and validation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit settings file.
pub const CONFIG_PATH_ENV: &str = "CHUNKSTATS_CONFIG_PATH";

/// Settings file looked up in the working directory.
pub const SETTINGS_FILE_NAME: &str = "chunkstats.json";

pub const DEFAULT_ITERATIONS: u32 = 10;
pub const DEFAULT_REPORT_PATH: &str = "output.csv";

pub const DEFAULT_COMPACTION_LEVELS: [u16; 18] = [
    0, 1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65535,
];

const MIB: usize = 1024 * 1024;

/// Number formatting used in the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLocale {
    /// `,` between fields, `.` as decimal separator.
    #[default]
    Invariant,
    /// `;` between fields, `,` as decimal separator.
    European,
}

impl ReportLocale {
    pub const fn delimiter(self) -> u8 {
        match self {
            Self::Invariant => b',',
            Self::European => b';',
        }
    }

    pub const fn decimal_separator(self) -> char {
        match self {
            Self::Invariant => '.',
            Self::European => ',',
        }
    }

    pub fn format_decimal(self, value: f64) -> String {
        let text = value.to_string();
        match self {
            Self::Invariant => text,
            Self::European => text.replace('.', ","),
        }
    }

    pub fn parse_decimal(self, text: &str) -> Option<f64> {
        let text = text.trim();
        match self {
            Self::Invariant => text.parse().ok(),
            Self::European => text.replace(',', ".").parse().ok(),
        }
    }
}

/// What to do when trials of one cell disagree on the chunk count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyPolicy {
    /// Log the anomaly and keep going.
    #[default]
    Warn,
    /// Abort the sweep with [`Error::Consistency`].
    Abort,
}

/// One payload size of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadSize {
    pub bytes: usize,
    pub label: String,
}

impl PayloadSize {
    pub fn new(bytes: usize, label: impl Into<String>) -> Self {
        Self {
            bytes,
            label: label.into(),
        }
    }
}

/// One (size, compaction level) point of the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepCell {
    /// Position in enumeration order.
    pub index: usize,
    pub size_label: String,
    pub size_bytes: usize,
    pub compaction_level: u16,
}

/// Fully resolved sweep parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub sizes: Vec<PayloadSize>,
    pub compaction_levels: Vec<u16>,
    pub iterations: u32,
    pub report_path: PathBuf,
    pub locale: ReportLocale,
    pub consistency: ConsistencyPolicy,
    pub include_total_chunks: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            sizes: Self::default_sizes(),
            compaction_levels: DEFAULT_COMPACTION_LEVELS.to_vec(),
            iterations: DEFAULT_ITERATIONS,
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
            locale: ReportLocale::default(),
            consistency: ConsistencyPolicy::default(),
            include_total_chunks: false,
        }
    }
}

impl SweepConfig {
    /// 100MB up to the largest single buffer of 2^31 - 1 bytes.
    pub fn default_sizes() -> Vec<PayloadSize> {
        vec![
            PayloadSize::new(100 * MIB, "100MB"),
            PayloadSize::new(200 * MIB, "200MB"),
            PayloadSize::new(500 * MIB, "500MB"),
            PayloadSize::new(1024 * MIB, "1GB"),
            PayloadSize::new(i32::MAX as usize, "2GB"),
        ]
    }

    pub fn cell_count(&self) -> usize {
        self.sizes.len() * self.compaction_levels.len()
    }

    /// Grid cells, sizes outer and compaction levels inner.
    pub fn cells(&self) -> impl Iterator<Item = SweepCell> + '_ {
        self.sizes
            .iter()
            .flat_map(move |size| {
                self.compaction_levels
                    .iter()
                    .map(move |level| (size, *level))
            })
            .enumerate()
            .map(|(index, (size, compaction_level))| SweepCell {
                index,
                size_label: size.label.clone(),
                size_bytes: size.bytes,
                compaction_level,
            })
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::config("iterations must be greater than 0"));
        }
        if self.sizes.is_empty() {
            return Err(Error::config("at least one payload size is required"));
        }
        if self.compaction_levels.is_empty() {
            return Err(Error::config("at least one compaction level is required"));
        }

        let mut labels = BTreeSet::new();
        for size in &self.sizes {
            if size.label.trim().is_empty() {
                return Err(Error::config(format!(
                    "payload size of {} bytes has an empty label",
                    size.bytes
                )));
            }
            if size.bytes > isize::MAX as usize {
                return Err(Error::config(format!(
                    "payload size {} is too large to allocate",
                    size.label
                )));
            }
            if !labels.insert(size.label.as_str()) {
                return Err(Error::config(format!(
                    "duplicate payload size label: {}",
                    size.label
                )));
            }
        }

        let mut levels = BTreeSet::new();
        for level in &self.compaction_levels {
            if !levels.insert(*level) {
                return Err(Error::config(format!(
                    "duplicate compaction level: {level}"
                )));
            }
        }

        if self.report_path.as_os_str().is_empty() {
            return Err(Error::config("report path must not be empty"));
        }
        Ok(())
    }
}

/// On-disk settings, every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sizes: Option<Vec<PayloadSize>>,
    #[serde(alias = "compactionLevels", alias = "compactLevels")]
    pub compaction_levels: Option<Vec<u16>>,
    pub iterations: Option<u32>,
    #[serde(alias = "reportPath", alias = "output")]
    pub report_path: Option<PathBuf>,
    pub locale: Option<ReportLocale>,
    #[serde(alias = "consistencyPolicy")]
    pub consistency: Option<ConsistencyPolicy>,
    #[serde(alias = "includeTotalChunks")]
    pub include_total_chunks: Option<bool>,
}

impl Settings {
    /// Load settings from `CHUNKSTATS_CONFIG_PATH` or the working directory.
    pub fn load() -> Result<Self> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let config_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        Self::load_with_roots(config_path.as_deref(), &cwd)
    }

    pub fn load_with_roots(config_path: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(Error::config(format!(
                    "settings file {} does not exist",
                    path.display()
                )));
            }
            return Self::load_from_path(path);
        }
        Self::load_from_path(&cwd.join(SETTINGS_FILE_NAME))
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings: Self = serde_json::from_str(&content).map_err(|e| {
            Error::config(format!(
                "Failed to parse settings file {}: {e}",
                path.display()
            ))
        })?;
        tracing::debug!(path = %path.display(), "Loaded settings file");
        Ok(settings)
    }

    /// Merge two settings, with `other` taking precedence.
    pub fn merge(base: Self, other: Self) -> Self {
        Self {
            sizes: other.sizes.or(base.sizes),
            compaction_levels: other.compaction_levels.or(base.compaction_levels),
            iterations: other.iterations.or(base.iterations),
            report_path: other.report_path.or(base.report_path),
            locale: other.locale.or(base.locale),
            consistency: other.consistency.or(base.consistency),
            include_total_chunks: other.include_total_chunks.or(base.include_total_chunks),
        }
    }

    /// Fill unset fields from the defaults.
    pub fn resolve(self) -> SweepConfig {
        let defaults = SweepConfig::default();
        SweepConfig {
            sizes: self.sizes.unwrap_or(defaults.sizes),
            compaction_levels: self.compaction_levels.unwrap_or(defaults.compaction_levels),
            iterations: self.iterations.unwrap_or(defaults.iterations),
            report_path: self.report_path.unwrap_or(defaults.report_path),
            locale: self.locale.unwrap_or(defaults.locale),
            consistency: self.consistency.unwrap_or(defaults.consistency),
            include_total_chunks: self
                .include_total_chunks
                .unwrap_or(defaults.include_total_chunks),
        }
    }
}
