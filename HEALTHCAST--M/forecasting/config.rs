use std::{
    fs,
    num::NonZeroU64,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use shared_logging::LogLevel;

use crate::error::ConfigurationError;

/// Bed capacity per region; key order is the active region order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapacityTable {
    capacities: IndexMap<String, NonZeroU64>,
}

impl CapacityTable {
    /// Validates `(region, capacity)` pairs: non-empty, unique, positive.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut capacities = IndexMap::new();
        for (region, capacity) in entries {
            let region = region.into();
            let capacity = NonZeroU64::new(capacity).ok_or_else(|| {
                ConfigurationError::ZeroCapacity {
                    region: region.clone(),
                }
            })?;
            if capacities.contains_key(&region) {
                return Err(ConfigurationError::DuplicateRegion { region });
            }
            capacities.insert(region, capacity);
        }
        if capacities.is_empty() {
            return Err(ConfigurationError::NoRegions);
        }
        Ok(Self { capacities })
    }

    /// Capacity for `region`.
    pub fn capacity(&self, region: &str) -> Result<NonZeroU64, ConfigurationError> {
        self.capacities
            .get(region)
            .copied()
            .ok_or_else(|| ConfigurationError::MissingCapacity {
                region: region.to_string(),
            })
    }

    /// Active regions in table order.
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.capacities.keys().map(String::as_str)
    }

    /// `(region, capacity)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, NonZeroU64)> {
        self.capacities
            .iter()
            .map(|(region, capacity)| (region.as_str(), *capacity))
    }

    /// Number of regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.capacities.len()
    }

    /// Always false for a validated table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capacities.is_empty()
    }
}

impl Default for CapacityTable {
    fn default() -> Self {
        let capacities = default_regions()
            .into_iter()
            .filter_map(|entry| Some((entry.name, NonZeroU64::new(entry.capacity)?)))
            .collect();
        Self { capacities }
    }
}

/// Region entry as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Region identifier (also the CSV column name).
    pub name: String,
    /// Hospital bed capacity.
    pub capacity: u64,
}

/// Historical data settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Wide CSV of daily case counts.
    pub series_csv: PathBuf,
    /// Name of the date column.
    #[serde(default = "default_date_column")]
    pub date_column: String,
}

/// Model settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// JSON file with linear model weights.
    pub weights: PathBuf,
}

/// Logging and event settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryConfig {
    /// JSON-lines log file.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// JSON-lines event file.
    #[serde(default)]
    pub event_log: Option<PathBuf>,
    /// Minimum level written to `log_path`.
    #[serde(default)]
    pub min_level: LogLevel,
}

/// Top-level HealthCast configuration document.
#[derive(Debug, Clone)]
pub struct HealthCastConfig {
    /// Schema version (informational).
    pub version: u32,
    /// Historical data location.
    pub data: DataConfig,
    /// Model location.
    pub model: ModelConfig,
    /// Telemetry sinks.
    pub telemetry: TelemetryConfig,
    /// Validated region capacities.
    pub capacities: CapacityTable,
}

#[derive(Debug, Clone, Deserialize)]
struct HealthCastConfigSerde {
    #[serde(default)]
    version: u32,
    data: DataConfig,
    model: ModelConfig,
    #[serde(default)]
    telemetry: TelemetryConfig,
    #[serde(default = "default_regions")]
    regions: Vec<RegionConfig>,
}

impl HealthCastConfig {
    /// Loads a TOML file; relative paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::parse(&raw, &base).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parses TOML text, resolving relative paths against `base`.
    pub fn parse(raw: &str, base: &Path) -> Result<Self> {
        let document: HealthCastConfigSerde = toml::from_str(raw)?;
        let capacities = CapacityTable::from_entries(
            document
                .regions
                .into_iter()
                .map(|region| (region.name, region.capacity)),
        )?;
        let resolve = |candidate: PathBuf| {
            if candidate.is_absolute() {
                candidate
            } else {
                base.join(candidate)
            }
        };
        let mut data = document.data;
        data.series_csv = resolve(data.series_csv);
        let mut model = document.model;
        model.weights = resolve(model.weights);
        let mut telemetry = document.telemetry;
        telemetry.log_path = telemetry.log_path.map(resolve);
        telemetry.event_log = telemetry.event_log.map(resolve);
        Ok(Self {
            version: document.version,
            data,
            model,
            telemetry,
            capacities,
        })
    }
}

fn default_date_column() -> String {
    "Date".into()
}

fn default_regions() -> Vec<RegionConfig> {
    [
        ("TN", 120_000),
        ("KA", 110_000),
        ("MH", 250_000),
        ("DL", 75_000),
        ("KL", 90_000),
    ]
    .into_iter()
    .map(|(name, capacity)| RegionConfig {
        name: name.into(),
        capacity,
    })
    .collect()
}
