#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms,
    missing_docs
)]

//! HealthCast forecasting core – builds lag/rolling features, runs the recursive
//! seven-day forecast, scores healthcare stress, and ranks regions by it.

/// Error types shared across the forecasting pipeline.
#[path = "../error.rs"]
pub mod error;

/// Historical series and the sources that provide them.
#[path = "../series.rs"]
pub mod series;

/// Lag and rolling-window feature construction.
#[path = "../features.rs"]
pub mod features;

/// Predictor capability and bundled models.
#[path = "../predictor.rs"]
pub mod predictor;

/// Recursive multi-step forecasting loop.
#[path = "../forecaster.rs"]
pub mod forecaster;

/// Stress ratio and risk level classification.
#[path = "../stress.rs"]
pub mod stress;

/// Cross-region ranking by stress.
#[path = "../ranking.rs"]
pub mod ranking;

/// Forecast tail trend labels.
#[path = "../trend.rs"]
pub mod trend;

/// Capacity table and TOML configuration.
#[path = "../config.rs"]
pub mod config;

/// Telemetry for forecasting runs.
#[path = "../helper.rs"]
pub mod helper;

/// Engine facade wiring source, predictor, and capacities together.
#[path = "../main.rs"]
pub mod runtime;

pub use config::{CapacityTable, HealthCastConfig};
pub use error::{ConfigurationError, ForecastError, PredictorError, SeriesError};
pub use features::{FeatureTable, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use forecaster::{ForecastSequence, RecursiveForecaster, HORIZON};
pub use helper::{ForecastTelemetry, ForecastTelemetryBuilder};
pub use predictor::{ConstantPredictor, LinearPredictor, Predictor};
pub use ranking::{RankedRegion, RegionFailure, RiskRanker, RiskRanking};
pub use runtime::{HealthCastEngine, HealthCastEngineBuilder, RegionOutlook};
pub use series::{CsvSeriesSource, InMemorySeriesSource, Series, SeriesSource};
pub use stress::{RiskLevel, StressAssessment};
pub use trend::Trend;
