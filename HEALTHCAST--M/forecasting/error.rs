use thiserror::Error;

/// Errors raised by a predictor for a single feature vector.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PredictorError {
    /// Model parameters do not match the feature schema.
    #[error("expected {expected} model weights, found {actual}")]
    DimensionMismatch {
        /// Number of features in the schema.
        expected: usize,
        /// Number of weights provided.
        actual: usize,
    },
    /// Model produced NaN or an infinity.
    #[error("predictor returned a non-finite value: {value}")]
    NonFinite {
        /// Offending value.
        value: f64,
    },
    /// Any other model failure.
    #[error("predictor failure: {0}")]
    Failed(String),
}

/// Failure of one region's recursive forecast.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ForecastError {
    /// The predictor failed at the given 1-based horizon step.
    #[error("prediction failed at step {step}: {source}")]
    Predictor {
        /// Horizon step (1..=7).
        step: usize,
        /// Underlying predictor error.
        #[source]
        source: PredictorError,
    },
}

/// Invalid capacity table or region setup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Capacity of zero configured for a region.
    #[error("capacity for region {region} must be positive")]
    ZeroCapacity {
        /// Region identifier.
        region: String,
    },
    /// Region has no configured capacity.
    #[error("no capacity configured for region {region}")]
    MissingCapacity {
        /// Region identifier.
        region: String,
    },
    /// Region listed twice.
    #[error("region {region} configured more than once")]
    DuplicateRegion {
        /// Region identifier.
        region: String,
    },
    /// Capacity table is empty.
    #[error("capacity table contains no regions")]
    NoRegions,
}

/// Errors raised while reading historical series.
#[derive(Debug, Error)]
pub enum SeriesError {
    /// Region not present in the source.
    #[error("no series for region {0}")]
    UnknownRegion(String),
    /// CSV header lacks the date column.
    #[error("date column {0} not found")]
    MissingDateColumn(String),
    /// Date cell failed to parse.
    #[error("row {row}: invalid date {value:?}")]
    InvalidDate {
        /// 1-based data row.
        row: usize,
        /// Raw cell content.
        value: String,
    },
    /// Observation cell failed to parse.
    #[error("row {row}, column {column}: invalid observation {value:?}")]
    InvalidValue {
        /// 1-based data row.
        row: usize,
        /// Column (region) name.
        column: String,
        /// Raw cell content.
        value: String,
    },
    /// CSV decoding error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// I/O error (filesystem).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
