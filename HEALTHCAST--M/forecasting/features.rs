//! The predictor was trained on exactly the column order of [`FEATURE_NAMES`];
//! every conversion in this module preserves it.

use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Number of features per timestep.
pub const FEATURE_COUNT: usize = 9;

/// Feature names in contract order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "lag_1",
    "lag_2",
    "lag_3",
    "lag_7",
    "lag_14",
    "rolling_avg_7",
    "rolling_avg_14",
    "rolling_std_7",
    "growth_rate",
];

const LAGS: [usize; 5] = [1, 2, 3, 7, 14];
const COL_ROLLING_AVG_7: usize = 5;
const COL_ROLLING_AVG_14: usize = 6;
const COL_ROLLING_STD_7: usize = 7;
const COL_GROWTH_RATE: usize = 8;

/// Features for a single timestep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Observation one step back.
    pub lag_1: f64,
    /// Observation two steps back.
    pub lag_2: f64,
    /// Observation three steps back.
    pub lag_3: f64,
    /// Observation seven steps back.
    pub lag_7: f64,
    /// Observation fourteen steps back.
    pub lag_14: f64,
    /// Mean of the trailing 7-observation window.
    pub rolling_avg_7: f64,
    /// Mean of the trailing 14-observation window.
    pub rolling_avg_14: f64,
    /// Sample standard deviation of the trailing 7-observation window.
    pub rolling_std_7: f64,
    /// Relative change from the previous observation.
    pub growth_rate: f64,
}

impl FeatureVector {
    /// Fields in contract order.
    #[must_use]
    pub const fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.lag_1,
            self.lag_2,
            self.lag_3,
            self.lag_7,
            self.lag_14,
            self.rolling_avg_7,
            self.rolling_avg_14,
            self.rolling_std_7,
            self.growth_rate,
        ]
    }

    /// Inverse of [`FeatureVector::to_array`].
    #[must_use]
    pub const fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            lag_1: values[0],
            lag_2: values[1],
            lag_3: values[2],
            lag_7: values[3],
            lag_14: values[4],
            rolling_avg_7: values[5],
            rolling_avg_14: values[6],
            rolling_std_7: values[7],
            growth_rate: values[8],
        }
    }

    /// Builds the features of the last timestep of `series`.
    ///
    /// Empty or short series never fail; undefined fields resolve to 0.
    #[must_use]
    pub fn build(series: &[f64]) -> Self {
        FeatureTable::build(series).last()
    }

    /// True when every field is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|value| value.is_finite())
    }
}

fn row_to_vector(row: ArrayView1<'_, f64>) -> FeatureVector {
    let mut values = [0.0; FEATURE_COUNT];
    for (slot, value) in values.iter_mut().zip(row.iter()) {
        *slot = *value;
    }
    FeatureVector::from_array(values)
}

/// Per-timestep feature table with the missing-value policy applied.
///
/// Rows are timesteps, columns follow [`FEATURE_NAMES`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    rows: Array2<f64>,
}

impl FeatureTable {
    /// Computes every row, then backward fills and zero fills the gaps.
    #[must_use]
    pub fn build(series: &[f64]) -> Self {
        Self {
            rows: zero_fill(backward_fill(raw_features(series))),
        }
    }

    /// Number of timesteps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    /// True for an empty input series.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.nrows() == 0
    }

    /// Features at timestep `t`, if it exists.
    #[must_use]
    pub fn row(&self, t: usize) -> Option<FeatureVector> {
        (t < self.len()).then(|| row_to_vector(self.rows.row(t)))
    }

    /// Features at the final timestep, or all zeros for an empty series.
    #[must_use]
    pub fn last(&self) -> FeatureVector {
        self.len()
            .checked_sub(1)
            .and_then(|t| self.row(t))
            .unwrap_or_default()
    }

    /// Underlying matrix.
    #[must_use]
    pub const fn as_array(&self) -> &Array2<f64> {
        &self.rows
    }
}

/// Raw table; undefined cells (short history, division by zero) hold NaN.
#[allow(clippy::cast_precision_loss)]
fn raw_features(series: &[f64]) -> Array2<f64> {
    let mut table = Array2::from_elem((series.len(), FEATURE_COUNT), f64::NAN);
    for t in 0..series.len() {
        for (col, lag) in LAGS.iter().enumerate() {
            if t >= *lag {
                table[[t, col]] = series[t - lag];
            }
        }
        if let Some(window) = trailing_window(series, t, 7) {
            table[[t, COL_ROLLING_AVG_7]] = mean(window);
            table[[t, COL_ROLLING_STD_7]] = sample_std(window);
        }
        if let Some(window) = trailing_window(series, t, 14) {
            table[[t, COL_ROLLING_AVG_14]] = mean(window);
        }
        if t >= 1 {
            table[[t, COL_GROWTH_RATE]] = (series[t] - series[t - 1]) / series[t - 1];
        }
    }
    table.mapv_inplace(|value| if value.is_finite() { value } else { f64::NAN });
    table
}

fn trailing_window(series: &[f64], t: usize, size: usize) -> Option<&[f64]> {
    (t + 1 >= size).then(|| &series[t + 1 - size..=t])
}

#[allow(clippy::cast_precision_loss)]
fn mean(window: &[f64]) -> f64 {
    window.iter().sum::<f64>() / window.len() as f64
}

/// Sample (N-1) standard deviation.
#[allow(clippy::cast_precision_loss)]
fn sample_std(window: &[f64]) -> f64 {
    if window.len() < 2 {
        return f64::NAN;
    }
    let avg = mean(window);
    let sum_sq = window.iter().map(|value| (value - avg).powi(2)).sum::<f64>();
    (sum_sq / (window.len() - 1) as f64).sqrt()
}

/// Replaces each NaN with the next defined value later in its column.
#[must_use]
pub fn backward_fill(mut table: Array2<f64>) -> Array2<f64> {
    for mut column in table.axis_iter_mut(Axis(1)) {
        let mut next = f64::NAN;
        for value in column.iter_mut().rev() {
            if value.is_nan() {
                *value = next;
            } else {
                next = *value;
            }
        }
    }
    table
}

/// Replaces every remaining NaN with 0.
#[must_use]
pub fn zero_fill(mut table: Array2<f64>) -> Array2<f64> {
    table.mapv_inplace(|value| if value.is_nan() { 0.0 } else { value });
    table
}
