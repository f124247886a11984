use std::fmt;

use serde::{Deserialize, Serialize};

use crate::forecaster::ForecastSequence;

/// Direction of the last three forecast days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trend {
    /// Strictly rising.
    Increasing,
    /// Strictly falling.
    Decreasing,
    /// Anything else, including ties and single reversals.
    Stable,
}

impl Trend {
    /// Labels three consecutive values, oldest first.
    #[must_use]
    pub fn classify([a, b, c]: [f64; 3]) -> Self {
        if a < b && b < c {
            Self::Increasing
        } else if a > b && b > c {
            Self::Decreasing
        } else {
            Self::Stable
        }
    }

    /// Labels the tail of a forecast.
    #[must_use]
    pub fn of_forecast(forecast: &ForecastSequence) -> Self {
        Self::classify(forecast.last_three())
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Increasing => "Increasing",
            Self::Decreasing => "Decreasing",
            Self::Stable => "Stable",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
