use std::{fmt, num::NonZeroU64};

use serde::{Deserialize, Serialize};

/// Fraction of forecast cases expected to need a hospital bed.
pub const BED_DEMAND_FRACTION: f64 = 0.05;

/// Upper bounds (exclusive) checked in order; anything at or above the last is critical.
const RISK_BANDS: [(f64, RiskLevel); 4] = [
    (0.001, RiskLevel::VeryLow),
    (0.005, RiskLevel::Low),
    (0.02, RiskLevel::Rising),
    (0.05, RiskLevel::High),
];

/// Discrete healthcare risk category, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Stress below 0.001.
    VeryLow,
    /// Stress in [0.001, 0.005).
    Low,
    /// Stress in [0.005, 0.02).
    Rising,
    /// Stress in [0.02, 0.05).
    High,
    /// Stress of 0.05 or more.
    Critical,
}

impl RiskLevel {
    /// Classifies a stress ratio; the first band whose bound exceeds it wins.
    #[must_use]
    pub fn from_ratio(stress_ratio: f64) -> Self {
        RISK_BANDS
            .iter()
            .find(|(upper, _)| stress_ratio < *upper)
            .map_or(Self::Critical, |(_, level)| *level)
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::VeryLow => "Very Low",
            Self::Low => "Low",
            Self::Rising => "Rising",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stress derived from one region's final forecast value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressAssessment {
    /// Forecast case count on the final horizon day.
    pub case_count: f64,
    /// Expected bed demand divided by bed capacity.
    pub stress_ratio: f64,
    /// Category of `stress_ratio`.
    pub risk_level: RiskLevel,
}

/// Expected bed demand over capacity.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn stress_ratio(final_prediction: f64, capacity: NonZeroU64) -> f64 {
    (final_prediction * BED_DEMAND_FRACTION) / capacity.get() as f64
}

/// Scores a final prediction against a region's bed capacity.
#[must_use]
pub fn evaluate(final_prediction: f64, capacity: NonZeroU64) -> StressAssessment {
    let stress_ratio = stress_ratio(final_prediction, capacity);
    StressAssessment {
        case_count: final_prediction,
        stress_ratio,
        risk_level: RiskLevel::from_ratio(stress_ratio),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capacity(value: u64) -> NonZeroU64 {
        NonZeroU64::new(value).unwrap()
    }

    #[test]
    fn small_forecast_is_very_low() {
        let assessment = evaluate(150.0, capacity(90_000));
        assert!((assessment.stress_ratio - 0.000_083_333).abs() < 1e-9);
        assert_eq!(assessment.risk_level, RiskLevel::VeryLow);
        assert_eq!(assessment.case_count, 150.0);
    }

    #[test]
    fn boundaries_belong_to_the_upper_band() {
        assert_eq!(RiskLevel::from_ratio(0.000_999), RiskLevel::VeryLow);
        assert_eq!(RiskLevel::from_ratio(0.001), RiskLevel::Low);
        assert_eq!(RiskLevel::from_ratio(0.005), RiskLevel::Rising);
        assert_eq!(RiskLevel::from_ratio(0.02), RiskLevel::High);
        assert_eq!(RiskLevel::from_ratio(0.049_999), RiskLevel::High);
        assert_eq!(RiskLevel::from_ratio(0.05), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_ratio(3.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_ratio(0.0), RiskLevel::VeryLow);
    }

    #[test]
    fn larger_capacity_never_raises_risk() {
        let prediction = 40_000.0;
        let mut previous = evaluate(prediction, capacity(1));
        for beds in [10, 100, 1_000, 10_000, 50_000, 100_000, 1_000_000, 10_000_000] {
            let current = evaluate(prediction, capacity(beds));
            assert!(current.stress_ratio <= previous.stress_ratio);
            assert!(current.risk_level <= previous.risk_level);
            previous = current;
        }
        assert_eq!(previous.risk_level, RiskLevel::VeryLow);
    }

    #[test]
    fn ratio_is_non_negative_for_non_negative_inputs() {
        for cases in [0.0, 1.0, 1_234.5, 2.5e6] {
            assert!(stress_ratio(cases, capacity(75_000)) >= 0.0);
        }
    }

    #[test]
    fn labels_match_display() {
        assert_eq!(RiskLevel::VeryLow.to_string(), "Very Low");
        assert_eq!(RiskLevel::Critical.label(), "Critical");
    }
}
