use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    error::{ForecastError, PredictorError},
    features::FeatureVector,
    helper::{self, ForecastTelemetry},
    predictor::Predictor,
    series::Series,
};

/// Number of days forecast ahead of the last observation.
pub const HORIZON: usize = 7;

/// Predictions for days 1..=HORIZON after the last observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastSequence([f64; HORIZON]);

impl ForecastSequence {
    /// Wraps predictions in day order.
    #[must_use]
    pub const fn new(values: [f64; HORIZON]) -> Self {
        Self(values)
    }

    /// Predictions in day order.
    #[must_use]
    pub const fn values(&self) -> &[f64; HORIZON] {
        &self.0
    }

    /// Day-`HORIZON` prediction.
    #[must_use]
    pub const fn final_value(&self) -> f64 {
        self.0[HORIZON - 1]
    }

    /// Final three predictions, oldest first.
    #[must_use]
    pub const fn last_three(&self) -> [f64; 3] {
        [self.0[HORIZON - 3], self.0[HORIZON - 2], self.0[HORIZON - 1]]
    }
}

/// Derives the next step's features from the previous ones and a prediction.
///
/// The lag chain shifts by one slot, so the prediction becomes `lag_1` and the
/// old `lag_7` lands in `lag_14`. Rolling statistics and the growth rate are
/// carried over unchanged instead of being recomputed from the synthetic
/// series. This approximation is intentional: the trained predictor's
/// outputs are only reproducible with this exact update, so do not replace it
/// with a true rolling recomputation.
#[must_use]
pub const fn next_features(previous: &FeatureVector, prediction: f64) -> FeatureVector {
    FeatureVector {
        lag_1: prediction,
        lag_2: previous.lag_1,
        lag_3: previous.lag_2,
        lag_7: previous.lag_3,
        lag_14: previous.lag_7,
        rolling_avg_7: previous.rolling_avg_7,
        rolling_avg_14: previous.rolling_avg_14,
        rolling_std_7: previous.rolling_std_7,
        growth_rate: previous.growth_rate,
    }
}

/// Runs the fixed-horizon recursive forecast loop.
#[derive(Debug, Clone, Default)]
pub struct RecursiveForecaster {
    telemetry: Option<ForecastTelemetry>,
}

impl RecursiveForecaster {
    /// Creates a forecaster with optional telemetry.
    #[must_use]
    pub const fn new(telemetry: Option<ForecastTelemetry>) -> Self {
        Self { telemetry }
    }

    /// Forecasts `HORIZON` days ahead of `series`.
    ///
    /// Stops at the first predictor failure; nothing is retried.
    pub fn forecast(
        &self,
        series: &Series,
        predictor: &dyn Predictor,
    ) -> Result<ForecastSequence, ForecastError> {
        let telemetry = self.telemetry.as_ref();
        helper::log(
            telemetry,
            LogLevel::Debug,
            "forecast.start",
            json!({ "region": series.name, "observations": series.len() }),
        );
        let mut features = FeatureVector::build(&series.values);
        let mut predictions = [0.0; HORIZON];
        for (idx, slot) in predictions.iter_mut().enumerate() {
            let step = idx + 1;
            let prediction = predictor
                .predict(&features)
                .and_then(|value| {
                    if value.is_finite() {
                        Ok(value)
                    } else {
                        Err(PredictorError::NonFinite { value })
                    }
                })
                .map_err(|source| ForecastError::Predictor { step, source })?;
            helper::log(
                telemetry,
                LogLevel::Debug,
                "forecast.step",
                json!({ "region": series.name, "step": step, "prediction": prediction }),
            );
            *slot = prediction;
            features = next_features(&features, prediction);
        }
        let sequence = ForecastSequence::new(predictions);
        tracing::debug!(
            region = %series.name,
            final_value = sequence.final_value(),
            "forecast completed"
        );
        Ok(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::ConstantPredictor;
    use parking_lot::Mutex;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    /// Records every feature vector it sees and predicts `lag_1 + 1`.
    struct RecordingPredictor {
        seen: Mutex<Vec<FeatureVector>>,
    }

    impl Predictor for RecordingPredictor {
        fn predict(&self, features: &FeatureVector) -> Result<f64, PredictorError> {
            self.seen.lock().push(*features);
            Ok(features.lag_1 + 1.0)
        }
    }

    struct FailingPredictor {
        fail_at: usize,
        calls: Mutex<usize>,
    }

    impl Predictor for FailingPredictor {
        fn predict(&self, _features: &FeatureVector) -> Result<f64, PredictorError> {
            let mut calls = self.calls.lock();
            *calls += 1;
            if *calls == self.fail_at {
                Err(PredictorError::Failed("model offline".into()))
            } else {
                Ok(1.0)
            }
        }
    }

    fn growth_series(len: usize) -> Series {
        let mut value = 100.0;
        let values = (0..len)
            .map(|_| {
                let current = value;
                value *= 1.1;
                current
            })
            .collect();
        Series::new("TN", values)
    }

    #[test]
    fn constant_predictor_yields_constant_sequence() {
        let forecast = RecursiveForecaster::default()
            .forecast(&growth_series(20), &ConstantPredictor(150.0))
            .unwrap();
        assert_eq!(forecast.values(), &[150.0; HORIZON]);
        assert_eq!(forecast.final_value(), 150.0);
        assert_eq!(forecast.last_three(), [150.0; 3]);
    }

    #[test]
    fn features_shift_lags_and_carry_rolling_stats() {
        let series = growth_series(20);
        let initial = FeatureVector::build(&series.values);
        let predictor = RecordingPredictor {
            seen: Mutex::new(Vec::new()),
        };
        let forecast = RecursiveForecaster::default()
            .forecast(&series, &predictor)
            .unwrap();
        let seen = predictor.seen.lock();
        assert_eq!(seen.len(), HORIZON);
        assert_eq!(seen[0], initial);
        for (prev, next) in seen.iter().zip(seen.iter().skip(1)) {
            assert_eq!(next.lag_1, prev.lag_1 + 1.0);
            assert_eq!(next.lag_2, prev.lag_1);
            assert_eq!(next.lag_3, prev.lag_2);
            assert_eq!(next.lag_7, prev.lag_3);
            assert_eq!(next.lag_14, prev.lag_7);
            assert_eq!(next.rolling_avg_7, initial.rolling_avg_7);
            assert_eq!(next.rolling_avg_14, initial.rolling_avg_14);
            assert_eq!(next.rolling_std_7, initial.rolling_std_7);
            assert_eq!(next.growth_rate, initial.growth_rate);
        }
        assert_eq!(forecast.values()[0], initial.lag_1 + 1.0);
        assert_eq!(forecast.final_value(), initial.lag_1 + 7.0);
    }

    #[test]
    fn forecasting_is_repeatable() {
        let series = growth_series(30);
        let predictor = crate::predictor::LinearPredictor::new(
            [0.5, 0.2, 0.1, 0.1, 0.05, 0.03, 0.02, 0.0, 10.0],
            1.0,
        );
        let forecaster = RecursiveForecaster::default();
        let first = forecaster.forecast(&series, &predictor).unwrap();
        let second = forecaster.forecast(&series, &predictor).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn predictor_failure_reports_step() {
        let predictor = FailingPredictor {
            fail_at: 3,
            calls: Mutex::new(0),
        };
        let err = RecursiveForecaster::default()
            .forecast(&growth_series(10), &predictor)
            .unwrap_err();
        assert_eq!(
            err,
            ForecastError::Predictor {
                step: 3,
                source: PredictorError::Failed("model offline".into()),
            }
        );
        assert_eq!(*predictor.calls.lock(), 3);
    }

    #[test]
    fn non_finite_predictions_are_rejected() {
        let err = RecursiveForecaster::default()
            .forecast(&growth_series(10), &ConstantPredictor(f64::NAN))
            .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::Predictor {
                step: 1,
                source: PredictorError::NonFinite { .. }
            }
        ));
    }

    #[test]
    fn any_series_length_yields_full_horizon() {
        let mut rng = SmallRng::seed_from_u64(11);
        let predictor = crate::predictor::LinearPredictor::new(
            [0.9, 0.0, 0.0, 0.0, 0.0, 0.1, 0.0, 0.0, 0.0],
            0.0,
        );
        for len in 0..40 {
            let values = (0..len).map(|_| rng.gen_range(0.0..1_000.0)).collect();
            let forecast = RecursiveForecaster::default()
                .forecast(&Series::new("KA", values), &predictor)
                .unwrap();
            assert_eq!(forecast.values().len(), HORIZON);
            assert!(forecast.values().iter().all(|value| value.is_finite()));
        }
    }
}
