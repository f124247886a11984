use std::{fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    error::PredictorError,
    features::{FeatureVector, FEATURE_COUNT},
};

/// Trained model mapping one feature vector to the next day's case count.
pub trait Predictor: Send + Sync {
    /// Predicts a single value from features in contract order.
    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictorError>;
}

impl<P: Predictor + ?Sized> Predictor for &P {
    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictorError> {
        (**self).predict(features)
    }
}

impl<P: Predictor + ?Sized> Predictor for std::sync::Arc<P> {
    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictorError> {
        (**self).predict(features)
    }
}

/// Stub model returning the same value for every input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantPredictor(pub f64);

impl Predictor for ConstantPredictor {
    fn predict(&self, _features: &FeatureVector) -> Result<f64, PredictorError> {
        Ok(self.0)
    }
}

/// Linear regression over the nine features plus an intercept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPredictor {
    weights: [f64; FEATURE_COUNT],
    bias: f64,
}

impl LinearPredictor {
    /// Creates a model from weights in feature order.
    #[must_use]
    pub const fn new(weights: [f64; FEATURE_COUNT], bias: f64) -> Self {
        Self { weights, bias }
    }

    /// Creates a model from a weight slice, checking its length.
    pub fn from_slice(weights: &[f64], bias: f64) -> Result<Self, PredictorError> {
        let weights: [f64; FEATURE_COUNT] =
            weights
                .try_into()
                .map_err(|_| PredictorError::DimensionMismatch {
                    expected: FEATURE_COUNT,
                    actual: weights.len(),
                })?;
        Ok(Self::new(weights, bias))
    }

    /// Loads `{"weights": [..9 numbers..], "bias": number}` from disk.
    pub fn from_weights_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        #[derive(Deserialize)]
        struct LinearWeights {
            weights: Vec<f64>,
            bias: f64,
        }

        let contents =
            fs::read_to_string(&path).with_context(|| format!("reading {:?}", path.as_ref()))?;
        let parsed: LinearWeights =
            serde_json::from_str(&contents).context("parsing linear weights file")?;
        Ok(Self::from_slice(&parsed.weights, parsed.bias)?)
    }

    /// Weights in feature order.
    #[must_use]
    pub const fn weights(&self) -> &[f64; FEATURE_COUNT] {
        &self.weights
    }

    /// Intercept term.
    #[must_use]
    pub const fn bias(&self) -> f64 {
        self.bias
    }
}

impl Predictor for LinearPredictor {
    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictorError> {
        Ok(features
            .to_array()
            .iter()
            .zip(self.weights.iter())
            .map(|(feature, weight)| feature * weight)
            .sum::<f64>()
            + self.bias)
    }
}
