use std::path::Path;
use std::sync::Arc;

use common::models::{Direction, PriceSeries};
use thiserror::Error;
use tract_onnx::prelude::*;
use tracing::{error, info, warn};

pub mod features;

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Not enough history for model features")]
    InsufficientHistory,
    #[error("Model evaluation failed: {0}")]
    Model(String),
}

/// Independent opinion on how likely `direction` is to pay off, in [0, 1].
pub trait ConfidenceScorer: Send + Sync {
    fn score(&self, series: &PriceSeries, direction: Direction) -> Result<f64, InferenceError>;
}

#[derive(Clone)]
pub struct OnnxConfidenceScorer {
    model: Arc<RunnableModel>,
}

impl OnnxConfidenceScorer {
    /// `None` when no model file exists or it fails to load; aggregation then
    /// runs on strategy strength alone.
    pub fn load(model_path: &str) -> Option<Self> {
        let path = Path::new(model_path);
        if !path.exists() {
            warn!(
                "ONNX model not found at {:?}. Confidence comes from strategies only.",
                path
            );
            return None;
        }

        info!("Loading ONNX model from {:?}", path);
        match Self::load_model(model_path) {
            Ok(plan) => Some(Self {
                model: Arc::new(plan),
            }),
            Err(e) => {
                error!("Failed to load model: {}", e);
                None
            }
        }
    }

    fn load_model(path: &str) -> TractResult<RunnableModel> {
        let model = tract_onnx::onnx()
            .model_for_path(path)?
            .into_optimized()?
            .into_runnable()?;
        Ok(model)
    }

    fn predict(&self, input: &[f32]) -> TractResult<f32> {
        let tensor =
            tract_ndarray::Array::from_shape_vec((1, input.len()), input.to_vec())?.into_tensor();

        let result = self.model.run(tvec!(tensor.into()))?;

        // Single probability, shaped [1, 1] or [1].
        let output = result[0].to_array_view::<f32>()?;
        Ok(output.iter().next().copied().unwrap_or(0.5))
    }
}

impl ConfidenceScorer for OnnxConfidenceScorer {
    fn score(&self, series: &PriceSeries, direction: Direction) -> Result<f64, InferenceError> {
        let input =
            features::extract(series, direction).ok_or(InferenceError::InsufficientHistory)?;
        let probability = self
            .predict(&input)
            .map_err(|e| InferenceError::Model(e.to_string()))?;
        Ok((probability as f64).clamp(0.0, 1.0))
    }
}
