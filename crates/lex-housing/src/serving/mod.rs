//! Serving contract: records in, price predictions out.
//!
//! The regressor itself lives outside this crate and plugs in through
//! [`PriceModel`]. [`Predictor`] pairs it with a [`PipelineHandle`] so the
//! preprocessing bundle can be swapped without touching the model.

use crate::error::{PricingError, Result};
use crate::features::columns::CITY_NAME;
use crate::pipeline::{FittedPipeline, PipelineHandle};
use crate::types::{RawRecord, to_row_major};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// A fitted regressor scoring transformed feature rows.
pub trait PriceModel: Send + Sync {
    /// Score each row. Rows follow the pipeline's feature order.
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Number of features the model was trained on, if known.
    fn num_features(&self) -> Option<usize> {
        None
    }
}

/// `intercept + Σ coefficient_i * x_i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPriceModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearPriceModel {
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            intercept,
            coefficients,
        }
    }
}

impl PriceModel for LinearPriceModel {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.coefficients.len() {
                    return Err(PricingError::InvalidConfig(format!(
                        "row has {} features, model expects {}",
                        row.len(),
                        self.coefficients.len()
                    )));
                }
                Ok(self.intercept
                    + row
                        .iter()
                        .zip(&self.coefficients)
                        .map(|(x, c)| x * c)
                        .sum::<f64>())
            })
            .collect()
    }

    fn num_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }
}

/// Wall-clock cost of one prediction call, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionTimings {
    pub preprocessing_time_ms: f64,
    pub model_inference_time_ms: f64,
    pub inference_time_ms: f64,
}

/// Predictions for a batch of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct PricePrediction {
    /// One price per input record, in input order.
    pub predictions: Vec<f64>,
    pub timings: PredictionTimings,
}

/// Metadata about the pipeline currently in service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ModelInfo {
    pub preprocessor_fitted: bool,
    pub num_features: usize,
    pub feature_names: Vec<String>,
    pub categorical_columns: Vec<String>,
    /// Cities seen during fit, if the pipeline encodes `CITY_NAME`.
    pub known_cities: Option<Vec<String>>,
    pub fitted_at: Option<DateTime<Utc>>,
}

impl ModelInfo {
    pub fn from_pipeline(fitted: &FittedPipeline) -> Self {
        Self {
            preprocessor_fitted: true,
            num_features: fitted.feature_names().len(),
            feature_names: fitted.feature_names().to_vec(),
            categorical_columns: fitted.schema().categorical_in_order(),
            known_cities: fitted
                .known_labels(CITY_NAME)
                .map(|labels| labels.into_iter().map(str::to_string).collect()),
            fitted_at: fitted.fitted_at(),
        }
    }
}

/// Preprocessing plus scoring behind one call.
pub struct Predictor<M: PriceModel> {
    pipeline: Arc<PipelineHandle>,
    model: M,
}

impl<M: PriceModel> Predictor<M> {
    pub fn new(pipeline: Arc<PipelineHandle>, model: M) -> Self {
        Self { pipeline, model }
    }

    pub fn pipeline(&self) -> &Arc<PipelineHandle> {
        &self.pipeline
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Transform `records` with the current pipeline and score them.
    pub fn predict_records(&self, records: &[RawRecord]) -> Result<PricePrediction> {
        let start = Instant::now();
        let fitted = self.pipeline.current();

        if let Some(expected) = self.model.num_features() {
            let produced = fitted.feature_names().len();
            if expected != produced {
                return Err(PricingError::InvalidConfig(format!(
                    "model expects {} features but pipeline produces {}",
                    expected, produced
                )));
            }
        }

        let matrix = fitted.transform_records(records)?;
        let rows = to_row_major(&matrix)?;
        let preprocessing_time_ms = elapsed_ms(start);

        let model_start = Instant::now();
        let predictions = self.model.predict(&rows)?;
        let model_inference_time_ms = elapsed_ms(model_start);

        let timings = PredictionTimings {
            preprocessing_time_ms,
            model_inference_time_ms,
            inference_time_ms: elapsed_ms(start),
        };
        debug!(
            "Scored {} records in {:.2} ms",
            predictions.len(),
            timings.inference_time_ms
        );

        Ok(PricePrediction {
            predictions,
            timings,
        })
    }

    /// Score a single record.
    pub fn predict_one(&self, record: &RawRecord) -> Result<f64> {
        let prediction = self.predict_records(std::slice::from_ref(record))?;
        prediction
            .predictions
            .first()
            .copied()
            .ok_or(PricingError::EmptyTable)
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo::from_pipeline(&self.pipeline.current())
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
