//! Standard (z-score) scaling for continuous numeric columns.
//!
//! The scaler is fitted on the numeric columns of the schema only. Encoded
//! categorical columns are ordinal codes, and standardizing them would squeeze
//! distinct categories into a narrow float band, so the pipeline never hands
//! them to this type.

use crate::error::{PricingError, Result};
use crate::utils::numeric_values;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fitted statistics for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub column: String,
    pub mean: f64,
    /// Population standard deviation; 1.0 when the column is constant.
    pub std: f64,
}

/// Standard scaler: `(x - mean) / std`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn mean and population standard deviation of each listed column.
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let mut params = Vec::with_capacity(columns.len());
        for name in columns {
            let column = df
                .column(name)
                .map_err(|_| PricingError::ColumnNotFound(name.clone()))?;
            let values = numeric_values(column.as_materialized_series())?;
            let (mean, std) = mean_std(&values);
            debug!("Scaler for '{}': mean={:.4} std={:.4}", name, mean, std);
            params.push(ScalerParams {
                column: name.clone(),
                mean,
                std,
            });
        }

        self.params = params;
        self.is_fitted = true;
        Ok(self)
    }

    /// Standardize every fitted column present in `df`.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PricingError::NotFitted("StandardScaler"));
        }

        let mut out = df.clone();
        for p in &self.params {
            let Ok(column) = df.column(&p.column) else {
                continue;
            };
            let scaled: Vec<Option<f64>> = numeric_values(column.as_materialized_series())?
                .into_iter()
                .map(|v| v.map(|x| (x - p.mean) / p.std))
                .collect();
            out.replace(&p.column, Series::new(p.column.as_str().into(), scaled))?;
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn params(&self) -> &[ScalerParams] {
        &self.params
    }

    /// Columns this scaler touches, in fit order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.column.as_str())
    }
}

/// Mean and population standard deviation of the observed values.
///
/// Empty input gives `(0.0, 1.0)`; a zero or non-finite deviation becomes 1.0.
fn mean_std(values: &[Option<f64>]) -> (f64, f64) {
    let observed: Vec<f64> = values.iter().flatten().copied().collect();
    if observed.is_empty() {
        return (0.0, 1.0);
    }
    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;
    let variance = observed.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if std == 0.0 || !std.is_finite() {
        (mean, 1.0)
    } else {
        (mean, std)
    }
}
