//! Median imputation learned at fit time.
//!
//! The fill value of every numeric column is the median of its observed
//! training values. Transforms reuse the stored medians unchanged, so a
//! serving row missing `SQUARE_FT` gets the training median, never a median
//! of the request batch.

use crate::error::{PricingError, Result};
use crate::utils::{median, numeric_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Fill value stored for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFill {
    pub column: String,
    pub fill_value: f64,
}

/// Median imputer for numeric columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    fills: Vec<ColumnFill>,
    is_fitted: bool,
}

impl MedianImputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the median of each listed column.
    ///
    /// A column without any observed value gets a fill value of 0.0.
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let mut fills = Vec::with_capacity(columns.len());
        for name in columns {
            let column = df
                .column(name)
                .map_err(|_| PricingError::ColumnNotFound(name.clone()))?;
            let values = numeric_values(column.as_materialized_series())?;
            let fill_value = match median(&values) {
                Some(m) => m,
                None => {
                    warn!("Column '{}' has no observed values; filling with 0.0", name);
                    0.0
                }
            };
            debug!("Median for '{}': {:.4}", name, fill_value);
            fills.push(ColumnFill {
                column: name.clone(),
                fill_value,
            });
        }

        self.fills = fills;
        self.is_fitted = true;
        Ok(self)
    }

    /// Replace missing values in every fitted column present in `df`.
    ///
    /// Fitted columns come out as `Float64`; other columns are untouched.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PricingError::NotFitted("MedianImputer"));
        }

        let mut out = df.clone();
        for fill in &self.fills {
            let Ok(column) = df.column(&fill.column) else {
                continue;
            };
            let values = numeric_values(column.as_materialized_series())?;
            let filled: Vec<f64> = values
                .into_iter()
                .map(|v| v.unwrap_or(fill.fill_value))
                .collect();
            out.replace(&fill.column, Series::new(fill.column.as_str().into(), filled))?;
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

    pub fn fill_value(&self, column: &str) -> Option<f64> {
        self.fills
            .iter()
            .find(|f| f.column == column)
            .map(|f| f.fill_value)
    }

    pub fn fills(&self) -> &[ColumnFill] {
        &self.fills
    }
}
