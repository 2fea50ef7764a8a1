//! Core data types shared across the pipeline stages.

use crate::error::{PricingError, Result};
use crate::utils::{number_label, numeric_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// One raw listing: column name to string, number, bool or null.
pub type RawRecord = serde_json::Map<String, Value>;

/// How a column is treated by the fitted pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Imputed with the training median, then standardized.
    Numeric,
    /// Label-encoded, never scaled.
    Categorical,
}

/// Column layout frozen at fit time.
///
/// `ordered_feature_names` is the exact column order of every matrix the
/// pipeline emits; `categorical_columns` is a subset of it and everything else
/// in it is numeric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    ordered_feature_names: Vec<String>,
    categorical_columns: BTreeSet<String>,
}

impl FeatureSchema {
    /// Create a schema, rejecting categorical names outside the feature list
    /// and duplicated feature names.
    pub fn new(
        ordered_feature_names: Vec<String>,
        categorical_columns: BTreeSet<String>,
    ) -> Result<Self> {
        let unique: BTreeSet<&String> = ordered_feature_names.iter().collect();
        if unique.len() != ordered_feature_names.len() {
            return Err(PricingError::BundleCorrupt(
                "duplicate feature names in schema".to_string(),
            ));
        }
        if let Some(stray) = categorical_columns
            .iter()
            .find(|c| !ordered_feature_names.contains(c))
        {
            return Err(PricingError::BundleCorrupt(format!(
                "categorical column '{}' is not a feature",
                stray
            )));
        }
        Ok(Self {
            ordered_feature_names,
            categorical_columns,
        })
    }

    pub fn ordered_feature_names(&self) -> &[String] {
        &self.ordered_feature_names
    }

    pub fn categorical_columns(&self) -> &BTreeSet<String> {
        &self.categorical_columns
    }

    /// Numeric columns in feature order.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.ordered_feature_names
            .iter()
            .filter(|name| !self.categorical_columns.contains(*name))
            .cloned()
            .collect()
    }

    /// Categorical columns in feature order.
    pub fn categorical_in_order(&self) -> Vec<String> {
        self.ordered_feature_names
            .iter()
            .filter(|name| self.categorical_columns.contains(*name))
            .cloned()
            .collect()
    }

    pub fn kind(&self, name: &str) -> Option<ColumnKind> {
        if self.categorical_columns.contains(name) {
            Some(ColumnKind::Categorical)
        } else if self.ordered_feature_names.iter().any(|n| n == name) {
            Some(ColumnKind::Numeric)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.ordered_feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered_feature_names.is_empty()
    }
}

/// Build a table from raw records.
///
/// Columns appear in first-seen key order. A column whose non-null values are
/// all numbers or booleans becomes `Float64`; anything else becomes `String`
/// with numbers and booleans rendered as text.
pub fn records_to_frame(records: &[RawRecord]) -> Result<DataFrame> {
    let mut names: Vec<&String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !names.contains(&key) {
                names.push(key);
            }
        }
    }

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let values: Vec<Option<&Value>> = records
            .iter()
            .map(|r| r.get(name.as_str()).filter(|v| !v.is_null()))
            .collect();

        let all_numeric = values
            .iter()
            .flatten()
            .all(|v| v.is_number() || v.is_boolean());

        let series = if all_numeric {
            let numbers: Vec<Option<f64>> = values
                .iter()
                .map(|v| {
                    v.and_then(|v| match v {
                        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                        other => other.as_f64(),
                    })
                })
                .collect();
            Series::new(name.as_str().into(), numbers)
        } else {
            let strings: Vec<Option<String>> = values
                .iter()
                .map(|v| {
                    v.map(|v| match v {
                        Value::String(s) => s.clone(),
                        Value::Number(n) if n.is_f64() => {
                            n.as_f64().map(number_label).unwrap_or_else(|| n.to_string())
                        }
                        other => other.to_string(),
                    })
                })
                .collect();
            Series::new(name.as_str().into(), strings)
        };
        columns.push(series.into_column());
    }

    Ok(DataFrame::new(columns)?)
}

/// Convert a transformed table into row-major `f64` rows for model scoring.
pub fn to_row_major(df: &DataFrame) -> Result<Vec<Vec<f64>>> {
    let mut rows = vec![Vec::with_capacity(df.width()); df.height()];
    for column in df.get_columns() {
        let values = numeric_values(column.as_materialized_series())?;
        for (row, value) in rows.iter_mut().zip(values) {
            row.push(value.unwrap_or(f64::NAN));
        }
    }
    Ok(rows)
}
