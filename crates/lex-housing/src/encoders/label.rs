//! Label encoding with a disjoint hash range for unseen labels.
//!
//! Known labels map to `0..K-1`. A label that was not present at fit time maps
//! to `K + fnv1a(label) % M`, where `M` is the unseen-code space recorded in
//! the encoder. This keeps three properties:
//!
//! - an unseen code is never a known code, because the range starts at `K`;
//! - the same unseen label gets the same code in every call and every process,
//!   because FNV-1a has no per-process seed;
//! - two different unseen labels share a code only with probability ~`1/M`,
//!   instead of every new city collapsing onto one fallback code.

use crate::config::{MAX_UNSEEN_CODE_SPACE, PipelineConfig};
use crate::error::{PricingError, Result};
use crate::utils::{fnv1a_hash, string_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use tracing::debug;

/// Encoder for a single categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    column: String,
    codes: BTreeMap<String, u64>,
    unseen_code_space: u64,
    unknown_label: String,
}

impl LabelEncoder {
    /// Learn codes from the training values of one column.
    ///
    /// Missing values are recorded as `unknown_label`. Codes follow the
    /// lexicographic order of the distinct labels.
    pub fn fit(
        column: impl Into<String>,
        values: &[Option<String>],
        unseen_code_space: u64,
        unknown_label: impl Into<String>,
    ) -> Self {
        let unknown_label = unknown_label.into();
        let distinct: BTreeSet<&str> = values
            .iter()
            .map(|v| v.as_deref().unwrap_or(&unknown_label))
            .collect();

        let codes = distinct
            .into_iter()
            .enumerate()
            .map(|(code, label)| (label.to_string(), code as u64))
            .collect();

        Self {
            column: column.into(),
            codes,
            unseen_code_space: unseen_code_space.max(1),
            unknown_label,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Number of labels seen during fit (`K`).
    pub fn num_known(&self) -> u64 {
        self.codes.len() as u64
    }

    pub fn unseen_code_space(&self) -> u64 {
        self.unseen_code_space
    }

    /// Codes that unseen labels can receive.
    pub fn unseen_code_range(&self) -> Range<u64> {
        let start = self.num_known();
        start..start + self.unseen_code_space
    }

    pub fn is_known(&self, label: &str) -> bool {
        self.codes.contains_key(label)
    }

    /// Known labels ordered by code.
    pub fn classes(&self) -> Vec<&str> {
        let mut classes: Vec<(&str, u64)> =
            self.codes.iter().map(|(l, c)| (l.as_str(), *c)).collect();
        classes.sort_by_key(|(_, code)| *code);
        classes.into_iter().map(|(label, _)| label).collect()
    }

    /// Code of a label; unseen labels land in [`Self::unseen_code_range`].
    pub fn encode(&self, label: &str) -> u64 {
        match self.codes.get(label) {
            Some(code) => *code,
            None => {
                self.num_known() + fnv1a_hash(label.as_bytes()) % self.unseen_code_space.max(1)
            }
        }
    }

    /// Check state restored from a bundle: codes must be exactly `0..K-1` and
    /// the unseen space within `1..=MAX_UNSEEN_CODE_SPACE`.
    pub fn validate(&self) -> Result<()> {
        if self.unseen_code_space == 0 || self.unseen_code_space > MAX_UNSEEN_CODE_SPACE {
            return Err(PricingError::BundleCorrupt(format!(
                "encoder '{}' has unseen code space {}",
                self.column, self.unseen_code_space
            )));
        }

        let codes: BTreeSet<u64> = self.codes.values().copied().collect();
        let dense = codes.len() == self.codes.len()
            && codes.iter().copied().eq(0..self.num_known());
        if !dense {
            return Err(PricingError::BundleCorrupt(format!(
                "encoder '{}' codes are not 0..{}",
                self.column,
                self.num_known()
            )));
        }

        if self.unknown_label.trim().is_empty() {
            return Err(PricingError::BundleCorrupt(format!(
                "encoder '{}' has an empty unknown label",
                self.column
            )));
        }
        Ok(())
    }

    /// Code of an optional value; missing is encoded as the unknown label.
    pub fn encode_value(&self, value: Option<&str>) -> u64 {
        self.encode(value.unwrap_or(&self.unknown_label))
    }

    /// Encode a whole Series into `Float64` codes.
    pub fn encode_series(&self, series: &Series) -> Result<Series> {
        let values = string_values(series)?;
        let codes: Vec<f64> = values
            .iter()
            .map(|v| self.encode_value(v.as_deref()) as f64)
            .collect();
        Ok(Series::new(series.name().clone(), codes))
    }
}

/// One [`LabelEncoder`] per categorical column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    encoders: BTreeMap<String, LabelEncoder>,
    is_fitted: bool,
}

impl CategoricalEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a fitted encoder set from already-fitted column encoders.
    pub fn from_encoders(encoders: impl IntoIterator<Item = LabelEncoder>) -> Self {
        Self {
            encoders: encoders
                .into_iter()
                .map(|e| (e.column.clone(), e))
                .collect(),
            is_fitted: true,
        }
    }

    /// Fit an encoder for every listed column.
    pub fn fit(
        &mut self,
        df: &DataFrame,
        columns: &[String],
        config: &PipelineConfig,
    ) -> Result<&mut Self> {
        let mut encoders = BTreeMap::new();
        for name in columns {
            let column = df
                .column(name)
                .map_err(|_| PricingError::ColumnNotFound(name.clone()))?;
            let values = string_values(column.as_materialized_series())?;
            let encoder = LabelEncoder::fit(
                name.clone(),
                &values,
                config.unseen_code_space,
                config.unknown_label.clone(),
            );
            debug!("Encoder for '{}': {} known labels", name, encoder.num_known());
            encoders.insert(name.clone(), encoder);
        }

        self.encoders = encoders;
        self.is_fitted = true;
        Ok(self)
    }

    /// Replace every encoded column present in `df` with its `Float64` codes.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PricingError::NotFitted("CategoricalEncoder"));
        }

        let mut out = df.clone();
        for (name, encoder) in &self.encoders {
            let Ok(column) = df.column(name) else {
                continue;
            };
            let encoded = encoder.encode_series(column.as_materialized_series())?;
            out.replace(name, encoded)?;
        }
        Ok(out)
    }

    pub fn fit_transform(
        &mut self,
        df: &DataFrame,
        columns: &[String],
        config: &PipelineConfig,
    ) -> Result<DataFrame> {
        self.fit(df, columns, config)?;
        self.transform(df)
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Check every column encoder and that each is filed under its own column.
    pub fn validate(&self) -> Result<()> {
        for (key, encoder) in &self.encoders {
            if key != &encoder.column {
                return Err(PricingError::BundleCorrupt(format!(
                    "encoder for '{}' is filed under '{}'",
                    encoder.column, key
                )));
            }
            encoder.validate()?;
        }
        Ok(())
    }

    pub fn get(&self, column: &str) -> Option<&LabelEncoder> {
        self.encoders.get(column)
    }

    /// Names of the columns that have an encoder.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.encoders.keys().map(String::as_str)
    }

    pub fn encoders(&self) -> impl Iterator<Item = &LabelEncoder> {
        self.encoders.values()
    }
}
