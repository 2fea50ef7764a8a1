//! Numeric vs. categorical partition of a derived table.
//!
//! Classification happens once, on the training table. The resulting
//! [`FeatureSchema`] travels with the fitted artifacts and is never
//! re-inferred, so a serving request whose `SQUARE_FT` arrives as text is
//! still treated as numeric.

use crate::error::Result;
use crate::types::FeatureSchema;
use crate::utils::{DtypeCategory, column_names, get_dtype_category};
use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::debug;

/// Partitions columns by their native dtype.
pub struct ColumnClassifier;

impl ColumnClassifier {
    /// Numeric and boolean columns are numeric; text and every other dtype
    /// (all-null, temporal, nested) is categorical.
    pub fn classify(df: &DataFrame) -> Result<FeatureSchema> {
        let ordered = column_names(df);
        let mut categorical = BTreeSet::new();

        for column in df.get_columns() {
            match get_dtype_category(column.dtype()) {
                DtypeCategory::Numeric | DtypeCategory::Boolean => {}
                DtypeCategory::String | DtypeCategory::Other => {
                    categorical.insert(column.name().to_string());
                }
            }
        }

        debug!(
            "Classified {} columns: {} numeric, {} categorical",
            ordered.len(),
            ordered.len() - categorical.len(),
            categorical.len()
        );

        FeatureSchema::new(ordered, categorical)
    }
}
