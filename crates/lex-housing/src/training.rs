//! Helpers for preparing a training table before `fit_transform`.

use crate::error::{PricingError, Result, ResultExt};
use crate::features::columns::CITY_NAME;
use crate::utils::{column_names, numeric_values};
use polars::prelude::*;
use tracing::{info, warn};

/// Known target column names, in priority order.
pub const TARGET_CANDIDATES: [&str; 12] = [
    "price",
    "Price",
    "PRICE",
    "target",
    "Target",
    "TARGET",
    "house_price",
    "House_Price",
    "HOUSE_PRICE",
    "price_in_lakhs",
    "Price_in_Lakhs",
    "TARGET(PRICE_IN_LACS)",
];

/// Pick the price column of a training table.
///
/// The first known name present wins; failing that, the first column whose
/// name contains "price" in any case; failing that, the last column.
pub fn detect_target_column(df: &DataFrame) -> Result<String> {
    let names = column_names(df);

    if let Some(found) = TARGET_CANDIDATES
        .iter()
        .find(|candidate| names.iter().any(|n| n == *candidate))
    {
        return Ok(found.to_string());
    }

    if let Some(found) = names.iter().find(|n| n.to_lowercase().contains("price")) {
        return Ok(found.clone());
    }

    match names.last() {
        Some(last) => {
            warn!("No price-like column found; using last column '{}' as target", last);
            Ok(last.clone())
        }
        None => Err(PricingError::EmptyTable),
    }
}

/// Ensure the city column is called `CITY_NAME`.
///
/// When `CITY_NAME` is absent, the first column whose name mentions "city" or
/// "location" is renamed. Returns whether a rename happened.
pub fn normalize_city_column(df: &mut DataFrame) -> Result<bool> {
    if df.column(CITY_NAME).is_ok() {
        return Ok(false);
    }

    let candidate = column_names(df).into_iter().find(|name| {
        let lower = name.to_lowercase();
        lower.contains("city") || lower.contains("location")
    });

    match candidate {
        Some(name) => {
            df.rename(&name, CITY_NAME.into())
                .context(format!("renaming '{}'", name))?;
            info!("Renamed '{}' to '{}'", name, CITY_NAME);
            Ok(true)
        }
        None => {
            warn!("No city column found; city differences cannot be learned");
            Ok(false)
        }
    }
}

/// Split a training table into features and target.
///
/// Rows whose target is missing or non-numeric are dropped from both halves.
pub fn split_features_target(df: &DataFrame, target: &str) -> Result<(DataFrame, Vec<f64>)> {
    let column = df
        .column(target)
        .map_err(|_| PricingError::ColumnNotFound(target.to_string()))?;
    let values = numeric_values(column.as_materialized_series())?;

    let keep: Vec<bool> = values.iter().map(Option::is_some).collect();
    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        warn!("Dropping {} rows with missing target '{}'", dropped, target);
    }

    let mask = BooleanChunked::new("keep".into(), keep);
    let features = df.drop(target)?.filter(&mask)?;
    let target_values: Vec<f64> = values.into_iter().flatten().collect();

    if features.height() == 0 {
        return Err(PricingError::EmptyTable);
    }
    Ok((features, target_values))
}
