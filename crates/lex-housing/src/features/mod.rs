//! Feature derivation.
//!
//! [`FeatureDeriver`] adds engineered columns to a raw table without removing
//! anything: household ratios and income/age bands for census-shaped data,
//! and `CITY_NAME` recovered from `ADDRESS` for listing data whose city column
//! is missing or mostly unset. Every feature is optional; a table that lacks
//! the inputs for a feature simply does not get it.

pub mod address;
pub mod bands;

pub use address::extract_city_from_address;
pub use bands::{AGE_BANDS, BandSpec, INCOME_BANDS};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::utils::{numeric_values, string_values};
use address::is_unset_city;
use polars::prelude::*;
use tracing::debug;

/// Raw and derived column names.
pub mod columns {
    pub const ADDRESS: &str = "ADDRESS";
    pub const CITY_NAME: &str = "CITY_NAME";

    pub const TOTAL_ROOMS: &str = "total_rooms";
    pub const TOTAL_BEDROOMS: &str = "total_bedrooms";
    pub const POPULATION: &str = "population";
    pub const HOUSEHOLDS: &str = "households";
    pub const MEDIAN_INCOME: &str = "median_income";
    pub const HOUSING_MEDIAN_AGE: &str = "housing_median_age";

    pub const ROOMS_PER_HOUSEHOLD: &str = "rooms_per_household";
    pub const BEDROOMS_PER_HOUSEHOLD: &str = "bedrooms_per_household";
    pub const POPULATION_PER_HOUSEHOLD: &str = "population_per_household";
    pub const POPULATION_PER_ROOM: &str = "population_per_room";
    pub const INCOME_BAND: &str = "income_band";
    pub const INCOME_SQUARED: &str = "income_squared";
    pub const INCOME_PER_ROOM: &str = "income_per_room";
    pub const AGE_BINS: &str = "age_bins";
}

/// Smoothing added to every ratio denominator.
pub const RATIO_SMOOTHING: f64 = 1.0;

/// Adds derived feature columns to a table.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDeriver {
    city_extraction_threshold: f64,
    unknown_label: String,
}

impl Default for FeatureDeriver {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl FeatureDeriver {
    pub fn new(city_extraction_threshold: f64, unknown_label: impl Into<String>) -> Self {
        Self {
            city_extraction_threshold,
            unknown_label: unknown_label.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.city_extraction_threshold, config.unknown_label.clone())
    }

    pub fn city_extraction_threshold(&self) -> f64 {
        self.city_extraction_threshold
    }

    pub fn unknown_label(&self) -> &str {
        &self.unknown_label
    }

    /// Return a copy of `df` augmented with every derivable feature.
    pub fn derive(&self, df: &DataFrame) -> Result<DataFrame> {
        use columns::*;

        let mut out = df.clone();

        self.derive_city(&mut out)?;

        let ratios = [
            (ROOMS_PER_HOUSEHOLD, TOTAL_ROOMS, HOUSEHOLDS),
            (BEDROOMS_PER_HOUSEHOLD, TOTAL_BEDROOMS, HOUSEHOLDS),
            (POPULATION_PER_HOUSEHOLD, POPULATION, HOUSEHOLDS),
            (POPULATION_PER_ROOM, POPULATION, TOTAL_ROOMS),
        ];
        for (name, numerator, denominator) in ratios {
            if let Some(series) = smoothed_ratio(&out, name, numerator, denominator)? {
                out.with_column(series)?;
                debug!("Derived '{}'", name);
            }
        }

        if let Some(income) = optional_numeric(&out, MEDIAN_INCOME)? {
            out.with_column(banded(INCOME_BAND, &income, &INCOME_BANDS))?;

            let squared: Vec<Option<f64>> = income.iter().map(|v| v.map(|x| x * x)).collect();
            out.with_column(Series::new(INCOME_SQUARED.into(), squared))?;

            let per_room = smoothed_ratio(&out, INCOME_PER_ROOM, MEDIAN_INCOME, TOTAL_ROOMS)?;
            if let Some(series) = per_room {
                out.with_column(series)?;
            }
            debug!("Derived income features");
        }

        if let Some(age) = optional_numeric(&out, HOUSING_MEDIAN_AGE)? {
            out.with_column(banded(AGE_BINS, &age, &AGE_BANDS))?;
            debug!("Derived '{}'", AGE_BINS);
        }

        Ok(out)
    }

    /// Replace or create `CITY_NAME` from `ADDRESS` when the city column is
    /// absent or unset for at least the configured share of rows.
    fn derive_city(&self, df: &mut DataFrame) -> Result<()> {
        use columns::{ADDRESS, CITY_NAME};

        let Ok(address_col) = df.column(ADDRESS) else {
            return Ok(());
        };
        let addresses = string_values(address_col.as_materialized_series())?;

        let should_extract = match df.column(CITY_NAME) {
            Err(_) => true,
            Ok(city_col) => {
                if df.height() == 0 {
                    false
                } else {
                    let cities = string_values(city_col.as_materialized_series())?;
                    let unset = cities
                        .iter()
                        .filter(|c| is_unset_city(c.as_deref(), &self.unknown_label))
                        .count();
                    unset as f64 >= self.city_extraction_threshold * df.height() as f64
                }
            }
        };

        if !should_extract {
            return Ok(());
        }

        let cities: Vec<String> = addresses
            .iter()
            .map(|a| extract_city_from_address(a.as_deref(), &self.unknown_label))
            .collect();
        df.with_column(Series::new(CITY_NAME.into(), cities))?;
        debug!("Derived '{}' from '{}'", CITY_NAME, ADDRESS);
        Ok(())
    }
}

/// Numeric view of a column, or `None` if the column is absent.
fn optional_numeric(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    match df.column(name) {
        Ok(col) => Ok(Some(numeric_values(col.as_materialized_series())?)),
        Err(_) => Ok(None),
    }
}

/// `numerator / (denominator + 1)`, or `None` if either input is absent.
/// A missing operand yields a missing ratio.
fn smoothed_ratio(
    df: &DataFrame,
    name: &str,
    numerator: &str,
    denominator: &str,
) -> Result<Option<Series>> {
    let (Some(num), Some(den)) = (
        optional_numeric(df, numerator)?,
        optional_numeric(df, denominator)?,
    ) else {
        return Ok(None);
    };

    let values: Vec<Option<f64>> = num
        .iter()
        .zip(den.iter())
        .map(|(n, d)| match (n, d) {
            (Some(n), Some(d)) => Some(n / (d + RATIO_SMOOTHING)),
            _ => None,
        })
        .collect();
    Ok(Some(Series::new(name.into(), values)))
}

fn banded(name: &str, values: &[Option<f64>], spec: &BandSpec) -> Series {
    let labels: Vec<Option<&str>> = values
        .iter()
        .map(|v| v.and_then(|x| spec.bucket(x)))
        .collect();
    Series::new(name.into(), labels)
}
