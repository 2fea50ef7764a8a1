//! Shared utilities for the feature pipeline.
//!
//! This module contains common helper functions used across multiple modules
//! to reduce code duplication and ensure consistency.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for feature classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Boolean flags
    Boolean,
    /// String/text type
    String,
    /// Other/unknown types (all-null, temporal, nested)
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 4] = [',', '₹', '$', ' '];

/// Clean a string for numeric parsing by removing formatting characters.
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Try to parse a string as a numeric value (f64).
///
/// Handles thousands separators, currency symbols and boolean words so that
/// flags such as `"true"` arriving as text still land on 1.0.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    match cleaned.to_ascii_lowercase().as_str() {
        "true" | "yes" => return Some(1.0),
        "false" | "no" => return Some(0.0),
        _ => {}
    }
    cleaned.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Title-case a string: the first letter of every alphabetic run is
/// upper-cased and the rest of the run lower-cased.
///
/// ```rust,ignore
/// assert_eq!(title_case("navi MUMBAI"), "Navi Mumbai");
/// ```
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

// =============================================================================
// Hashing
// =============================================================================

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// 64-bit FNV-1a hash.
///
/// Seed-free, so a label hashes to the same value in every process.
pub fn fnv1a_hash(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

// =============================================================================
// Series Extraction Utilities
// =============================================================================

/// Read a Series as optional floats.
///
/// Numeric and boolean columns are cast; text columns are parsed value by
/// value, with unparseable entries treated as missing. NaN counts as missing.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    match get_dtype_category(series.dtype()) {
        DtypeCategory::Numeric | DtypeCategory::Boolean => {
            let casted = series.cast(&DataType::Float64)?;
            Ok(casted
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()))
                .collect())
        }
        DtypeCategory::String | DtypeCategory::Other => {
            let casted = series.cast(&DataType::String)?;
            Ok(casted
                .str()?
                .into_iter()
                .map(|v| v.and_then(parse_numeric_string))
                .collect())
        }
    }
}

/// Render a number as a categorical label.
///
/// Integral values print without a fractional part, so `5.0` and the text `"5"`
/// are the same label.
pub fn number_label(value: f64) -> String {
    const EXACT_INT: f64 = 9_007_199_254_740_992.0;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < EXACT_INT {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Read a Series as optional strings, stringifying non-text values.
///
/// Float columns go through [`number_label`].
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    if series.dtype().is_float() {
        let casted = series.cast(&DataType::Float64)?;
        return Ok(casted
            .f64()?
            .into_iter()
            .map(|v| v.map(number_label))
            .collect());
    }
    let casted = series.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Median of the observed values; `None` when nothing was observed.
///
/// An even count averages the two middle values.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut observed: Vec<f64> = values.iter().flatten().copied().collect();
    if observed.is_empty() {
        return None;
    }
    observed.sort_by(|a, b| a.total_cmp(b));
    let mid = observed.len() / 2;
    if observed.len() % 2 == 0 {
        Some((observed[mid - 1] + observed[mid]) / 2.0)
    } else {
        Some(observed[mid])
    }
}

/// Column names of a DataFrame as owned strings, in order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_category() {
        assert_eq!(get_dtype_category(&DataType::Int64), DtypeCategory::Numeric);
        assert_eq!(get_dtype_category(&DataType::Float64), DtypeCategory::Numeric);
        assert_eq!(get_dtype_category(&DataType::Boolean), DtypeCategory::Boolean);
        assert_eq!(get_dtype_category(&DataType::String), DtypeCategory::String);
        assert_eq!(get_dtype_category(&DataType::Null), DtypeCategory::Other);
    }

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("42"), Some(42.0));
        assert_eq!(parse_numeric_string("₹1,250,000"), Some(1_250_000.0));
        assert_eq!(parse_numeric_string(" -3.5 "), Some(-3.5));
        assert_eq!(parse_numeric_string("TRUE"), Some(1.0));
        assert_eq!(parse_numeric_string("no"), Some(0.0));
        assert_eq!(parse_numeric_string(""), None);
        assert_eq!(parse_numeric_string("Owner"), None);
        assert_eq!(parse_numeric_string("NaN"), None);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("mumbai"), "Mumbai");
        assert_eq!(title_case("navi MUMBAI"), "Navi Mumbai");
        assert_eq!(title_case("sector-5 salt lake"), "Sector-5 Salt Lake");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_fnv1a_known_values() {
        assert_eq!(fnv1a_hash(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a_hash(b"Chennai"), 2_928_613_302_751_816_019);
        assert_ne!(fnv1a_hash(b"Chennai"), fnv1a_hash(b"Kochi"));
    }

    #[test]
    fn test_numeric_values_from_text() {
        let series = Series::new("SQUARE_FT".into(), &[Some("1,000"), None, Some("abc")]);
        let values = numeric_values(&series).unwrap();
        assert_eq!(values, vec![Some(1000.0), None, None]);
    }

    #[test]
    fn test_numeric_values_from_ints() {
        let series = Series::new("BHK_NO.".into(), &[Some(2i64), None, Some(3)]);
        let values = numeric_values(&series).unwrap();
        assert_eq!(values, vec![Some(2.0), None, Some(3.0)]);
    }

    #[test]
    fn test_string_values_from_numbers() {
        let series = Series::new("code".into(), &[Some(7i64), None]);
        let values = string_values(&series).unwrap();
        assert_eq!(values, vec![Some("7".to_string()), None]);
    }

    #[test]
    fn test_string_values_from_integral_floats() {
        let series = Series::new("BHK_NO.".into(), &[Some(5.0f64), Some(2.5), None]);
        let values = string_values(&series).unwrap();
        assert_eq!(
            values,
            vec![Some("5".to_string()), Some("2.5".to_string()), None]
        );
    }

    #[test]
    fn test_number_label() {
        assert_eq!(number_label(5.0), "5");
        assert_eq!(number_label(-3.0), "-3");
        assert_eq!(number_label(0.25), "0.25");
        assert_eq!(number_label(f64::INFINITY), "inf");
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[Some(10.0), Some(20.0), None, Some(40.0)]), Some(20.0));
        assert_eq!(median(&[Some(1.0), Some(4.0), Some(2.0), Some(3.0)]), Some(2.5));
        assert_eq!(median(&[None, None]), None);
        assert_eq!(median(&[]), None);
    }
}
