//! Integration tests for the feature-encoding pipeline.
//!
//! These tests exercise fit, transform, persistence and serving end to end.

use lex_housing::{
    FeaturePipeline, FittedPipeline, LinearPriceModel, PipelineConfig, PipelineHandle,
    Predictor, PricingError, RawRecord, detect_target_column, normalize_city_column,
    split_features_target, to_row_major,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_csv(filename: &str) -> DataFrame {
    let path = fixtures_path().join(filename);
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read CSV file")
}

fn record(value: serde_json::Value) -> RawRecord {
    value.as_object().cloned().expect("record must be an object")
}

fn values(df: &DataFrame, name: &str) -> Vec<f64> {
    df.column(name)
        .expect("column exists")
        .as_materialized_series()
        .f64()
        .expect("Float64 column")
        .into_iter()
        .map(|v| v.expect("no nulls in output"))
        .collect()
}

fn names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Two cities with identical listings, the minimal city-aware training set.
fn two_city_pipeline() -> FeaturePipeline {
    let train = df![
        "SQUARE_FT" => [1000.0, 1000.0],
        "CITY_NAME" => ["Mumbai", "Delhi"],
    ]
    .unwrap();
    let mut pipeline = FeaturePipeline::new(PipelineConfig::default());
    pipeline.fit_transform(&train).unwrap();
    pipeline
}

fn listings_pipeline() -> (FeaturePipeline, DataFrame, Vec<f64>) {
    let mut data = load_csv("listings_small.csv");
    let target = detect_target_column(&data).unwrap();
    normalize_city_column(&mut data).unwrap();
    let (features, y) = split_features_target(&data, &target).unwrap();

    let mut pipeline = FeaturePipeline::new(PipelineConfig::default());
    let matrix = pipeline.fit_transform(&features).unwrap();
    assert_eq!(matrix.height(), y.len());
    (pipeline, matrix, y)
}

// ============================================================================
// Unseen City Scenarios
// ============================================================================

#[test]
fn test_known_cities_encode_differently() {
    let pipeline = two_city_pipeline();
    let request = df![
        "SQUARE_FT" => [1000.0, 1000.0],
        "CITY_NAME" => ["Mumbai", "Delhi"],
    ]
    .unwrap();
    let out = pipeline.transform(&request).unwrap();
    let cities = values(&out, "CITY_NAME");

    assert_eq!(cities, vec![1.0, 0.0]);
}

#[test]
fn test_unseen_cities_get_distinct_codes_above_known() {
    let pipeline = two_city_pipeline();
    let request = df![
        "SQUARE_FT" => [1000.0, 1000.0, 1000.0, 1000.0],
        "CITY_NAME" => ["Chennai", "Kochi", "Mumbai", "Delhi"],
    ]
    .unwrap();
    let cities = values(&pipeline.transform(&request).unwrap(), "CITY_NAME");

    let (chennai, kochi) = (cities[0], cities[1]);
    assert!(chennai >= 2.0, "Chennai code {} collides with known range", chennai);
    assert!(kochi >= 2.0, "Kochi code {} collides with known range", kochi);
    assert_ne!(chennai, kochi);
    assert_ne!(chennai, cities[2]);
    assert_ne!(chennai, cities[3]);
}

#[test]
fn test_unseen_city_code_is_stable_across_calls() {
    let pipeline = two_city_pipeline();
    let request = df![
        "SQUARE_FT" => [1000.0, 1000.0],
        "CITY_NAME" => ["Chennai", "Chennai"],
    ]
    .unwrap();

    let first = values(&pipeline.transform(&request).unwrap(), "CITY_NAME");
    let second = values(&pipeline.transform(&request).unwrap(), "CITY_NAME");
    assert_eq!(first[0], first[1]);
    assert_eq!(first, second);
}

#[test]
fn test_missing_city_is_a_valid_code() {
    let pipeline = two_city_pipeline();
    let request = df![
        "SQUARE_FT" => [1000.0],
        "CITY_NAME" => [None::<&str>],
    ]
    .unwrap();
    let out = pipeline.transform(&request).unwrap();
    assert_eq!(out.column("CITY_NAME").unwrap().null_count(), 0);
    assert!(values(&out, "CITY_NAME")[0] >= 2.0);
}

// ============================================================================
// Transform Contract
// ============================================================================

#[test]
fn test_transform_is_bit_identical() {
    let (pipeline, _, _) = listings_pipeline();
    let request = load_csv("listings_small.csv");

    let first = pipeline.transform(&request).unwrap();
    let second = pipeline.transform(&request).unwrap();

    assert!(first.equals_missing(&second));
    assert_eq!(to_row_major(&first).unwrap(), to_row_major(&second).unwrap());
}

#[test]
fn test_output_columns_match_schema_order() {
    let (pipeline, matrix, _) = listings_pipeline();
    let fitted = pipeline.fitted().unwrap();

    assert_eq!(names(&matrix), fitted.feature_names().to_vec());

    // Extra columns dropped, missing ones filled, order preserved
    let request = df![
        "agent_phone" => ["99999"],
        "CITY_NAME" => ["Pune"],
        "SQUARE_FT" => [1100.0],
    ]
    .unwrap();
    let out = pipeline.transform(&request).unwrap();
    assert_eq!(names(&out), fitted.feature_names().to_vec());
    assert_eq!(out.height(), 1);
    for col in out.get_columns() {
        assert_eq!(col.dtype(), &DataType::Float64, "column {}", col.name());
        assert_eq!(col.null_count(), 0, "column {}", col.name());
    }
}

#[test]
fn test_listing_city_derived_from_address() {
    let (pipeline, _, _) = listings_pipeline();
    let fitted = pipeline.fitted().unwrap();

    assert!(fitted.schema().categorical_columns().contains("CITY_NAME"));
    assert_eq!(
        fitted.known_labels("CITY_NAME").unwrap(),
        vec!["Bangalore", "Ghaziabad", "Jaipur", "Kochi", "Kolkata", "Mohali", "Mysore"]
    );

    // Serving rows without CITY_NAME take the city from ADDRESS too
    let out = pipeline
        .transform_records(&[record(json!({"ADDRESS": "Jigani,Bangalore", "SQUARE_FT": 900}))])
        .unwrap();
    assert_eq!(values(&out, "CITY_NAME"), vec![0.0]);
}

#[test]
fn test_numeric_json_label_matches_training_text() {
    let train = df![
        "SQUARE_FT" => [1000.0, 1200.0],
        "CITY_NAME" => ["Mumbai", "Delhi"],
        "BLOCK" => ["5", "7"],
    ]
    .unwrap();
    let mut pipeline = FeaturePipeline::new(PipelineConfig::default());
    pipeline.fit_transform(&train).unwrap();

    let out = pipeline
        .fitted()
        .unwrap()
        .transform_records(&[
            record(json!({"SQUARE_FT": 1000, "CITY_NAME": "Mumbai", "BLOCK": 5})),
            record(json!({"SQUARE_FT": 1000, "CITY_NAME": "Delhi", "BLOCK": 7.0})),
        ])
        .unwrap();
    assert_eq!(values(&out, "BLOCK"), vec![0.0, 1.0]);
}

#[test]
fn test_categorical_columns_never_scaled() {
    let (pipeline, _, _) = listings_pipeline();
    let fitted = pipeline.fitted().unwrap();

    for column in fitted.scaler().columns() {
        assert!(
            !fitted.schema().categorical_columns().contains(column),
            "{} is categorical but scaled",
            column
        );
    }
    assert_eq!(
        fitted.scaler().columns().count() + fitted.schema().categorical_columns().len(),
        fitted.feature_names().len()
    );
}

#[test]
fn test_census_dataset_derived_features() {
    let mut data = load_csv("census_small.csv");
    let target = detect_target_column(&data).unwrap();
    assert_eq!(target, "median_house_value");
    assert!(!normalize_city_column(&mut data).unwrap());

    let (features, y) = split_features_target(&data, &target).unwrap();
    let mut pipeline = FeaturePipeline::default();
    let matrix = pipeline.fit_transform(&features).unwrap();
    let fitted = pipeline.fitted().unwrap();

    assert_eq!(y.len(), 10);
    assert_eq!(matrix.height(), 10);
    for derived in [
        "rooms_per_household",
        "bedrooms_per_household",
        "population_per_household",
        "population_per_room",
        "income_band",
        "income_squared",
        "income_per_room",
        "age_bins",
    ] {
        assert!(
            fitted.feature_names().iter().any(|n| n == derived),
            "missing derived feature {}",
            derived
        );
    }
    let categorical: Vec<&str> = fitted
        .schema()
        .categorical_columns()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(categorical, vec!["age_bins", "income_band", "ocean_proximity"]);
    assert_eq!(
        fitted.known_labels("age_bins").unwrap(),
        vec!["Mature", "New", "Old", "Recent", "Very Old"]
    );
    for col in matrix.get_columns() {
        assert_eq!(col.null_count(), 0, "column {}", col.name());
    }
}

#[test]
fn test_imputer_uses_training_median() {
    let train = df!["SQUARE_FT" => [Some(10.0), Some(20.0), None, Some(40.0)]].unwrap();
    let mut pipeline = FeaturePipeline::default();
    pipeline.fit_transform(&train).unwrap();
    let fitted = pipeline.fitted().unwrap();

    assert_eq!(fitted.imputer().fill_value("SQUARE_FT"), Some(20.0));

    let scaler = &fitted.scaler().params()[0];
    let out = pipeline
        .transform(&df!["SQUARE_FT" => [None::<f64>]].unwrap())
        .unwrap();
    assert_eq!(values(&out, "SQUARE_FT"), vec![(20.0 - scaler.mean) / scaler.std]);
}

#[test]
fn test_transform_before_fit() {
    let pipeline = FeaturePipeline::default();
    let err = pipeline
        .transform(&df!["SQUARE_FT" => [1.0]].unwrap())
        .unwrap_err();
    assert!(err.is_not_fitted());
    assert_eq!(err.error_code(), "NOT_FITTED");
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_save_load_round_trip() {
    let (pipeline, _, _) = listings_pipeline();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("preprocessor.json");
    pipeline.save(&path).unwrap();

    let loaded = FeaturePipeline::load(&path).unwrap();
    assert_eq!(loaded.fitted().unwrap(), pipeline.fitted().unwrap());

    let request = df![
        "SQUARE_FT" => [Some(1000.0), None],
        "CITY_NAME" => ["Chennai", "Mumbai"],
        "POSTED_BY" => ["Owner", "Agent"],
    ]
    .unwrap();
    let before = pipeline.transform(&request).unwrap();
    let after = loaded.transform(&request).unwrap();
    assert!(before.equals(&after));
}

#[test]
fn test_legacy_bundle_without_categorical_columns() {
    let (pipeline, _, _) = listings_pipeline();
    let fitted = pipeline.fitted().unwrap();

    let mut bundle: serde_json::Value =
        serde_json::from_slice(&fitted.to_bytes().unwrap()).unwrap();
    let object = bundle.as_object_mut().unwrap();
    object.remove("categorical_columns");
    object.remove("derivation");
    object.remove("format_version");
    object.remove("fitted_at");

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("legacy.json");
    std::fs::write(&path, serde_json::to_vec(&bundle).unwrap()).unwrap();

    let legacy = FittedPipeline::load(&path).unwrap();
    assert_eq!(legacy.schema(), fitted.schema());
    assert_eq!(legacy.fitted_at(), None);

    let request = load_csv("listings_small.csv");
    assert!(
        legacy
            .transform(&request)
            .unwrap()
            .equals(&fitted.transform(&request).unwrap())
    );
}

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = FeaturePipeline::load(dir.path().join("nope.json")).unwrap_err();
    assert!(err.is_load_failure());
    assert_eq!(err.error_code(), "IO_ERROR");
}

#[test]
fn test_load_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, b"{\"is_fitted\": true, \"feature_names\": [").unwrap();

    let err = FittedPipeline::load(&path).unwrap_err();
    assert!(err.is_load_failure());
    assert_eq!(err.error_code(), "JSON_ERROR");
}

#[test]
fn test_save_keeps_backup_of_previous_bundle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("preprocessor.json");

    let first = two_city_pipeline();
    first.save(&path).unwrap();
    let (second, _, _) = listings_pipeline();
    second.save(&path).unwrap();

    let backup = dir.path().join("backup").join("preprocessor_old.json");
    let restored = FittedPipeline::load(&backup).unwrap();
    assert_eq!(&restored, first.fitted().unwrap());
    assert_eq!(
        &FittedPipeline::load(&path).unwrap(),
        second.fitted().unwrap()
    );
}

#[test]
fn test_unseen_code_survives_reload() {
    let pipeline = two_city_pipeline();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("p.json");
    pipeline.save(&path).unwrap();
    let loaded = FeaturePipeline::load(&path).unwrap();

    let request = df!["SQUARE_FT" => [1.0], "CITY_NAME" => ["Chennai"]].unwrap();
    assert_eq!(
        values(&pipeline.transform(&request).unwrap(), "CITY_NAME"),
        values(&loaded.transform(&request).unwrap(), "CITY_NAME")
    );
}

// ============================================================================
// Serving
// ============================================================================

#[test]
fn test_regressor_sees_city_differences() {
    let pipeline = two_city_pipeline();
    let handle = Arc::new(PipelineHandle::new(pipeline.into_fitted().unwrap()));
    // Price depends on the city code only
    let predictor = Predictor::new(handle, LinearPriceModel::new(100.0, vec![0.0, 5.0]));

    let cities = ["Mumbai", "Delhi", "Chennai", "Kochi"];
    let records: Vec<RawRecord> = cities
        .iter()
        .map(|city| record(json!({"SQUARE_FT": 1000, "CITY_NAME": city})))
        .collect();
    let prices = predictor.predict_records(&records).unwrap().predictions;

    for i in 0..prices.len() {
        for j in (i + 1)..prices.len() {
            assert_ne!(
                prices[i], prices[j],
                "{} and {} scored the same",
                cities[i], cities[j]
            );
        }
    }
}

#[test]
fn test_predictor_follows_swapped_pipeline() {
    let handle = Arc::new(PipelineHandle::new(
        two_city_pipeline().into_fitted().unwrap(),
    ));
    let predictor = Predictor::new(Arc::clone(&handle), LinearPriceModel::new(0.0, vec![0.0, 1.0]));
    let pune = record(json!({"SQUARE_FT": 1000, "CITY_NAME": "Pune"}));

    let before = predictor.predict_one(&pune).unwrap();
    assert!(before >= 2.0);

    let retrained = df![
        "SQUARE_FT" => [900.0, 1100.0, 1000.0],
        "CITY_NAME" => ["Pune", "Mumbai", "Delhi"],
    ]
    .unwrap();
    let (fitted, _) = FittedPipeline::fit(&PipelineConfig::default(), &retrained).unwrap();
    handle.swap(fitted);

    assert_eq!(predictor.predict_one(&pune).unwrap(), 2.0);
    assert_eq!(
        predictor.model_info().known_cities,
        Some(vec!["Delhi".to_string(), "Mumbai".to_string(), "Pune".to_string()])
    );
}

#[test]
fn test_fit_rejects_invalid_config() {
    let config = PipelineConfig {
        city_extraction_threshold: 1.5,
        ..PipelineConfig::default()
    };
    let err = FeaturePipeline::new(config)
        .fit_transform(&df!["SQUARE_FT" => [1.0]].unwrap())
        .unwrap_err();
    assert!(matches!(err, PricingError::InvalidConfig(_)));
}
