//! Feature Encoding Library for Real-Estate Price Prediction
//!
//! Turns raw property listings into the fixed-width numeric matrix a price
//! regressor is trained on and served with, built on Polars.
//!
//! # Overview
//!
//! - **Feature Derivation**: city from free-text address, household ratios,
//!   income and age bands
//! - **Schema Freezing**: numeric vs. categorical columns decided once at fit
//!   time and persisted with the artifacts
//! - **Median Imputation**: missing numeric values filled with training medians
//! - **Label Encoding**: known labels get `0..K-1`; unseen labels get a stable
//!   hashed code in a disjoint range, so two new cities stay distinguishable
//! - **Standard Scaling**: numeric columns only, categorical codes are never
//!   scaled
//! - **Persistence**: the whole fitted bundle saved and loaded as one JSON file
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_housing::{FeaturePipeline, PipelineConfig, to_row_major};
//! use polars::prelude::*;
//!
//! let train = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("train.csv".into()))?
//!     .finish()?;
//!
//! let mut pipeline = FeaturePipeline::new(PipelineConfig::default());
//! let matrix = pipeline.fit_transform(&train)?;
//! pipeline.save("models/preprocessor.json")?;
//!
//! // Later, in the serving process
//! let pipeline = FeaturePipeline::load("models/preprocessor.json")?;
//! let rows = to_row_major(&pipeline.transform(&request)?)?;
//! ```
//!
//! # Serving
//!
//! Wrap a [`FittedPipeline`] in a [`PipelineHandle`] and pair it with any
//! [`PriceModel`] through a [`Predictor`]. Retrained bundles are swapped in
//! with [`PipelineHandle::swap`] while requests keep running.
//!
//! # Configuration
//!
//! ```rust,ignore
//! use lex_housing::PipelineConfig;
//!
//! let config = PipelineConfig::builder()
//!     .city_extraction_threshold(0.8)   // derive city when >=80% unset
//!     .unseen_code_space(1 << 24)       // width of the unseen-label range
//!     .unknown_label("Unknown")
//!     .keep_backup(true)
//!     .build()?;
//! ```

pub mod config;
pub mod encoders;
pub mod error;
pub mod features;
pub mod imputers;
pub mod pipeline;
pub mod scaling;
pub mod schema;
pub mod serving;
pub mod training;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{ConfigValidationError, PipelineConfig, PipelineConfigBuilder};
pub use encoders::{CategoricalEncoder, LabelEncoder};
pub use error::{PricingError, Result as PricingResult, ResultExt};
pub use features::FeatureDeriver;
pub use imputers::MedianImputer;
pub use pipeline::{FeaturePipeline, FittedPipeline, PipelineHandle};
pub use scaling::{ScalerParams, StandardScaler};
pub use schema::ColumnClassifier;
pub use serving::{LinearPriceModel, ModelInfo, PriceModel, PricePrediction, Predictor};
pub use training::{detect_target_column, normalize_city_column, split_features_target};
pub use types::{ColumnKind, FeatureSchema, RawRecord, records_to_frame, to_row_major};
