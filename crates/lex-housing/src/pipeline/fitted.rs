//! Pipeline orchestration.
//!
//! [`FeaturePipeline`] is the mutable front door (`fit_transform`, `transform`,
//! `save`, `load`); it owns an optional [`FittedPipeline`], the immutable
//! bundle of every artifact produced by one fit pass. Serving code should hold
//! a `FittedPipeline` (or a [`PipelineHandle`](super::PipelineHandle)) directly.
//!
//! Stage order:
//!
//! ```text
//! fit_transform: derive → classify → impute(fit) → encode(fit) → scale(fit)
//! transform:     derive → conform to schema → impute → encode → scale
//! ```

use crate::config::PipelineConfig;
use crate::encoders::CategoricalEncoder;
use crate::error::{PricingError, Result};
use crate::features::FeatureDeriver;
use crate::imputers::MedianImputer;
use crate::scaling::StandardScaler;
use crate::schema::ColumnClassifier;
use crate::types::{ColumnKind, FeatureSchema, RawRecord, records_to_frame};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Immutable bundle of all fitted artifacts.
///
/// `transform` takes `&self` and never mutates, so one instance can serve
/// concurrent callers. Retraining builds a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedPipeline {
    pub(crate) deriver: FeatureDeriver,
    pub(crate) schema: FeatureSchema,
    pub(crate) imputer: MedianImputer,
    pub(crate) encoder: CategoricalEncoder,
    pub(crate) scaler: StandardScaler,
    pub(crate) fitted_at: Option<DateTime<Utc>>,
}

// Shared read-only across request handlers
static_assertions::assert_impl_all!(FittedPipeline: Send, Sync);

impl FittedPipeline {
    /// Fit every stage on a training table and return the fitted bundle
    /// together with the transformed training matrix.
    pub fn fit(config: &PipelineConfig, df: &DataFrame) -> Result<(Self, DataFrame)> {
        config.validate()?;
        if df.height() == 0 {
            return Err(PricingError::EmptyTable);
        }

        let start = Instant::now();
        info!("Fitting feature pipeline on {} rows x {} columns", df.height(), df.width());

        let deriver = FeatureDeriver::from_config(config);
        let derived = deriver.derive(df)?;

        let schema = ColumnClassifier::classify(&derived)?;
        let numeric = schema.numeric_columns();
        let categorical = schema.categorical_in_order();
        info!(
            "Schema frozen: {} features ({} numeric, {} categorical)",
            schema.len(),
            numeric.len(),
            categorical.len()
        );

        let mut imputer = MedianImputer::new();
        let imputed = imputer.fit_transform(&derived, &numeric)?;

        let mut encoder = CategoricalEncoder::new();
        let encoded = encoder.fit_transform(&imputed, &categorical, config)?;

        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&encoded, &numeric)?;

        let fitted = Self {
            deriver,
            schema,
            imputer,
            encoder,
            scaler,
            fitted_at: Some(Utc::now()),
        };
        let matrix = fitted.select_features(&scaled)?;

        info!("Pipeline fitted in {} ms", start.elapsed().as_millis());
        Ok((fitted, matrix))
    }

    /// Map a table onto the fitted feature matrix.
    ///
    /// The result has exactly the schema's columns, in schema order, all
    /// `Float64`, one row per input row. Absent feature columns are filled
    /// with 0 (numeric) or an empty string (categorical) and extra input
    /// columns are dropped.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let derived = self.deriver.derive(df)?;
        let conformed = self.conform(&derived)?;
        let imputed = self.imputer.transform(&conformed)?;
        let encoded = self.encoder.transform(&imputed)?;
        let scaled = self.scaler.transform(&encoded)?;
        let matrix = self.select_features(&scaled)?;
        debug!("Transformed {} rows", matrix.height());
        Ok(matrix)
    }

    /// Transform raw records, e.g. a decoded JSON request body.
    pub fn transform_records(&self, records: &[RawRecord]) -> Result<DataFrame> {
        let df = records_to_frame(records)?;
        self.transform(&df)
    }

    /// Add absent schema columns with defaults and restrict to schema order.
    fn conform(&self, df: &DataFrame) -> Result<DataFrame> {
        let height = df.height();
        let mut out = df.clone();
        for name in self.schema.ordered_feature_names() {
            if out.column(name).is_ok() {
                continue;
            }
            let filler = match self.schema.kind(name) {
                Some(ColumnKind::Categorical) => {
                    Series::new(name.as_str().into(), vec![String::new(); height])
                }
                _ => Series::new(name.as_str().into(), vec![0.0f64; height]),
            };
            debug!("Filling absent feature '{}'", name);
            out.with_column(filler)?;
        }
        self.select_features(&out)
    }

    fn select_features(&self, df: &DataFrame) -> Result<DataFrame> {
        Ok(df.select(self.schema.ordered_feature_names().iter().map(String::as_str))?)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn feature_names(&self) -> &[String] {
        self.schema.ordered_feature_names()
    }

    pub fn imputer(&self) -> &MedianImputer {
        &self.imputer
    }

    pub fn encoder(&self) -> &CategoricalEncoder {
        &self.encoder
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn deriver(&self) -> &FeatureDeriver {
        &self.deriver
    }

    /// When the bundle was fitted, if recorded.
    pub fn fitted_at(&self) -> Option<DateTime<Utc>> {
        self.fitted_at
    }

    /// Labels seen during fit for a categorical column, ordered by code.
    pub fn known_labels(&self, column: &str) -> Option<Vec<&str>> {
        self.encoder.get(column).map(|e| e.classes())
    }

    /// Write the bundle to `path`. See [`super::persistence`].
    pub fn save(&self, path: impl AsRef<Path>, keep_backup: bool) -> Result<()> {
        super::persistence::save_bundle(self, path.as_ref(), keep_backup)
    }

    /// Read a bundle written by [`Self::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        super::persistence::load_bundle(path.as_ref())
    }

    /// Serialize the bundle into JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        super::persistence::to_bytes(self)
    }

    /// Deserialize a bundle from bytes produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        super::persistence::from_bytes(bytes)
    }
}

/// Fit/transform front end holding configuration and, once fitted, the
/// fitted bundle.
///
/// # Example
///
/// ```rust,ignore
/// use lex_housing::{FeaturePipeline, PipelineConfig};
///
/// let mut pipeline = FeaturePipeline::new(PipelineConfig::default());
/// let train_matrix = pipeline.fit_transform(&train_df)?;
/// pipeline.save("models/preprocessor.json")?;
///
/// let loaded = FeaturePipeline::load("models/preprocessor.json")?;
/// let rows = loaded.transform(&request_df)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct FeaturePipeline {
    config: PipelineConfig,
    fitted: Option<FittedPipeline>,
}

impl FeaturePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    /// Fit all stages on `df` and return its transformed matrix.
    ///
    /// Refitting replaces the previous bundle as a whole.
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        let (fitted, matrix) = FittedPipeline::fit(&self.config, df)?;
        self.fitted = Some(fitted);
        Ok(matrix)
    }

    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.fitted()?.transform(df)
    }

    pub fn transform_records(&self, records: &[RawRecord]) -> Result<DataFrame> {
        self.fitted()?.transform_records(records)
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The fitted bundle, or `NotFitted`.
    pub fn fitted(&self) -> Result<&FittedPipeline> {
        self.fitted.as_ref().ok_or(PricingError::NotFitted("Pipeline"))
    }

    pub fn into_fitted(self) -> Result<FittedPipeline> {
        self.fitted.ok_or(PricingError::NotFitted("Pipeline"))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.fitted()?.save(path, self.config.keep_backup)
    }

    /// Load a fitted pipeline. Derivation settings come from the bundle.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let fitted = FittedPipeline::load(path)?;
        let config = PipelineConfig {
            city_extraction_threshold: fitted.deriver.city_extraction_threshold(),
            unknown_label: fitted.deriver.unknown_label().to_string(),
            ..PipelineConfig::default()
        };
        Ok(Self {
            config,
            fitted: Some(fitted),
        })
    }
}

impl From<FittedPipeline> for FeaturePipeline {
    fn from(fitted: FittedPipeline) -> Self {
        let config = PipelineConfig {
            city_extraction_threshold: fitted.deriver.city_extraction_threshold(),
            unknown_label: fitted.deriver.unknown_label().to_string(),
            ..PipelineConfig::default()
        };
        Self {
            config,
            fitted: Some(fitted),
        }
    }
}
