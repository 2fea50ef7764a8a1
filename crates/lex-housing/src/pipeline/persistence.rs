//! On-disk bundle format for a [`FittedPipeline`].
//!
//! The bundle is a single pretty-printed JSON document. Bundles written before
//! `categorical_columns` and `derivation` were recorded still load: the
//! categorical set is rebuilt from the encoder keys and derivation falls back
//! to the default settings.
//!
//! Saving writes to a sibling temporary file and renames it over the target,
//! so a reader never observes a half-written bundle. With `keep_backup` the
//! previous bundle is copied to `backup/<stem>_old.<ext>` first.

use super::FittedPipeline;
use crate::config::{MAX_UNSEEN_CODE_SPACE, PipelineConfig};
use crate::encoders::CategoricalEncoder;
use crate::error::{PricingError, Result, ResultExt};
use crate::features::FeatureDeriver;
use crate::imputers::MedianImputer;
use crate::scaling::StandardScaler;
use crate::types::FeatureSchema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Current bundle layout version.
pub const BUNDLE_FORMAT_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DerivationSettings {
    city_extraction_threshold: f64,
    unknown_label: String,
}

impl Default for DerivationSettings {
    fn default() -> Self {
        let config = PipelineConfig::default();
        Self {
            city_extraction_threshold: config.city_extraction_threshold,
            unknown_label: config.unknown_label,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PipelineBundle {
    #[serde(default = "legacy_version")]
    format_version: u32,
    #[serde(default)]
    fitted_at: Option<DateTime<Utc>>,
    is_fitted: bool,
    feature_names: Vec<String>,
    #[serde(default)]
    categorical_columns: Option<BTreeSet<String>>,
    #[serde(default)]
    derivation: DerivationSettings,
    imputer: MedianImputer,
    label_encoders: CategoricalEncoder,
    scaler: StandardScaler,
}

fn legacy_version() -> u32 {
    1
}

impl From<&FittedPipeline> for PipelineBundle {
    fn from(fitted: &FittedPipeline) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            fitted_at: fitted.fitted_at,
            is_fitted: true,
            feature_names: fitted.schema.ordered_feature_names().to_vec(),
            categorical_columns: Some(fitted.schema.categorical_columns().clone()),
            derivation: DerivationSettings {
                city_extraction_threshold: fitted.deriver.city_extraction_threshold(),
                unknown_label: fitted.deriver.unknown_label().to_string(),
            },
            imputer: fitted.imputer.clone(),
            label_encoders: fitted.encoder.clone(),
            scaler: fitted.scaler.clone(),
        }
    }
}

impl PipelineBundle {
    /// Validate the bundle and assemble a fitted pipeline from it.
    fn into_fitted(self) -> Result<FittedPipeline> {
        if self.format_version > BUNDLE_FORMAT_VERSION {
            return Err(PricingError::BundleCorrupt(format!(
                "unsupported bundle format version {}",
                self.format_version
            )));
        }
        if !self.is_fitted
            || !self.imputer.is_fitted()
            || !self.label_encoders.is_fitted()
            || !self.scaler.is_fitted()
        {
            return Err(PricingError::BundleCorrupt(
                "bundle was saved before fitting".to_string(),
            ));
        }

        self.label_encoders.validate()?;
        if let Some(fill) = self.imputer.fills().iter().find(|f| !f.fill_value.is_finite()) {
            return Err(PricingError::BundleCorrupt(format!(
                "non-finite fill value for '{}'",
                fill.column
            )));
        }
        if let Some(p) = self
            .scaler
            .params()
            .iter()
            .find(|p| !p.mean.is_finite() || !p.std.is_finite() || p.std <= 0.0)
        {
            return Err(PricingError::BundleCorrupt(format!(
                "invalid scaler statistics for '{}'",
                p.column
            )));
        }

        let categorical = match self.categorical_columns {
            Some(columns) => columns,
            None => {
                warn!("Bundle has no categorical column list; using encoder columns");
                self.label_encoders.columns().map(str::to_string).collect()
            }
        };
        let schema = FeatureSchema::new(self.feature_names, categorical)?;

        for column in schema.categorical_columns() {
            if self.label_encoders.get(column).is_none() {
                return Err(PricingError::BundleCorrupt(format!(
                    "no encoder for categorical column '{}'",
                    column
                )));
            }
        }
        let stage_columns = self
            .imputer
            .fills()
            .iter()
            .map(|f| f.column.as_str())
            .chain(self.scaler.columns());
        for column in stage_columns {
            if schema.kind(column).is_none() || schema.categorical_columns().contains(column) {
                return Err(PricingError::BundleCorrupt(format!(
                    "numeric stage references non-numeric column '{}'",
                    column
                )));
            }
        }

        let derivation = self.derivation;
        if !(0.0..=1.0).contains(&derivation.city_extraction_threshold) {
            return Err(PricingError::BundleCorrupt(format!(
                "city extraction threshold {} out of range",
                derivation.city_extraction_threshold
            )));
        }

        Ok(FittedPipeline {
            deriver: FeatureDeriver::new(
                derivation.city_extraction_threshold,
                derivation.unknown_label,
            ),
            schema,
            imputer: self.imputer,
            encoder: self.label_encoders,
            scaler: self.scaler,
            fitted_at: self.fitted_at,
        })
    }
}

pub(crate) fn to_bytes(fitted: &FittedPipeline) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(&PipelineBundle::from(fitted))?)
}

pub(crate) fn from_bytes(bytes: &[u8]) -> Result<FittedPipeline> {
    let bundle: PipelineBundle = serde_json::from_slice(bytes)?;
    bundle.into_fitted()
}

pub(crate) fn save_bundle(fitted: &FittedPipeline, path: &Path, keep_backup: bool) -> Result<()> {
    let bytes = to_bytes(fitted)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(format!("creating {}", parent.display()))?;
    }

    if keep_backup && path.exists() {
        let backup = backup_path(path);
        if let Some(dir) = backup.parent() {
            fs::create_dir_all(dir).context(format!("creating {}", dir.display()))?;
        }
        fs::copy(path, &backup).context(format!("backing up to {}", backup.display()))?;
        info!("Previous bundle backed up to {}", backup.display());
    }

    let tmp = temp_path(path);
    fs::write(&tmp, &bytes).context(format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).context(format!("replacing {}", path.display()))?;

    info!(
        "Saved pipeline bundle ({} features) to {}",
        fitted.schema.len(),
        path.display()
    );
    Ok(())
}

pub(crate) fn load_bundle(path: &Path) -> Result<FittedPipeline> {
    let bytes = fs::read(path).context(format!("reading {}", path.display()))?;
    let fitted = from_bytes(&bytes).map_err(|e| e.with_context(path.display().to_string()))?;
    info!(
        "Loaded pipeline bundle ({} features) from {}",
        fitted.schema.len(),
        path.display()
    );
    Ok(fitted)
}

/// `dir/model.json` → `dir/backup/model_old.json`
pub fn backup_path(path: &Path) -> PathBuf {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string());
    let file_name = match path.extension() {
        Some(ext) => format!("{}_old.{}", stem, ext.to_string_lossy()),
        None => format!("{}_old", stem),
    };
    dir.join("backup").join(file_name)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
