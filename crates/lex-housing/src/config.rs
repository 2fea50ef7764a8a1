//! Configuration types for the feature-encoding pipeline.
//!
//! This module provides configuration options using the builder pattern.
//! Every value here only influences how a pipeline is *fitted*; once fitted,
//! the values that matter for transforms are copied into the bundle so that a
//! loaded pipeline never depends on the caller's current configuration.

use serde::{Deserialize, Serialize};

/// Default size of the code range reserved for labels unseen during fit.
pub const DEFAULT_UNSEEN_CODE_SPACE: u64 = 1 << 24;

/// Largest accepted unseen-code range. Codes are emitted as `f64`, and
/// `K + 2^32` stays far inside the exactly-representable integer range.
pub const MAX_UNSEEN_CODE_SPACE: u64 = 1 << 32;

/// Configuration for the feature pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lex_housing::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .city_extraction_threshold(0.9)
///     .unseen_code_space(1 << 20)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Fraction of rows (0.0 - 1.0) whose `CITY_NAME` must be "Unknown" or
    /// empty before the city is re-derived from `ADDRESS`.
    /// Default: 0.8 (80%)
    pub city_extraction_threshold: f64,

    /// Number of distinct codes reserved above the known labels of each
    /// categorical column for values never seen during fit.
    /// Default: 2^24
    pub unseen_code_space: u64,

    /// Label substituted for missing categorical values.
    /// Default: "Unknown"
    pub unknown_label: String,

    /// Whether saving over an existing bundle first copies it to
    /// `backup/<stem>_old.json` next to the bundle.
    /// Default: true
    pub keep_backup: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            city_extraction_threshold: 0.8,
            unseen_code_space: DEFAULT_UNSEEN_CODE_SPACE,
            unknown_label: "Unknown".to_string(),
            keep_backup: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(0.0..=1.0).contains(&self.city_extraction_threshold) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "city_extraction_threshold".to_string(),
                value: self.city_extraction_threshold,
            });
        }

        if self.unseen_code_space == 0 || self.unseen_code_space > MAX_UNSEEN_CODE_SPACE {
            return Err(ConfigValidationError::InvalidCodeSpace(
                self.unseen_code_space,
            ));
        }

        if self.unknown_label.trim().is_empty() {
            return Err(ConfigValidationError::EmptyUnknownLabel);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid unseen code space: {0} (must be between 1 and 2^32)")]
    InvalidCodeSpace(u64),

    #[error("Unknown label must not be empty")]
    EmptyUnknownLabel,
}

impl From<ConfigValidationError> for crate::error::PricingError {
    fn from(err: ConfigValidationError) -> Self {
        crate::error::PricingError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    city_extraction_threshold: Option<f64>,
    unseen_code_space: Option<u64>,
    unknown_label: Option<String>,
    keep_backup: Option<bool>,
}

impl PipelineConfigBuilder {
    /// Set the share of unknown cities that triggers address-based extraction.
    ///
    /// # Arguments
    /// * `threshold` - Value between 0.0 and 1.0 (e.g., 0.8 = 80%)
    pub fn city_extraction_threshold(mut self, threshold: f64) -> Self {
        self.city_extraction_threshold = Some(threshold);
        self
    }

    /// Set the size of the code range reserved for unseen labels.
    pub fn unseen_code_space(mut self, space: u64) -> Self {
        self.unseen_code_space = Some(space);
        self
    }

    /// Set the label used for missing categorical values.
    pub fn unknown_label(mut self, label: impl Into<String>) -> Self {
        self.unknown_label = Some(label.into());
        self
    }

    /// Enable or disable the backup copy written before a bundle is replaced.
    pub fn keep_backup(mut self, keep: bool) -> Self {
        self.keep_backup = Some(keep);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let config = PipelineConfig {
            city_extraction_threshold: self.city_extraction_threshold.unwrap_or(0.8),
            unseen_code_space: self.unseen_code_space.unwrap_or(DEFAULT_UNSEEN_CODE_SPACE),
            unknown_label: self.unknown_label.unwrap_or_else(|| "Unknown".to_string()),
            keep_backup: self.keep_backup.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}
