//! Custom error types for the feature-encoding pipeline.
//!
//! This module provides the error hierarchy using `thiserror` for
//! consistent handling and context throughout fit, transform and persistence.
//!
//! Errors are serializable so that a serving layer can forward them to its
//! clients as `{ "code": ..., "message": ... }` objects.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the pricing pipeline.
#[derive(Error, Debug)]
pub enum PricingError {
    /// A transform was requested before the pipeline (or one of its stages)
    /// was fitted or loaded.
    #[error("{0} must be fitted before transform")]
    NotFitted(&'static str),

    /// Column was not found in the table.
    #[error("Column '{0}' not found in table")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The input table has no rows.
    #[error("Cannot fit on an empty table")]
    EmptyTable,

    /// A persisted bundle was readable but its contents are inconsistent.
    #[error("Corrupt pipeline bundle: {0}")]
    BundleCorrupt(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PricingError>,
    },
}

impl PricingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PricingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for callers that branch on error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFitted(_) => "NOT_FITTED",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::EmptyTable => "EMPTY_TABLE",
            Self::BundleCorrupt(_) => "BUNDLE_CORRUPT",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error means "fit or load first".
    pub fn is_not_fitted(&self) -> bool {
        match self {
            Self::NotFitted(_) => true,
            Self::WithContext { source, .. } => source.is_not_fitted(),
            _ => false,
        }
    }

    /// Check if this error came from reading or decoding a persisted bundle.
    pub fn is_load_failure(&self) -> bool {
        match self {
            Self::Io(_) | Self::Json(_) | Self::BundleCorrupt(_) => true,
            Self::WithContext { source, .. } => source.is_load_failure(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PricingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PricingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PricingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PricingError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PricingError::Io(e).with_context(context))
    }
}
