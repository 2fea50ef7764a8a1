//! Fit-time column classification.

mod classifier;

pub use classifier::ColumnClassifier;
