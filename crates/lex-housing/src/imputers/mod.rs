//! Missing-value imputation for numeric feature columns.

pub mod median;

pub use median::MedianImputer;
