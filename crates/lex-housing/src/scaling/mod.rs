//! Numeric feature scaling.

pub mod standard;

pub use standard::{ScalerParams, StandardScaler};
