//! Categorical encoding.
//!
//! Each categorical column gets a [`LabelEncoder`]: the labels seen during fit
//! are numbered `0..K-1` in sorted order, and any other label is hashed into a
//! reserved range starting at `K`. [`CategoricalEncoder`] holds one encoder per
//! column and applies them to a table.

pub mod label;

pub use label::{CategoricalEncoder, LabelEncoder};
