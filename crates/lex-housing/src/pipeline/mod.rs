//! Fit/transform orchestration, persistence and the serving handle.

mod fitted;
mod handle;
pub mod persistence;

pub use fitted::{FeaturePipeline, FittedPipeline};
pub use handle::PipelineHandle;
pub use persistence::{BUNDLE_FORMAT_VERSION, backup_path};
