//! Hot-swappable shared pipeline for serving.

use super::FittedPipeline;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Shared slot holding the current [`FittedPipeline`].
///
/// Readers clone the inner `Arc` and release the lock before transforming, so
/// a swap never blocks behind an in-flight request and never exposes a
/// partially replaced bundle.
#[derive(Debug)]
pub struct PipelineHandle {
    current: RwLock<Arc<FittedPipeline>>,
}

static_assertions::assert_impl_all!(PipelineHandle: Send, Sync);

impl PipelineHandle {
    pub fn new(fitted: FittedPipeline) -> Self {
        Self {
            current: RwLock::new(Arc::new(fitted)),
        }
    }

    /// Snapshot of the pipeline in service.
    pub fn current(&self) -> Arc<FittedPipeline> {
        self.current.read().clone()
    }

    /// Replace the pipeline in service, returning the previous one.
    pub fn swap(&self, fitted: FittedPipeline) -> Arc<FittedPipeline> {
        let next = Arc::new(fitted);
        let previous = std::mem::replace(&mut *self.current.write(), next);
        info!(
            "Swapped serving pipeline ({} -> {} features)",
            previous.feature_names().len(),
            self.current.read().feature_names().len()
        );
        previous
    }
}

impl From<FittedPipeline> for PipelineHandle {
    fn from(fitted: FittedPipeline) -> Self {
        Self::new(fitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use polars::prelude::*;
    use std::thread;

    fn fit(cities: [&str; 2]) -> FittedPipeline {
        let df = df![
            "SQUARE_FT" => [800.0, 1200.0],
            "CITY_NAME" => cities,
        ]
        .unwrap();
        FittedPipeline::fit(&PipelineConfig::default(), &df).unwrap().0
    }

    #[test]
    fn test_swap_replaces_current() {
        let handle = PipelineHandle::new(fit(["Mumbai", "Delhi"]));
        let before = handle.current();

        let previous = handle.swap(fit(["Pune", "Kochi"]));
        assert!(Arc::ptr_eq(&before, &previous));
        assert_eq!(
            handle.current().known_labels("CITY_NAME"),
            Some(vec!["Kochi", "Pune"])
        );
        // old snapshot stays usable
        assert_eq!(before.known_labels("CITY_NAME"), Some(vec!["Delhi", "Mumbai"]));
    }

    #[test]
    fn test_concurrent_readers() {
        let handle = Arc::new(PipelineHandle::new(fit(["Mumbai", "Delhi"])));
        let request = df!["SQUARE_FT" => [1000.0], "CITY_NAME" => ["Chennai"]].unwrap();
        let expected = handle.current().transform(&request).unwrap();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let handle = Arc::clone(&handle);
                let request = request.clone();
                thread::spawn(move || handle.current().transform(&request).unwrap())
            })
            .collect();
        for worker in workers {
            assert!(worker.join().unwrap().equals(&expected));
        }
    }
}
