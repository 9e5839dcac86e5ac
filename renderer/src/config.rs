//! Renderer configuration.
//!
//! ```ignore
//! let config = RendererConfig::new()
//!     .with_multi_queue(true)
//!     .with_worker_threads(4)
//!     .with_staging_clear_budget(4 * 1024 * 1024);
//! ```

use crate::staging::DEFAULT_CLEAR_BUDGET;

/// Name under which the default staging data store is registered.
pub const DEFAULT_STAGING_DATA_STORE_NAME: &str = "RenderDataStoreDefaultStaging";

/// Configuration of a [`Renderer`](crate::Renderer).
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Translate node wait dependencies into cross-queue semaphores.
    pub multi_queue: bool,
    /// Record node command lists on worker threads.
    pub threaded_recording: bool,
    /// Worker threads of the node execution pool. `0` uses the available
    /// parallelism of the machine.
    pub worker_threads: usize,
    /// Lower bound of the frame rate used to clamp the frame delta.
    pub min_frame_rate: f64,
    /// Render the dev overlay graph after user graphs.
    pub dev_overlay: bool,
    /// Upper bound, in bytes, of the scratch buffer used for CPU image clears.
    pub staging_clear_budget: u64,
    /// Name of the default staging data store.
    pub staging_data_store_name: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            multi_queue: false,
            threaded_recording: true,
            worker_threads: 0,
            min_frame_rate: 15.0,
            dev_overlay: false,
            staging_clear_budget: DEFAULT_CLEAR_BUDGET,
            staging_data_store_name: DEFAULT_STAGING_DATA_STORE_NAME.to_string(),
        }
    }
}

impl RendererConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable multi-queue submission.
    pub fn with_multi_queue(mut self, multi_queue: bool) -> Self {
        self.multi_queue = multi_queue;
        self
    }

    /// Enable or disable threaded command list recording.
    pub fn with_threaded_recording(mut self, threaded: bool) -> Self {
        self.threaded_recording = threaded;
        self
    }

    /// Set the worker thread count.
    pub fn with_worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = count;
        self
    }

    /// Set the minimum frame rate.
    pub fn with_min_frame_rate(mut self, fps: f64) -> Self {
        self.min_frame_rate = fps;
        self
    }

    /// Enable or disable the dev overlay graph.
    pub fn with_dev_overlay(mut self, enabled: bool) -> Self {
        self.dev_overlay = enabled;
        self
    }

    /// Set the CPU clear scratch budget in bytes.
    pub fn with_staging_clear_budget(mut self, bytes: u64) -> Self {
        self.staging_clear_budget = bytes;
        self
    }

    /// Set the name of the default staging data store.
    pub fn with_staging_data_store_name(mut self, name: impl Into<String>) -> Self {
        self.staging_data_store_name = name.into();
        self
    }

    /// Longest frame delta, in seconds, reported to nodes.
    pub fn max_frame_delta(&self) -> f64 {
        if self.min_frame_rate > 0.0 {
            1.0 / self.min_frame_rate
        } else {
            f64::MAX
        }
    }
}
