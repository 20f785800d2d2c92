//! Observer trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via
//! [`crate::config::BoardConfigBuilder::observer`] to follow a refresh as it
//! moves through fetch, extract, transform, and render.
//!
//! # Example
//!
//! ```rust
//! use guildboard::{BoardConfig, PipelineObserver, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RetryCounter {
//!     retries: AtomicUsize,
//! }
//!
//! impl PipelineObserver for RetryCounter {
//!     fn on_fetch_retry(&self, attempt: u32, max_attempts: u32, reason: &str) {
//!         self.retries.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("attempt {attempt}/{max_attempts} failed: {reason}");
//!     }
//! }
//!
//! let config = BoardConfig::builder()
//!     .observer(Arc::new(RetryCounter { retries: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ArtifactOutput;
use std::fmt;
use std::sync::Arc;

/// One step of a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Extract,
    Transform,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Render => "render",
        };
        f.write_str(name)
    }
}

/// Called by the pipeline as a refresh progresses.
///
/// Implementations must be `Send + Sync`; every method has a no-op default so
/// callers override only what they care about.
pub trait PipelineObserver: Send + Sync {
    /// A cached artifact was served; nothing else will run.
    fn on_cache_hit(&self, age: &str) {
        let _ = age;
    }

    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// A fetch attempt failed. Called for the final attempt too.
    fn on_fetch_retry(&self, attempt: u32, max_attempts: u32, reason: &str) {
        let _ = (attempt, max_attempts, reason);
    }

    fn on_artifact_ready(&self, output: &ArtifactOutput) {
        let _ = output;
    }
}

/// Default observer that ignores every event.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::BoardConfig`].
pub type SharedObserver = Arc<dyn PipelineObserver>;
