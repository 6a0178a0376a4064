//! Ocean feature-extraction pipeline.
//!
//! Fans processing tasks out over (date, region, dataset) triples:
//! acquires or reuses cached raw grids, standardizes and land-masks
//! them, runs feature detection and contour extraction, and writes one
//! feature document per task. Task failures are isolated; a batch run
//! always returns a per-task report list.

pub mod acquire;
pub mod config;
pub mod orchestrator;

pub use acquire::{fetch_with_retry, Acquire, LocalDirAcquisition, RetryPolicy};
pub use config::PipelineConfig;
pub use orchestrator::{Orchestrator, ProcessingTask, TaskArtifacts, TaskReport};
