//! On-disk persistence for the processing pipeline.
//!
//! [`GridStore`] keeps raw acquisitions and processed feature documents
//! under deterministic per-(dataset, region, date) filenames with
//! age-based validity, so concurrent tasks never contend on the same
//! file under correct key derivation. [`CleanupSweeper`] maintains a
//! rolling retention window over those directories.

pub mod cache;
pub mod cleanup;

pub use cache::{CacheStats, GridStore};
pub use cleanup::CleanupSweeper;
