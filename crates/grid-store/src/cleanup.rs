//! Retention sweep over cache and output directories.

use std::path::Path;
use std::time::{Duration, SystemTime};

use ocean_common::OceanResult;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Deletes files older than a retention window, keeping a rolling
/// window of recent data on disk.
pub struct CleanupSweeper {
    retention: Duration,
}

impl CleanupSweeper {
    pub fn new(retention: Duration) -> Self {
        Self { retention }
    }

    /// The operational default: keep 5 days of data.
    pub fn with_default_retention() -> Self {
        Self::new(Duration::from_secs(5 * 24 * 3600))
    }

    /// Remove stale files under each directory, returning the number
    /// deleted. Per-file failures are logged and skipped; a sweep
    /// never aborts half way because one unlink failed.
    pub fn sweep(&self, dirs: &[&Path]) -> OceanResult<usize> {
        let cutoff = SystemTime::now() - self.retention;
        let mut removed = 0usize;

        for dir in dirs {
            if !dir.exists() {
                continue;
            }
            for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let modified = match entry.metadata().map(|m| m.modified()) {
                    Ok(Ok(t)) => t,
                    Ok(Err(e)) => {
                        warn!(path = %entry.path().display(), error = %e, "Skipping unreadable file");
                        continue;
                    }
                    Err(e) => {
                        warn!(path = %entry.path().display(), error = %e, "Skipping unreadable file");
                        continue;
                    }
                };
                if modified >= cutoff {
                    continue;
                }
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => {
                        debug!(path = %entry.path().display(), "Removed stale file");
                        removed += 1;
                    }
                    Err(e) => {
                        warn!(path = %entry.path().display(), error = %e, "Failed to remove stale file");
                    }
                }
            }
        }

        info!(removed, retention_days = self.retention.as_secs() / 86_400, "Cleanup sweep complete");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sweep_removes_everything_with_zero_retention() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("old.json"), b"{}").unwrap();
        let nested = dir.path().join("sub");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("older.json"), b"{}").unwrap();

        let sweeper = CleanupSweeper::new(Duration::ZERO);
        let removed = sweeper.sweep(&[dir.path()]).unwrap();
        assert_eq!(removed, 2);
        assert!(!dir.path().join("old.json").exists());
    }

    #[test]
    fn test_sweep_keeps_fresh_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fresh.json"), b"{}").unwrap();

        let sweeper = CleanupSweeper::with_default_retention();
        let removed = sweeper.sweep(&[dir.path()]).unwrap();
        assert_eq!(removed, 0);
        assert!(dir.path().join("fresh.json").exists());
    }

    #[test]
    fn test_missing_directory_is_not_an_error() {
        let sweeper = CleanupSweeper::with_default_retention();
        let removed = sweeper.sweep(&[Path::new("/nonexistent/cache/dir")]).unwrap();
        assert_eq!(removed, 0);
    }
}
