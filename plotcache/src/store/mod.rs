//! Disk-backed artifact store for rendered segment plots.
//!
//! Provides atomic artifact persistence, an in-memory index rebuilt by
//! scanning the store directory on open, capacity-driven eviction, age
//! expiry, and statistics tracking.

mod disk;
mod entry;
mod stats;

pub use disk::{ArtifactStore, Reclaimed, StoreSnapshot};
pub use entry::{ArtifactStatus, CacheEntry, StoreError};
pub use stats::{StoreStats, StoreStatsSnapshot};

use std::io;
use std::path::Path;

use crate::key::parse_artifact_file_name;

/// Outcome of clearing a store directory offline.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearResult {
    /// Number of files deleted.
    pub files_deleted: u64,
    /// Total bytes freed.
    pub bytes_freed: u64,
}

/// Delete plot artifacts in a store directory without opening a store.
///
/// Used by the CLI to clear the cache while no manager is running. With a
/// `source_id` only that source's artifacts go; otherwise everything does,
/// including leftover `.tmp` files from an interrupted write. Anything not
/// recognised as a plot artifact is left untouched, and a missing
/// directory counts as already clear.
pub fn clear_store_dir(dir: &Path, source_id: Option<u32>) -> io::Result<ClearResult> {
    let mut result = ClearResult::default();
    if !dir.is_dir() {
        return Ok(result);
    }

    for dirent in std::fs::read_dir(dir)? {
        let dirent = dirent?;
        let path = dirent.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let doomed = match parse_artifact_file_name(name) {
            Some(key) => source_id.is_none_or(|s| key.source_id == s),
            None => source_id.is_none() && name.ends_with(".tmp"),
        };
        if !doomed {
            continue;
        }

        let size = dirent.metadata().map(|m| m.len()).unwrap_or(0);
        std::fs::remove_file(&path)?;
        result.files_deleted += 1;
        result.bytes_freed += size;
    }

    Ok(result)
}

/// Count plot artifacts and their total size in a store directory.
///
/// Returns `(files, bytes)`. Like [`clear_store_dir`] this is an offline
/// helper for the CLI; a missing directory reports as empty.
pub fn store_dir_stats(dir: &Path) -> io::Result<(u64, u64)> {
    let mut files = 0u64;
    let mut bytes = 0u64;
    if !dir.is_dir() {
        return Ok((files, bytes));
    }

    for dirent in std::fs::read_dir(dir)? {
        let dirent = dirent?;
        let path = dirent.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if parse_artifact_file_name(name).is_none() {
            continue;
        }

        files += 1;
        bytes += dirent.metadata().map(|m| m.len()).unwrap_or(0);
    }

    Ok((files, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::SegmentKey;
    use tempfile::TempDir;

    fn write_artifact(dir: &Path, key: &SegmentKey, len: usize) {
        std::fs::write(dir.join(key.artifact_file_name()), vec![0u8; len]).unwrap();
    }

    #[test]
    fn test_store_dir_stats_counts_only_artifacts() {
        let tmp = TempDir::new().unwrap();
        let key_a = SegmentKey::new(1, 8192, 0, 0);
        let key_b = SegmentKey::new(1, 8192, 1, 0);
        write_artifact(tmp.path(), &key_a, 100);
        write_artifact(tmp.path(), &key_b, 250);
        std::fs::write(tmp.path().join("notes.txt"), b"unrelated").unwrap();

        let (files, bytes) = store_dir_stats(tmp.path()).unwrap();
        assert_eq!(files, 2);
        assert_eq!(bytes, 350);
    }

    #[test]
    fn test_clear_store_dir_removes_artifacts_and_tmp_only() {
        let tmp = TempDir::new().unwrap();
        let key = SegmentKey::new(2, 65536, 3, 1200);
        write_artifact(tmp.path(), &key, 64);
        std::fs::write(tmp.path().join("partial.tmp"), b"half-written").unwrap();
        std::fs::write(tmp.path().join("keep.me"), b"config").unwrap();

        let result = clear_store_dir(tmp.path(), None).unwrap();
        assert_eq!(result.files_deleted, 2);
        assert!(result.bytes_freed >= 64);
        assert!(tmp.path().join("keep.me").exists());
        assert!(!tmp.path().join(key.artifact_file_name()).exists());
    }

    #[test]
    fn test_clear_store_dir_filters_by_source() {
        let tmp = TempDir::new().unwrap();
        let doomed = SegmentKey::new(7, 8192, 0, 0);
        let survivor = SegmentKey::new(8, 8192, 0, 0);
        write_artifact(tmp.path(), &doomed, 40);
        write_artifact(tmp.path(), &survivor, 40);
        std::fs::write(tmp.path().join("partial.tmp"), b"half-written").unwrap();

        let result = clear_store_dir(tmp.path(), Some(7)).unwrap();
        assert_eq!(result.files_deleted, 1);
        assert!(!tmp.path().join(doomed.artifact_file_name()).exists());
        assert!(tmp.path().join(survivor.artifact_file_name()).exists());
        // Orphaned temp files only go with a full clear.
        assert!(tmp.path().join("partial.tmp").exists());
    }

    #[test]
    fn test_missing_directory_reports_empty() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("never-created");

        assert_eq!(store_dir_stats(&gone).unwrap(), (0, 0));
        let cleared = clear_store_dir(&gone, None).unwrap();
        assert_eq!(cleared.files_deleted, 0);
    }
}
