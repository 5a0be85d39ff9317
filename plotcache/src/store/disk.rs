//! Disk-backed artifact store with bounded capacity.
//!
//! One directory holds every rendered plot, named by
//! [`SegmentKey::artifact_file_name`] so the index can be rebuilt from a
//! plain directory scan on startup. Writes are atomic (temp file + rename);
//! concurrent readers never observe a partially written artifact.
//!
//! The index is a single mutex over entry metadata and the byte total.
//! Eviction decisions and index mutation happen inside that lock, which
//! makes eviction passes mutually exclusive by construction; file unlinks
//! happen after the victim has already left the index. The lock is never
//! held across an await point.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::key::{parse_artifact_file_name, SegmentKey};

use super::entry::{ArtifactStatus, CacheEntry, StoreError};
use super::stats::{StoreStats, StoreStatsSnapshot};

/// Files and bytes released by an eviction, sweep, or invalidation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reclaimed {
    pub files: u64,
    pub bytes: u64,
}

/// Entry counts and byte usage for status reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreSnapshot {
    pub entries: usize,
    pub ready: usize,
    pub pending: usize,
    pub failed: usize,
    pub size_bytes: u64,
    pub capacity_bytes: u64,
}

#[derive(Default)]
struct StoreIndex {
    entries: HashMap<SegmentKey, CacheEntry>,
    /// Sum of `size_bytes` over all entries. Pending and Failed entries
    /// contribute zero.
    total_bytes: u64,
}

impl StoreIndex {
    fn remove(&mut self, key: &SegmentKey) -> Option<CacheEntry> {
        let removed = self.entries.remove(key);
        if let Some(e) = &removed {
            self.total_bytes -= e.size_bytes;
        }
        removed
    }
}

/// Content-addressed on-disk storage for rendered plot artifacts.
pub struct ArtifactStore {
    root: PathBuf,
    index: Mutex<StoreIndex>,
    capacity_bytes: AtomicU64,
    /// Age bound for the periodic sweep, in seconds. Zero disables it.
    max_age_secs: AtomicU64,
    stats: StoreStats,
}

impl ArtifactStore {
    /// Open a store rooted at `root`, rebuilding the index from the files
    /// already present. Leftover temp files from an interrupted write are
    /// removed; foreign files are skipped.
    pub fn open(root: impl Into<PathBuf>, capacity_bytes: u64) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StoreError::Directory {
            path: root.clone(),
            source,
        })?;

        let mut index = StoreIndex::default();
        let mut skipped = 0usize;

        let dir = std::fs::read_dir(&root).map_err(|source| StoreError::Directory {
            path: root.clone(),
            source,
        })?;
        for dir_entry in dir.flatten() {
            let path = dir_entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(".tmp") {
                let _ = std::fs::remove_file(&path);
                continue;
            }
            let Some(key) = parse_artifact_file_name(name) else {
                skipped += 1;
                continue;
            };
            let Ok(meta) = dir_entry.metadata() else {
                skipped += 1;
                continue;
            };
            let created_at = meta.modified().unwrap_or_else(|_| SystemTime::now());
            let size_bytes = meta.len();
            index.total_bytes += size_bytes;
            index.entries.insert(
                key,
                CacheEntry {
                    key,
                    artifact_path: path,
                    created_at,
                    render_duration: None,
                    size_bytes,
                    status: ArtifactStatus::Ready,
                },
            );
        }

        info!(
            root = %root.display(),
            entries = index.entries.len(),
            bytes = index.total_bytes,
            skipped,
            "artifact store opened"
        );

        Ok(Self {
            root,
            index: Mutex::new(index),
            capacity_bytes: AtomicU64::new(capacity_bytes),
            max_age_secs: AtomicU64::new(0),
            stats: StoreStats::new(),
        })
    }

    /// Directory this store writes into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path an artifact for `key` is (or would be) stored at.
    pub fn artifact_path_for(&self, key: &SegmentKey) -> PathBuf {
        self.root.join(key.artifact_file_name())
    }

    /// Update the capacity bound. Takes effect on the next put or explicit
    /// eviction pass.
    pub fn set_capacity(&self, bytes: u64) {
        self.capacity_bytes.store(bytes, Ordering::Relaxed);
    }

    /// Update the age bound for [`Self::sweep_expired`]. `None` disables it.
    pub fn set_max_age(&self, age: Option<Duration>) {
        self.max_age_secs
            .store(age.map_or(0, |a| a.as_secs().max(1)), Ordering::Relaxed);
    }

    pub fn capacity(&self) -> u64 {
        self.capacity_bytes.load(Ordering::Relaxed)
    }

    /// Metadata lookup without touching the filesystem or the hit counters.
    pub fn get(&self, key: &SegmentKey) -> Option<CacheEntry> {
        self.index.lock().entries.get(key).cloned()
    }

    /// Cheap status probe used by the scheduler's deduplication pass.
    pub fn status_of(&self, key: &SegmentKey) -> Option<ArtifactStatus> {
        self.index.lock().entries.get(key).map(|e| e.status)
    }

    /// Read the artifact bytes for a Ready entry.
    ///
    /// Anything that prevents serving (no entry, Pending, Failed, or a file
    /// that has vanished or become unreadable) is reported as a miss so the
    /// caller regenerates instead of failing. An unreadable entry is dropped
    /// from the index.
    pub async fn read(&self, key: &SegmentKey) -> Option<Bytes> {
        let path = {
            let index = self.index.lock();
            index
                .entries
                .get(key)
                .filter(|e| e.is_ready())
                .map(|e| e.artifact_path.clone())
        };
        let Some(path) = path else {
            self.stats.record_miss();
            return None;
        };

        match tokio::fs::read(&path).await {
            Ok(data) => {
                self.stats.record_hit();
                Some(Bytes::from(data))
            }
            Err(e) => {
                warn!(key = %key, path = %path.display(), error = %e, "ready artifact unreadable, dropping entry");
                self.index.lock().remove(key);
                self.stats.record_miss();
                self.stats.record_failure();
                None
            }
        }
    }

    /// Record that a render job for `key` has started.
    pub fn mark_pending(&self, key: &SegmentKey) {
        let entry = CacheEntry {
            key: *key,
            artifact_path: self.artifact_path_for(key),
            created_at: SystemTime::now(),
            render_duration: None,
            size_bytes: 0,
            status: ArtifactStatus::Pending,
        };
        let mut index = self.index.lock();
        if let Some(old) = index.entries.insert(*key, entry) {
            index.total_bytes -= old.size_bytes;
        }
    }

    /// Record that the render or write for `key` failed. The entry is kept
    /// as Failed so readers see a miss and a later request can retry.
    pub fn mark_failed(&self, key: &SegmentKey) {
        let entry = CacheEntry {
            key: *key,
            artifact_path: self.artifact_path_for(key),
            created_at: SystemTime::now(),
            render_duration: None,
            size_bytes: 0,
            status: ArtifactStatus::Failed,
        };
        let mut index = self.index.lock();
        if let Some(old) = index.entries.insert(*key, entry) {
            index.total_bytes -= old.size_bytes;
        }
        drop(index);
        self.stats.record_failure();
    }

    /// Write an artifact atomically and record its entry as Ready, then run
    /// the capacity eviction check.
    ///
    /// The write goes to `<name>.tmp` first and is renamed into place, so a
    /// concurrent reader sees either the previous artifact or the complete
    /// new one, never a torn file.
    pub async fn put(
        &self,
        key: &SegmentKey,
        bytes: Bytes,
        render_duration: Duration,
    ) -> Result<CacheEntry, StoreError> {
        let path = self.artifact_path_for(key);
        let temp_path = path.with_extension("tmp");

        if let Err(source) = tokio::fs::write(&temp_path, &bytes).await {
            self.mark_failed(key);
            return Err(StoreError::Write {
                path: temp_path,
                source,
            });
        }
        if let Err(source) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            self.mark_failed(key);
            return Err(StoreError::Write { path, source });
        }

        let size_bytes = bytes.len() as u64;
        let entry = CacheEntry {
            key: *key,
            artifact_path: path,
            created_at: SystemTime::now(),
            render_duration: Some(render_duration),
            size_bytes,
            status: ArtifactStatus::Ready,
        };

        let victims = {
            let mut index = self.index.lock();
            if let Some(old) = index.entries.insert(*key, entry.clone()) {
                index.total_bytes -= old.size_bytes;
            }
            index.total_bytes += size_bytes;
            self.collect_eviction_victims(&mut index)
        };
        self.stats.record_write(size_bytes);
        debug!(
            key = %key,
            bytes = size_bytes,
            duration_ms = render_duration.as_millis() as u64,
            "artifact stored"
        );
        self.unlink_victims(victims, false).await;

        Ok(entry)
    }

    /// Remove one entry and its artifact. Idempotent: absent keys are a
    /// no-op returning false.
    pub async fn invalidate(&self, key: &SegmentKey) -> bool {
        let existed = self.index.lock().remove(key).is_some();
        let _ = tokio::fs::remove_file(self.artifact_path_for(key)).await;
        if existed {
            debug!(key = %key, "entry invalidated");
        }
        existed
    }

    /// Remove every entry, or every entry for one source.
    pub async fn invalidate_all(&self, source_id: Option<u32>) -> Reclaimed {
        let victims: Vec<CacheEntry> = {
            let mut index = self.index.lock();
            let keys: Vec<SegmentKey> = index
                .entries
                .keys()
                .filter(|k| source_id.is_none_or(|s| k.source_id == s))
                .copied()
                .collect();
            keys.iter().filter_map(|k| index.remove(k)).collect()
        };

        let mut reclaimed = Reclaimed::default();
        for victim in victims {
            reclaimed.files += 1;
            reclaimed.bytes += victim.size_bytes;
            let _ = tokio::fs::remove_file(&victim.artifact_path).await;
        }
        info!(
            source_id = ?source_id,
            files = reclaimed.files,
            bytes = reclaimed.bytes,
            "entries invalidated"
        );
        reclaimed
    }

    /// Evict oldest-first until total bytes fit the capacity bound or a
    /// single Ready entry remains.
    pub async fn evict_if_over_capacity(&self) -> Reclaimed {
        let victims = {
            let mut index = self.index.lock();
            self.collect_eviction_victims(&mut index)
        };
        self.unlink_victims(victims, false).await
    }

    /// Remove Ready entries older than the configured age bound. A zero /
    /// unset bound disables the sweep.
    pub async fn sweep_expired(&self) -> Reclaimed {
        let max_age_secs = self.max_age_secs.load(Ordering::Relaxed);
        if max_age_secs == 0 {
            return Reclaimed::default();
        }
        let cutoff = SystemTime::now() - Duration::from_secs(max_age_secs);

        let victims: Vec<CacheEntry> = {
            let mut index = self.index.lock();
            let expired: Vec<SegmentKey> = index
                .entries
                .values()
                .filter(|e| e.is_ready() && e.created_at < cutoff)
                .map(|e| e.key)
                .collect();
            expired.iter().filter_map(|k| index.remove(k)).collect()
        };
        self.unlink_victims(victims, true).await
    }

    /// Entry counts and usage for status reporting.
    pub fn snapshot(&self) -> StoreSnapshot {
        let index = self.index.lock();
        let mut snap = StoreSnapshot {
            entries: index.entries.len(),
            size_bytes: index.total_bytes,
            capacity_bytes: self.capacity(),
            ..StoreSnapshot::default()
        };
        for entry in index.entries.values() {
            match entry.status {
                ArtifactStatus::Ready => snap.ready += 1,
                ArtifactStatus::Pending => snap.pending += 1,
                ArtifactStatus::Failed => snap.failed += 1,
            }
        }
        snap
    }

    pub fn stats(&self) -> StoreStatsSnapshot {
        self.stats.snapshot()
    }

    /// Pick eviction victims under the index lock: Ready entries oldest by
    /// `created_at` first, stopping once under capacity or when only one
    /// Ready entry would remain (the sole survivor is never evicted, even
    /// if it alone exceeds the bound).
    fn collect_eviction_victims(&self, index: &mut StoreIndex) -> Vec<CacheEntry> {
        let capacity = self.capacity();
        if index.total_bytes <= capacity {
            return Vec::new();
        }

        let mut ready: Vec<(SystemTime, SegmentKey)> = index
            .entries
            .values()
            .filter(|e| e.is_ready())
            .map(|e| (e.created_at, e.key))
            .collect();
        ready.sort_by_key(|(created_at, key)| (*created_at, key.segment_index));

        let mut victims = Vec::new();
        let mut remaining = ready.len();
        for (_, key) in ready {
            if index.total_bytes <= capacity || remaining <= 1 {
                break;
            }
            if let Some(entry) = index.remove(&key) {
                victims.push(entry);
                remaining -= 1;
            }
        }
        victims
    }

    /// Unlink victim files after they have left the index, best-effort.
    async fn unlink_victims(&self, victims: Vec<CacheEntry>, expired: bool) -> Reclaimed {
        let mut reclaimed = Reclaimed::default();
        for victim in victims {
            reclaimed.files += 1;
            reclaimed.bytes += victim.size_bytes;
            if let Err(e) = tokio::fs::remove_file(&victim.artifact_path).await {
                warn!(path = %victim.artifact_path.display(), error = %e, "failed to unlink evicted artifact");
            }
        }
        if reclaimed.files > 0 {
            if expired {
                self.stats.record_expired(reclaimed.files);
                debug!(files = reclaimed.files, bytes = reclaimed.bytes, "expired artifacts swept");
            } else {
                self.stats.record_evictions(reclaimed.files, reclaimed.bytes);
                debug!(files = reclaimed.files, bytes = reclaimed.bytes, "artifacts evicted");
            }
        }
        reclaimed
    }
}
