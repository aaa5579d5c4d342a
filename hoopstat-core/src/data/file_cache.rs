//! On-disk cache: one JSON document per player.
//!
//! Layout: `{cache_dir}/subject={KEY}.json` where KEY is the BLAKE3 hex of the
//! lowercased player id.
//!
//! - Atomic writes (write to a unique .tmp, rename into place)
//! - Corrupt files are quarantined (`.quarantined`) and read as a miss
//! - Expired files read as a miss and are removed by `purge_expired`

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::cache::{CacheEntry, CacheError, CacheStore};
use super::clock::{Clock, SystemClock};
use crate::domain::{RawRecord, SubjectId};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct FileCache {
    cache_dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileCache {
    /// Open (creating if needed) a cache rooted at `cache_dir`.
    pub fn open(cache_dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        Self::open_with_clock(cache_dir, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        cache_dir: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CacheError> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)
            .map_err(|e| CacheError::Unavailable(format!("create {}: {e}", cache_dir.display())))?;
        Ok(Self { cache_dir, clock })
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn entry_path(&self, subject: &SubjectId) -> PathBuf {
        self.cache_dir
            .join(format!("subject={}.json", subject.cache_key()))
    }

    fn read_entry(&self, path: &Path) -> Result<Option<CacheEntry>, CacheError> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io(format!("read {}: {e}", path.display()))),
        };

        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                let quarantine = path.with_extension("json.quarantined");
                warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                let _ = fs::rename(path, &quarantine);
                Ok(None)
            }
        }
    }

    /// Remove every expired entry file; returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = self.clock.now();
        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| CacheError::Io(format!("read dir: {e}")))?;

        let mut removed = 0;
        for entry in entries {
            let path = entry
                .map_err(|e| CacheError::Io(format!("dir entry: {e}")))?
                .path();
            let is_entry_file = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("subject=") && n.ends_with(".json"));
            if !is_entry_file {
                continue;
            }
            if let Some(cached) = self.read_entry(&path)? {
                if !cached.is_valid_at(now) {
                    fs::remove_file(&path)
                        .map_err(|e| CacheError::Io(format!("remove {}: {e}", path.display())))?;
                    removed += 1;
                }
            }
        }
        debug!(removed, "purged expired cache entries");
        Ok(removed)
    }
}

impl CacheStore for FileCache {
    fn get(&self, subject: &SubjectId) -> Result<Option<RawRecord>, CacheError> {
        let now = self.clock.now();
        Ok(self
            .read_entry(&self.entry_path(subject))?
            .filter(|e| e.is_valid_at(now))
            .map(|e| e.record))
    }

    fn put(&self, subject: &SubjectId, record: RawRecord, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry::new(record, self.clock.now(), ttl);
        let json = serde_json::to_vec_pretty(&entry)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        let path = self.entry_path(subject);
        let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_path = path.with_extension(format!("{}.{seq}.tmp", std::process::id()));

        fs::write(&tmp_path, json)
            .map_err(|e| CacheError::Io(format!("write {}: {e}", tmp_path.display())))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            CacheError::Io(format!("atomic rename failed: {e}"))
        })?;
        Ok(())
    }

    fn invalidate(&self, subject: &SubjectId) -> Result<(), CacheError> {
        match fs::remove_file(self.entry_path(subject)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(format!("invalidate: {e}"))),
        }
    }
}
