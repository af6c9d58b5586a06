//! File-backed cache store
//!
//! Persists JSON entries under an XDG-compliant cache directory
//! (`~/.cache/magicmirror/` on Linux), one subdirectory per namespace and one
//! file per entry generation. A generation is named from the derived key plus
//! its creation timestamp, so multiple generations of the same key can coexist
//! transiently; writing a fresh generation prunes the older ones.
//!
//! Reads are fail-open: a missing, expired, unreadable, or corrupt entry is a
//! cache miss, never an error. A stale or broken cache must not stop the
//! caller from fetching live data.

use chrono::{DateTime, NaiveDateTime, Utc};
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::key::CacheKey;

/// Timestamp format embedded in generation filenames (fixed width, sortable).
const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Length of a formatted stamp: `YYYYmmdd-HHMMSS`.
const STAMP_LEN: usize = 15;

/// Errors that can occur when writing to the store.
///
/// Read-side problems never surface as errors; they fold into a miss.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("cache I/O failed: {0}")]
    Io(#[from] io::Error),

    /// Payload could not be serialized to JSON
    #[error("cache serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// On-disk envelope for one cache entry generation.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// When the entry was written
    created_at: DateTime<Utc>,
    /// The cached payload
    payload: T,
}

/// Manages the cache directory tree.
///
/// Cheap to clone; every client holds its own copy. The directory is shared
/// read/write across all processes using the same cache root, with no
/// ownership exclusivity and no locking.
#[derive(Debug, Clone)]
pub struct FileCache {
    /// Root directory under which namespaces live
    root: PathBuf,
}

impl FileCache {
    /// Creates a `FileCache` rooted at the XDG cache directory.
    ///
    /// Returns `None` when no home directory can be resolved (e.g. some CI
    /// environments); callers then run uncached.
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "magicmirror")?;
        Some(Self {
            root: project_dirs.cache_dir().to_path_buf(),
        })
    }

    /// Creates a `FileCache` rooted at an explicit directory.
    ///
    /// Used by tests and by the `--cache-dir` CLI override.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    /// Returns the cache root directory.
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    fn entry_path(&self, namespace: &str, key: &CacheKey, created_at: DateTime<Utc>) -> PathBuf {
        let stamp = created_at.format(STAMP_FORMAT);
        self.namespace_dir(namespace)
            .join(format!("{}-{}.json", key.as_str(), stamp))
    }

    /// Looks up the entry for `key` within `namespace`.
    ///
    /// Picks the newest generation of the key and returns its payload iff the
    /// entry is younger than `ttl`. Every anomaly (absent entry, expired
    /// entry, unreadable file, corrupt JSON) is a miss (`None`). Expired
    /// entries are left on disk; removal is deferred to the next `put`.
    pub fn get<T: DeserializeOwned>(
        &self,
        namespace: &str,
        key: &CacheKey,
        ttl: Duration,
    ) -> Option<T> {
        let newest = self.generations(namespace, key).into_iter().max()?;
        let content = fs::read_to_string(&newest).ok()?;
        let entry: CacheEntry<T> = serde_json::from_str(&content).ok()?;

        let age = Utc::now().signed_duration_since(entry.created_at);
        let window = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        if age > window {
            return None;
        }
        Some(entry.payload)
    }

    /// Persists `payload` as a fresh generation of `key` within `namespace`.
    ///
    /// Creates the namespace directory on first use. After a successful
    /// write, prunes all other generations of the same key; prune failures
    /// are logged and swallowed, since the fresh entry is already in place.
    pub fn put<T: Serialize>(
        &self,
        namespace: &str,
        key: &CacheKey,
        payload: &T,
    ) -> Result<PathBuf, StoreError> {
        self.put_at(namespace, key, payload, Utc::now())
    }

    /// `put` with an explicit creation time. Split out so tests can plant
    /// entries in the past without sleeping through a ttl.
    fn put_at<T: Serialize>(
        &self,
        namespace: &str,
        key: &CacheKey,
        payload: &T,
        created_at: DateTime<Utc>,
    ) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(self.namespace_dir(namespace))?;

        let entry = CacheEntry {
            created_at,
            payload,
        };
        let json = serde_json::to_string_pretty(&entry)?;
        let path = self.entry_path(namespace, key, created_at);
        fs::write(&path, json)?;

        for stale in self.generations(namespace, key) {
            if stale == path {
                continue;
            }
            if let Err(e) = fs::remove_file(&stale) {
                log::warn!("failed to prune stale cache entry {}: {e}", stale.display());
            }
        }

        Ok(path)
    }

    /// Lists every generation file for `key` in `namespace`.
    fn generations(&self, namespace: &str, key: &CacheKey) -> Vec<PathBuf> {
        let prefix = format!("{}-", key.as_str());
        let dir = match fs::read_dir(self.namespace_dir(namespace)) {
            Ok(dir) => dir,
            Err(_) => return Vec::new(),
        };
        dir.flatten()
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .map(|n| n.starts_with(&prefix) && n.ends_with(".json"))
                    .unwrap_or(false)
            })
            .map(|e| e.path())
            .collect()
    }

    /// Removes every generation in `namespace` older than `older_than`,
    /// regardless of key. Returns the number of files removed.
    ///
    /// This is an opt-in maintenance pass; nothing calls it automatically.
    /// Generations whose filename stamp cannot be parsed are left alone.
    pub fn sweep(&self, namespace: &str, older_than: Duration) -> io::Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::MAX);
        let dir = match fs::read_dir(self.namespace_dir(namespace)) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for entry in dir.flatten() {
            let name = entry.file_name();
            let Some(stamp) = name.to_str().and_then(stamp_from_filename) else {
                continue;
            };
            if stamp < cutoff {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Removes the entire cache root. Missing root is not an error.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.root) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Extracts the creation timestamp from a generation filename
/// (`<key>-<YYYYmmdd-HHMMSS>.json`).
fn stamp_from_filename(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(".json")?;
    if stem.len() < STAMP_LEN + 1 {
        return None;
    }
    // Byte-indexed slice; a foreign filename may put a multi-byte character
    // across the boundary, which is a parse failure, not a panic.
    let stamp = stem.get(stem.len() - STAMP_LEN..)?;
    let naive = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;
    Some(naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Arrivals {
        stop: String,
        minutes: Vec<u32>,
    }

    const TTL: Duration = Duration::from_secs(30);

    fn create_test_cache() -> (FileCache, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = FileCache::with_root(temp_dir.path().to_path_buf());
        (cache, temp_dir)
    }

    fn sample() -> Arrivals {
        Arrivals {
            stop: "490008660N".into(),
            minutes: vec![2, 7, 13],
        }
    }

    #[test]
    fn test_get_misses_on_absent_entry() {
        let (cache, _temp_dir) = create_test_cache();
        let k = key::derive("tfl.arrivals", &("490008660N",)).unwrap();

        let result: Option<Arrivals> = cache.get("tfl.arrivals", &k, TTL);

        assert!(result.is_none());
    }

    #[test]
    fn test_put_then_get_round_trips_payload() {
        let (cache, _temp_dir) = create_test_cache();
        let k = key::derive("tfl.arrivals", &("490008660N",)).unwrap();
        let data = sample();

        cache.put("tfl.arrivals", &k, &data).expect("put should succeed");
        let result: Arrivals = cache.get("tfl.arrivals", &k, TTL).expect("should hit");

        assert_eq!(result, data);
    }

    #[test]
    fn test_put_creates_namespace_directory_and_envelope() {
        let (cache, temp_dir) = create_test_cache();
        let k = key::derive("weather.forecast", &("SW1A 1AA",)).unwrap();

        let path = cache.put("weather.forecast", &k, &sample()).unwrap();

        assert!(path.starts_with(temp_dir.path().join("weather.forecast")));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"created_at\""));
        assert!(content.contains("\"payload\""));
        assert!(content.contains("490008660N"));
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_stays_on_disk() {
        let (cache, _temp_dir) = create_test_cache();
        let k = key::derive("tfl.arrivals", &("490008660N",)).unwrap();
        let written = cache
            .put_at("tfl.arrivals", &k, &sample(), Utc::now() - chrono::Duration::seconds(60))
            .unwrap();

        let result: Option<Arrivals> = cache.get("tfl.arrivals", &k, TTL);

        assert!(result.is_none(), "Entry older than ttl must miss");
        assert!(written.exists(), "Reads never delete; cleanup waits for the next put");
    }

    #[test]
    fn test_put_prunes_older_generations_of_same_key() {
        let (cache, _temp_dir) = create_test_cache();
        let k = key::derive("tfl.arrivals", &("490008660N",)).unwrap();
        let old = cache
            .put_at("tfl.arrivals", &k, &sample(), Utc::now() - chrono::Duration::seconds(60))
            .unwrap();

        let fresh = cache.put("tfl.arrivals", &k, &sample()).unwrap();

        assert!(!old.exists(), "Older generation should be pruned after a fresh write");
        assert!(fresh.exists());
        assert_eq!(cache.generations("tfl.arrivals", &k).len(), 1);
    }

    #[test]
    fn test_put_leaves_other_keys_alone() {
        let (cache, _temp_dir) = create_test_cache();
        let ka = key::derive("tfl.arrivals", &("A",)).unwrap();
        let kb = key::derive("tfl.arrivals", &("B",)).unwrap();
        let b_path = cache
            .put_at("tfl.arrivals", &kb, &sample(), Utc::now() - chrono::Duration::seconds(60))
            .unwrap();

        cache.put("tfl.arrivals", &ka, &sample()).unwrap();

        assert!(b_path.exists(), "Cleanup is per-key, not per-namespace");
    }

    #[test]
    fn test_newest_generation_wins_when_several_coexist() {
        let (cache, _temp_dir) = create_test_cache();
        let k = key::derive("tfl.arrivals", &("490008660N",)).unwrap();
        let old = Arrivals {
            stop: "490008660N".into(),
            minutes: vec![99],
        };
        cache.put_at("tfl.arrivals", &k, &sample(), Utc::now()).unwrap();
        // Plant an older generation directly, bypassing put's cleanup.
        let old_path =
            cache.entry_path("tfl.arrivals", &k, Utc::now() - chrono::Duration::seconds(10));
        let envelope = CacheEntry {
            created_at: Utc::now() - chrono::Duration::seconds(10),
            payload: &old,
        };
        fs::write(&old_path, serde_json::to_string_pretty(&envelope).unwrap()).unwrap();

        let result: Arrivals = cache.get("tfl.arrivals", &k, TTL).expect("should hit");

        assert_eq!(result, sample(), "The newest stamp must win");
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let (cache, _temp_dir) = create_test_cache();
        let k = key::derive("tfl.arrivals", &("490008660N",)).unwrap();
        let path = cache.put("tfl.arrivals", &k, &sample()).unwrap();

        fs::write(&path, "{ not json at all").unwrap();

        let result: Option<Arrivals> = cache.get("tfl.arrivals", &k, TTL);
        assert!(result.is_none(), "Corrupt JSON folds into a miss, not an error");
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let (cache, _temp_dir) = create_test_cache();
        let k = key::derive("tfl.arrivals", &("490008660N",)).unwrap();
        cache.put("tfl.arrivals", &k, &sample()).unwrap();

        let result: Option<Arrivals> = cache.get("weather.forecast", &k, TTL);

        assert!(result.is_none());
    }

    #[test]
    fn test_sweep_removes_only_entries_older_than_cutoff() {
        let (cache, _temp_dir) = create_test_cache();
        let old_key = key::derive("news.feed", &("http://old",)).unwrap();
        let new_key = key::derive("news.feed", &("http://new",)).unwrap();
        let old = cache
            .put_at("news.feed", &old_key, &sample(), Utc::now() - chrono::Duration::hours(48))
            .unwrap();
        let fresh = cache.put("news.feed", &new_key, &sample()).unwrap();

        let removed = cache.sweep("news.feed", Duration::from_secs(60 * 60)).unwrap();

        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn test_sweep_of_missing_namespace_is_a_noop() {
        let (cache, _temp_dir) = create_test_cache();
        assert_eq!(cache.sweep("nonexistent", Duration::from_secs(1)).unwrap(), 0);
    }

    #[test]
    fn test_clear_removes_cache_root() {
        let (cache, temp_dir) = create_test_cache();
        let k = key::derive("tfl.arrivals", &("490008660N",)).unwrap();
        cache.put("tfl.arrivals", &k, &sample()).unwrap();

        cache.clear().unwrap();

        assert!(!temp_dir.path().join("tfl.arrivals").exists());
        cache.clear().expect("Clearing an already-missing root is fine");
    }

    #[test]
    fn test_stamp_from_filename() {
        let stamp = stamp_from_filename("a1b2c3d4-20250115-093000.json").unwrap();
        assert_eq!(stamp.format(STAMP_FORMAT).to_string(), "20250115-093000");
        assert!(stamp_from_filename("garbage.json").is_none());
        assert!(stamp_from_filename("a1b2c3d4-20250115-093000.tmp").is_none());
        // Multi-byte character straddling where the stamp would start.
        assert!(stamp_from_filename("éaaaaaaaaaaaaaa.json").is_none());
    }

    #[test]
    fn test_sweep_skips_foreign_filenames() {
        let (cache, temp_dir) = create_test_cache();
        let k = key::derive("news.feed", &("http://x",)).unwrap();
        cache
            .put_at("news.feed", &k, &sample(), Utc::now() - chrono::Duration::hours(48))
            .unwrap();
        // The directory is shared; other tools may drop files of their own.
        let foreign = temp_dir.path().join("news.feed").join("éaaaaaaaaaaaaaa.json");
        fs::write(&foreign, "{}").unwrap();

        let removed = cache.sweep("news.feed", Duration::from_secs(60 * 60)).unwrap();

        assert_eq!(removed, 1, "Only entries with a parseable stamp are swept");
        assert!(foreign.exists(), "Unparseable filenames are left alone");
    }

    #[test]
    fn test_new_uses_project_cache_dir() {
        if let Some(cache) = FileCache::new() {
            assert!(cache.root().to_string_lossy().contains("magicmirror"));
        }
        // None is acceptable when no home directory exists (e.g. CI).
    }
}
