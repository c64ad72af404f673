//! File-backed TTL cache for provider fetch results
//!
//! Every entry lives in its own JSON file named after its fingerprint. Writes go
//! to a temporary file that is renamed into place, so a concurrent reader sees
//! either the old entry, the new entry or no entry. An entry that cannot be
//! read or decoded is a miss: it is logged, removed and later rewritten by the
//! next successful fetch.

use crate::error::{PredictionError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const ENTRY_EXTENSION: &str = "json";

/// Deterministic key of a cache entry
///
/// Built from the identity of the cached function and the arguments that
/// change its result. Control flags such as `force_update` are never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Start a fingerprint for the named function
    pub fn builder(function: &str) -> FingerprintBuilder {
        let mut hasher = blake3::Hasher::new();
        hasher.update(function.as_bytes());
        FingerprintBuilder { hasher }
    }

    /// Fingerprint of a function and a serializable argument set
    pub fn from_args<A: Serialize + ?Sized>(function: &str, args: &A) -> Result<Self> {
        let encoded = serde_json::to_string(args)?;
        Ok(Self::builder(function).arg("args", encoded).build())
    }

    /// Hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental fingerprint construction
#[derive(Debug, Clone)]
pub struct FingerprintBuilder {
    hasher: blake3::Hasher,
}

impl FingerprintBuilder {
    /// Add a named argument
    pub fn arg(mut self, name: &str, value: impl fmt::Display) -> Self {
        let value = value.to_string();
        for part in [name, value.as_str()] {
            self.hasher.update(&(part.len() as u64).to_le_bytes());
            self.hasher.update(part.as_bytes());
        }
        self
    }

    /// Finish the fingerprint
    pub fn build(self) -> Fingerprint {
        Fingerprint(self.hasher.finalize().to_hex().to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    value: serde_json::Value,
}

enum EntryRead {
    Missing,
    Corrupt,
    Valid(CacheEntry),
}

/// Keyed, TTL-based persistent cache in a local directory
#[derive(Debug)]
pub struct CacheFileStore {
    directory: PathBuf,
    write_lock: Mutex<()>,
}

impl CacheFileStore {
    /// Open (and create if needed) a cache directory
    pub fn open<P: Into<PathBuf>>(directory: P) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the entries
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, key: &Fingerprint) -> PathBuf {
        self.directory
            .join(format!("{}.{}", key.as_str(), ENTRY_EXTENSION))
    }

    /// Stored value of an entry that has not expired
    pub fn get<T: DeserializeOwned>(&self, key: &Fingerprint) -> Option<T> {
        self.get_at(key, Utc::now())
    }

    /// [`get`](Self::get) against an explicit clock
    pub fn get_at<T: DeserializeOwned>(&self, key: &Fingerprint, now: DateTime<Utc>) -> Option<T> {
        let path = self.entry_path(key);
        let entry = match self.read_entry(&path) {
            EntryRead::Valid(entry) => entry,
            EntryRead::Missing => return None,
            EntryRead::Corrupt => {
                self.discard(&path);
                return None;
            }
        };

        if entry.key != key.as_str() {
            warn!("Cache entry {} carries a foreign key, treating as miss", path.display());
            self.discard(&path);
            return None;
        }
        if entry.expires_at <= now {
            debug!("Cache entry {} expired at {}", key, entry.expires_at);
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => {
                debug!("Cache hit for {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Cache entry {} does not decode ({}), treating as miss", key, e);
                self.discard(&path);
                None
            }
        }
    }

    /// Store a value valid for `ttl`, replacing any existing entry
    pub fn create<T: Serialize + ?Sized>(
        &self,
        key: &Fingerprint,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        self.create_at(key, value, ttl, Utc::now())
    }

    /// [`create`](Self::create) against an explicit clock
    pub fn create_at<T: Serialize + ?Sized>(
        &self,
        key: &Fingerprint,
        value: &T,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if ttl <= Duration::zero() {
            return Err(PredictionError::InvalidParameter(
                "Cache TTL must be positive".to_string(),
            ));
        }

        let entry = CacheEntry {
            key: key.as_str().to_string(),
            created_at: now,
            expires_at: now + ttl,
            value: serde_json::to_value(value)?,
        };
        let bytes = serde_json::to_vec(&entry)?;

        let path = self.entry_path(key);
        let mut staging = tempfile::Builder::new()
            .prefix(".")
            .suffix(".tmp")
            .tempfile_in(&self.directory)?;
        staging.write_all(&bytes)?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        staging.persist(&path).map_err(|e| e.error)?;
        debug!("Cache entry {} stored until {}", key, entry.expires_at);
        Ok(())
    }

    /// Remove one entry; returns whether it existed
    pub fn remove(&self, key: &Fingerprint) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove expired (and unreadable) entries, or every entry when `clear_all` is set
    pub fn clear(&self, clear_all: bool) -> Result<usize> {
        self.clear_at(clear_all, Utc::now())
    }

    /// [`clear`](Self::clear) against an explicit clock
    pub fn clear_at(&self, clear_all: bool, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        for path in self.entry_paths()? {
            let expired = clear_all
                || match self.read_entry(&path) {
                    EntryRead::Valid(entry) => entry.expires_at <= now,
                    EntryRead::Missing => false,
                    EntryRead::Corrupt => true,
                };
            if expired {
                let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        debug!("Cleared {} cache entries (clear_all = {})", removed, clear_all);
        Ok(removed)
    }

    /// Number of entries on disk, expired ones included
    pub fn len(&self) -> usize {
        self.entry_paths().map(|paths| paths.len()).unwrap_or(0)
    }

    /// Whether no entry is on disk
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for dir_entry in fs::read_dir(&self.directory)? {
            let path = dir_entry?.path();
            let is_entry = path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
                && !path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'));
            if is_entry {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    fn read_entry(&self, path: &Path) -> EntryRead {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return EntryRead::Missing,
            Err(e) => {
                warn!("Cache entry {} unreadable ({}), treating as miss", path.display(), e);
                return EntryRead::Missing;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(entry) => EntryRead::Valid(entry),
            Err(e) => {
                warn!("Cache entry {} corrupted ({}), treating as miss", path.display(), e);
                EntryRead::Corrupt
            }
        }
    }

    fn discard(&self, path: &Path) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Could not remove cache entry {}: {}", path.display(), e);
            }
        }
    }
}

/// Where a cached call got its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOrigin {
    /// Served from a valid entry
    Hit,
    /// No valid entry; the wrapped call ran
    Miss,
    /// Cache bypassed by `force_update`; the wrapped call ran
    Forced,
}

/// Value of a cached call and its origin
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOutcome<T> {
    pub value: T,
    pub origin: CacheOrigin,
}

impl<T> CacheOutcome<T> {
    /// Whether the wrapped call actually ran
    pub fn is_fresh(&self) -> bool {
        self.origin != CacheOrigin::Hit
    }
}

/// Explicit caching wrapper around a fetch function
///
/// Holds the TTL and the function that derives a fingerprint from the call
/// arguments. Which arguments count is visible in that function alone.
pub struct CachedFetch<A: ?Sized> {
    ttl: Duration,
    fingerprint: fn(&A) -> Fingerprint,
}

impl<A: ?Sized> CachedFetch<A> {
    /// Create a wrapper
    pub fn new(ttl: Duration, fingerprint: fn(&A) -> Fingerprint) -> Self {
        Self { ttl, fingerprint }
    }

    /// TTL of stored results
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fingerprint of a call
    pub fn fingerprint(&self, args: &A) -> Fingerprint {
        (self.fingerprint)(args)
    }

    /// Run `fetch` unless a valid entry exists or `force_update` is set.
    ///
    /// Errors from `fetch` propagate and leave the cache untouched. A failure to
    /// store the fresh result is logged; the result is still returned.
    pub fn call<T, F>(
        &self,
        store: &CacheFileStore,
        args: &A,
        force_update: bool,
        fetch: F,
    ) -> Result<CacheOutcome<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&A) -> Result<T>,
    {
        let key = self.fingerprint(args);

        if !force_update {
            if let Some(value) = store.get(&key) {
                return Ok(CacheOutcome {
                    value,
                    origin: CacheOrigin::Hit,
                });
            }
        }

        let value = fetch(args)?;
        if let Err(e) = store.create(&key, &value, self.ttl) {
            warn!("Could not store cache entry {}: {}", key, e);
        }

        Ok(CacheOutcome {
            value,
            origin: if force_update {
                CacheOrigin::Forced
            } else {
                CacheOrigin::Miss
            },
        })
    }
}

impl<A: ?Sized> fmt::Debug for CachedFetch<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedFetch").field("ttl", &self.ttl).finish()
    }
}
