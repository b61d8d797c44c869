//! Derived image cache.
//!
//! Image encoding dominates build time, so every generated variant is kept in
//! a persistent store under `cache_dir` and reused when neither the source
//! nor the generation options have changed.
//!
//! ## Cache keys
//!
//! Each entry records two hashes for one output `file_name`:
//!
//! - **`content_hash`**: SHA-256 of the source file bytes. Content-based
//!   rather than mtime-based so it survives `git checkout`.
//! - **`options_hash`**: SHA-256 of the canonical JSON of the options that
//!   shape the output (see [`ImageRequest::options_hash`]).
//!
//! They are kept apart so a miss can be attributed to the source or to the
//! options when debugging.
//!
//! A hit requires:
//! 1. The entry for that `file_name` has both hashes equal
//! 2. The store file `<cache_dir>/<file_name>` still exists
//!
//! ## Storage
//!
//! `<cache_dir>/cache.json` holds a versioned, ordered list of entries, at
//! most one per `file_name`. It is replaced as a whole via write-to-temp then
//! rename.
//!
//! ## Bypassing the cache
//!
//! `--no-cache` starts from an empty manifest, so every image is re-encoded
//! and every entry rewritten.
//!
//! [`ImageRequest::options_hash`]: super::params::ImageRequest::options_hash

use crate::reconcile::write_atomic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the manifest file within the cache directory.
pub(crate) const MANIFEST_FILENAME: &str = "cache.json";

/// Bump to invalidate every existing cache when the format or key
/// computation changes.
pub(crate) const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub file_name: String,
    pub content_hash: String,
    pub options_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: Vec<CacheEntry>,
}

impl CacheManifest {
    /// Create an empty manifest (used for `--no-cache` or first build).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: Vec::new(),
        }
    }

    /// Load from the cache directory. Returns an empty manifest if the file
    /// doesn't exist or can't be used (corruption, version mismatch).
    pub fn load(cache_dir: &Path) -> Self {
        let path = manifest_path(cache_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "ignoring unreadable cache manifest");
                return Self::empty();
            }
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest
    }

    /// Save to the cache directory, replacing the previous manifest whole.
    pub fn save(&self, cache_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(&manifest_path(cache_dir), json.as_bytes())
    }

    pub fn get(&self, file_name: &str) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| e.file_name == file_name)
    }

    /// Look up a cached store file.
    ///
    /// Returns the store path when the entry for `file_name` carries both
    /// hashes **and** the store file is still on disk.
    pub fn find_cached(
        &self,
        file_name: &str,
        content_hash: &str,
        options_hash: &str,
        cache_dir: &Path,
    ) -> Option<PathBuf> {
        let entry = self.get(file_name)?;
        if entry.content_hash != content_hash || entry.options_hash != options_hash {
            return None;
        }
        let stored = cache_dir.join(file_name);
        stored.is_file().then_some(stored)
    }

    /// Record an entry, replacing the existing one for the same file name in
    /// place or appending.
    pub fn insert(&mut self, entry: CacheEntry) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.file_name == entry.file_name)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }
}

/// Summary of cache performance for a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
    pub failures: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.misses + self.failures
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} encoded ({} total)",
                self.hits,
                self.misses,
                self.total()
            )?;
        } else {
            write!(f, "{} encoded", self.misses)?;
        }
        if self.failures > 0 {
            write!(f, ", {} failed", self.failures)?;
        }
        Ok(())
    }
}

/// Resolve the manifest path for a cache directory.
pub fn manifest_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(MANIFEST_FILENAME)
}
