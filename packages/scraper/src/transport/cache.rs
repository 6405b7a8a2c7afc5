//! On-disk response cache.
//!
//! [`CachedTransport`] wraps another [`Transport`]. Successful bodies are
//! stored gzip-compressed, one file per URL; 404s are remembered in the
//! index only, so a re-run does not ask for pages that do not exist.
//! Transient failures are never cached.
//!
//! The index (`index.json`) is loaded on open and written back by
//! [`Transport::checkpoint`] and [`Transport::close`]. Dropping an unclosed
//! transport writes it too, so a batch that ends in an error still keeps
//! what it fetched.

use std::collections::BTreeMap;
use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::transport::{FetchError, Transport};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum CachedStatus {
    Ok,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    status: CachedStatus,
    fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: BTreeMap<String, CacheEntry>,
    dirty: bool,
}

/// A [`Transport`] that serves repeated requests from disk.
#[derive(Debug)]
pub struct CachedTransport<T: Transport> {
    inner: T,
    dir: PathBuf,
    max_age: Option<chrono::Duration>,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Transport> CachedTransport<T> {
    /// Opens (or creates) the cache in `dir` in front of `inner`.
    ///
    /// Entries older than `max_age` are refetched. An unreadable index is
    /// logged and replaced with an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Cache`] if `dir` cannot be created.
    pub fn open(
        dir: &Path,
        inner: T,
        max_age: Option<chrono::Duration>,
    ) -> Result<Self, FetchError> {
        std::fs::create_dir_all(dir).map_err(|e| cache_error(dir, e))?;

        let index_path = dir.join(INDEX_FILE);
        let entries = match std::fs::read(&index_path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                log::warn!(
                    "Ignoring unreadable cache index {}: {e}",
                    index_path.display()
                );
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(cache_error(&index_path, e)),
        };

        log::info!(
            "Opened response cache at {} ({} entries)",
            dir.display(),
            entries.len()
        );

        Ok(Self {
            inner,
            dir: dir.to_path_buf(),
            max_age,
            state: Mutex::new(CacheState {
                entries,
                dirty: false,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// The wrapped transport.
    #[must_use]
    pub const fn inner(&self) -> &T {
        &self.inner
    }

    /// Number of requests answered from the cache so far.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of requests passed through to the inner transport so far.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of URLs currently in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Writes the index to disk if it has changed.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Cache`] if the index cannot be written.
    pub fn flush(&self) -> Result<(), FetchError> {
        let mut state = self.lock();
        if !state.dirty {
            return Ok(());
        }

        let index_path = self.dir.join(INDEX_FILE);
        let tmp_path = self.dir.join(format!("{INDEX_FILE}.tmp"));
        let json = serde_json::to_vec_pretty(&state.entries)
            .map_err(|e| cache_error(&index_path, std::io::Error::other(e)))?;
        std::fs::write(&tmp_path, json).map_err(|e| cache_error(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &index_path).map_err(|e| cache_error(&index_path, e))?;

        state.dirty = false;
        log::debug!(
            "Wrote cache index {} ({} entries)",
            index_path.display(),
            state.entries.len()
        );
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh_entry(&self, url: &str) -> Option<CacheEntry> {
        let entry = self.lock().entries.get(url).cloned()?;
        match self.max_age {
            Some(max_age) if Utc::now() - entry.fetched_at > max_age => {
                log::debug!("Cache entry for {url} expired");
                None
            }
            _ => Some(entry),
        }
    }

    fn record(&self, url: &str, status: CachedStatus, file: Option<String>) {
        let mut state = self.lock();
        state.entries.insert(
            url.to_owned(),
            CacheEntry {
                status,
                fetched_at: Utc::now(),
                file,
            },
        );
        state.dirty = true;
    }

    fn read_body(&self, file: &str) -> Result<String, FetchError> {
        let path = self.dir.join(file);
        let compressed = std::fs::read(&path).map_err(|e| cache_error(&path, e))?;
        let mut body = String::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_string(&mut body)
            .map_err(|e| cache_error(&path, e))?;
        Ok(body)
    }

    fn write_body(&self, url: &str, body: &str) -> Result<String, FetchError> {
        let file = body_file_name(url);
        let path = self.dir.join(&file);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(body.as_bytes())
            .map_err(|e| cache_error(&path, e))?;
        let compressed = encoder.finish().map_err(|e| cache_error(&path, e))?;
        std::fs::write(&path, compressed).map_err(|e| cache_error(&path, e))?;
        Ok(file)
    }
}

impl<T: Transport> Transport for CachedTransport<T> {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if let Some(entry) = self.fresh_entry(url) {
            match (entry.status, entry.file.as_deref()) {
                (CachedStatus::NotFound, _) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    log::debug!("Cache hit (not found) for {url}");
                    return Err(FetchError::NotFound {
                        url: url.to_owned(),
                    });
                }
                (CachedStatus::Ok, Some(file)) => match self.read_body(file) {
                    Ok(body) => {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        log::debug!("Cache hit for {url}");
                        return Ok(body);
                    }
                    Err(e) => log::warn!("Discarding cache entry for {url}: {e}"),
                },
                (CachedStatus::Ok, None) => {
                    log::warn!("Discarding cache entry for {url}: no body file");
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        match self.inner.fetch(url).await {
            Ok(body) => {
                match self.write_body(url, &body) {
                    Ok(file) => self.record(url, CachedStatus::Ok, Some(file)),
                    Err(e) => log::warn!("Failed to cache {url}: {e}"),
                }
                Ok(body)
            }
            Err(FetchError::NotFound { url }) => {
                self.record(&url, CachedStatus::NotFound, None);
                Err(FetchError::NotFound { url })
            }
            Err(e) => Err(e),
        }
    }

    fn checkpoint(&self) -> Result<(), FetchError> {
        self.flush()
    }

    fn close(&mut self) -> Result<(), FetchError> {
        log::info!(
            "Response cache: {} hits, {} misses",
            self.hits(),
            self.misses()
        );
        self.flush()?;
        self.inner.close()
    }
}

impl<T: Transport> Drop for CachedTransport<T> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::error!("Failed to write cache index on drop: {e}");
        }
    }
}

/// File name for the cached body of `url`: every non-alphanumeric
/// character becomes `_`.
fn body_file_name(url: &str) -> String {
    let stem: String = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{stem}.html.gz")
}

fn cache_error(path: &Path, source: std::io::Error) -> FetchError {
    FetchError::Cache {
        path: path.display().to_string(),
        source,
    }
}
