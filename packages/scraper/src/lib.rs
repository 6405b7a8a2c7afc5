#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! QuickFacts page fetching, extraction, and batch orchestration.
//!
//! [`FetchOrchestrator`] walks a list of places, resolves each to a
//! QuickFacts URL, fetches it through a [`Transport`], extracts the
//! configured attributes with [`PageExtractor`], and upserts the result
//! into a [`RecordStore`](county_facts_store::RecordStore). Every place
//! yields exactly one [`PlaceOutcome`]; per-place failures never abort the
//! batch.
//!
//! The transport is either a direct [`HttpTransport`] or a
//! [`CachedTransport`] in front of one, chosen by [`ScrapeConfig`].

pub mod extract;
pub mod orchestrator;
pub mod progress;
pub mod transport;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use county_facts_store::StoreError;

pub use extract::{ExtractionError, PageExtractor};
pub use orchestrator::{
    BatchReport, BatchSummary, FetchOrchestrator, Outcome, PlaceOutcome, SkipReason,
};
pub use progress::{NullProgress, ProgressCallback};
pub use transport::{
    CachedTransport, ConfiguredTransport, FetchError, HttpTransport, Transport,
};

/// Default QuickFacts base URL. Page URLs are `<base>/<token>`.
pub const DEFAULT_BASE_URL: &str = "https://census.gov/quickfacts";

/// Default `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("county_facts/", env!("CARGO_PKG_VERSION"));

/// Errors that abort a scrape before or outside the per-place loop.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The HTTP client could not be built.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configuration is invalid (bad header, bad base URL).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The attribute schema could not be turned into selectors.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The transport failed to open or close.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where and how long to keep cached responses.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache directory. Created on open.
    pub dir: PathBuf,
    /// Entries older than this are refetched. `None` keeps them forever.
    pub max_age: Option<chrono::Duration>,
}

impl CacheConfig {
    /// A cache in `dir` whose entries never expire.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_age: None,
        }
    }

    /// Sets the maximum entry age.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: chrono::Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

/// Network and cache settings for a scrape.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// QuickFacts base URL.
    pub base_url: String,
    /// Additional HTTP headers to include in requests.
    pub headers: BTreeMap<String, String>,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Backoff before the first retry; doubled for each further retry.
    pub retry_delay: Duration,
    /// Minimum delay in milliseconds between requests.
    pub delay_ms: Option<u64>,
    /// Response cache. `None` sends every request to the network.
    pub cache: Option<CacheConfig>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ScrapeConfig {
    /// Creates a new `ScrapeConfig` for `base_url` with sensible defaults.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_owned(),
            headers: BTreeMap::new(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
            delay_ms: None,
            cache: None,
        }
    }

    /// Adds a request header.
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_owned(), value.to_owned());
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the number of retries for transient failures.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the initial retry backoff.
    #[must_use]
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Sets the minimum delay between requests.
    #[must_use]
    pub const fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    /// Enables the response cache.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builds the transport this configuration describes.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the HTTP client cannot be built or the
    /// cache directory cannot be opened.
    pub fn build_transport(&self) -> Result<ConfiguredTransport, ScrapeError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ScrapeError::Config(format!(
                "base URL must start with http:// or https://: {}",
                self.base_url
            )));
        }

        let http = HttpTransport::new(self)?;

        Ok(match &self.cache {
            Some(cache) => ConfiguredTransport::Cached(CachedTransport::open(
                &cache.dir,
                http,
                cache.max_age,
            )?),
            None => ConfiguredTransport::Direct(http),
        })
    }
}
