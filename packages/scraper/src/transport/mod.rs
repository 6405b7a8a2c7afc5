//! Page transports.
//!
//! The orchestrator fetches pages through the [`Transport`] trait and never
//! learns whether a response came from the network or from disk.
//! [`HttpTransport`] talks to the site; [`CachedTransport`] wraps any other
//! transport with an on-disk response cache; [`ConfiguredTransport`] is
//! whichever of the two a [`ScrapeConfig`](crate::ScrapeConfig) asks for.

pub mod cache;
pub mod http;

use std::future::Future;

pub use cache::CachedTransport;
pub use http::HttpTransport;

/// Errors returned by a [`Transport`].
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The site has no page at this URL.
    #[error("Not found: {url}")]
    NotFound {
        /// Requested URL.
        url: String,
    },

    /// The site answered with a non-success status other than 404.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// The request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response cache could not be read or written.
    #[error("Cache error at {path}: {source}")]
    Cache {
        /// Cache path involved.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl FetchError {
    /// Returns `true` for [`FetchError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Fetches page bodies by URL.
pub trait Transport: Send + Sync {
    /// Fetches the body at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] for a missing page and other
    /// [`FetchError`] variants for everything else that is not a success.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;

    /// Persists any pending state without releasing the transport, so a
    /// killed process keeps what it fetched up to here.
    ///
    /// The default implementation does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if pending state cannot be persisted.
    fn checkpoint(&self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Releases any held resources (flushes caches, etc.).
    ///
    /// The default implementation does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if pending state cannot be persisted.
    fn close(&mut self) -> Result<(), FetchError> {
        Ok(())
    }
}

/// The transport selected by a [`ScrapeConfig`](crate::ScrapeConfig).
pub enum ConfiguredTransport {
    /// Every request goes to the network.
    Direct(HttpTransport),
    /// Requests are served from the cache when possible.
    Cached(CachedTransport<HttpTransport>),
}

impl Transport for ConfiguredTransport {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        match self {
            Self::Direct(transport) => transport.fetch(url).await,
            Self::Cached(transport) => transport.fetch(url).await,
        }
    }

    fn checkpoint(&self) -> Result<(), FetchError> {
        match self {
            Self::Direct(transport) => transport.checkpoint(),
            Self::Cached(transport) => transport.checkpoint(),
        }
    }

    fn close(&mut self) -> Result<(), FetchError> {
        match self {
            Self::Direct(transport) => transport.close(),
            Self::Cached(transport) => transport.close(),
        }
    }
}
