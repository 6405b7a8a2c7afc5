//! Direct HTTP transport with retry and request pacing.
//!
//! Transient failures (connect errors, timeouts, HTTP 429, HTTP 5xx) are
//! retried with exponential backoff up to the configured limit. A 404 is
//! returned immediately as [`FetchError::NotFound`]; other 4xx statuses are
//! permanent and returned as [`FetchError::Status`].

use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::transport::{FetchError, Transport};
use crate::{ScrapeConfig, ScrapeError};

/// Fetches pages over HTTP with a shared [`reqwest::Client`].
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    max_retries: u32,
    retry_delay: Duration,
    min_interval: Option<Duration>,
    last_request: Mutex<Option<Instant>>,
}

impl HttpTransport {
    /// Builds a transport from `config` (headers, timeout, retries,
    /// pacing).
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if a header is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        let mut header_map = reqwest::header::HeaderMap::new();
        for (key, value) in &config.headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ScrapeError::Config(format!("invalid header name '{key}': {e}")))?;
            let val = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
                ScrapeError::Config(format!("invalid header value '{value}': {e}"))
            })?;
            header_map.insert(name, val);
        }

        let client = reqwest::Client::builder()
            .default_headers(header_map)
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(ScrapeError::Http)?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            min_interval: config.delay_ms.map(Duration::from_millis),
            last_request: Mutex::new(None),
        })
    }

    /// Waits until at least `min_interval` has passed since the previous
    /// request.
    async fn pace(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                log::warn!("  retry {attempt}/{} in {delay:?}...", self.max_retries);
                tokio::time::sleep(delay).await;
            }
            let can_retry = attempt < self.max_retries;
            attempt += 1;

            self.pace().await;

            let response = match self.client.get(url).send().await {
                Ok(response) => response,
                Err(e) if can_retry && is_transient(&e) => {
                    log::warn!("  transient error for {url}: {e}");
                    continue;
                }
                Err(e) => return Err(FetchError::Http(e)),
            };

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound {
                    url: url.to_owned(),
                });
            }
            if is_retryable_status(status) && can_retry {
                log::warn!("  HTTP {status} for {url}");
                continue;
            }
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_owned(),
                    status: status.as_u16(),
                });
            }

            match response.text().await {
                Ok(body) => {
                    log::debug!("Fetched {} bytes from {url}", body.len());
                    return Ok(body);
                }
                Err(e) if can_retry => {
                    log::warn!("  body read failed for {url}: {e}");
                }
                Err(e) => return Err(FetchError::Http(e)),
            }
        }
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

/// Returns `true` for statuses that signal a temporary server condition.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    const OK: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 20\r\nConnection: close\r\n\r\n<html>autauga</html>";
    const NOT_FOUND: &str =
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const FORBIDDEN: &str =
        "HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const UNAVAILABLE: &str =
        "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    /// Answers each request on a loopback port with the next of
    /// `responses`, repeating the last one. Returns a page URL and the
    /// number of requests answered.
    async fn serve(responses: &'static [&'static str]) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let answered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&answered);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0_u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let response = responses[n.min(responses.len() - 1)];
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}/quickfacts/autaugacountyalabama"), answered)
    }

    fn fast_retries() -> ScrapeConfig {
        ScrapeConfig::default()
            .with_timeout(Duration::from_secs(5))
            .with_retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn retries_rate_limits_and_server_errors_only() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::FORBIDDEN));
        assert!(!is_retryable_status(StatusCode::OK));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = ScrapeConfig::default().with_retry_delay(Duration::from_millis(100));
        let transport = HttpTransport::new(&config).unwrap();

        assert_eq!(transport.backoff(1), Duration::from_millis(100));
        assert_eq!(transport.backoff(2), Duration::from_millis(200));
        assert_eq!(transport.backoff(4), Duration::from_millis(800));
    }

    #[test]
    fn rejects_invalid_header_names() {
        let config = ScrapeConfig::default().with_header("bad header", "x");
        assert!(matches!(
            HttpTransport::new(&config),
            Err(ScrapeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let config = ScrapeConfig::default()
            .with_timeout(Duration::from_secs(2))
            .with_max_retries(0);
        let transport = HttpTransport::new(&config).unwrap();

        let err = transport
            .fetch("http://127.0.0.1:9/quickfacts/autaugacountyalabama")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Http(_)), "{err}");
    }

    #[tokio::test]
    async fn not_found_is_returned_without_retrying() {
        let (url, answered) = serve(&[NOT_FOUND]).await;
        let transport = HttpTransport::new(&fast_retries()).unwrap();

        let err = transport.fetch(&url).await.unwrap_err();

        assert!(err.is_not_found(), "{err}");
        assert!(matches!(&err, FetchError::NotFound { url: u } if *u == url));
        assert_eq!(answered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_error_then_success_returns_the_body() {
        let (url, answered) = serve(&[UNAVAILABLE, OK]).await;
        let transport = HttpTransport::new(&fast_retries()).unwrap();

        let body = transport.fetch(&url).await.unwrap();

        assert_eq!(body, "<html>autauga</html>");
        assert_eq!(answered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistent_server_error_gives_up_after_max_retries() {
        let (url, answered) = serve(&[UNAVAILABLE]).await;
        let transport = HttpTransport::new(&fast_retries().with_max_retries(2)).unwrap();

        let err = transport.fetch(&url).await.unwrap_err();

        assert!(
            matches!(err, FetchError::Status { status: 503, .. }),
            "{err}"
        );
        assert_eq!(answered.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn forbidden_is_permanent() {
        let (url, answered) = serve(&[FORBIDDEN]).await;
        let transport = HttpTransport::new(&fast_retries()).unwrap();

        let err = transport.fetch(&url).await.unwrap_err();

        assert!(
            matches!(err, FetchError::Status { status: 403, .. }),
            "{err}"
        );
        assert!(!err.is_not_found());
        assert_eq!(answered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = ScrapeConfig::default()
            .with_timeout(Duration::from_millis(200))
            .with_max_retries(0);
        let transport = HttpTransport::new(&config).unwrap();

        let err = transport
            .fetch(&format!("http://{addr}/quickfacts/autaugacountyalabama"))
            .await
            .unwrap_err();

        assert!(matches!(&err, FetchError::Http(e) if e.is_timeout()), "{err}");
    }
}
