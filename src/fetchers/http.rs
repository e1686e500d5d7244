use crate::error::FetchError;
use crate::fetchers::challenge::ChallengeDetector;
use crate::fetchers::fetcher::{FetchOutcome, Fetcher};
use crate::utils::pause;
use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fetches pages with a plain HTTP client presenting browser-like headers
pub struct HttpFetcher {
    client: reqwest::Client,
    detector: ChallengeDetector,
    timeout: Duration,
    delay_range_ms: (u64, u64),
    shutdown: CancellationToken,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(timeout)?,
            detector: ChallengeDetector::default(),
            timeout,
            delay_range_ms: (0, 0),
            shutdown: CancellationToken::new(),
        })
    }

    /// Random pause before every request, in milliseconds
    pub fn with_request_delay(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.delay_range_ms = (min_ms, max_ms.max(min_ms));
        self
    }

    /// Cut the pre-request delay short when `shutdown` fires
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Use a custom challenge classifier
    pub fn with_detector(mut self, detector: ChallengeDetector) -> Self {
        self.detector = detector;
        self
    }

    fn request_delay(&self) -> Duration {
        let (min, max) = self.delay_range_ms;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .timeout(timeout)
        .build()
        .map_err(|e| FetchError::Startup(e.to_string()))
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&mut self, url: &str) -> Result<FetchOutcome, FetchError> {
        if !pause(&self.shutdown, self.request_delay()).await {
            return Ok(FetchOutcome::TransientError("shutdown requested".to_string()));
        }

        ::log::debug!("GET {}", url);
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                ::log::error!("Request to {} failed: {}", url, e);
                return Ok(FetchOutcome::TransientError(e.to_string()));
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            ::log::warn!("HTTP 404 for {}", url);
            return Ok(FetchOutcome::NotFound);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Ok(FetchOutcome::TransientError(e.to_string())),
        };

        if self.detector.is_challenge_page(&body) {
            ::log::warn!("Challenge page served for {} (HTTP {})", url, status.as_u16());
            return Ok(FetchOutcome::Challenge);
        }

        if status != StatusCode::OK {
            ::log::error!("HTTP {} for {}", status.as_u16(), url);
            return Ok(FetchOutcome::TransientError(format!(
                "unexpected status {}",
                status.as_u16()
            )));
        }

        Ok(FetchOutcome::Content(body))
    }

    async fn restart(&mut self) -> Result<(), FetchError> {
        ::log::info!("Recreating HTTP session");
        self.client = build_client(self.timeout)?;
        Ok(())
    }

    async fn shutdown(&mut self) {
        ::log::debug!("HTTP session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fetch_with(status: usize, body: &str) -> FetchOutcome {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/discussion/1/p7")
            .with_status(status)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(body)
            .create_async()
            .await;

        let mut fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let outcome = fetcher
            .fetch(&format!("{}/discussion/1/p7", server.url()))
            .await
            .unwrap();
        mock.assert_async().await;
        outcome
    }

    #[tokio::test]
    async fn test_not_found_status() {
        assert_eq!(fetch_with(404, "gone").await, FetchOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_challenge_page() {
        let body = "<html><head><title>Just a moment...</title></head><body></body></html>";
        assert_eq!(fetch_with(403, body).await, FetchOutcome::Challenge);
        assert_eq!(fetch_with(200, body).await, FetchOutcome::Challenge);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        assert!(matches!(
            fetch_with(502, "bad gateway").await,
            FetchOutcome::TransientError(_)
        ));
    }

    #[tokio::test]
    async fn test_content() {
        let body = r#"<html><head><title>Thread</title></head><body><li class="Item ItemComment"></li></body></html>"#;
        assert_eq!(
            fetch_with(200, body).await,
            FetchOutcome::Content(body.to_string())
        );
    }

    #[tokio::test]
    async fn test_thread_mentioning_challenge_is_content() {
        let body = r#"<html><head><title>Thread</title>
            <script src="/cdn-cgi/challenge-platform/scripts/jsd/main.js"></script></head>
            <body><li class="Item ItemComment"><div class="Message userContent">Checking your browser loop again</div></li></body></html>"#;
        assert_eq!(
            fetch_with(200, body).await,
            FetchOutcome::Content(body.to_string())
        );
    }

    #[tokio::test]
    async fn test_shutdown_cuts_request_delay() {
        let token = CancellationToken::new();
        token.cancel();
        let mut fetcher = HttpFetcher::new(Duration::from_secs(1))
            .unwrap()
            .with_request_delay(60_000, 60_000)
            .with_shutdown(token);

        let started = std::time::Instant::now();
        let outcome = fetcher.fetch("http://127.0.0.1:9/p1").await.unwrap();

        assert!(matches!(outcome, FetchOutcome::TransientError(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_connection_failure_is_transient() {
        let mut fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        let outcome = fetcher.fetch("http://127.0.0.1:9/p1").await.unwrap();
        assert!(matches!(outcome, FetchOutcome::TransientError(_)));
    }
}
