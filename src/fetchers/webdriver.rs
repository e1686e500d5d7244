use crate::error::FetchError;
use crate::fetchers::challenge::ChallengeDetector;
use crate::fetchers::fetcher::{FetchOutcome, Fetcher};
use crate::parsers::comments::{self, COMMENT_MARKER};
use crate::utils::pause;
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Interval between checks while a challenge page is showing
const CHALLENGE_POLL: Duration = Duration::from_secs(2);

/// Upper bound for a single navigation plus challenge wait
const FETCH_TIMEOUT_SLACK: Duration = Duration::from_secs(45);

/// Extra time given to a page whose comment list has not rendered yet
const RENDER_GRACE: Duration = Duration::from_secs(5);

/// Fetches pages through a browser driven over WebDriver
pub struct WebDriverFetcher {
    webdriver_url: String,
    headless: bool,
    client: Option<Client>,
    detector: ChallengeDetector,
    challenge_timeout: Duration,
    shutdown: CancellationToken,
}

impl WebDriverFetcher {
    pub fn new(webdriver_url: &str, headless: bool, challenge_timeout: Duration) -> Self {
        Self {
            webdriver_url: webdriver_url.to_string(),
            headless,
            client: None,
            detector: ChallengeDetector::default(),
            challenge_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    /// Abandon in-page waits when `shutdown` fires
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Use a custom challenge classifier
    pub fn with_detector(mut self, detector: ChallengeDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Connects to the WebDriver instance
    async fn connect(&self) -> Result<Client, FetchError> {
        let mut builder = ClientBuilder::native();
        if self.headless {
            let mut caps = serde_json::Map::new();
            caps.insert(
                "goog:chromeOptions".to_string(),
                serde_json::json!({
                    "args": ["--headless=new", "--disable-gpu", "--no-sandbox", "--window-size=1920,1080"]
                }),
            );
            builder.capabilities(caps);
        }

        match builder.connect(&self.webdriver_url).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", self.webdriver_url);
                Ok(client)
            }
            Err(e) => {
                ::log::error!(
                    "Failed to connect to WebDriver at {}: {}",
                    self.webdriver_url,
                    e
                );
                ::log::error!(
                    "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
                );
                Err(FetchError::Startup(e.to_string()))
            }
        }
    }

    /// Lazily initialize the WebDriver client
    async fn client(&mut self) -> Result<&Client, FetchError> {
        if self.client.is_none() {
            ::log::debug!("Connecting to WebDriver");
            self.client = Some(self.connect().await?);
        }
        self.client
            .as_ref()
            .ok_or_else(|| FetchError::Startup("no WebDriver client".to_string()))
    }

    async fn load(&mut self, url: &str) -> Result<FetchOutcome, FetchError> {
        let detector = self.detector.clone();
        let challenge_timeout = self.challenge_timeout;
        let shutdown = self.shutdown.clone();
        let client = self.client().await?;

        if let Err(e) = client.goto(url).await {
            return handle_navigation_error(e, "accessing", url);
        }

        let (title, mut source) = match snapshot(client).await {
            Ok(snap) => snap,
            Err(e) => return handle_navigation_error(e, "getting source for", url),
        };

        if detector.is_challenge(&title, &source) {
            ::log::info!("Challenge page detected, waiting up to {:?}", challenge_timeout);
            match wait_for_challenge(client, &detector, challenge_timeout, &shutdown).await {
                Some(cleared) => source = cleared,
                None if shutdown.is_cancelled() => return Ok(interrupted()),
                None => {
                    ::log::warn!("Challenge did not clear within {:?}", challenge_timeout);
                    return Ok(FetchOutcome::Challenge);
                }
            }
        }

        if !source.contains(COMMENT_MARKER) {
            if comments::page_not_found(&source) {
                return Ok(FetchOutcome::NotFound);
            }

            ::log::warn!("Comment list not rendered yet, waiting {:?}", RENDER_GRACE);
            if !pause(&shutdown, RENDER_GRACE).await {
                return Ok(interrupted());
            }
            source = match client.source().await {
                Ok(source) => source,
                Err(e) => return handle_navigation_error(e, "getting source for", url),
            };
            if !source.contains(COMMENT_MARKER) {
                return Ok(FetchOutcome::TransientError(
                    "comment list did not render".to_string(),
                ));
            }
        }

        Ok(FetchOutcome::Content(source))
    }
}

#[async_trait]
impl Fetcher for WebDriverFetcher {
    async fn fetch(&mut self, url: &str) -> Result<FetchOutcome, FetchError> {
        let started = Instant::now();
        ::log::debug!("FETCH: {}", url);

        let limit = self.challenge_timeout + FETCH_TIMEOUT_SLACK;
        let shutdown = self.shutdown.clone();
        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => Ok(interrupted()),
            loaded = timeout(limit, self.load(url)) => match loaded {
                Ok(outcome) => outcome,
                Err(_) => {
                    ::log::error!("Timeout fetching: {}", url);
                    Ok(FetchOutcome::TransientError(format!("timed out after {:?}", limit)))
                }
            },
        };

        ::log::debug!(
            "Fetched {} in {:.2} seconds",
            url,
            started.elapsed().as_secs_f64()
        );
        outcome
    }

    async fn restart(&mut self) -> Result<(), FetchError> {
        ::log::warn!("Restarting WebDriver session");
        self.shutdown().await;
        self.client = Some(self.connect().await?);
        ::log::info!("WebDriver session restarted");
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close WebDriver client: {}", e);
            }
        }
    }
}

fn interrupted() -> FetchOutcome {
    FetchOutcome::TransientError("shutdown requested".to_string())
}

async fn snapshot(client: &Client) -> Result<(String, String), fantoccini::error::CmdError> {
    let title = client.title().await?;
    let source = client.source().await?;
    Ok((title, source))
}

/// Polls until the challenge page is gone; returns the cleared source.
/// Gives up early on shutdown.
async fn wait_for_challenge(
    client: &Client,
    detector: &ChallengeDetector,
    limit: Duration,
    shutdown: &CancellationToken,
) -> Option<String> {
    let started = Instant::now();

    while started.elapsed() < limit {
        if !pause(shutdown, CHALLENGE_POLL).await {
            return None;
        }
        match snapshot(client).await {
            Ok((title, source)) if !detector.is_challenge(&title, &source) => {
                ::log::info!("Challenge cleared after {:?}", started.elapsed());
                return Some(source);
            }
            Ok(_) => {
                ::log::debug!("Challenge still showing ({:?})", started.elapsed());
            }
            Err(e) => {
                ::log::debug!("Challenge check failed: {}", e);
            }
        }
    }

    None
}

/// True if a WebDriver error means the browser session is gone
pub fn is_session_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("unable to find session")
        || message.contains("invalid session id")
        || message.contains("no such window")
        || message.contains("session not created")
}

/// Handles errors that occur during navigation or page source retrieval
fn handle_navigation_error(
    error: fantoccini::error::CmdError,
    context: &str,
    url: &str,
) -> Result<FetchOutcome, FetchError> {
    let message = error.to_string();
    if is_session_error(&message) {
        ::log::warn!("Lost session while {} {}", context, url);
        Err(FetchError::SessionLost(message))
    } else {
        ::log::error!("Failed {} {}: {}", context, url, message);
        Ok(FetchOutcome::TransientError(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_errors() {
        assert!(is_session_error(
            "webdriver returned error: Unable to find session with ID: 1234"
        ));
        assert!(is_session_error("invalid session id"));
        assert!(!is_session_error("timeout: Timed out receiving message"));
    }

    #[tokio::test]
    async fn test_fetch_returns_at_once_after_shutdown() {
        let token = CancellationToken::new();
        token.cancel();
        let mut fetcher =
            WebDriverFetcher::new("http://127.0.0.1:9", true, Duration::from_secs(30))
                .with_shutdown(token);

        let outcome = fetcher.fetch("https://forum.example/p1").await.unwrap();

        assert!(matches!(outcome, FetchOutcome::TransientError(_)));
        assert!(fetcher.client.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_without_session() {
        let mut fetcher =
            WebDriverFetcher::new("http://localhost:4444", true, Duration::from_secs(1));
        fetcher.shutdown().await;
        assert!(fetcher.client.is_none());
    }
}
