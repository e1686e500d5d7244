use crate::error::FetchError;
use async_trait::async_trait;

/// Classified result of fetching one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Page markup
    Content(String),
    /// The server reported the page does not exist
    NotFound,
    /// An anti-automation interstitial was served instead of the page
    Challenge,
    /// Network hiccup, unexpected status, or a page that did not render
    TransientError(String),
}

/// A transport able to fetch thread pages.
///
/// Implementations own their session. `fetch` returns `Err` only when the
/// session itself is unusable; per-request problems are reported through
/// [`FetchOutcome`].
#[async_trait]
pub trait Fetcher: Send {
    /// Fetch a URL and classify the result
    async fn fetch(&mut self, url: &str) -> Result<FetchOutcome, FetchError>;

    /// Tear down the current session and start a fresh one
    async fn restart(&mut self) -> Result<(), FetchError>;

    /// Release the session before exit
    async fn shutdown(&mut self);
}
