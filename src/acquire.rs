use crate::error::FetchError;
use crate::fetchers::{FetchOutcome, Fetcher};
use crate::filter::CommentFilter;
use crate::parsers::{self, Extraction};
use crate::results::{AbandonCause, PageResult};
use crate::utils::pause;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Reasons an acquisition stops without a page result
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The fetch session is unusable and must be recycled
    #[error(transparent)]
    Session(#[from] FetchError),
    #[error("shutdown requested")]
    Cancelled,
}

/// Retry budget for one page acquisition
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Fetch attempts per acquisition
    pub max_attempts: u32,
    /// Challenge failures on one page before it is abandoned
    pub max_challenge_fails: u32,
    /// Fixed wait after a challenge
    pub challenge_retry_delay: Duration,
    /// Linear backoff step after a transient failure
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Wait before the next attempt after transient failure number `attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

/// Fetches a page with retries, then extracts and filters its comments
pub struct PageAcquirer {
    policy: RetryPolicy,
    filter: CommentFilter,
    shutdown: CancellationToken,
}

impl PageAcquirer {
    pub fn new(policy: RetryPolicy, filter: CommentFilter, shutdown: CancellationToken) -> Self {
        Self {
            policy,
            filter,
            shutdown,
        }
    }

    /// Acquire one page.
    ///
    /// `challenge_fails` is the running challenge count for this page; it is
    /// reset on success and left untouched by a not-found outcome.
    pub async fn acquire(
        &self,
        fetcher: &mut dyn Fetcher,
        page: u32,
        page_url: &str,
        challenge_fails: &mut u32,
    ) -> Result<PageResult, AcquireError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut cause = AbandonCause::Exhausted;

        for attempt in 1..=max_attempts {
            if self.shutdown.is_cancelled() {
                return Err(AcquireError::Cancelled);
            }

            if attempt > 1 {
                ::log::info!("Attempt {}/{} for page {}", attempt, max_attempts, page);
            } else {
                ::log::info!("Loading page {}: {}", page, page_url);
            }

            let outcome = fetcher.fetch(page_url).await?;
            // an interrupted fetch says nothing about the page
            if self.shutdown.is_cancelled() {
                return Err(AcquireError::Cancelled);
            }

            let wait = match outcome {
                FetchOutcome::Content(html) => {
                    return Ok(self.on_content(&html, page, page_url, challenge_fails));
                }
                FetchOutcome::NotFound => {
                    ::log::info!("Page {} not created yet", page);
                    return Ok(PageResult::not_yet_created());
                }
                FetchOutcome::Challenge => {
                    *challenge_fails += 1;
                    cause = AbandonCause::Challenge;
                    ::log::warn!(
                        "Challenge on page {} ({}/{})",
                        page,
                        challenge_fails,
                        self.policy.max_challenge_fails
                    );

                    if *challenge_fails >= self.policy.max_challenge_fails {
                        ::log::error!(
                            "Page {} failed {} challenges, abandoning it",
                            page,
                            challenge_fails
                        );
                        return Ok(PageResult::abandoned(AbandonCause::Challenge));
                    }
                    self.policy.challenge_retry_delay
                }
                FetchOutcome::TransientError(detail) => {
                    cause = AbandonCause::Exhausted;
                    ::log::warn!(
                        "Attempt {}/{} for page {} failed: {}",
                        attempt,
                        max_attempts,
                        page,
                        detail
                    );
                    self.policy.backoff(attempt)
                }
            };

            if attempt < max_attempts {
                ::log::info!("Retrying page {} in {:?}", page, wait);
                if !pause(&self.shutdown, wait).await {
                    return Err(AcquireError::Cancelled);
                }
            }
        }

        ::log::error!(
            "Page {} not loaded after {} attempts, abandoning it",
            page,
            max_attempts
        );
        Ok(PageResult::abandoned(cause))
    }

    fn on_content(
        &self,
        html: &str,
        page: u32,
        page_url: &str,
        challenge_fails: &mut u32,
    ) -> PageResult {
        match parsers::extract(html) {
            Extraction::NotFound => {
                ::log::info!("Page {} shows the not-found view", page);
                PageResult::not_yet_created()
            }
            Extraction::Page {
                candidates,
                total_on_page,
            } => {
                if *challenge_fails > 0 {
                    ::log::info!(
                        "Page {} loaded, clearing {} challenge failures",
                        page,
                        challenge_fails
                    );
                }
                *challenge_fails = 0;

                let comments = self.filter.filter(&candidates, page, page_url);
                PageResult::ok(comments, total_on_page)
            }
        }
    }
}
