use crate::acquire::{AcquireError, PageAcquirer, RetryPolicy};
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::fetchers::{self, Fetcher};
use crate::filter::{CommentFilter, CommentFilterConfig};
use crate::notify::{DispatchReport, Dispatcher, MessageFormat, Notifier, TelegramNotifier};
use crate::pagination::{Pagination, Transition};
use crate::results::{AbandonCause, PageResult, PageStatus};
use crate::session::{AddressRotator, CommandRotator, NoopRotator, RecyclePolicy, SessionHealth};
use crate::utils::{pause, wait_duration};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timeout for the address rotation command
const ROTATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Mutable state of one monitor run
#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    /// Page being watched
    pub current_page: u32,

    /// Ids of comments already delivered
    pub seen_ids: HashSet<String>,

    /// Pages advanced past since the last session recycle
    pub pages_checked_since_recycle: u32,

    /// Challenge failures on `current_page`
    pub challenge_fail_count: u32,

    /// Pages abandoned in a row because of challenges
    pub consecutive_challenge_abandons: u32,
}

impl MonitorState {
    pub fn new(start_page: u32) -> Self {
        Self {
            current_page: start_page,
            ..Self::default()
        }
    }

    /// Move to a new page, clearing per-page counters
    pub fn move_to(&mut self, page: u32) {
        if page != self.current_page {
            self.current_page = page;
            self.challenge_fail_count = 0;
        }
    }
}

/// Result of one polling iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The page was checked
    Checked {
        transition: Transition,
        report: DispatchReport,
        wait: Duration,
    },
    /// The fetch session was recovered after a lock-out
    Recovered { wait: Duration },
    /// Shutdown was requested
    Stopped,
}

/// Polls a thread for new comments by one author
pub struct Monitor {
    config: MonitorConfig,
    acquirer: PageAcquirer,
    pagination: Pagination,
    dispatcher: Dispatcher,
    session: SessionHealth,
    shutdown: CancellationToken,
}

impl Monitor {
    /// Build a monitor with the backends named in the configuration
    pub fn from_config(
        config: MonitorConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, MonitorError> {
        config.validate()?;

        let fetcher = fetchers::from_config(&config, shutdown.clone())?;
        let notifier = TelegramNotifier::new(
            &config.telegram_api_base,
            &config.telegram_bot_token,
            &config.telegram_chat_id,
            config.notify_timeout(),
        )
        .map_err(|e| crate::error::ConfigError::invalid("telegram", e.to_string()))?;

        let rotator: Box<dyn AddressRotator> = match config
            .rotate_command
            .as_deref()
            .and_then(|cmd| CommandRotator::from_command_line(cmd, ROTATE_TIMEOUT))
        {
            Some(rotator) => Box::new(rotator),
            None => Box::new(NoopRotator),
        };

        Self::new(config, fetcher, Box::new(notifier), rotator, shutdown)
    }

    /// Build a monitor from explicit collaborators
    pub fn new(
        config: MonitorConfig,
        fetcher: Box<dyn Fetcher>,
        notifier: Box<dyn Notifier>,
        rotator: Box<dyn AddressRotator>,
        shutdown: CancellationToken,
    ) -> Result<Self, MonitorError> {
        config.validate()?;

        let filter = CommentFilter::new(CommentFilterConfig {
            target_author: config.target_user.clone(),
            required_marker: config.required_marker.clone(),
            exclude_quoted: config.exclude_quoted,
        });

        let acquirer = PageAcquirer::new(
            RetryPolicy {
                max_attempts: config.max_page_retries,
                max_challenge_fails: config.max_challenge_fails,
                challenge_retry_delay: Duration::from_millis(config.challenge_retry_delay_ms),
                backoff_base: Duration::from_millis(config.backoff_base_ms),
            },
            filter,
            shutdown.clone(),
        );

        let dispatcher = Dispatcher::new(
            notifier,
            MessageFormat {
                target_user: config.target_user.clone(),
                max_body_chars: config.max_body_chars,
                max_links_shown: config.max_links_shown,
            },
        );

        let session = SessionHealth::new(
            fetcher,
            rotator,
            RecyclePolicy {
                restart_interval: config.restart_interval,
                rotate_on_recycle: config.rotate_on_recycle,
                recycle_pause: Duration::from_millis(config.recycle_pause_ms),
                settle_delay: Duration::from_millis(config.settle_delay_ms),
            },
            shutdown.clone(),
        );

        Ok(Self {
            pagination: Pagination::new(config.full_page_threshold),
            config,
            acquirer,
            dispatcher,
            session,
            shutdown,
        })
    }

    /// Initial state for a run starting at `start_page`, or the configured one
    pub fn initial_state(&self, start_page: Option<u32>) -> MonitorState {
        MonitorState::new(start_page.unwrap_or(self.config.start_page))
    }

    /// Poll until shutdown is requested, then close the fetch session
    pub async fn run(&mut self, state: &mut MonitorState) {
        ::log::info!("Starting monitor at page {}", state.current_page);
        ::log::info!("Target user: {}", self.config.target_user);
        ::log::info!("Poll interval: {}s", self.config.poll_interval_secs);

        loop {
            let wait = match self.poll_once(state).await {
                Step::Checked { wait, .. } | Step::Recovered { wait } => wait,
                Step::Stopped => break,
            };

            ::log::info!("Next check of page {} in {:?}", state.current_page, wait);
            if !pause(&self.shutdown, wait).await {
                break;
            }
        }

        ::log::info!("Shutdown requested, stopping monitor");
        self.session.shutdown().await;
        ::log::info!("Monitor stopped");
    }

    /// Run one iteration: acquire, notify, decide the next page
    pub async fn poll_once(&mut self, state: &mut MonitorState) -> Step {
        if self.shutdown.is_cancelled() {
            return Step::Stopped;
        }

        let page = state.current_page;
        let page_url = self.config.page_url(page);
        ::log::info!("Checking page {}", page);

        let result = match self
            .acquirer
            .acquire(
                self.session.fetcher(),
                page,
                &page_url,
                &mut state.challenge_fail_count,
            )
            .await
        {
            Ok(result) => result,
            Err(AcquireError::Cancelled) => return Step::Stopped,
            Err(AcquireError::Session(e)) => {
                ::log::error!("Fetch session failed on page {}: {}", page, e);
                return self.recover(state).await;
            }
        };

        let report = self.deliver(page, &result, state).await;

        // any other outcome breaks the streak
        if result.status == PageStatus::Abandoned(AbandonCause::Challenge) {
            state.consecutive_challenge_abandons += 1;
        } else {
            state.consecutive_challenge_abandons = 0;
        }

        let transition = self.pagination.next(page, &result);
        let wait = match transition {
            Transition::Advance { to, .. } => {
                state.move_to(to);
                state.pages_checked_since_recycle += 1;

                if self.config.max_abandoned_pages > 0
                    && state.consecutive_challenge_abandons >= self.config.max_abandoned_pages
                {
                    ::log::error!(
                        "{} pages in a row abandoned on challenges",
                        state.consecutive_challenge_abandons
                    );
                    return self.recover(state).await;
                }

                if let Err(e) = self
                    .session
                    .maybe_recycle(&mut state.pages_checked_since_recycle)
                    .await
                {
                    ::log::error!("Session recycle failed: {}", e);
                    return Step::Recovered {
                        wait: self.error_backoff(),
                    };
                }
                self.config.poll_interval()
            }
            Transition::Hold { .. } | Transition::WaitNotCreated { .. } => {
                wait_duration(self.config.poll_interval(), self.config.wait_range())
            }
        };

        Step::Checked {
            transition,
            report,
            wait,
        }
    }

    /// Check a single page without sending notifications
    pub async fn check_once(&mut self, page: u32) -> Result<PageResult, MonitorError> {
        let page_url = self.config.page_url(page);
        let mut challenge_fails = 0;

        match self
            .acquirer
            .acquire(self.session.fetcher(), page, &page_url, &mut challenge_fails)
            .await
        {
            Ok(result) => {
                self.session.shutdown().await;
                Ok(result)
            }
            Err(AcquireError::Cancelled) => {
                self.session.shutdown().await;
                Ok(PageResult::abandoned(AbandonCause::Exhausted))
            }
            Err(AcquireError::Session(e)) => {
                self.session.shutdown().await;
                Err(e.into())
            }
        }
    }

    async fn deliver(
        &self,
        page: u32,
        result: &PageResult,
        state: &mut MonitorState,
    ) -> DispatchReport {
        if result.comments.is_empty() {
            if result.status == PageStatus::Ok {
                ::log::info!("No matching comments on page {}", page);
            }
            return DispatchReport::default();
        }

        ::log::info!(
            "Found {} matching comments on page {}",
            result.comments.len(),
            page
        );
        self.dispatcher
            .notify(&result.comments, &mut state.seen_ids)
            .await
    }

    async fn recover(&mut self, state: &mut MonitorState) -> Step {
        match self
            .session
            .recover(&mut state.pages_checked_since_recycle)
            .await
        {
            Ok(()) => {
                state.challenge_fail_count = 0;
                state.consecutive_challenge_abandons = 0;
                Step::Recovered {
                    wait: Duration::ZERO,
                }
            }
            Err(e) => {
                ::log::error!("Session recovery failed: {}", e);
                Step::Recovered {
                    wait: self.error_backoff(),
                }
            }
        }
    }

    fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.config.error_backoff_ms)
    }
}
