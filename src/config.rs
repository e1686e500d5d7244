use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Transport used to fetch thread pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Browser automation through a WebDriver server
    WebDriver,
    /// Plain HTTP client with browser-like headers
    Http,
}

/// Configuration for the thread monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Thread URL prefix; the page number is appended to it
    #[serde(default = "default_thread_base_url")]
    pub thread_base_url: String,

    /// First page to watch
    #[serde(default = "default_start_page")]
    pub start_page: u32,

    /// Seconds between polls of the same page
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Lower bound of the jittered wait in seconds
    #[serde(default)]
    pub wait_min_secs: Option<u64>,

    /// Upper bound of the jittered wait in seconds
    #[serde(default)]
    pub wait_max_secs: Option<u64>,

    /// Username whose comments trigger notifications
    #[serde(default = "default_target_user")]
    pub target_user: String,

    /// Image URL a comment must embed to be reported
    #[serde(default = "default_required_marker")]
    pub required_marker: String,

    /// Skip comments that quote another comment
    #[serde(default = "default_true")]
    pub exclude_quoted: bool,

    /// Comment count at which a page is complete
    #[serde(default = "default_full_page_threshold")]
    pub full_page_threshold: usize,

    /// Fetch attempts per page acquisition
    #[serde(default = "default_max_page_retries")]
    pub max_page_retries: u32,

    /// Challenge failures tolerated on one page before it is abandoned
    #[serde(default = "default_max_challenge_fails")]
    pub max_challenge_fails: u32,

    /// Consecutive challenge-abandoned pages before the session is treated as locked
    #[serde(default = "default_max_abandoned_pages")]
    pub max_abandoned_pages: u32,

    /// Seconds to wait for a challenge page to clear
    #[serde(default = "default_challenge_timeout")]
    pub challenge_timeout_secs: u64,

    /// Pages advanced past before the fetch session is recycled
    #[serde(default = "default_restart_interval")]
    pub restart_interval: u32,

    /// Rotate the outbound address on every periodic recycle
    #[serde(default)]
    pub rotate_on_recycle: bool,

    /// Command that rotates the outbound network address
    #[serde(default)]
    pub rotate_command: Option<String>,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_challenge_retry_delay_ms")]
    pub challenge_retry_delay_ms: u64,

    /// Pause after an escalated recycle before resuming
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Pause between tearing down and re-creating a session
    #[serde(default = "default_recycle_pause_ms")]
    pub recycle_pause_ms: u64,

    /// Wait after a failed recycle
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    /// Random delay range before each HTTP request
    #[serde(default = "default_request_delay_min_ms")]
    pub request_delay_min_ms: u64,

    #[serde(default = "default_request_delay_max_ms")]
    pub request_delay_max_ms: u64,

    #[serde(default = "default_backend")]
    pub backend: Backend,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default)]
    pub headless: bool,

    #[serde(default)]
    pub telegram_bot_token: String,

    #[serde(default)]
    pub telegram_chat_id: String,

    #[serde(default = "default_telegram_api_base")]
    pub telegram_api_base: String,

    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,

    /// Body length cap in characters for a notification
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,

    /// Number of extracted links listed in a notification
    #[serde(default = "default_max_links_shown")]
    pub max_links_shown: usize,

    /// Optional log file kept alongside stderr output
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Size at which the log file rolls over
    #[serde(default = "default_log_max_bytes")]
    pub log_max_bytes: u64,

    /// Rolled-over log files kept next to the live one
    #[serde(default = "default_log_backups")]
    pub log_backups: usize,
}

fn default_thread_base_url() -> String {
    "https://lowendtalk.com/discussion/212154/2025-black-friday-cyber-monday-flash-sale-megathread-the-trade-war/p".to_string()
}

fn default_start_page() -> u32 {
    241
}

fn default_poll_interval() -> u64 {
    60
}

fn default_target_user() -> String {
    "FAT32".to_string()
}

fn default_required_marker() -> String {
    "https://lowendtalk.com/uploads/editor/jm/2b3rylu483wr.png".to_string()
}

fn default_true() -> bool {
    true
}

fn default_full_page_threshold() -> usize {
    30
}

fn default_max_page_retries() -> u32 {
    3
}

fn default_max_challenge_fails() -> u32 {
    3
}

fn default_max_abandoned_pages() -> u32 {
    2
}

fn default_challenge_timeout() -> u64 {
    30
}

fn default_restart_interval() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    10_000
}

fn default_challenge_retry_delay_ms() -> u64 {
    10_000
}

fn default_settle_delay_ms() -> u64 {
    5_000
}

fn default_recycle_pause_ms() -> u64 {
    2_000
}

fn default_error_backoff_ms() -> u64 {
    30_000
}

fn default_request_delay_min_ms() -> u64 {
    1_000
}

fn default_request_delay_max_ms() -> u64 {
    3_000
}

fn default_backend() -> Backend {
    Backend::WebDriver
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_notify_timeout() -> u64 {
    10
}

fn default_max_body_chars() -> usize {
    3000
}

fn default_max_links_shown() -> usize {
    10
}

fn default_log_max_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_log_backups() -> usize {
    3
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            thread_base_url: default_thread_base_url(),
            start_page: default_start_page(),
            poll_interval_secs: default_poll_interval(),
            wait_min_secs: None,
            wait_max_secs: None,
            target_user: default_target_user(),
            required_marker: default_required_marker(),
            exclude_quoted: true,
            full_page_threshold: default_full_page_threshold(),
            max_page_retries: default_max_page_retries(),
            max_challenge_fails: default_max_challenge_fails(),
            max_abandoned_pages: default_max_abandoned_pages(),
            challenge_timeout_secs: default_challenge_timeout(),
            restart_interval: default_restart_interval(),
            rotate_on_recycle: false,
            rotate_command: None,
            backoff_base_ms: default_backoff_base_ms(),
            challenge_retry_delay_ms: default_challenge_retry_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            recycle_pause_ms: default_recycle_pause_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            request_delay_min_ms: default_request_delay_min_ms(),
            request_delay_max_ms: default_request_delay_max_ms(),
            backend: default_backend(),
            webdriver_url: default_webdriver_url(),
            headless: false,
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            telegram_api_base: default_telegram_api_base(),
            notify_timeout_secs: default_notify_timeout(),
            max_body_chars: default_max_body_chars(),
            max_links_shown: default_max_links_shown(),
            log_file: None,
            log_max_bytes: default_log_max_bytes(),
            log_backups: default_log_backups(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Override fields from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Override fields from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram_bot_token = v;
        }
        if let Some(v) = get("TELEGRAM_CHAT_ID") {
            self.telegram_chat_id = v;
        }
        if let Some(v) = get("THREAD_BASE_URL") {
            self.thread_base_url = v;
        }
        if let Some(v) = get("TARGET_USER") {
            self.target_user = v;
        }
        if let Some(v) = get("REQUIRED_IMAGE_URL") {
            self.required_marker = v;
        }
        if let Some(v) = get("WEBDRIVER_URL") {
            self.webdriver_url = v;
        }
        if let Some(v) = get("ROTATE_COMMAND") {
            self.rotate_command = Some(v);
        }
        if let Some(v) = get("START_PAGE") {
            self.start_page = parse_var("START_PAGE", &v)?;
        }
        if let Some(v) = get("CHECK_INTERVAL") {
            self.poll_interval_secs = parse_var("CHECK_INTERVAL", &v)?;
        }
        if let Some(v) = get("WAIT_MIN") {
            self.wait_min_secs = Some(parse_var("WAIT_MIN", &v)?);
        }
        if let Some(v) = get("WAIT_MAX") {
            self.wait_max_secs = Some(parse_var("WAIT_MAX", &v)?);
        }
        if let Some(v) = get("MAX_PAGE_RETRIES") {
            self.max_page_retries = parse_var("MAX_PAGE_RETRIES", &v)?;
        }
        if let Some(v) = get("MAX_CF_FAILS") {
            self.max_challenge_fails = parse_var("MAX_CF_FAILS", &v)?;
        }
        if let Some(v) = get("CLOUDFLARE_TIMEOUT") {
            self.challenge_timeout_secs = parse_var("CLOUDFLARE_TIMEOUT", &v)?;
        }
        if let Some(v) = get("RESTART_INTERVAL") {
            self.restart_interval = parse_var("RESTART_INTERVAL", &v)?;
        }
        if let Some(v) = get("FULL_PAGE_THRESHOLD") {
            self.full_page_threshold = parse_var("FULL_PAGE_THRESHOLD", &v)?;
        }
        if let Some(v) = get("FILTER_BLOCKQUOTE") {
            self.exclude_quoted = parse_flag(&v);
        }
        if let Some(v) = get("HEADLESS") {
            self.headless = parse_flag(&v);
        }
        if let Some(v) = get("LOG_FILE") {
            self.log_file = Some(PathBuf::from(v));
        }

        Ok(())
    }

    /// Check the configuration before the monitor starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_bot_token.trim().is_empty() {
            return Err(ConfigError::Missing("TELEGRAM_BOT_TOKEN"));
        }
        if self.telegram_chat_id.trim().is_empty() {
            return Err(ConfigError::Missing("TELEGRAM_CHAT_ID"));
        }

        let base = Url::parse(&self.thread_base_url)
            .map_err(|e| ConfigError::invalid("thread_base_url", e.to_string()))?;
        if base.host_str().is_none() {
            return Err(ConfigError::invalid("thread_base_url", "missing host"));
        }

        if self.target_user.is_empty() {
            return Err(ConfigError::Missing("TARGET_USER"));
        }
        if self.max_page_retries == 0 {
            return Err(ConfigError::invalid("max_page_retries", "must be at least 1"));
        }
        if self.max_challenge_fails == 0 {
            return Err(ConfigError::invalid(
                "max_challenge_fails",
                "must be at least 1",
            ));
        }
        if self.full_page_threshold == 0 {
            return Err(ConfigError::invalid(
                "full_page_threshold",
                "must be at least 1",
            ));
        }
        if let (Some(min), Some(max)) = (self.wait_min_secs, self.wait_max_secs) {
            if min > max {
                return Err(ConfigError::invalid(
                    "wait_min_secs",
                    format!("{} exceeds wait_max_secs {}", min, max),
                ));
            }
        }
        if self.log_file.is_some() && self.log_max_bytes == 0 {
            return Err(ConfigError::invalid("log_max_bytes", "must be at least 1"));
        }
        if self.request_delay_min_ms > self.request_delay_max_ms {
            return Err(ConfigError::invalid(
                "request_delay_min_ms",
                "exceeds request_delay_max_ms",
            ));
        }

        Ok(())
    }

    /// URL of a given thread page
    pub fn page_url(&self, page: u32) -> String {
        format!("{}{}", self.thread_base_url, page)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Jitter bounds, present only when both ends are configured
    pub fn wait_range(&self) -> Option<(Duration, Duration)> {
        match (self.wait_min_secs, self.wait_max_secs) {
            (Some(min), Some(max)) => Some((Duration::from_secs(min), Duration::from_secs(max))),
            _ => None,
        }
    }

    pub fn challenge_timeout(&self) -> Duration {
        Duration::from_secs(self.challenge_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

fn parse_var<T: FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(field, e.to_string()))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}
