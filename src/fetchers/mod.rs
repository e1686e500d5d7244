pub mod challenge;
pub mod fetcher;
pub mod http;
pub mod webdriver;

pub use challenge::ChallengeDetector;
pub use fetcher::{FetchOutcome, Fetcher};
pub use http::HttpFetcher;
pub use webdriver::WebDriverFetcher;

use crate::config::{Backend, MonitorConfig};
use crate::error::FetchError;
use tokio_util::sync::CancellationToken;

/// Build the fetcher selected by the configuration
pub fn from_config(
    config: &MonitorConfig,
    shutdown: CancellationToken,
) -> Result<Box<dyn Fetcher>, FetchError> {
    match config.backend {
        Backend::WebDriver => {
            ::log::info!("Using WebDriver backend at {}", config.webdriver_url);
            Ok(Box::new(
                WebDriverFetcher::new(
                    &config.webdriver_url,
                    config.headless,
                    config.challenge_timeout(),
                )
                .with_shutdown(shutdown),
            ))
        }
        Backend::Http => {
            ::log::info!("Using HTTP backend");
            let fetcher = HttpFetcher::new(config.challenge_timeout())?
                .with_request_delay(config.request_delay_min_ms, config.request_delay_max_ms)
                .with_shutdown(shutdown);
            Ok(Box::new(fetcher))
        }
    }
}
