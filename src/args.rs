use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use thread_watch::Backend;

#[derive(Parser, Debug)]
#[command(name = "thread-watch")]
#[command(about = "Watches a forum thread and forwards new comments by one author to Telegram")]
#[command(version)]
pub struct Args {
    /// JSON configuration file, overlaid by environment variables
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Page to start watching from
    #[arg(short, long)]
    pub start_page: Option<u32>,

    /// Fetch backend (webdriver, http)
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendArg>,

    /// Check one page once and print the matches, without notifying
    #[arg(long)]
    pub test: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Webdriver,
    Http,
}

/// Convert from CLI argument backend to the configured backend
pub fn convert_backend(arg: Option<BackendArg>) -> Option<Backend> {
    arg.map(|arg| match arg {
        BackendArg::Webdriver => Backend::WebDriver,
        BackendArg::Http => Backend::Http,
    })
}
