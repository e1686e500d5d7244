use crate::error::FetchError;
use crate::fetchers::Fetcher;
use crate::utils::pause;
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Changes the host's outbound network address
#[async_trait]
pub trait AddressRotator: Send + Sync {
    /// Returns status lines on success, a reason on failure
    async fn rotate(&self) -> Result<Vec<String>, String>;
}

/// Rotator used when no rotation command is configured
pub struct NoopRotator;

#[async_trait]
impl AddressRotator for NoopRotator {
    async fn rotate(&self) -> Result<Vec<String>, String> {
        Ok(vec!["no rotation command configured".to_string()])
    }
}

/// Runs an external program to rotate the address
pub struct CommandRotator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRotator {
    /// Parse a whitespace-separated command line; `None` if it is empty
    pub fn from_command_line(command: &str, timeout: Duration) -> Option<Self> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }
}

#[async_trait]
impl AddressRotator for CommandRotator {
    async fn rotate(&self) -> Result<Vec<String>, String> {
        let run = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(format!("failed to run {}: {}", self.program, e)),
            Err(_) => return Err(format!("{} timed out after {:?}", self.program, self.timeout)),
        };

        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}

/// Timing and thresholds for session recycling
#[derive(Debug, Clone)]
pub struct RecyclePolicy {
    /// Pages advanced past before a periodic recycle
    pub restart_interval: u32,
    /// Also rotate the address on periodic recycles
    pub rotate_on_recycle: bool,
    /// Pause between tearing down and re-creating the session
    pub recycle_pause: Duration,
    /// Pause after an escalated recycle
    pub settle_delay: Duration,
}

/// Owns the fetch session and decides when to recycle it
pub struct SessionHealth {
    fetcher: Box<dyn Fetcher>,
    rotator: Box<dyn AddressRotator>,
    policy: RecyclePolicy,
    shutdown: CancellationToken,
}

impl SessionHealth {
    pub fn new(
        fetcher: Box<dyn Fetcher>,
        rotator: Box<dyn AddressRotator>,
        policy: RecyclePolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            rotator,
            policy,
            shutdown,
        }
    }

    /// The live fetch session
    pub fn fetcher(&mut self) -> &mut dyn Fetcher {
        self.fetcher.as_mut()
    }

    /// Recycle if enough pages have been advanced past. Returns true if it did.
    pub async fn maybe_recycle(&mut self, pages_checked: &mut u32) -> Result<bool, FetchError> {
        // zero disables periodic recycling
        if self.policy.restart_interval == 0 || *pages_checked < self.policy.restart_interval {
            return Ok(false);
        }

        ::log::info!(
            "Checked {} pages since last recycle, recycling session",
            pages_checked
        );
        self.recycle(pages_checked).await?;
        if self.policy.rotate_on_recycle {
            self.rotate().await;
        }
        Ok(true)
    }

    /// Out-of-band recovery for a session that is locked out
    pub async fn recover(&mut self, pages_checked: &mut u32) -> Result<(), FetchError> {
        ::log::error!("Fetch session is locked out, recycling and rotating address");
        self.recycle(pages_checked).await?;
        self.rotate().await;
        pause(&self.shutdown, self.policy.settle_delay).await;
        ::log::info!("Recovery complete, resuming");
        Ok(())
    }

    /// Release the session before exit
    pub async fn shutdown(&mut self) {
        ::log::info!("Closing fetch session");
        self.fetcher.shutdown().await;
    }

    async fn recycle(&mut self, pages_checked: &mut u32) -> Result<(), FetchError> {
        self.fetcher.shutdown().await;
        pause(&self.shutdown, self.policy.recycle_pause).await;
        self.fetcher.restart().await?;
        *pages_checked = 0;
        ::log::info!("Session recycled");
        Ok(())
    }

    async fn rotate(&self) {
        ::log::info!("Rotating outbound address");
        match self.rotator.rotate().await {
            Ok(lines) => {
                ::log::info!("Address rotation succeeded");
                for line in lines {
                    ::log::info!("   {}", line);
                }
            }
            Err(reason) => ::log::warn!("Address rotation failed: {}", reason),
        }
    }
}
