//! Boot Orchestrator
//!
//! Runs one check-and-recover pass against the target:
//! HTTP liveness → iDRAC ping → SSH session → power state → power-up.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use super::ping::{IcmpProbe, PingStats, SurgePinger};
use super::probe::{HttpProbe, ReqwestProbe};
use super::remote::{RemoteSession, RemoteShell, SshShell};
use super::types::{commands, parse_power_state, BootOutcome, PowerState};
use crate::config::{TargetConfig, TimeoutConfig};
use crate::error::{AppError, Result};
use crate::utils::LogThrottler;
use crate::watcher::TriggerHandler;

/// Timing constants for the reachability poll
pub mod timing {
    use std::time::Duration;

    /// Give up on the iDRAC after this long without a ping reply
    pub const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

    /// Pause after each failed ping
    pub const PING_RETRY_INTERVAL: Duration = Duration::from_secs(1);
}

/// Drives a single boot attempt through the external transports
pub struct BootOrchestrator {
    http: Box<dyn HttpProbe>,
    icmp: Box<dyn IcmpProbe>,
    remote: Box<dyn RemoteShell>,
    reachability_timeout: Duration,
    retry_interval: Duration,
}

impl BootOrchestrator {
    /// Create an orchestrator over the given transports with default timing
    pub fn new(
        http: Box<dyn HttpProbe>,
        icmp: Box<dyn IcmpProbe>,
        remote: Box<dyn RemoteShell>,
    ) -> Self {
        Self {
            http,
            icmp,
            remote,
            reachability_timeout: timing::REACHABILITY_TIMEOUT,
            retry_interval: timing::PING_RETRY_INTERVAL,
        }
    }

    /// Create an orchestrator with the production transports
    pub fn from_config(timeouts: &TimeoutConfig) -> Result<Self> {
        Ok(Self::new(
            Box::new(ReqwestProbe::new(timeouts.http)?),
            Box::new(SurgePinger::new()),
            Box::new(SshShell::new(timeouts.ssh)),
        )
        .with_reachability_timeout(timeouts.reachability))
    }

    pub fn with_reachability_timeout(mut self, timeout: Duration) -> Self {
        self.reachability_timeout = timeout;
        self
    }

    /// Make sure the target is up, powering it on through the iDRAC if needed
    ///
    /// Never sends a power-up without a ping reply from the iDRAC and a
    /// power state other than On.
    pub async fn ensure_booted(&self, target: &TargetConfig) -> Result<BootOutcome> {
        if self.is_live(&target.http_host).await {
            info!("{} already running", target.http_host);
            return Ok(BootOutcome::AlreadyRunning);
        }

        self.wait_reachable(&target.idrac_host).await?;

        let mut session = self
            .remote
            .connect(&target.idrac_host, &target.idrac_user, &target.idrac_pass)
            .await?;
        debug!("Remote session to {} open", target.idrac_host);

        let result = self.power_on_if_off(session.as_mut()).await;
        session.close().await;
        result
    }

    async fn is_live(&self, url: &str) -> bool {
        match self.http.get_status(url).await {
            Ok(200) => true,
            Ok(status) => {
                info!("Liveness probe {} returned status {}", url, status);
                false
            }
            Err(e) => {
                info!("No http response from {}; error: {} (expected)", url, e);
                false
            }
        }
    }

    async fn wait_reachable(&self, host: &str) -> Result<PingStats> {
        let started = Instant::now();
        let mut throttler = LogThrottler::default();
        let mut attempts: u32 = 0;

        loop {
            if started.elapsed() > self.reachability_timeout {
                warn!(
                    "Timed out waiting for ping response from {} after {} attempts",
                    host, attempts
                );
                return Err(AppError::ReachabilityTimeout {
                    host: host.to_string(),
                    timeout: self.reachability_timeout,
                });
            }

            attempts += 1;
            match self.icmp.ping_once(host).await {
                Ok(stats) => {
                    info!(
                        "ping statistics: {} ({}) replied in {:?} after {} attempts, {:?} elapsed",
                        host,
                        stats.addr,
                        stats.rtt,
                        attempts,
                        started.elapsed()
                    );
                    return Ok(stats);
                }
                Err(e) => {
                    let message = e.to_string();
                    match throttler.check(&message) {
                        Some(0) => info!(
                            "No ping response; error: {}, waiting {:?}",
                            message, self.retry_interval
                        ),
                        Some(suppressed) => info!(
                            "No ping response; error: {} ({} similar suppressed), waiting {:?}",
                            message, suppressed, self.retry_interval
                        ),
                        None => {}
                    }
                    sleep(self.retry_interval).await;
                }
            }
        }
    }

    async fn power_on_if_off(&self, session: &mut dyn RemoteSession) -> Result<BootOutcome> {
        let output = session.exec(commands::GET_SYSINFO).await?;
        let state = parse_power_state(&output);
        debug!("Parsed power state: {}", state);

        match state {
            PowerState::On => {
                info!("Already powered on");
                return Ok(BootOutcome::AlreadyOn);
            }
            PowerState::Unknown => {
                warn!("No Power Status line in sysinfo output, assuming powered off");
            }
            PowerState::Off => {}
        }

        info!("Powering on");
        if let Err(e) = session.exec(commands::POWER_UP).await {
            error!("Power-up command failed: {}", e);
            return Err(e);
        }
        info!("Power-up command accepted");
        Ok(BootOutcome::PoweredOn)
    }
}

/// Runs a boot attempt for a fixed target on every trigger
pub struct BootTrigger {
    orchestrator: BootOrchestrator,
    target: TargetConfig,
}

impl BootTrigger {
    pub fn new(orchestrator: BootOrchestrator, target: TargetConfig) -> Self {
        Self {
            orchestrator,
            target,
        }
    }

    pub async fn run_once(&self) -> Result<BootOutcome> {
        self.orchestrator.ensure_booted(&self.target).await
    }
}

#[async_trait]
impl TriggerHandler for BootTrigger {
    async fn on_trigger(&self) -> Result<()> {
        let outcome = self.run_once().await?;
        info!("Boot attempt finished: {}", outcome);
        Ok(())
    }
}
