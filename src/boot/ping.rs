//! ICMP reachability check

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};

/// Payload carried by each echo request
const PAYLOAD: [u8; 56] = [0; 56];

/// Round-trip statistics of a single echo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingStats {
    pub addr: IpAddr,
    pub rtt: Duration,
}

/// Sends one ICMP echo and waits for the reply
#[async_trait]
pub trait IcmpProbe: Send + Sync {
    /// Resolve `host` and ping it once
    ///
    /// Resolution failures and lost replies are both errors.
    async fn ping_once(&self, host: &str) -> Result<PingStats>;
}

/// surge-ping backed prober
#[derive(Debug, Default)]
pub struct SurgePinger;

impl SurgePinger {
    pub fn new() -> Self {
        Self
    }
}

/// Resolve a host name or literal address, ignoring any `:port` suffix
async fn resolve(host: &str) -> Result<IpAddr> {
    let bare = strip_port(host);
    if let Ok(addr) = bare.parse::<IpAddr>() {
        return Ok(addr);
    }

    tokio::net::lookup_host((bare, 0))
        .await
        .map_err(|e| AppError::Ping {
            host: host.to_string(),
            reason: format!("resolve failed: {}", e),
        })?
        .map(|sock| sock.ip())
        .next()
        .ok_or_else(|| AppError::Ping {
            host: host.to_string(),
            reason: "no addresses".to_string(),
        })
}

fn strip_port(host: &str) -> &str {
    if host.parse::<IpAddr>().is_ok() {
        return host;
    }
    if let Some(inner) = host.strip_prefix('[') {
        return inner.split(']').next().unwrap_or(inner);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.parse::<u16>().is_ok() && !name.contains(':') => name,
        _ => host,
    }
}

#[async_trait]
impl IcmpProbe for SurgePinger {
    async fn ping_once(&self, host: &str) -> Result<PingStats> {
        let addr = resolve(host).await?;
        let (_packet, rtt) = surge_ping::ping(addr, &PAYLOAD)
            .await
            .map_err(|e| AppError::Ping {
                host: host.to_string(),
                reason: e.to_string(),
            })?;
        Ok(PingStats { addr, rtt })
    }
}
