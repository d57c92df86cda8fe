use std::fmt;
use std::time::Duration;

/// Main application configuration
///
/// Built once at startup and never modified afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server to keep powered on
    pub target: TargetConfig,
    /// GPIO line identifier (line name, `gpiochipN:OFFSET` or bare offset)
    pub gpio_pin: String,
    /// Transport and retry timing
    pub timeouts: TimeoutConfig,
}

/// The server and its management controller
#[derive(Clone, PartialEq, Eq)]
pub struct TargetConfig {
    /// URL that answers 200 once the service is up
    pub http_host: String,
    /// iDRAC address, optionally with `:port`
    pub idrac_host: String,
    pub idrac_user: String,
    pub idrac_pass: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("http_host", &self.http_host)
            .field("idrac_host", &self.idrac_host)
            .field("idrac_user", &self.idrac_user)
            .field("idrac_pass", &"<redacted>")
            .finish()
    }
}

/// Timeout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Per-request timeout of the HTTP liveness probe
    pub http: Duration,
    /// How long to wait for the iDRAC to answer pings
    pub reachability: Duration,
    /// libssh2 blocking timeout for connect and exec
    pub ssh: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            http: Duration::from_secs(10),
            reachability: Duration::from_secs(5 * 60),
            ssh: Duration::from_secs(30),
        }
    }
}
