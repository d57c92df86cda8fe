//! Configuration loading
//!
//! Settings come from the process environment, optionally seeded from a `.env`
//! file. Variables already present in the environment win over the file.

mod schema;

pub use schema::{AppConfig, TargetConfig, TimeoutConfig};

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{AppError, Result};

/// Liveness URL of the target service
pub const HTTP_HOST: &str = "HTTP_HOST";
/// Management controller address
pub const IDRAC_HOST: &str = "IDRAC_HOST";
pub const IDRAC_USER: &str = "IDRAC_USER";
pub const IDRAC_PASS: &str = "IDRAC_PASS";
/// GPIO line to watch
pub const GPIO_PIN: &str = "GPIO_PIN";

pub const HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
pub const PING_TIMEOUT_SECS: &str = "PING_TIMEOUT_SECS";
pub const SSH_TIMEOUT_SECS: &str = "SSH_TIMEOUT_SECS";

/// Read `KEY=VALUE` pairs from an env file without touching the process environment
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let iter = dotenvy::from_path_iter(path).map_err(|e| {
        AppError::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| {
            AppError::Config(format!("Invalid line in {}: {}", path.display(), e))
        })?;
        vars.insert(key, value);
    }
    Ok(vars)
}

impl AppConfig {
    /// Build the configuration from an arbitrary key lookup
    ///
    /// Missing or empty required keys are reported by name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("Missing config param: {}", key)))
        };
        let seconds = |key: &str, default: Duration| -> Result<Duration> {
            match lookup(key).filter(|v| !v.trim().is_empty()) {
                Some(raw) => raw.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
                    AppError::Config(format!("{} must be a number of seconds, got {:?}", key, raw))
                }),
                None => Ok(default),
            }
        };

        let defaults = TimeoutConfig::default();
        Ok(Self {
            target: TargetConfig {
                http_host: required(HTTP_HOST)?,
                idrac_host: required(IDRAC_HOST)?,
                idrac_user: required(IDRAC_USER)?,
                idrac_pass: required(IDRAC_PASS)?,
            },
            gpio_pin: required(GPIO_PIN)?,
            timeouts: TimeoutConfig {
                http: seconds(HTTP_TIMEOUT_SECS, defaults.http)?,
                reachability: seconds(PING_TIMEOUT_SECS, defaults.reachability)?,
                ssh: seconds(SSH_TIMEOUT_SECS, defaults.ssh)?,
            },
        })
    }

    /// Load from the process environment, falling back to `env_file` entries
    ///
    /// A missing file is only an error when `required` is set.
    pub fn load(env_file: &Path, required: bool) -> Result<Self> {
        let file_vars = if env_file.exists() || required {
            let vars = read_env_file(env_file)?;
            info!("Loaded {} settings from {}", vars.len(), env_file.display());
            vars
        } else {
            debug!("No env file at {}, using environment only", env_file.display());
            HashMap::new()
        };

        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file_vars.get(key).cloned()))
    }
}
