use std::time::Duration;

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GPIO pin not found: {0}")]
    PinNotFound(String),

    #[error("GPIO error: {0}")]
    Gpio(String),

    #[error("HTTP probe error: {0}")]
    Http(String),

    #[error("Ping error [{host}]: {reason}")]
    Ping { host: String, reason: String },

    #[error("Timed out waiting for ping response from {host} after {timeout:?}")]
    ReachabilityTimeout { host: String, timeout: Duration },

    #[error("Remote session to {host} failed: {reason}")]
    RemoteConnect { host: String, reason: String },

    #[error("Remote command '{command}' failed: {reason}")]
    RemoteExec { command: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<gpiocdev::Error> for AppError {
    fn from(err: gpiocdev::Error) -> Self {
        AppError::Gpio(err.to_string())
    }
}

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = AppError::ReachabilityTimeout {
            host: "10.0.0.20".to_string(),
            timeout: Duration::from_secs(300),
        };
        assert_eq!(
            err.to_string(),
            "Timed out waiting for ping response from 10.0.0.20 after 300s"
        );
    }

    #[test]
    fn test_error_messages() {
        let err = AppError::RemoteExec {
            command: "racadm getsysinfo".to_string(),
            reason: "channel closed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Remote command 'racadm getsysinfo' failed: channel closed"
        );
    }
}
