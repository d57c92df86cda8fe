//! Boot data types and the iDRAC system-info parser

use std::fmt;

/// Fixed racadm commands issued over the remote session
pub mod commands {
    /// Prints system information, including a `Power Status` line
    pub const GET_SYSINFO: &str = "racadm getsysinfo";

    /// Powers the server on
    pub const POWER_UP: &str = "racadm serveraction powerup";
}

const POWER_STATUS_PREFIX: &[u8] = b"Power Status";

/// Server power state as reported by the management controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    /// Power is on
    On,
    /// Power is off
    Off,
    /// No `Power Status` line in the output
    #[default]
    Unknown,
}

impl PowerState {
    /// Whether a power-up command should be sent
    ///
    /// Unknown is treated as Off.
    pub fn needs_power_on(self) -> bool {
        !matches!(self, PowerState::On)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::On => write!(f, "on"),
            PowerState::Off => write!(f, "off"),
            PowerState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Parse `racadm getsysinfo` output
///
/// The first line starting with `Power Status` decides: On if it contains
/// `ON`, otherwise Off.
pub fn parse_power_state(output: &[u8]) -> PowerState {
    output
        .split(|&b| b == b'\n')
        .find(|line| line.starts_with(POWER_STATUS_PREFIX))
        .map(|line| {
            if line.windows(2).any(|w| w == b"ON") {
                PowerState::On
            } else {
                PowerState::Off
            }
        })
        .unwrap_or(PowerState::Unknown)
}

/// Successful terminal states of a boot attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// The liveness URL already answered 200
    AlreadyRunning,
    /// The iDRAC reported the server as on
    AlreadyOn,
    /// A power-up command was issued
    PoweredOn,
}

impl fmt::Display for BootOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootOutcome::AlreadyRunning => write!(f, "already running"),
            BootOutcome::AlreadyOn => write!(f, "already powered on"),
            BootOutcome::PoweredOn => write!(f, "powered on"),
        }
    }
}
