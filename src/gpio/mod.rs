//! GPIO input capability
//!
//! The watcher only needs two operations from the hardware: block until the
//! line changes level, and read the current level. [`EdgePin`] is that
//! capability; [`CdevPin`] implements it on the Linux GPIO character device.
//!
//! Pins are resolved once at startup:
//!
//! ```ignore
//! use edge_boot::gpio::{self, Bias, EdgeDetect};
//!
//! let line = gpio::lookup("GPIO17")?;
//! let mut pin = line.configure_input(Bias::PullDown, EdgeDetect::Both)?;
//! pin.wait_for_edge(None).await?;
//! let level = pin.read()?;
//! ```

mod cdev;

pub use cdev::{lookup, CdevPin, GpioLine, PinSpec};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Electrical level of a digital input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
    High,
    Low,
}

impl PinLevel {
    /// Map a raw line value (0 or 1) to a level
    pub fn from_raw(value: u8) -> Self {
        if value == 0 {
            Self::Low
        } else {
            Self::High
        }
    }
}

impl fmt::Display for PinLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinLevel::High => write!(f, "High"),
            PinLevel::Low => write!(f, "Low"),
        }
    }
}

/// Internal resistor bias for an input line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bias {
    #[default]
    PullDown,
    PullUp,
    Disabled,
}

/// Which transitions generate edge events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeDetect {
    Rising,
    Falling,
    #[default]
    Both,
}

/// A configured input pin with edge detection
#[async_trait]
pub trait EdgePin: Send {
    /// Block until the line reports an edge
    ///
    /// Returns `false` when `timeout` elapsed without an edge. `None` waits forever.
    async fn wait_for_edge(&mut self, timeout: Option<Duration>) -> Result<bool>;

    /// Sample the current level
    fn read(&self) -> Result<PinLevel>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_raw() {
        assert_eq!(PinLevel::from_raw(0), PinLevel::Low);
        assert_eq!(PinLevel::from_raw(1), PinLevel::High);
    }

    #[test]
    fn test_defaults_match_doorbell_wiring() {
        assert_eq!(Bias::default(), Bias::PullDown);
        assert_eq!(EdgeDetect::default(), EdgeDetect::Both);
        assert_eq!(PinLevel::Low.to_string(), "Low");
    }
}
