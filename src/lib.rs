//! edge-boot - power on a server when a GPIO line is pulled low
//!
//! A [`watcher::SignalWatcher`] waits for falling edges on one input pin and
//! hands each one to a [`boot::BootOrchestrator`], which checks the target's
//! HTTP endpoint and, if it is down, powers the server on through its iDRAC.

pub mod boot;
pub mod config;
pub mod error;
pub mod gpio;
pub mod utils;
pub mod watcher;

pub use error::{AppError, Result};
