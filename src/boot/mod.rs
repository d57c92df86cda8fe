//! Boot orchestration
//!
//! Makes sure the target server is running when the watcher fires. The
//! orchestrator talks to three external transports, each behind a trait so
//! the pipeline can run against in-memory fakes:
//!
//! - [`HttpProbe`]: liveness check of the served application
//! - [`IcmpProbe`]: reachability of the iDRAC
//! - [`RemoteShell`]: racadm over SSH for power state and power-up
//!
//! # Example
//!
//! ```ignore
//! use edge_boot::boot::BootOrchestrator;
//!
//! let orchestrator = BootOrchestrator::from_config(&config.timeouts)?;
//! match orchestrator.ensure_booted(&config.target).await? {
//!     BootOutcome::AlreadyRunning => {}
//!     outcome => tracing::info!("{}", outcome),
//! }
//! ```

mod orchestrator;
mod ping;
mod probe;
mod remote;
mod types;

pub use orchestrator::{timing, BootOrchestrator, BootTrigger};
pub use ping::{IcmpProbe, PingStats, SurgePinger};
pub use probe::{HttpProbe, ReqwestProbe};
pub use remote::{with_default_port, RemoteSession, RemoteShell, SshSession, SshShell};
pub use types::{commands, parse_power_state, BootOutcome, PowerState};
