//! Log throttling utility
//!
//! Limits how often the same log message is recorded while a retry loop
//! keeps failing the same way.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

struct Entry {
    last_logged: Instant,
    suppressed: u32,
}

/// Log throttler that limits how often the same message is logged
///
/// Uses the tokio clock so throttling follows paused time in tests.
///
/// # Example
///
/// ```ignore
/// let mut throttler = LogThrottler::new(Duration::from_secs(10));
///
/// // First occurrence is always logged
/// assert_eq!(throttler.check("timeout"), Some(0));
///
/// // Repeats within the interval are counted, not logged
/// assert_eq!(throttler.check("timeout"), None);
/// ```
pub struct LogThrottler {
    entries: HashMap<String, Entry>,
    interval: Duration,
}

impl LogThrottler {
    /// Create a new log throttler with the specified interval
    pub fn new(interval: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            interval,
        }
    }

    /// Create a new log throttler with interval specified in seconds
    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Check whether a message should be logged now
    ///
    /// Returns `Some(n)` when it should, where `n` is how many repeats were
    /// suppressed since it was last logged, and `None` when it is throttled.
    pub fn check(&mut self, key: &str) -> Option<u32> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get_mut(key) {
            if now.duration_since(entry.last_logged) < self.interval {
                entry.suppressed += 1;
                return None;
            }
            entry.last_logged = now;
            return Some(std::mem::take(&mut entry.suppressed));
        }

        self.entries.insert(
            key.to_string(),
            Entry {
                last_logged: now,
                suppressed: 0,
            },
        );
        Some(0)
    }
}

impl Default for LogThrottler {
    /// Create a default log throttler with 10 second interval
    fn default() -> Self {
        Self::with_secs(10)
    }
}
