//! Signal Watcher
//!
//! Turns the raw edge notifications of one input pin into logical trigger
//! events. An edge only counts when the sampled level differs from the
//! previous sample; a transition to Low calls the [`TriggerHandler`]. Every
//! accepted transition is followed by a debounce pause, and edges arriving
//! during the pause or during the handler are coalesced into the next read.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{error, info, trace};

use crate::error::Result;
use crate::gpio::{EdgePin, PinLevel};

/// Pause after each accepted transition
pub const DEBOUNCE: Duration = Duration::from_secs(1);

/// Receives one call per falling transition
///
/// The watcher awaits the call, so no new edges are observed until it returns.
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn on_trigger(&self) -> Result<()>;
}

/// Tracks the last sampled level and reports real changes
#[derive(Debug, Clone, Copy)]
pub struct EdgeFilter {
    last: PinLevel,
}

impl EdgeFilter {
    pub fn new(initial: PinLevel) -> Self {
        Self { last: initial }
    }

    pub fn last(&self) -> PinLevel {
        self.last
    }

    /// Record a sample, returning it if it differs from the previous one
    pub fn observe(&mut self, level: PinLevel) -> Option<PinLevel> {
        if level == self.last {
            return None;
        }
        self.last = level;
        Some(level)
    }
}

/// Edge loop over a configured pin
pub struct SignalWatcher<P> {
    pin: P,
    debounce: Duration,
}

impl<P: EdgePin> SignalWatcher<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            debounce: DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Watch the pin forever
    ///
    /// Handler failures are logged and the loop continues. Only a GPIO error
    /// ends the loop.
    pub async fn run<H>(&mut self, handler: &H) -> Result<()>
    where
        H: TriggerHandler + ?Sized,
    {
        let mut filter = EdgeFilter::new(self.pin.read()?);
        info!("Watching for edges, initial level {}", filter.last());

        loop {
            self.pin.wait_for_edge(None).await?;
            let sampled = self.pin.read()?;
            let Some(level) = filter.observe(sampled) else {
                trace!("Edge without level change ({}), ignoring", sampled);
                continue;
            };

            info!("triggered {} {}", level, chrono::Local::now().to_rfc3339());
            if level == PinLevel::Low {
                if let Err(e) = handler.on_trigger().await {
                    error!("Boot attempt failed: {}", e);
                }
            }

            sleep(self.debounce).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    use crate::gpio::PinLevel::{High, Low};

    /// Pin driven by a timeline of level changes
    ///
    /// Changes that happened while nobody was waiting are applied together,
    /// like the kernel event queue followed by a single read.
    struct ScriptedPin {
        start: Instant,
        level: PinLevel,
        changes: VecDeque<(Duration, PinLevel)>,
    }

    impl ScriptedPin {
        fn new(initial: PinLevel, changes: &[(u64, PinLevel)]) -> Self {
            Self {
                start: Instant::now(),
                level: initial,
                changes: changes
                    .iter()
                    .map(|&(ms, level)| (Duration::from_millis(ms), level))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl EdgePin for ScriptedPin {
        async fn wait_for_edge(&mut self, _timeout: Option<Duration>) -> Result<bool> {
            let Some(&(at, _)) = self.changes.front() else {
                return Err(AppError::Gpio("script exhausted".to_string()));
            };
            tokio::time::sleep_until(self.start + at).await;
            let now = Instant::now();
            while let Some(&(at, level)) = self.changes.front() {
                if self.start + at > now {
                    break;
                }
                self.level = level;
                self.changes.pop_front();
            }
            Ok(true)
        }

        fn read(&self) -> Result<PinLevel> {
            Ok(self.level)
        }
    }

    #[derive(Default)]
    struct RecordingHandler {
        triggered_at: Mutex<Vec<Instant>>,
        busy_for: Duration,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl TriggerHandler for RecordingHandler {
        async fn on_trigger(&self) -> Result<()> {
            self.triggered_at.lock().unwrap().push(Instant::now());
            sleep(self.busy_for).await;
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(AppError::RemoteConnect {
                    host: "idrac".to_string(),
                    reason: "refused".to_string(),
                });
            }
            Ok(())
        }
    }

    impl RecordingHandler {
        fn times(&self) -> Vec<Instant> {
            self.triggered_at.lock().unwrap().clone()
        }
    }

    fn reference_triggers(initial: PinLevel, reads: &[PinLevel]) -> usize {
        let mut prev = initial;
        let mut count = 0;
        for &read in reads {
            if read != prev && read == Low {
                count += 1;
            }
            prev = read;
        }
        count
    }

    #[test]
    fn test_filter_reports_changes_only() {
        let mut filter = EdgeFilter::new(High);
        assert_eq!(filter.observe(High), None);
        assert_eq!(filter.observe(Low), Some(Low));
        assert_eq!(filter.observe(Low), None);
        assert_eq!(filter.observe(High), Some(High));
        assert_eq!(filter.last(), High);
    }

    #[test]
    fn test_filter_matches_trigger_rule_for_all_short_sequences() {
        for initial in [High, Low] {
            for len in 0..=8u32 {
                for bits in 0..(1u32 << len) {
                    let reads: Vec<PinLevel> = (0..len)
                        .map(|i| if bits & (1 << i) == 0 { Low } else { High })
                        .collect();

                    let mut filter = EdgeFilter::new(initial);
                    let emitted = reads
                        .iter()
                        .filter_map(|&r| filter.observe(r))
                        .filter(|&l| l == Low)
                        .count();
                    assert_eq!(emitted, reference_triggers(initial, &reads), "{:?}", reads);
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_falling_edge_triggers_once() {
        let pin = ScriptedPin::new(High, &[(100, Low), (5_000, High)]);
        let handler = RecordingHandler::default();
        let start = Instant::now();

        let err = SignalWatcher::new(pin).run(&handler).await.unwrap_err();
        assert!(matches!(err, AppError::Gpio(_)));

        let times = handler.times();
        assert_eq!(times.len(), 1);
        assert_eq!(times[0] - start, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounce_within_debounce_is_ignored() {
        let pin = ScriptedPin::new(
            High,
            &[
                (100, Low),
                (300, High),
                (500, Low),
                (5_000, High),
                (6_000, Low),
            ],
        );
        let handler = RecordingHandler::default();

        let _ = SignalWatcher::new(pin).run(&handler).await;

        let times = handler.times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= DEBOUNCE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_trigger_within_debounce_window() {
        // A clean release and press 200ms apart still waits out the debounce
        let pin = ScriptedPin::new(High, &[(100, Low), (1_200, High), (1_400, Low)]);
        let handler = RecordingHandler::default();

        let _ = SignalWatcher::new(pin).run(&handler).await;

        let times = handler.times();
        assert_eq!(times.len(), 2);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rising_edges_never_trigger() {
        let pin = ScriptedPin::new(Low, &[(100, High), (3_000, High), (6_000, High)]);
        let handler = RecordingHandler::default();

        let _ = SignalWatcher::new(pin).run(&handler).await;
        assert!(handler.times().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_failure_keeps_watching() {
        let pin = ScriptedPin::new(
            High,
            &[(100, Low), (3_000, High), (6_000, Low), (9_000, High)],
        );
        let handler = RecordingHandler {
            failures: AtomicUsize::new(1),
            ..Default::default()
        };

        let _ = SignalWatcher::new(pin).run(&handler).await;
        assert_eq!(handler.times().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edges_during_handler_are_coalesced() {
        // Presses while a 60s boot attempt runs are not queued as triggers
        let pin = ScriptedPin::new(
            High,
            &[
                (100, Low),
                (10_000, High),
                (20_000, Low),
                (30_000, High),
                (40_000, Low),
                (90_000, High),
            ],
        );
        let handler = RecordingHandler {
            busy_for: Duration::from_secs(60),
            ..Default::default()
        };

        let _ = SignalWatcher::new(pin).run(&handler).await;
        assert_eq!(handler.times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_debounce() {
        let pin = ScriptedPin::new(High, &[(100, Low), (400, High), (700, Low)]);
        let handler = RecordingHandler::default();

        let _ = SignalWatcher::new(pin)
            .with_debounce(Duration::from_millis(100))
            .run(&handler)
            .await;
        assert_eq!(handler.times().len(), 2);
    }
}
