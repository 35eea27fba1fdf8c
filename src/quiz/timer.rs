use std::fmt;
use std::time::{Duration, Instant};

/// Limit applied when a quiz has no time limit of its own.
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 30 * 60;

/// Monotonic time source, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Count-down timer for one quiz attempt.
///
/// Time only accrues while the timer runs. The owner polls `is_expired` and
/// decides what expiry means.
#[derive(Debug, Clone)]
pub struct QuizTimer<C: Clock = SystemClock> {
    clock: C,
    limit: Duration,
    accumulated: Duration,
    started_at: Option<Instant>,
}

impl QuizTimer<SystemClock> {
    pub fn new(limit_secs: u64) -> Self {
        Self::with_clock(limit_secs, SystemClock)
    }
}

impl<C: Clock> QuizTimer<C> {
    pub fn with_clock(limit_secs: u64, clock: C) -> Self {
        Self {
            clock,
            limit: Duration::from_secs(limit_secs),
            accumulated: Duration::ZERO,
            started_at: None,
        }
    }

    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(self.clock.now());
        }
    }

    pub fn pause(&mut self) {
        if let Some(started_at) = self.started_at.take() {
            self.accumulated += self.clock.now().saturating_duration_since(started_at);
        }
    }

    /// Stops the timer and clears elapsed time, optionally with a new limit.
    pub fn reset(&mut self, new_limit_secs: Option<u64>) {
        self.started_at = None;
        self.accumulated = Duration::ZERO;
        if let Some(limit) = new_limit_secs {
            self.limit = Duration::from_secs(limit);
        }
    }

    /// Continues an attempt that already used `time_spent_secs`.
    pub fn resume_from(&mut self, time_spent_secs: u64) {
        self.accumulated = Duration::from_secs(time_spent_secs);
        if self.started_at.is_some() {
            self.started_at = Some(self.clock.now());
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn limit_secs(&self) -> u64 {
        self.limit.as_secs()
    }

    pub fn elapsed(&self) -> Duration {
        let running = self
            .started_at
            .map(|started_at| self.clock.now().saturating_duration_since(started_at))
            .unwrap_or_default();
        self.accumulated + running
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed().as_secs()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.limit.saturating_sub(self.elapsed()).as_secs()
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.limit
    }

    /// Remaining time as `m:ss`.
    pub fn formatted(&self) -> String {
        RemainingTime(self.remaining_secs()).to_string()
    }
}

struct RemainingTime(u64);

impl fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.0 / 60, self.0 % 60)
    }
}

#[cfg(test)]
pub(crate) mod test_clock {
    use super::Clock;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// Clock that only moves when told to.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        base: Instant,
        offset_ms: Arc<AtomicU64>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                base: Instant::now(),
                offset_ms: Arc::new(AtomicU64::new(0)),
            }
        }

        pub fn advance(&self, by: Duration) {
            self.offset_ms
                .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_clock::ManualClock;
    use super::*;

    #[test]
    fn counts_down_while_running() {
        let clock = ManualClock::new();
        let mut timer = QuizTimer::with_clock(90, clock.clone());
        timer.start();
        clock.advance(Duration::from_secs(25));

        assert_eq!(timer.elapsed_secs(), 25);
        assert_eq!(timer.remaining_secs(), 65);
        assert_eq!(timer.formatted(), "1:05");
        assert!(!timer.is_expired());
    }

    #[test]
    fn pause_stops_the_clock() {
        let clock = ManualClock::new();
        let mut timer = QuizTimer::with_clock(60, clock.clone());
        timer.start();
        clock.advance(Duration::from_secs(10));
        timer.pause();
        clock.advance(Duration::from_secs(100));

        assert_eq!(timer.elapsed_secs(), 10);
        assert!(!timer.is_running());
    }

    #[test]
    fn expires_at_zero_remaining() {
        let clock = ManualClock::new();
        let mut timer = QuizTimer::with_clock(30, clock.clone());
        timer.start();
        clock.advance(Duration::from_secs(45));

        assert!(timer.is_expired());
        assert_eq!(timer.remaining_secs(), 0);
        assert_eq!(timer.formatted(), "0:00");
    }

    #[test]
    fn resume_subtracts_time_already_spent() {
        let clock = ManualClock::new();
        let mut timer = QuizTimer::with_clock(DEFAULT_TIME_LIMIT_SECS, clock.clone());
        timer.start();
        timer.resume_from(1_000);

        assert_eq!(timer.remaining_secs(), 800);
        clock.advance(Duration::from_secs(800));
        assert!(timer.is_expired());
    }

    #[test]
    fn reset_clears_elapsed_and_changes_limit() {
        let clock = ManualClock::new();
        let mut timer = QuizTimer::with_clock(60, clock.clone());
        timer.start();
        clock.advance(Duration::from_secs(59));
        timer.reset(Some(120));

        assert_eq!(timer.elapsed_secs(), 0);
        assert_eq!(timer.limit_secs(), 120);
        assert_eq!(timer.formatted(), "2:00");
    }
}
