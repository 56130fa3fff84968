// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic clocks, stopwatches, periodic timers and countdowns.
//!
//! Everything reads time through a [`TimeSource`], so tests drive a [`ManualClock`] instead of
//! sleeping. Only monotonicity is guaranteed for [`SystemClock`].

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A monotonic microsecond clock.
pub trait TimeSource {
    /// Microseconds since an arbitrary fixed origin.
    fn now_us(&self) -> u64;

    /// Blocks (or advances, for test clocks) for `us` microseconds.
    fn sleep_us(&self, us: u64);
}

fn process_origin() -> Instant {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    *ORIGIN.get_or_init(Instant::now)
}

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

/// Host monotonic clock measured from process start.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now_us(&self) -> u64 {
        micros(process_origin().elapsed())
    }

    fn sleep_us(&self, us: u64) {
        std::thread::sleep(Duration::from_micros(us));
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// A clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward.
    pub fn advance_ms(&self, ms: u64) {
        self.now.fetch_add(ms.saturating_mul(1000), Ordering::Relaxed);
    }
}

impl TimeSource for ManualClock {
    fn now_us(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }

    fn sleep_us(&self, us: u64) {
        self.now.fetch_add(us, Ordering::Relaxed);
    }
}

/// Milliseconds on the process monotonic clock.
#[must_use]
pub fn clock_ticks_ms() -> i64 {
    clock_ticks_us() / 1000
}

/// Microseconds on the process monotonic clock.
#[must_use]
pub fn clock_ticks_us() -> i64 {
    i64::try_from(SystemClock.now_us()).unwrap_or(i64::MAX)
}

/// Sleeps the current thread. Negative durations return immediately.
pub fn sleep_ms(ms: i64) {
    if let Ok(ms) = u64::try_from(ms) {
        SystemClock.sleep_us(ms.saturating_mul(1000));
    }
}

/// Accumulating stopwatch: elapsed time survives stop/start cycles until reset.
#[derive(Clone, Debug)]
pub struct Stopwatch<C: TimeSource = SystemClock> {
    clock: C,
    accumulated_us: u64,
    started_at: Option<u64>,
}

impl Stopwatch {
    /// A stopped stopwatch on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: TimeSource> Stopwatch<C> {
    /// A stopped stopwatch reading `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            accumulated_us: 0,
            started_at: None,
        }
    }

    /// Starts timing; no-op when already running.
    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(self.clock.now_us());
        }
    }

    /// Stops timing and folds the running interval into the total.
    pub fn stop(&mut self) {
        if let Some(t0) = self.started_at.take() {
            self.accumulated_us += self.clock.now_us().saturating_sub(t0);
        }
    }

    /// Stops and zeroes.
    pub fn reset(&mut self) {
        self.accumulated_us = 0;
        self.started_at = None;
    }

    /// Zeroes and starts again.
    pub fn restart(&mut self) {
        self.reset();
        self.start();
    }

    /// Returns `true` while running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Total elapsed microseconds.
    #[must_use]
    pub fn elapsed_us(&self) -> u64 {
        let running = self
            .started_at
            .map_or(0, |t0| self.clock.now_us().saturating_sub(t0));
        self.accumulated_us + running
    }

    /// Total elapsed milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_us() / 1000
    }
}

/// Periodic timer polled by the program.
#[derive(Clone, Debug)]
pub struct Timer<C: TimeSource = SystemClock> {
    clock: C,
    period_us: u64,
    next_us: u64,
}

impl Timer {
    /// A timer on the system clock firing every `period_ms`.
    #[must_use]
    pub fn new(period_ms: u64) -> Self {
        Self::with_clock(SystemClock, period_ms)
    }
}

impl<C: TimeSource> Timer<C> {
    /// A timer reading `clock`, first firing one period from now.
    pub fn with_clock(clock: C, period_ms: u64) -> Self {
        let period_us = period_ms.saturating_mul(1000);
        let next_us = clock.now_us().saturating_add(period_us);
        Self {
            clock,
            period_us,
            next_us,
        }
    }

    /// Number of periods that elapsed since the previous poll. A zero period never fires.
    pub fn poll(&mut self) -> u64 {
        if self.period_us == 0 {
            return 0;
        }
        let now = self.clock.now_us();
        if now < self.next_us {
            return 0;
        }
        let fired = (now - self.next_us) / self.period_us + 1;
        self.next_us += fired * self.period_us;
        fired
    }

    /// Restarts the period from now.
    pub fn reset(&mut self) {
        self.next_us = self.clock.now_us().saturating_add(self.period_us);
    }
}

/// A stopwatch with a target interval.
#[derive(Clone, Debug)]
pub struct Countdown<C: TimeSource = SystemClock> {
    watch: Stopwatch<C>,
    interval_ms: u64,
}

impl Countdown {
    /// A stopped countdown on the system clock.
    #[must_use]
    pub fn new(interval_ms: u64) -> Self {
        Self::with_clock(SystemClock, interval_ms)
    }
}

impl<C: TimeSource> Countdown<C> {
    /// A stopped countdown reading `clock`.
    pub fn with_clock(clock: C, interval_ms: u64) -> Self {
        Self {
            watch: Stopwatch::with_clock(clock),
            interval_ms,
        }
    }

    /// Starts or resumes.
    pub fn start(&mut self) {
        self.watch.start();
    }

    /// Pauses.
    pub fn stop(&mut self) {
        self.watch.stop();
    }

    /// Stops and clears elapsed time.
    pub fn reset(&mut self) {
        self.watch.reset();
    }

    /// Returns `true` while running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.watch.is_running()
    }

    /// Elapsed milliseconds.
    #[must_use]
    pub fn elapsed(&self) -> u64 {
        self.watch.elapsed_ms()
    }

    /// Milliseconds left, saturating at zero.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.interval_ms.saturating_sub(self.elapsed())
    }

    /// Returns `true` once elapsed time reaches the interval.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.elapsed() >= self.interval_ms
    }

    /// Target interval in milliseconds.
    #[must_use]
    pub fn interval(&self) -> u64 {
        self.interval_ms
    }

    /// Changes the target interval.
    pub fn set_interval(&mut self, ms: u64) {
        self.interval_ms = ms;
    }

    /// Blocks until expired, starting the countdown if needed.
    pub fn wait(&mut self) {
        self.start();
        let left_us = self
            .interval_ms
            .saturating_mul(1000)
            .saturating_sub(self.watch.elapsed_us());
        if left_us > 0 {
            self.watch.clock.sleep_us(left_us);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopwatch_accumulates_across_cycles() {
        let clock = ManualClock::new();
        let mut sw = Stopwatch::with_clock(clock.clone());
        sw.start();
        clock.advance_ms(30);
        sw.stop();
        clock.advance_ms(100);
        assert_eq!(sw.elapsed_ms(), 30, "stopped time is not counted");
        sw.start();
        clock.advance_ms(12);
        assert!(sw.is_running());
        assert_eq!(sw.elapsed_ms(), 42);
        sw.restart();
        assert_eq!(sw.elapsed_ms(), 0);
        sw.reset();
        assert!(!sw.is_running());
    }

    #[test]
    fn timer_reports_missed_periods() {
        let clock = ManualClock::new();
        let mut t = Timer::with_clock(clock.clone(), 10);
        assert_eq!(t.poll(), 0);
        clock.advance_ms(10);
        assert_eq!(t.poll(), 1);
        clock.advance_ms(35);
        assert_eq!(t.poll(), 3);
        assert_eq!(t.poll(), 0);
        t.reset();
        clock.advance_ms(9);
        assert_eq!(t.poll(), 0);
    }

    #[test]
    fn countdown_expires_and_waits() {
        let clock = ManualClock::new();
        let mut cd = Countdown::with_clock(clock.clone(), 50);
        cd.start();
        clock.advance_ms(20);
        assert_eq!(cd.remaining(), 30);
        assert!(!cd.expired());
        cd.wait();
        assert!(cd.expired());
        assert_eq!(cd.remaining(), 0);
        cd.set_interval(80);
        assert_eq!(cd.interval(), 80);
        assert!(!cd.expired());
        cd.reset();
        assert_eq!(cd.elapsed(), 0);
    }

    #[test]
    fn system_ticks_are_monotonic() {
        let a = clock_ticks_us();
        let b = clock_ticks_us();
        assert!(b >= a);
        assert!(clock_ticks_ms() >= 0);
    }
}
