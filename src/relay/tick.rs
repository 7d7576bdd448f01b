use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

/// Capture tick; deliberately not phase-locked to the 20ms codec frame
pub const DEFAULT_TICK: Duration = Duration::from_millis(15);

/// Retry interval while waiting on a contended lock
const LOCK_RETRY: Duration = Duration::from_millis(1);

/// Fixed-period execution budget.
///
/// Work that finishes early sleeps out the rest of the tick. Work that
/// overruns starts the next tick immediately with no catch-up, so a late
/// tick stretches the real spacing between frames.
#[derive(Debug)]
pub struct TickScheduler {
    period: Duration,
    overruns: u64,
}

impl TickScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            overruns: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks whose work took longer than the period
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Time left in a tick after `elapsed` of work, `None` once over budget.
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        self.period
            .checked_sub(elapsed)
            .filter(|left| !left.is_zero())
    }

    /// Sleep out the tick that started at `started`. Returns the time slept.
    pub fn finish_tick(&mut self, started: Instant) -> Duration {
        match self.remaining(started.elapsed()) {
            Some(left) => {
                thread::sleep(left);
                left
            }
            None => {
                self.overruns += 1;
                Duration::ZERO
            }
        }
    }

    /// Run `work` inside one tick.
    pub fn run_tick<T>(&mut self, work: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = work();
        self.finish_tick(started);
        result
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

/// Acquire `mutex` within `timeout`, or give up and return `None`.
///
/// A poisoned lock is still handed out: the guarded data is a handle slot
/// that stays consistent even if a holder panicked.
pub fn lock_within<T>(mutex: &Mutex<T>, timeout: Duration) -> Option<MutexGuard<'_, T>> {
    let deadline = Instant::now() + timeout;
    loop {
        match mutex.try_lock() {
            Ok(guard) => return Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        thread::sleep(LOCK_RETRY.min(deadline - now));
    }
}

/// Poll `ready` every `tick` until it returns true or `timeout` passes.
///
/// Returns how many tick sleeps it took, or `None` on timeout.
pub async fn poll_until(
    tick: Duration,
    timeout: Duration,
    mut ready: impl FnMut() -> bool,
) -> Option<u32> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut intervals = 0u32;

    loop {
        if ready() {
            return Some(intervals);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(tick).await;
        intervals += 1;
    }
}
