//! Millisecond tick source and interval checks for the recalibration cadence.

use core::sync::atomic::{AtomicU32, Ordering};

/// A free-running millisecond counter. Wraps at `u32::MAX`.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

/// A tick counter bumped from the SysTick handler
impl Clock for AtomicU32 {
    fn now_ms(&self) -> u32 {
        self.load(Ordering::Relaxed)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// Check whether `interval_ms` has passed since `*last`, and if so move `*last` to `now`.
pub fn interval_elapsed(now: u32, interval_ms: u32, last: &mut u32) -> bool {
    if now.wrapping_sub(*last) >= interval_ms {
        *last = now;
        true
    } else {
        false
    }
}

/// A periodic deadline which is only moved forward when asked to.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug)]
pub struct Interval {
    period_ms: u32,
    last: u32,
}

impl Interval {
    pub const fn new(period_ms: u32, start: u32) -> Self {
        Self { period_ms, last: start }
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Tick at which the interval last fired
    pub fn last(&self) -> u32 {
        self.last
    }

    /// True if a full period has passed since the last restart. Does not restart.
    pub fn elapsed(&self, now: u32) -> bool {
        now.wrapping_sub(self.last) >= self.period_ms
    }

    /// Check and restart in one step
    pub fn check(&mut self, now: u32) -> bool {
        interval_elapsed(now, self.period_ms, &mut self.last)
    }

    pub fn restart(&mut self, now: u32) {
        self.last = now;
    }
}
