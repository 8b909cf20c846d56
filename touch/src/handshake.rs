//! Result storage shared with an asynchronous monitor.
//!
//! The per-channel counts are written by the acquisition loop and may be read at any
//! time by a monitor that runs outside of it: a host tool reading RAM through the
//! debug port, or an interrupt handler. Neither side is an OS thread, so instead of a
//! lock the two sides run Peterson's two-flag handshake over atomics. The monitor can
//! use [`SharedResults::try_inspect`], which gives up instead of waiting, because an
//! interrupt can never wait for the code it preempted.

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Acquisition = 0,
    Monitor = 1,
}

impl Side {
    fn other(self) -> Self {
        match self {
            Side::Acquisition => Side::Monitor,
            Side::Monitor => Side::Acquisition,
        }
    }
}

pub struct Handshake {
    busy: [AtomicBool; 2],
    turn: AtomicU8,
}

impl Handshake {
    pub const fn new() -> Self {
        Self {
            busy: [AtomicBool::new(false), AtomicBool::new(false)],
            turn: AtomicU8::new(0),
        }
    }

    /// Enter the critical section for `side`, spinning while the other side is inside.
    pub fn acquire(&self, side: Side) {
        let other = side.other();
        self.announce(side);
        while self.contended(other) {
            spin_loop();
        }
    }

    /// Enter the critical section for `side` if the other side is not inside or waiting.
    ///
    /// Returns false if the section was not entered. The flag for `side` is cleared
    /// again, but `turn` is left pointing at the other side.
    pub fn try_acquire(&self, side: Side) -> bool {
        let other = side.other();
        self.announce(side);
        if self.contended(other) {
            self.busy[side as usize].store(false, Ordering::SeqCst);
            false
        } else {
            true
        }
    }

    pub fn release(&self, side: Side) {
        self.busy[side as usize].store(false, Ordering::SeqCst);
    }

    /// True while `side` has announced itself, whether waiting or inside
    pub fn is_busy(&self, side: Side) -> bool {
        self.busy[side as usize].load(Ordering::SeqCst)
    }

    /// Side that yields when both are contending
    pub fn turn(&self) -> Side {
        if self.turn.load(Ordering::SeqCst) == Side::Acquisition as u8 {
            Side::Acquisition
        } else {
            Side::Monitor
        }
    }

    fn announce(&self, side: Side) {
        self.busy[side as usize].store(true, Ordering::SeqCst);
        self.turn.store(side.other() as u8, Ordering::SeqCst);
    }

    fn contended(&self, other: Side) -> bool {
        self.busy[other as usize].load(Ordering::SeqCst)
            && self.turn.load(Ordering::SeqCst) == other as u8
    }
}

/// Releases the handshake when dropped
struct Held<'a> {
    handshake: &'a Handshake,
    side: Side,
}

impl Drop for Held<'_> {
    fn drop(&mut self) {
        self.handshake.release(self.side);
    }
}

/// Per-channel counts of the latest acquisitions, guarded by a [`Handshake`].
///
/// Closures passed to these methods must not call back into the same storage.
pub struct SharedResults<const N: usize> {
    handshake: Handshake,
    counts: UnsafeCell<[u16; N]>,
}

// SAFETY: every access to `counts` happens with the handshake held for one side, and
// each side is a single execution context.
unsafe impl<const N: usize> Sync for SharedResults<N> {}

impl<const N: usize> SharedResults<N> {
    pub const fn new() -> Self {
        Self {
            handshake: Handshake::new(),
            counts: UnsafeCell::new([0; N]),
        }
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Write counts from the acquisition side
    pub fn update<R>(&self, f: impl FnOnce(&mut [u16]) -> R) -> R {
        let _held = self.hold(Side::Acquisition);
        // SAFETY: the monitor is excluded while the handshake is held
        f(unsafe { &mut *self.counts.get() })
    }

    /// Read counts from the acquisition side
    pub fn read<R>(&self, f: impl FnOnce(&[u16]) -> R) -> R {
        let _held = self.hold(Side::Acquisition);
        // SAFETY: as in `update`
        f(unsafe { &*self.counts.get() })
    }

    /// Read counts from the monitor side, waiting for the acquisition side to finish
    pub fn inspect<R>(&self, f: impl FnOnce(&[u16]) -> R) -> R {
        let _held = self.hold(Side::Monitor);
        // SAFETY: the acquisition side is excluded while the handshake is held
        f(unsafe { &*self.counts.get() })
    }

    /// Read counts from the monitor side unless the acquisition side is using them
    pub fn try_inspect<R>(&self, f: impl FnOnce(&[u16]) -> R) -> Option<R> {
        if !self.handshake.try_acquire(Side::Monitor) {
            return None;
        }
        let _held = Held { handshake: &self.handshake, side: Side::Monitor };
        // SAFETY: as in `inspect`
        Some(f(unsafe { &*self.counts.get() }))
    }

    fn hold(&self, side: Side) -> Held<'_> {
        self.handshake.acquire(side);
        Held { handshake: &self.handshake, side }
    }
}
