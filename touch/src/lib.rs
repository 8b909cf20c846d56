#![cfg_attr(not(test), no_std)]

//! Non-blocking capacitive touch acquisition.
//!
//! The acquisition hardware is walked one bank at a time by a
//! [`sequencer::BankSequencer`]. Once every bank of a cycle has been collected the
//! [`coordinator::Coordinator`] hands the results to the touch objects and, on a
//! slower cadence, lets them recalibrate. Nothing here ever waits on hardware: every
//! call does a bounded amount of work and returns.

pub mod bank;
pub mod button;
pub mod coordinator;
pub mod error;
pub mod group;
pub mod handshake;
pub mod linear;
pub mod object;
pub mod sequencer;
pub mod timer;
#[cfg(any(feature = "stm32f0x1", feature = "stm32f303"))]
pub mod tsc;

pub use coordinator::{Coordinator, CoordinatorConfig, Status};
pub use error::Error;

/// Enumeration of touch activity states
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchState {
    Startup(u16),
    Calibrate(u16),
    Idle(u16),
    Active,
}

/// Configuration structure for all touch inputs
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug)]
pub struct TouchConfig {
    /// The number of counts of delta capacitance required to active the button
    pub detect_threshold: u16,
    /// The hysteresis in deactivation. Once active, counts must fall below `detect_threshold -
    /// detect_hysteresis` in order to deactivate.
    pub detect_hysteresis: u16,
    /// Number of samples to wait after initialization before starting calibration
    pub calibration_delay: u16,
    /// Number of sample to collect for reference level calibration
    pub calibration_samples: u16,
    /// Number of positive samples required to transition to Active state
    pub debounce: u16,
    /// Weight, out of 256, given to the latest measurement when the reference is
    /// tracked during recalibration. 0 freezes the reference.
    pub ecs_weight: u16,
}

impl TouchConfig {
    pub const fn default() -> Self {
        Self {
            detect_threshold: 100,
            detect_hysteresis: 5,
            calibration_delay: 10,
            calibration_samples: 16,
            debounce: 2,
            ecs_weight: 26,
        }
    }
}

pub const DEFAULT_TOUCH_CONFIG: TouchConfig = TouchConfig::default();
pub const FULL_SCALE: u16 = 1024;
