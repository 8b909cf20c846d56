//! Periodic touch handler.
//!
//! [`Coordinator::run`] is meant to be called on every pass of the main loop. Each call
//! advances the bank sequencer by one step. When the last bank of the cycle has been
//! collected, the same call re-arms the sequencer, hands the results to the object
//! group and, once per recalibration interval, asks the group to recalibrate.

use crate::bank::Acquisition;
use crate::handshake::SharedResults;
use crate::sequencer::BankSequencer;
use crate::timer::{Clock, Interval};
use crate::Error;

/// Result of one call to [`Coordinator::run`]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum Status {
    /// Acquisition cycle still in progress
    Busy,
    /// Cycle complete, objects processed, recalibration not due
    Complete,
    /// Cycle complete and the recalibration pass ran
    Recalibrated,
    /// Cycle complete, recalibration was due but the group declined it
    RecalibrationSkipped,
}

impl Status {
    pub fn is_busy(&self) -> bool {
        *self == Status::Busy
    }
}

/// Outcome of a recalibration request
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recalibration {
    Done,
    Declined,
}

/// When to try again after the group declined a recalibration
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EcsRetry {
    /// Retry on the next completed cycle. The interval only restarts when a pass runs.
    NextCycle,
    /// Wait a full interval. The interval restarts whenever it is checked and found due.
    NextInterval,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug)]
pub struct CoordinatorConfig {
    /// Minimum time between recalibration passes, in milliseconds
    pub ecs_interval_ms: u32,
    pub ecs_retry: EcsRetry,
}

impl CoordinatorConfig {
    pub const fn default() -> Self {
        Self {
            ecs_interval_ms: 500,
            ecs_retry: EcsRetry::NextCycle,
        }
    }
}

pub const DEFAULT_COORDINATOR_CONFIG: CoordinatorConfig = CoordinatorConfig::default();

/// Detection over a whole group of touch objects, run once per acquisition cycle.
pub trait Detect {
    /// Called once when the coordinator is created
    fn init(&mut self) {}

    /// Called once after `init` to apply per-object thresholds
    fn override_thresholds(&mut self) {}

    /// Run debounce and detection for every object against the latest counts
    fn process(&mut self, results: &[u16]);

    /// Arbitrate between simultaneously active objects, starting from the first one
    fn process_first(&mut self);
}

/// Slow tracking of environmental drift
pub trait Recalibrate {
    fn recalibrate(&mut self) -> Recalibration;
}

pub struct Coordinator<'r, A, G, C, const N: usize> {
    sequencer: BankSequencer<'r, A, N>,
    group: G,
    clock: C,
    config: CoordinatorConfig,
    ecs: Interval,
}

impl<'r, A, G, C, const N: usize> Coordinator<'r, A, G, C, N>
where
    A: Acquisition,
    G: Detect + Recalibrate,
    C: Clock,
{
    /// Set up the touch subsystem.
    ///
    /// `engine` must already hold its bank table. The group is initialized and its
    /// threshold overrides applied; the recalibration interval starts now.
    pub fn new(
        engine: A,
        mut group: G,
        clock: C,
        results: &'r SharedResults<N>,
        config: Option<CoordinatorConfig>,
    ) -> Result<Self, Error> {
        let config = config.unwrap_or(DEFAULT_COORDINATOR_CONFIG);
        let sequencer = BankSequencer::new(engine, results)?;

        group.init();
        group.override_thresholds();

        let ecs = Interval::new(config.ecs_interval_ms, clock.now_ms());

        Ok(Self {
            sequencer,
            group,
            clock,
            config,
            ecs,
        })
    }

    /// Make one step of progress. Never blocks.
    pub fn run(&mut self) -> Status {
        self.sequencer.step();
        if !self.sequencer.cycle_complete() {
            return Status::Busy;
        }

        // Re-arm before anything else so the next call always starts a new cycle
        self.sequencer.rearm();

        let group = &mut self.group;
        self.sequencer.results().read(|counts| group.process(counts));
        self.group.process_first();

        let now = self.clock.now_ms();
        let due = match self.config.ecs_retry {
            EcsRetry::NextCycle => self.ecs.elapsed(now),
            EcsRetry::NextInterval => self.ecs.check(now),
        };
        if !due {
            return Status::Complete;
        }

        match self.group.recalibrate() {
            Recalibration::Done => {
                self.ecs.restart(now);
                #[cfg(feature = "defmt")]
                defmt::debug!("touch: recalibrated at {} ms", now);
                Status::Recalibrated
            }
            Recalibration::Declined => {
                #[cfg(feature = "defmt")]
                defmt::debug!("touch: recalibration declined at {} ms", now);
                Status::RecalibrationSkipped
            }
        }
    }

    pub fn group(&self) -> &G {
        &self.group
    }

    pub fn group_mut(&mut self) -> &mut G {
        &mut self.group
    }

    pub fn sequencer(&self) -> &BankSequencer<'r, A, N> {
        &self.sequencer
    }

    pub fn engine_mut(&mut self) -> &mut A {
        self.sequencer.engine_mut()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Tick at which the recalibration interval last restarted
    pub fn last_recalibration(&self) -> u32 {
        self.ecs.last()
    }
}
