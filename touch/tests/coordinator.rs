//! Cycle and recalibration behaviour of the coordinator against a scripted engine.

use std::cell::Cell;
use std::convert::Infallible;

use touch::bank::Acquisition;
use touch::button::Button;
use touch::coordinator::{Detect, Recalibrate, Recalibration};
use touch::group::ObjectGroup;
use touch::handshake::SharedResults;
use touch::linear::HalfEndedLinear;
use touch::object::TouchObject;
use touch::timer::Clock;
use touch::{Coordinator, CoordinatorConfig, Status, TouchConfig, TouchState, DEFAULT_TOUCH_CONFIG};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Configure(usize),
    Start,
    Collect(usize),
}

/// Engine whose acquisitions complete after `polls` checks, writing `level` to every
/// slot of the collected bank. Bank `b` owns slot `b`.
struct Scripted {
    banks: usize,
    polls: u32,
    remaining: u32,
    level: u16,
    calls: Vec<Call>,
}

impl Scripted {
    fn new(banks: usize, polls: u32) -> Self {
        Self { banks, polls, remaining: 0, level: 1000, calls: Vec::new() }
    }
}

impl Acquisition for Scripted {
    fn banks(&self) -> usize {
        self.banks
    }

    fn slots(&self) -> usize {
        self.banks
    }

    fn configure(&mut self, bank: usize) {
        self.calls.push(Call::Configure(bank));
    }

    fn start(&mut self) {
        self.remaining = self.polls;
        self.calls.push(Call::Start);
    }

    fn poll(&mut self) -> nb::Result<(), Infallible> {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn collect(&mut self, bank: usize, results: &mut [u16]) {
        self.calls.push(Call::Collect(bank));
        results[bank] = self.level;
    }
}

#[derive(Default)]
struct Group {
    cycles: u32,
    accept: bool,
    recalibrations: u32,
}

impl Detect for Group {
    fn process(&mut self, _results: &[u16]) {
        self.cycles += 1;
    }

    fn process_first(&mut self) {}
}

impl Recalibrate for Group {
    fn recalibrate(&mut self) -> Recalibration {
        self.recalibrations += 1;
        if self.accept {
            Recalibration::Done
        } else {
            Recalibration::Declined
        }
    }
}

struct Ticks(Cell<u32>);

impl Clock for Ticks {
    fn now_ms(&self) -> u32 {
        self.0.get()
    }
}

/// Run a two bank cycle where each bank takes two polls
fn cycle<G: Detect + Recalibrate, C: Clock>(coordinator: &mut Coordinator<'_, Scripted, G, C, 2>) -> Status {
    for _ in 0..3 {
        assert_eq!(coordinator.run(), Status::Busy);
    }
    coordinator.run()
}

fn config(interval: u32) -> Option<CoordinatorConfig> {
    Some(CoordinatorConfig { ecs_interval_ms: interval, ..CoordinatorConfig::default() })
}

#[test]
fn completes_on_last_bank_for_any_bank_count() {
    for banks in 1..=6 {
        let results: SharedResults<6> = SharedResults::new();
        let ticks = Ticks(Cell::new(0));
        let mut coordinator =
            Coordinator::new(Scripted::new(banks, 1), Group::default(), &ticks, &results, config(1000)).unwrap();

        for call in 1..=banks {
            let status = coordinator.run();
            if call < banks {
                assert_eq!(status, Status::Busy, "banks={} call={}", banks, call);
            } else {
                assert_eq!(status, Status::Complete, "banks={}", banks);
            }
        }
        assert_eq!(coordinator.sequencer().bank(), 0);
        assert!(!coordinator.sequencer().configured());
        assert_eq!(coordinator.group().cycles, 1);
    }
}

#[test]
fn busy_while_last_bank_pending() {
    let results: SharedResults<2> = SharedResults::new();
    let ticks = Ticks(Cell::new(0));
    let mut coordinator =
        Coordinator::new(Scripted::new(2, 3), Group::default(), &ticks, &results, config(1000)).unwrap();

    let statuses: Vec<Status> = (0..6).map(|_| coordinator.run()).collect();
    assert!(statuses[..5].iter().all(|s| s.is_busy()));
    assert_eq!(statuses[5], Status::Complete);

    // Each bank is configured and started exactly once, before it is polled
    assert_eq!(
        coordinator.sequencer().engine().calls,
        vec![
            Call::Configure(0),
            Call::Start,
            Call::Collect(0),
            Call::Configure(1),
            Call::Start,
            Call::Collect(1),
        ]
    );
}

#[test]
fn end_to_end_four_banks() {
    let results: SharedResults<4> = SharedResults::new();
    let ticks = Ticks(Cell::new(0));
    let mut coordinator =
        Coordinator::new(Scripted::new(4, 1), Group::default(), &ticks, &results, config(100)).unwrap();

    assert_eq!(coordinator.run(), Status::Busy);
    assert_eq!(coordinator.run(), Status::Busy);
    assert_eq!(coordinator.run(), Status::Busy);
    assert!(!coordinator.run().is_busy());

    // The fifth call starts over from bank 0
    assert_eq!(coordinator.sequencer().bank(), 0);
    assert_eq!(coordinator.run(), Status::Busy);
    assert_eq!(coordinator.sequencer().engine().calls[12], Call::Configure(0));
    assert_eq!(results.inspect(|counts| counts.to_vec()), vec![1000; 4]);
}

#[test]
fn recalibration_cadence() {
    let results: SharedResults<1> = SharedResults::new();
    let ticks = Ticks(Cell::new(0));
    let group = Group { accept: true, ..Group::default() };
    let mut coordinator = Coordinator::new(Scripted::new(1, 1), group, &ticks, &results, config(100)).unwrap();

    ticks.0.set(40);
    assert_eq!(coordinator.run(), Status::Complete);
    ticks.0.set(99);
    assert_eq!(coordinator.run(), Status::Complete);
    ticks.0.set(100);
    assert_eq!(coordinator.run(), Status::Recalibrated);
    assert_eq!(coordinator.last_recalibration(), 100);
    ticks.0.set(150);
    assert_eq!(coordinator.run(), Status::Complete);
    assert_eq!(coordinator.group().recalibrations, 1);
}

#[test]
fn declined_recalibration_retries_next_cycle() {
    let results: SharedResults<2> = SharedResults::new();
    let ticks = Ticks(Cell::new(0));
    let mut coordinator =
        Coordinator::new(Scripted::new(2, 1), Group::default(), &ticks, &results, config(100)).unwrap();

    ticks.0.set(120);
    assert_eq!(coordinator.run(), Status::Busy);
    assert_eq!(coordinator.run(), Status::RecalibrationSkipped);
    assert_eq!(coordinator.last_recalibration(), 0, "a declined pass must not restart the interval");

    // Acquisition restarts normally after the failed pass
    assert_eq!(coordinator.sequencer().bank(), 0);
    assert!(!coordinator.sequencer().configured());
    assert_eq!(coordinator.run(), Status::Busy);

    coordinator.group_mut().accept = true;
    ticks.0.set(121);
    assert_eq!(coordinator.run(), Status::Recalibrated);
    assert_eq!(coordinator.last_recalibration(), 121);
    assert_eq!(coordinator.group().recalibrations, 2);
}

#[test]
fn engine_that_never_completes_stays_busy() {
    let results: SharedResults<1> = SharedResults::new();
    let ticks = Ticks(Cell::new(0));
    let mut coordinator =
        Coordinator::new(Scripted::new(1, u32::MAX), Group::default(), &ticks, &results, None).unwrap();

    for _ in 0..100 {
        assert_eq!(coordinator.run(), Status::Busy);
    }
    assert_eq!(coordinator.group().cycles, 0);
    assert_eq!(coordinator.sequencer().engine().calls, vec![Call::Configure(0), Call::Start]);
}

#[test]
fn rejects_topology_larger_than_storage() {
    let results: SharedResults<2> = SharedResults::new();
    let ticks = Ticks(Cell::new(0));
    let err = Coordinator::new(Scripted::new(3, 1), Group::default(), &ticks, &results, None).err();
    assert_eq!(err, Some(touch::Error::ResultStorage { needed: 3, available: 2 }));
}

#[test]
fn buttons_detect_touch_through_coordinator() {
    const CONFIG: TouchConfig = TouchConfig {
        calibration_delay: 0,
        calibration_samples: 2,
        debounce: 1,
        ..DEFAULT_TOUCH_CONFIG
    };

    let results: SharedResults<2> = SharedResults::new();
    let ticks = Ticks(Cell::new(0));
    let mut left = Button::new([0], Some(&CONFIG));
    let mut right = Button::new([1], Some(&CONFIG));
    let mut objects: [&mut dyn TouchObject; 2] = [&mut left, &mut right];
    let group = ObjectGroup::new(&mut objects);
    let mut coordinator = Coordinator::new(Scripted::new(2, 2), group, &ticks, &results, config(10)).unwrap();

    assert_eq!(cycle(&mut coordinator), Status::Complete);
    assert_eq!(cycle(&mut coordinator), Status::Complete);
    assert_eq!(coordinator.group().state(0), TouchState::Idle(1));

    coordinator.engine_mut().level = 800;
    ticks.0.set(10);
    assert_eq!(cycle(&mut coordinator), Status::RecalibrationSkipped);
    assert_eq!(coordinator.group().owner(), Some(0));
    assert!(coordinator.group().changed());

    coordinator.engine_mut().level = 1000;
    assert_eq!(cycle(&mut coordinator), Status::Recalibrated);
    assert_eq!(coordinator.group().owner(), None);
}

#[test]
fn slider_with_zero_threshold_keeps_running_on_flat_counts() {
    const CONFIG: TouchConfig = TouchConfig {
        detect_threshold: 0,
        calibration_delay: 0,
        calibration_samples: 1,
        debounce: 1,
        ..DEFAULT_TOUCH_CONFIG
    };

    let results: SharedResults<2> = SharedResults::new();
    let ticks = Ticks(Cell::new(0));
    let mut slider = HalfEndedLinear::new([0, 1], Some(&CONFIG));
    let mut objects: [&mut dyn TouchObject; 1] = [&mut slider];
    let group = ObjectGroup::new(&mut objects);
    let mut coordinator = Coordinator::new(Scripted::new(2, 2), group, &ticks, &results, config(1000)).unwrap();

    for _ in 0..4 {
        assert_eq!(cycle(&mut coordinator), Status::Complete);
    }
    assert_eq!(coordinator.group().state(0), TouchState::Active);
    assert_eq!(coordinator.group().object(0).position(), None);
}
