use crate::object::TouchObject;
use crate::{TouchConfig, TouchState, DEFAULT_TOUCH_CONFIG};

/// Denominator of `TouchConfig::ecs_weight`
const ECS_SCALE: u32 = 256;

pub struct Button<'a, const N: usize> {
    pub reference: [u32; N],
    pub state: TouchState,
    pub config: &'a TouchConfig,
    /// Result slot of each electrode
    pub channels: [usize; N],
    last: [u16; N],
}

/// Counts drop when a finger adds capacitance, so the delta is reference minus measurement
pub(crate) fn delta(reference: u32, measurement: u16) -> u16 {
    reference.saturating_sub(measurement as u32).min(u16::MAX as u32) as u16
}

impl<'a, const N: usize> Button<'a, N> {
    pub fn new(channels: [usize; N], config: Option<&'a TouchConfig>) -> Self {
        let config = config.unwrap_or(&DEFAULT_TOUCH_CONFIG);
        Self {
            reference: [0; N],
            state: TouchState::Startup(config.calibration_delay),
            config,
            channels,
            last: [0; N],
        }
    }

    pub fn active(&self) -> bool {
        match self.state {
            TouchState::Active => true,
            _ => false
        }
    }

    /// Measurements from the most recent `push`
    pub fn last(&self) -> &[u16; N] {
        &self.last
    }

    /// Process a new measurement for this touch button
    ///
    pub fn push(&mut self, measurements: [u16; N]) -> TouchState {
        let mut deltas = [0u16; N];
        for i in 0..N {
            deltas[i] = delta(self.reference[i], measurements[i]);
        }
        self.last = measurements;

        self.state = match self.state {
            TouchState::Startup(counter) => {
                if counter == 0 {
                    self.reference = [0; N];
                    TouchState::Calibrate(self.config.calibration_samples)
                } else {
                    TouchState::Startup(counter - 1)
                }
            },
            TouchState::Calibrate(counter) => {
                for i in 0..N {
                    self.reference[i] += measurements[i] as u32;
                }
                if counter <= 1 {
                    let samples = self.config.calibration_samples.max(1) as u32;
                    for i in 0..N {
                        self.reference[i] /= samples;
                    }
                    TouchState::Idle(self.config.debounce)
                } else {
                    TouchState::Calibrate(counter - 1)
                }
            },
            TouchState::Idle(counter) => {
                if deltas.iter().any(|x| *x >= self.config.detect_threshold) {
                    if counter <= 1 {
                        TouchState::Active
                    } else {
                        TouchState::Idle(counter - 1)
                    }
                } else {
                    TouchState::Idle(self.config.debounce)
                }
            },
            TouchState::Active => {
                let release = self.config.detect_threshold.saturating_sub(self.config.detect_hysteresis);
                if deltas.iter().all(|x| *x < release) {
                    TouchState::Idle(self.config.debounce)
                } else {
                    TouchState::Active
                }
            }
        };

        self.state
    }

    /// Gather this button's electrodes from the shared result slots
    pub fn measurements(&self, results: &[u16]) -> [u16; N] {
        let mut measurements = [0u16; N];
        for i in 0..N {
            measurements[i] = results[self.channels[i]];
        }
        measurements
    }
}

impl<'a, const N: usize> TouchObject for Button<'a, N> {
    fn process(&mut self, results: &[u16]) -> TouchState {
        let measurements = self.measurements(results);
        self.push(measurements)
    }

    fn state(&self) -> TouchState {
        self.state
    }

    fn settled(&self) -> bool {
        self.state == TouchState::Idle(self.config.debounce)
    }

    fn recalibrate(&mut self) {
        let weight = (self.config.ecs_weight as u32).min(ECS_SCALE);
        for i in 0..N {
            self.reference[i] = (self.reference[i] * (ECS_SCALE - weight)
                + self.last[i] as u32 * weight
                + ECS_SCALE / 2)
                / ECS_SCALE;
        }
    }

    fn force_calibrate(&mut self) {
        self.reference = [0; N];
        self.state = TouchState::Calibrate(self.config.calibration_samples);
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    const REF: u16 = 1000;

    fn calibrated(config: &TouchConfig) -> Button<'_, 1> {
        let mut b = Button::new([0], Some(config));
        for _ in 0..config.calibration_delay + config.calibration_samples + 1 {
            b.push([REF]);
            assert!(!b.active());
        }
        assert_eq!(b.reference, [REF as u32]);
        b
    }

    #[test]
    pub fn test_button() {

        let config = &DEFAULT_TOUCH_CONFIG;
        let mut b = calibrated(config);

        // "Touch" it for enough samples to get through debounce
        for _ in 0..DEFAULT_TOUCH_CONFIG.debounce {
            assert!(!b.active());
            b.push([REF - config.detect_threshold - 1]);
        }

        // Now it should be active
        assert!(b.active(), "Not active after debounce");

        // Down to hysteresis value, it should remain active
        b.push([REF - config.detect_threshold + config.detect_hysteresis - 1]);
        assert!(b.active(), "Became inactive too soon despite hysteresis");

        b.push([REF]);
        assert!(!b.active(), "Didn't deactivate");

    }

    #[test]
    pub fn test_button_negative() {
        let config = &DEFAULT_TOUCH_CONFIG;
        let mut b = calibrated(config);

        // Counts rising above the reference is not a touch
        for _ in 0..config.debounce + 2 {
            assert!(!b.active());
            b.push([REF + 300]);
        }

        assert!(!b.active());
    }

    #[test]
    fn test_debounce_restarts_on_release() {
        let config = &DEFAULT_TOUCH_CONFIG;
        let mut b = calibrated(config);

        b.push([REF - 200]);
        assert_eq!(b.state, TouchState::Idle(config.debounce - 1));
        assert!(!b.settled());
        b.push([REF]);
        assert!(b.settled());
    }

    #[test]
    fn test_process_reads_result_slots() {
        let config = TouchConfig { calibration_delay: 0, calibration_samples: 1, ..DEFAULT_TOUCH_CONFIG };
        let mut b = Button::new([2, 0], Some(&config));
        let results = [500, 0, 800];

        b.process(&results);
        b.process(&results);
        assert_eq!(b.reference, [800, 500]);
        assert_eq!(b.last(), &[800, 500]);
    }

    #[test]
    fn test_recalibrate_tracks_drift() {
        let config = TouchConfig { ecs_weight: 128, ..DEFAULT_TOUCH_CONFIG };
        let mut b = calibrated(&config);

        b.push([REF - 40]);
        assert!(b.settled());
        b.recalibrate();
        assert_eq!(b.reference, [REF as u32 - 20]);
    }

    #[test]
    fn test_force_calibrate() {
        let config = &DEFAULT_TOUCH_CONFIG;
        let mut b = calibrated(config);

        b.force_calibrate();
        assert_eq!(b.state(), TouchState::Calibrate(config.calibration_samples));
        for _ in 0..config.calibration_samples {
            b.push([REF + 50]);
        }
        assert_eq!(b.reference, [REF as u32 + 50]);
        assert!(b.settled());
    }
}
