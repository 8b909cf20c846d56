use crate::button::{delta, Button};
use crate::object::TouchObject;
use crate::FULL_SCALE;
use crate::{TouchConfig, TouchState};

/// Position of electrode `index` on the full scale axis.
///
/// The shared half-size electrode at index 0 sits at either end of the strip, on the
/// side of `partner`, the other electrode it is being interpolated with.
fn electrode_pos(index: u32, partner: u32, segment: i32) -> i32 {
    if index != 0 {
        segment * index as i32 - segment / 2
    } else if partner == 1 {
        -(segment / 2)
    } else {
        FULL_SCALE as i32 + segment / 2
    }
}

pub fn half_ended_pos(deltas: &[u16], detect_threshold: u16) -> Option<u16> {
    // Interpolation needs at least two electrodes
    if deltas.len() < 2 {
        return None;
    }

    let mut delta_high: i32 = 0;
    let mut delta_mid: i32 = 0;
    let mut delta_low: i32 = 0;
    let mut index_high: u32 = 0;
    let mut index_mid: u32 = 0;
    let mut index_low: u32 = 0;

    // Find the three highest deltas and sort them.
    for (i, delta) in deltas.iter().enumerate() {
        let delta = *delta as i32;
        let i = i as u32;

        if delta >= delta_high {
            delta_low = delta_mid;
            delta_mid = delta_high;
            delta_high = delta;
            index_low = index_mid;
            index_mid = index_high;
            index_high = i;
        } else if delta >= delta_mid {
            delta_low = delta_mid;
            delta_mid = delta;
            index_low = index_mid;
            index_mid = i;
        } else if delta >= delta_low {
            delta_low = delta;
            index_low = i;
        }
    }

    // Require two electrodes to have significant signal to calculate a position
    if delta_mid < detect_threshold as i32 {
        return None;
    }

    // The two electrodes must be neighbors, where the first and last electrodes are
    // neighbors of the shared half-end electrode.
    let last = deltas.len() as u32 - 1;
    let adjacent = (index_mid as i32 - index_high as i32).abs() == 1;
    let wraps = (index_high == 0 || index_mid == 0) && (index_high == last || index_mid == last);
    if !adjacent && !wraps {
        return None;
    }

    // The position on the linear is normalized so that 0 between the first and second electrode,
    // and 1 is between the n-1 and n-2 electrodes, on the right. It is assumed that the
    // measurements provided are ordered left-to-right, with the exception that the first sensor is
    // be found on both ends.
    let segment: i32 = FULL_SCALE as i32 / last as i32;
    let x0 = electrode_pos(index_low, index_high, segment);
    let x1 = electrode_pos(index_mid, index_high, segment);
    let x2 = electrode_pos(index_high, index_mid, segment);

    // With a zero detect threshold, a flat strip passes every check above
    let total = delta_low + delta_mid + delta_high;
    if total == 0 {
        return None;
    }

    // xn are 10 bits, deltas are (at most) 14 bits. i32 is safe from overflow.
    let center = (x0 * delta_low + x1 * delta_mid + x2 * delta_high) / total;

    Some(center.clamp(0, FULL_SCALE as i32 - 1) as u16)
}


/// Implement a linear touch input with "half-end" configuation, where the
/// first electrode and last electrodes are half-size, and both connected to
/// channel one. The electrode array looks like:
///
/// ---------------------------
/// | 1 |  2  | ... |  N  | 1 |
/// ---------------------------
pub struct HalfEndedLinear<'a, const N: usize> {
    pub button: Button<'a, N>,
    pub deltas: [u16; N],
}

impl<'a, const N: usize> HalfEndedLinear<'a, N> {
    /// `channels` are the result slots of the electrodes, left to right
    pub fn new(channels: [usize; N], config: Option<&'a TouchConfig>) -> Self {
        Self {
            button: Button::new(channels, config),
            deltas: [0; N],
        }
    }

    pub fn pos(&self) -> Option<u16> {
        if self.active() {
            half_ended_pos(&self.deltas, self.button.config.detect_threshold)
        } else {
            None
        }
    }

    pub fn active(&self) -> bool {
        self.button.active()
    }
    /// Input a new sample for all electrodes in the linear array
    ///
    /// Returns the latest positions if a touch is detected, otherwise None
    pub fn push(&mut self, measurements: [u16; N]) -> Option<u16> {
        for i in 0..N {
            self.deltas[i] = delta(self.button.reference[i], measurements[i]);
        }

        let state = self.button.push(measurements);

        match state {
            TouchState::Active => {
                self.pos()
            },
            _ => None
        }
    }
}

impl<'a, const N: usize> TouchObject for HalfEndedLinear<'a, N> {
    fn process(&mut self, results: &[u16]) -> TouchState {
        let measurements = self.button.measurements(results);
        self.push(measurements);
        self.button.state
    }

    fn state(&self) -> TouchState {
        self.button.state
    }

    fn position(&self) -> Option<u16> {
        self.pos()
    }

    fn settled(&self) -> bool {
        self.button.settled()
    }

    fn recalibrate(&mut self) {
        self.button.recalibrate()
    }

    fn force_calibrate(&mut self) {
        self.deltas = [0; N];
        self.button.force_calibrate()
    }
}


#[cfg(test)]
pub mod test {
    use super::*;
    use crate::DEFAULT_TOUCH_CONFIG;

    #[test]
    fn test_half_ended_pos() {

        let detect_threshold = 15;

        let pos = half_ended_pos(&[0, 20, 20], detect_threshold);
        assert_eq!(pos, Some(512));

        let pos = half_ended_pos(&[0, detect_threshold - 1, 20], detect_threshold);
        assert!(pos.is_none(), "Failed to return none for signal below detect threshold");

        let pos = half_ended_pos(&[100, 100, 0], detect_threshold);
        assert_eq!(pos, Some(0));

        let pos = half_ended_pos(&[120, 60, 10], detect_threshold);
        assert_eq!(pos, Some(0));

        let pos = half_ended_pos(&[100, 200, 100], detect_threshold);
        assert_eq!(pos, Some(256));

        let pos = half_ended_pos(&[100, 200, 80], detect_threshold);
        assert_eq!(pos, Some(229));

        let pos = half_ended_pos(&[200, 0, 20], detect_threshold);
        assert_eq!(pos, Some(1023));

        let pos = half_ended_pos(&[200, 10, 200], detect_threshold);
        assert_eq!(pos, Some(1005));

        let pos = half_ended_pos(&[5200, 0, 5800], detect_threshold);
        assert_eq!(pos, Some(1010));


        let pos = half_ended_pos(&[0, 3900, 5800], detect_threshold);
        assert_eq!(pos, Some(562));
    }

    #[test]
    fn test_non_adjacent_electrodes() {
        let pos = half_ended_pos(&[0, 200, 10, 200], 15);
        assert!(pos.is_none());
    }

    #[test]
    fn test_degenerate_strips_have_no_position() {
        assert_eq!(half_ended_pos(&[], 0), None);
        assert_eq!(half_ended_pos(&[5], 0), None);
        assert_eq!(half_ended_pos(&[0, 0, 0], 0), None);
        assert_eq!(half_ended_pos(&[0, 0], 0), None);
    }

    #[test]
    fn test_zero_threshold_flat_counts() {
        let config = TouchConfig {
            detect_threshold: 0,
            calibration_delay: 0,
            calibration_samples: 1,
            debounce: 1,
            ..DEFAULT_TOUCH_CONFIG
        };
        let mut linear = HalfEndedLinear::new([0, 1, 2], Some(&config));

        let flat = [1000, 1000, 1000];
        linear.process(&flat);
        linear.process(&flat);
        // Every delta reaches a zero threshold, but there is nothing to locate
        assert_eq!(linear.process(&flat), TouchState::Active);
        assert_eq!(linear.pos(), None);
    }

    #[test]
    fn test_linear_reports_position_when_active() {
        let config = TouchConfig { calibration_delay: 0, calibration_samples: 1, debounce: 1, ..DEFAULT_TOUCH_CONFIG };
        let mut linear = HalfEndedLinear::new([0, 1, 2], Some(&config));

        let idle = [1000, 1000, 1000];
        assert_eq!(linear.process(&idle), TouchState::Calibrate(1));
        assert_eq!(linear.process(&idle), TouchState::Idle(1));
        assert_eq!(linear.pos(), None);

        // Finger between electrodes 2 and 3
        let touched = [1000, 800, 800];
        assert_eq!(linear.process(&touched), TouchState::Active);
        assert_eq!(linear.pos(), Some(512));
        assert_eq!(TouchObject::position(&linear), Some(512));

        linear.force_calibrate();
        assert_eq!(linear.deltas, [0; 3]);
        assert_eq!(linear.pos(), None);
    }
}
