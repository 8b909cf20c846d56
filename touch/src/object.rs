use crate::TouchState;

/// A logical touch sensor built from one or more channels of the result storage.
///
/// Objects are type-erased inside an [`crate::group::ObjectGroup`], so buttons and
/// sliders with different channel counts can be processed together.
pub trait TouchObject {
    /// Read this object's channels from `results` and advance its state machine
    fn process(&mut self, results: &[u16]) -> TouchState;

    fn state(&self) -> TouchState;

    fn active(&self) -> bool {
        self.state() == TouchState::Active
    }

    /// Touch position along the object, for objects which have one
    fn position(&self) -> Option<u16> {
        None
    }

    /// True when the object is idle with no detection pending, so its reference may move
    fn settled(&self) -> bool;

    /// Track slow drift by moving the reference toward the latest measurements
    fn recalibrate(&mut self);

    /// Drop the reference and collect a fresh one
    fn force_calibrate(&mut self);
}
