//! The set of touch objects processed together once per acquisition cycle.

use crate::coordinator::{Detect, Recalibrate, Recalibration};
use crate::object::TouchObject;
use crate::TouchState;

/// Touch objects sharing one acquisition cycle.
///
/// Besides running every object's state machine, the group arbitrates between objects
/// which are active at the same time: only one of them is reported, the first active
/// one in group order, and it keeps that ownership until it is released. Place the
/// objects that should win (a stop button, say) first.
pub struct ObjectGroup<'a, 'b> {
    objects: &'a mut [&'b mut dyn TouchObject],
    owner: Option<usize>,
    changed: bool,
}

impl<'a, 'b> ObjectGroup<'a, 'b> {
    pub fn new(objects: &'a mut [&'b mut dyn TouchObject]) -> Self {
        Self {
            objects,
            owner: None,
            changed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// True if any object entered or left the active state during the last cycle
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Index of the object currently allowed to report a touch
    pub fn owner(&self) -> Option<usize> {
        self.owner
    }

    /// True if object `index` is active and owns the group
    pub fn reported(&self, index: usize) -> bool {
        self.owner == Some(index)
    }

    pub fn state(&self, index: usize) -> TouchState {
        self.objects[index].state()
    }

    pub fn object(&self, index: usize) -> &dyn TouchObject {
        &*self.objects[index]
    }

    pub fn object_mut(&mut self, index: usize) -> &mut dyn TouchObject {
        &mut *self.objects[index]
    }
}

impl Detect for ObjectGroup<'_, '_> {
    fn init(&mut self) {
        for object in self.objects.iter_mut() {
            object.force_calibrate();
        }
        self.owner = None;
        self.changed = false;
    }

    fn process(&mut self, results: &[u16]) {
        self.changed = false;
        for object in self.objects.iter_mut() {
            let was_active = object.active();
            object.process(results);
            if object.active() != was_active {
                self.changed = true;
            }
        }
    }

    fn process_first(&mut self) {
        if let Some(owner) = self.owner {
            if self.objects[owner].active() {
                return;
            }
        }
        let owner = self.objects.iter().position(|object| object.active());
        if owner != self.owner {
            self.changed = true;
        }
        self.owner = owner;
    }
}

impl Recalibrate for ObjectGroup<'_, '_> {
    fn recalibrate(&mut self) -> Recalibration {
        if !self.objects.iter().all(|object| object.settled()) {
            return Recalibration::Declined;
        }
        for object in self.objects.iter_mut() {
            object.recalibrate();
        }
        Recalibration::Done
    }
}
