use std::rc::Rc;

use crate::{BurnDetector, BurnError};

/// Scheduler lifecycle events. Only [`ModelEvent::Step`] carries semantics
/// in this crate; the others exist so the seam matches what a scheduler
/// emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelEvent {
    /// The model starts running.
    Started,
    /// A propagation pass has settled; no further value changes are expected
    /// without new external input.
    Step,
    /// The model stops running.
    Stopped,
}

/// Per-simulation-model context.
///
/// Owns the shared [`BurnDetector`] for one model instance and acts as the
/// typed lookup through which nets and switches obtain it. Build one model
/// per circuit; detectors are never shared across models.
pub struct Model {
    burn: Rc<BurnDetector>,
}

impl Model {
    pub fn new() -> Model {
        Model { burn: Rc::new(BurnDetector::new()) }
    }

    /// The burn detector scoped to this model.
    pub fn burn_detector(&self) -> &Rc<BurnDetector> {
        &self.burn
    }

    /// Declares the current propagation step settled, promoting surviving
    /// conflicts to a fatal [`BurnError`].
    pub fn step_complete(&self) -> Result<(), BurnError> {
        self.burn.handle_event(ModelEvent::Step)
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::new()
    }
}
