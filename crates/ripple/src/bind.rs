//! Binding context
//!
//! Combinators are constructed under a [`BindContext`]: it carries the
//! lifespan their disposal registers on and a snapshot of the wave that was
//! active at construction time, so building a node inside or outside a wave
//! goes through the same code path.

use std::rc::Rc;

use crate::error::Result;
use crate::lifespan::{self, Lifespan};
use crate::participant::Participant;
use crate::wave::Wave;

/// Either the active wave or nothing to participate in
#[derive(Clone)]
pub enum Participable {
    Wave(Wave),
    Idle,
}

impl Participable {
    pub(crate) fn engage(&self, participant: &Participant) -> Result<()> {
        match self {
            Participable::Wave(wave) => participant.engage(wave),
            Participable::Idle => Ok(()),
        }
    }
}

/// A lifespan paired with the current participation scope
#[derive(Clone)]
pub struct BindContext {
    lifespan: Rc<dyn Lifespan>,
    scope: Participable,
}

impl BindContext {
    /// Bind under `lifespan`, snapshotting the thread's active wave
    pub fn new(lifespan: Rc<dyn Lifespan>) -> Self {
        let scope = match Wave::current() {
            Some(wave) => Participable::Wave(wave),
            None => Participable::Idle,
        };
        Self { lifespan, scope }
    }

    /// Bind under the infinite lifespan
    pub fn forever() -> Self {
        Self::new(lifespan::forever())
    }

    pub fn lifespan(&self) -> &Rc<dyn Lifespan> {
        &self.lifespan
    }

    /// Finish constructing a node: register its disposal, then engage it in
    /// the wave captured at context creation (if any).
    pub(crate) fn finish(
        &self,
        participant: &Participant,
        dispose: impl FnOnce() + 'static,
    ) -> Result<()> {
        self.lifespan.on_dispose(Box::new(dispose))?;
        self.scope.engage(participant)
    }
}
