//! Writable leaf behaviours
//!
//! A variable owns its value and seeds waves. The first distinct write in a
//! wave records the pre-wave value as a baseline; the change flag is computed
//! against that baseline at resolution, so several writes in one wave expose
//! only their net effect downstream.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::behaviour::{Behaviour, BehaviourRef, Value};
use crate::error::Result;
use crate::event::{Event, EventSource};
use crate::participant::{Participant, WaveNode};
use crate::wave::Wave;

struct VarCore<T: Value> {
    participant: Participant,
    value: RefCell<T>,
    /// Pre-wave value, recorded once per wave on the first distinct write
    baseline: RefCell<Option<T>>,
    changed: Cell<bool>,
    this: Weak<VarCore<T>>,
}

impl<T: Value> Behaviour<T> for VarCore<T> {
    fn value(&self) -> T {
        self.value.borrow().clone()
    }

    fn change(&self) -> Event {
        Event::bound(self.this.clone())
    }
}

impl<T: Value> EventSource for VarCore<T> {
    fn backing(&self) -> Option<Participant> {
        Some(self.participant.clone())
    }

    fn fired(&self) -> bool {
        self.changed.get()
    }
}

impl<T: Value> WaveNode for VarCore<T> {
    fn on_resolved(&self) -> Result<()> {
        if let Some(baseline) = self.baseline.borrow().as_ref() {
            self.changed.set(*baseline != *self.value.borrow());
        }
        Ok(())
    }

    fn on_cleanup(&self) {
        self.changed.set(false);
        self.baseline.borrow_mut().take();
    }
}

/// A leaf behaviour whose value is assigned imperatively
pub struct Variable<T: Value> {
    core: Rc<VarCore<T>>,
}

impl<T: Value> Variable<T> {
    pub fn new(initial: T) -> Self {
        let core = Rc::new_cyclic(|this| VarCore {
            participant: Participant::new(),
            value: RefCell::new(initial),
            baseline: RefCell::new(None),
            changed: Cell::new(false),
            this: this.clone(),
        });
        let node: Weak<dyn WaveNode> = core.this.clone();
        core.participant.bind_node(node);
        Self { core }
    }

    /// Assign `value`, opening a wave (or joining the active one)
    pub fn set(&self, value: T) -> Result<()> {
        Wave::group(|wave| self.waved_set(value, wave))
    }

    /// Assign `value` inside an explicit wave.
    ///
    /// Equal values are ignored. A distinct transition records the pre-wave
    /// baseline once and engages this variable's participant (idempotently),
    /// so repeated writes within one wave are fine.
    pub fn waved_set(&self, value: T, wave: &Wave) -> Result<()> {
        if *self.core.value.borrow() == value {
            return Ok(());
        }
        {
            let mut baseline = self.core.baseline.borrow_mut();
            if baseline.is_none() {
                *baseline = Some(self.core.value.borrow().clone());
            }
        }
        *self.core.value.borrow_mut() = value;
        debug!(participant = %self.core.participant.id(), wave = %wave.id(), "variable written");
        self.core.participant.engage(wave)
    }

    pub fn value(&self) -> T {
        self.core.value()
    }

    pub fn change(&self) -> Event {
        self.core.change()
    }

    /// This variable as a shared behaviour handle
    pub fn behaviour(&self) -> BehaviourRef<T> {
        BehaviourRef::new(self.core.clone())
    }
}

impl<T: Value> Clone for Variable<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

/// Shorthand constructor mirroring the combinator free functions
pub fn variable<T: Value>(initial: T) -> Variable<T> {
    Variable::new(initial)
}
