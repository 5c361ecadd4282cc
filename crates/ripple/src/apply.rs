//! Applicative application
//!
//! Applies a function-valued behaviour to an argument behaviour. Chaining
//! applications is how multi-argument derivations are expressed.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::behaviour::{Behaviour, BehaviourRef, Func, Value};
use crate::bind::BindContext;
use crate::error::Result;
use crate::event::{Event, EventSource};
use crate::participant::{Participant, WaveNode};
use crate::wave::Wave;

struct ApplyCore<S: Value, T: Value> {
    participant: Participant,
    func: BehaviourRef<Func<S, T>>,
    func_change: Event,
    base: BehaviourRef<S>,
    base_change: Event,
    current: RefCell<T>,
    changed: Cell<bool>,
    this: Weak<ApplyCore<S, T>>,
}

impl<S: Value, T: Value> Behaviour<T> for ApplyCore<S, T> {
    fn value(&self) -> T {
        self.current.borrow().clone()
    }

    fn change(&self) -> Event {
        Event::bound(self.this.clone())
    }
}

impl<S: Value, T: Value> EventSource for ApplyCore<S, T> {
    fn backing(&self) -> Option<Participant> {
        Some(self.participant.clone())
    }

    fn fired(&self) -> bool {
        self.changed.get()
    }
}

impl<S: Value, T: Value> WaveNode for ApplyCore<S, T> {
    fn on_boot(&self, _wave: &Wave) -> Result<()> {
        self.func_change.defer(&self.participant)?;
        self.base_change.defer(&self.participant)
    }

    fn on_resolved(&self) -> Result<()> {
        if !self.func_change.value() && !self.base_change.value() {
            return Ok(());
        }
        let next = self.func.value().call(&self.base.value());
        let mut current = self.current.borrow_mut();
        if *current != next {
            *current = next;
            self.changed.set(true);
            trace!(participant = %self.participant.id(), "applied value updated");
        }
        Ok(())
    }

    fn on_cleanup(&self) {
        self.changed.set(false);
    }
}

/// Derive a behaviour holding `func(base)`, recomputed when either changes
pub fn apply<S, T>(
    ctx: &BindContext,
    func: &BehaviourRef<Func<S, T>>,
    base: &BehaviourRef<S>,
) -> Result<BehaviourRef<T>>
where
    S: Value,
    T: Value,
{
    let initial = func.value().call(&base.value());
    let core = Rc::new_cyclic(|this| ApplyCore {
        participant: Participant::new(),
        func: func.clone(),
        func_change: func.change(),
        base: base.clone(),
        base_change: base.change(),
        current: RefCell::new(initial),
        changed: Cell::new(false),
        this: this.clone(),
    });
    let node: Weak<dyn WaveNode> = core.this.clone();
    core.participant.bind_node(node);
    core.func_change.add_correlated_node(&core.participant);
    core.base_change.add_correlated_node(&core.participant);

    let func_change = core.func_change.clone();
    let base_change = core.base_change.clone();
    let participant = core.participant.clone();
    ctx.finish(&core.participant, move || {
        func_change.remove_correlated_node(&participant);
        base_change.remove_correlated_node(&participant);
    })?;
    Ok(BehaviourRef::new(core))
}
