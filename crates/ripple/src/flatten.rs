//! Monadic join
//!
//! Collapses a behaviour-of-behaviours to the value of the currently
//! selected inner behaviour. The scheduling subtlety lives here: which inner
//! to wait on is only known once the outer source has resolved, so the
//! deferral against the inner is installed from a pre-resolution callback,
//! the wave's late-discovered dependency path.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::behaviour::{Behaviour, BehaviourRef, Value};
use crate::bind::BindContext;
use crate::error::Result;
use crate::event::{Event, EventSource};
use crate::participant::{Participant, WaveNode};
use crate::wave::Wave;

struct FlattenCore<T: Value> {
    participant: Participant,
    source: BehaviourRef<BehaviourRef<T>>,
    source_change: Event,
    /// Currently selected inner behaviour
    inner: RefCell<BehaviourRef<T>>,
    /// Change event of the current inner, cached so the correlation can be
    /// severed when the selection swaps
    inner_change: RefCell<Event>,
    current: RefCell<T>,
    changed: Cell<bool>,
    this: Weak<FlattenCore<T>>,
}

impl<T: Value> FlattenCore<T> {
    /// Runs between the source's resolution and our own: the selection is
    /// final now, so wait on whichever inner it points at. If that inner is
    /// not in the wave, its value is stable and the deferral is a no-op.
    fn await_selected_inner(&self) -> Result<()> {
        self.source.value().change().defer(&self.participant)
    }
}

impl<T: Value> Behaviour<T> for FlattenCore<T> {
    fn value(&self) -> T {
        self.current.borrow().clone()
    }

    fn change(&self) -> Event {
        Event::bound(self.this.clone())
    }
}

impl<T: Value> EventSource for FlattenCore<T> {
    fn backing(&self) -> Option<Participant> {
        Some(self.participant.clone())
    }

    fn fired(&self) -> bool {
        self.changed.get()
    }
}

impl<T: Value> WaveNode for FlattenCore<T> {
    fn on_boot(&self, _wave: &Wave) -> Result<()> {
        let this = self.this.clone();
        self.source_change.defer_by(
            &self.participant,
            Box::new(move |_wave| match this.upgrade() {
                Some(core) => core.await_selected_inner(),
                None => Ok(()),
            }),
        )
    }

    fn on_resolved(&self) -> Result<()> {
        let source_fired = self.source_change.value();
        let inner_fired = self.inner_change.borrow().value();
        if !source_fired && !inner_fired {
            return Ok(());
        }
        if source_fired {
            let next = self.source.value();
            self.inner_change
                .borrow()
                .remove_correlated_node(&self.participant);
            next.change().add_correlated_node(&self.participant);
            debug!(participant = %self.participant.id(), "inner behaviour swapped");
            *self.inner_change.borrow_mut() = next.change();
            *self.inner.borrow_mut() = next;
        }
        let value = self.inner.borrow().value();
        let mut current = self.current.borrow_mut();
        if *current != value {
            *current = value;
            self.changed.set(true);
            trace!(participant = %self.participant.id(), "joined value updated");
        }
        Ok(())
    }

    fn on_cleanup(&self) {
        self.changed.set(false);
    }
}

/// Collapse a behaviour-of-behaviours into the inner's value
pub fn join<T: Value>(
    ctx: &BindContext,
    source: &BehaviourRef<BehaviourRef<T>>,
) -> Result<BehaviourRef<T>> {
    let inner = source.value();
    let core = Rc::new_cyclic(|this| FlattenCore {
        participant: Participant::new(),
        source: source.clone(),
        source_change: source.change(),
        inner_change: RefCell::new(inner.change()),
        current: RefCell::new(inner.value()),
        inner: RefCell::new(inner),
        changed: Cell::new(false),
        this: this.clone(),
    });
    let node: Weak<dyn WaveNode> = core.this.clone();
    core.participant.bind_node(node);
    core.source_change.add_correlated_node(&core.participant);
    core.inner_change.borrow().add_correlated_node(&core.participant);

    let this = core.this.clone();
    let source_change = core.source_change.clone();
    let participant = core.participant.clone();
    ctx.finish(&core.participant, move || {
        source_change.remove_correlated_node(&participant);
        if let Some(core) = this.upgrade() {
            core.inner_change
                .borrow()
                .remove_correlated_node(&participant);
        }
    })?;
    Ok(BehaviourRef::new(core))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::variable;

    #[test]
    fn test_join_follows_inner_updates() {
        let ctx = BindContext::forever();
        let v1 = variable("Abc".to_string());
        let vb = variable(v1.behaviour());
        let joined = join(&ctx, &vb.behaviour()).unwrap();

        assert_eq!(joined.value(), "Abc");

        v1.set("XyZ".to_string()).unwrap();
        assert_eq!(joined.value(), "XyZ");
    }

    #[test]
    fn test_join_switches_inner() {
        let ctx = BindContext::forever();
        let v1 = variable("Abc".to_string());
        let v2 = variable("Def".to_string());
        let vb = variable(v1.behaviour());
        let joined = join(&ctx, &vb.behaviour()).unwrap();

        vb.set(v2.behaviour()).unwrap();
        assert_eq!(joined.value(), "Def");

        // The old inner is disconnected: writes to it no longer show through.
        v1.set("stale".to_string()).unwrap();
        assert_eq!(joined.value(), "Def");

        v2.set("Fed".to_string()).unwrap();
        assert_eq!(joined.value(), "Fed");
    }

    #[test]
    fn test_join_over_constant_source() {
        use crate::behaviour::constant;

        let ctx = BindContext::forever();
        let v = variable(5);
        let joined = join(&ctx, &constant(v.behaviour())).unwrap();

        assert_eq!(joined.value(), 5);
        v.set(6).unwrap();
        assert_eq!(joined.value(), 6);
    }
}
