//! Mapped behaviours

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::behaviour::{Behaviour, BehaviourRef, Value};
use crate::bind::BindContext;
use crate::error::Result;
use crate::event::{Event, EventSource};
use crate::participant::{Participant, WaveNode};
use crate::wave::Wave;

struct MapCore<S: Value, T: Value> {
    participant: Participant,
    source: BehaviourRef<S>,
    source_change: Event,
    mapper: Box<dyn Fn(&S) -> T>,
    current: RefCell<T>,
    changed: Cell<bool>,
    this: Weak<MapCore<S, T>>,
}

impl<S: Value, T: Value> Behaviour<T> for MapCore<S, T> {
    fn value(&self) -> T {
        self.current.borrow().clone()
    }

    fn change(&self) -> Event {
        Event::bound(self.this.clone())
    }
}

impl<S: Value, T: Value> EventSource for MapCore<S, T> {
    fn backing(&self) -> Option<Participant> {
        Some(self.participant.clone())
    }

    fn fired(&self) -> bool {
        self.changed.get()
    }
}

impl<S: Value, T: Value> WaveNode for MapCore<S, T> {
    fn on_boot(&self, _wave: &Wave) -> Result<()> {
        self.source_change.defer(&self.participant)
    }

    fn on_resolved(&self) -> Result<()> {
        if !self.source_change.value() {
            return Ok(());
        }
        let next = (self.mapper)(&self.source.value());
        let mut current = self.current.borrow_mut();
        if *current != next {
            *current = next;
            self.changed.set(true);
            trace!(participant = %self.participant.id(), "mapped value updated");
        }
        Ok(())
    }

    fn on_cleanup(&self) {
        self.changed.set(false);
    }
}

/// Derive a behaviour holding `f(source)`.
///
/// Recomputes only in waves where the source changed; equal results are
/// suppressed and produce no downstream change.
pub fn map<S, T>(
    ctx: &BindContext,
    f: impl Fn(&S) -> T + 'static,
    source: &BehaviourRef<S>,
) -> Result<BehaviourRef<T>>
where
    S: Value,
    T: Value,
{
    let initial = f(&source.value());
    let core = Rc::new_cyclic(|this| MapCore {
        participant: Participant::new(),
        source: source.clone(),
        source_change: source.change(),
        mapper: Box::new(f),
        current: RefCell::new(initial),
        changed: Cell::new(false),
        this: this.clone(),
    });
    let node: Weak<dyn WaveNode> = core.this.clone();
    core.participant.bind_node(node);
    core.source_change.add_correlated_node(&core.participant);

    let change = core.source_change.clone();
    let participant = core.participant.clone();
    ctx.finish(&core.participant, move || {
        change.remove_correlated_node(&participant);
    })?;
    Ok(BehaviourRef::new(core))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::variable;

    #[test]
    fn test_map_tracks_source() {
        let ctx = BindContext::forever();
        let v = variable(3);
        let doubled = map(&ctx, |x| x * 2, &v.behaviour()).unwrap();

        assert_eq!(doubled.value(), 6);
        v.set(5).unwrap();
        assert_eq!(doubled.value(), 10);
    }

    #[test]
    fn test_idempotent_writes_recompute_once() {
        let ctx = BindContext::forever();
        let v = variable(3);
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let same = map(
            &ctx,
            move |x: &i32| {
                counter.set(counter.get() + 1);
                x + 0
            },
            &v.behaviour(),
        )
        .unwrap();

        assert_eq!(runs.get(), 1); // initial computation

        v.set(4).unwrap();
        assert_eq!(runs.get(), 2);
        assert_eq!(same.value(), 4);

        v.set(4).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_equal_results_suppress_change() {
        let ctx = BindContext::forever();
        let v = variable(1);
        let parity = map(&ctx, |x| x % 2, &v.behaviour()).unwrap();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let _downstream = map(
            &ctx,
            move |p: &i32| {
                counter.set(counter.get() + 1);
                *p
            },
            &parity,
        )
        .unwrap();

        v.set(3).unwrap(); // parity unchanged: downstream must not recompute
        assert_eq!(fired.get(), 1);

        v.set(4).unwrap(); // parity flips
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn test_disposal_severs_upstream_link() {
        use crate::lifespan::ScopedLifespan;

        let scope = ScopedLifespan::new();
        let ctx = BindContext::new(scope.handle());
        let v = variable(1);
        let mapped = map(&ctx, |x| x + 1, &v.behaviour()).unwrap();

        scope.dispose();
        v.set(2).unwrap();
        // The mapped behaviour is no longer pulled into waves.
        assert_eq!(mapped.value(), 2);
    }
}
