//! Change listeners
//!
//! A watch is a terminal consumer: it runs a callback with the source's
//! freshly resolved value in every wave where the source changed. The
//! callback runs during the watch's own resolution, strictly after its
//! source, inside the wave's queue-driven schedule.

use std::rc::{Rc, Weak};

use tracing::trace;

use crate::behaviour::{BehaviourRef, Value};
use crate::bind::BindContext;
use crate::error::Result;
use crate::event::Event;
use crate::participant::{Participant, WaveNode};
use crate::wave::Wave;

struct WatchCore<T: Value> {
    participant: Participant,
    source: BehaviourRef<T>,
    source_change: Event,
    callback: Box<dyn Fn(&T)>,
    this: Weak<WatchCore<T>>,
}

impl<T: Value> WaveNode for WatchCore<T> {
    fn on_boot(&self, _wave: &Wave) -> Result<()> {
        self.source_change.defer(&self.participant)
    }

    fn on_resolved(&self) -> Result<()> {
        if self.source_change.value() {
            trace!(participant = %self.participant.id(), "watch fired");
            (self.callback)(&self.source.value());
        }
        Ok(())
    }
}

/// Keeps a watch alive; dropping it leaves the watch inert (its lifespan
/// disposal still removes the upstream correlation).
pub struct Watch {
    _core: Rc<dyn WaveNode>,
}

/// Observe `source`, running `f` on its new value after each change
pub fn watch<T: Value>(
    ctx: &BindContext,
    source: &BehaviourRef<T>,
    f: impl Fn(&T) + 'static,
) -> Result<Watch> {
    let core = Rc::new_cyclic(|this| WatchCore {
        participant: Participant::new(),
        source: source.clone(),
        source_change: source.change(),
        callback: Box::new(f),
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
    Ok(Watch { _core: core })
}
