//! Detachable passthrough behaviours
//!
//! A proxy forwards its peer's value and change signal until its session is
//! destroyed. Correlation links registered through the proxy land on the
//! peer and are recorded, so detaching returns the peer to its pre-proxy
//! correlation counts. After detach the proxy's event goes silent; the value
//! passthrough itself stays readable.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::behaviour::{Behaviour, BehaviourRef, Value};
use crate::error::Result;
use crate::event::{Event, EventSource};
use crate::participant::Participant;
use crate::session::Session;

struct ProxyCore<T: Value> {
    peer: BehaviourRef<T>,
    peer_change: Event,
    attached: Cell<bool>,
    /// Correlation links forwarded to the peer, with multiplicity
    forwarded: RefCell<Vec<Participant>>,
    this: Weak<ProxyCore<T>>,
}

impl<T: Value> ProxyCore<T> {
    fn detach(&self) {
        if !self.attached.replace(false) {
            return;
        }
        let forwarded = self.forwarded.take();
        debug!(links = forwarded.len(), "proxy detached");
        for node in forwarded {
            self.peer_change.remove_correlated_node(&node);
        }
    }
}

impl<T: Value> Behaviour<T> for ProxyCore<T> {
    fn value(&self) -> T {
        self.peer.value()
    }

    fn change(&self) -> Event {
        Event::bound(self.this.clone())
    }
}

impl<T: Value> EventSource for ProxyCore<T> {
    fn backing(&self) -> Option<Participant> {
        if self.attached.get() {
            self.peer_change.backing()
        } else {
            None
        }
    }

    fn fired(&self) -> bool {
        self.attached.get() && self.peer_change.value()
    }

    fn add_correlated(&self, node: &Participant) {
        if !self.attached.get() {
            return;
        }
        self.peer_change.add_correlated_node(node);
        self.forwarded.borrow_mut().push(node.clone());
    }

    fn remove_correlated(&self, node: &Participant) {
        if !self.attached.get() {
            return;
        }
        self.peer_change.remove_correlated_node(node);
        let mut forwarded = self.forwarded.borrow_mut();
        if let Some(pos) = forwarded.iter().position(|p| p.id() == node.id()) {
            forwarded.remove(pos);
        }
    }
}

/// Wrap `peer` in a passthrough that detaches when `session` is destroyed
pub fn proxy<T: Value>(session: &Session, peer: &BehaviourRef<T>) -> Result<BehaviourRef<T>> {
    let core = Rc::new_cyclic(|this| ProxyCore {
        peer: peer.clone(),
        peer_change: peer.change(),
        attached: Cell::new(true),
        forwarded: RefCell::new(Vec::new()),
        this: this.clone(),
    });
    let weak = core.this.clone();
    session.on_destroy(Box::new(move || {
        if let Some(core) = weak.upgrade() {
            core.detach();
        }
    }))?;
    Ok(BehaviourRef::new(core))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::BindContext;
    use crate::lifespan::forever;
    use crate::map::map;
    use crate::variable::variable;

    #[test]
    fn test_proxy_passes_values_through() {
        let session = Session::new(&forever()).unwrap();
        let v = variable(4);
        let proxied = proxy(&session, &v.behaviour()).unwrap();

        assert_eq!(proxied.value(), 4);
        v.set(5).unwrap();
        assert_eq!(proxied.value(), 5);
    }

    #[test]
    fn test_detach_restores_peer_correlation_baseline() {
        let ctx = BindContext::forever();
        let session = Session::new(&forever()).unwrap();
        let v = variable(1);
        let peer_participant = v.change().backing().unwrap();
        let baseline = peer_participant.correlation_count();

        let proxied = proxy(&session, &v.behaviour()).unwrap();
        let mapped = map(&ctx, |x| x + 1, &proxied).unwrap();
        assert!(peer_participant.correlation_count() > baseline);

        session.destroy();
        assert_eq!(peer_participant.correlation_count(), baseline);

        // Downstream of the proxy no longer sees updates.
        v.set(10).unwrap();
        assert_eq!(mapped.value(), 2);
    }

    #[test]
    fn test_detached_event_is_silent() {
        let session = Session::new(&forever()).unwrap();
        let v = variable(1);
        let proxied = proxy(&session, &v.behaviour()).unwrap();
        let event = proxied.change();

        session.destroy();
        let node = Participant::new();
        event.add_correlated_node(&node);
        assert!(!event.value());
        // Value passthrough survives detachment.
        v.set(2).unwrap();
        assert_eq!(proxied.value(), 2);
    }
}
