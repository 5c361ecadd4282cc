//! Change events
//!
//! An event is the capability bundle a behaviour exposes for its change
//! signal: correlation management, deferral, and the fired-this-wave flag.
//! Events hold their source weakly; once the owning behaviour is gone (or a
//! proxy is severed) every operation degrades to a harmless no-op and the
//! flag reads false.

use std::rc::{Rc, Weak};

use crate::error::Result;
use crate::participant::{Participant, PreResolveFn};

/// Backing store of an event, implemented by behaviour cores.
pub(crate) trait EventSource {
    /// Participant carrying this event's wave participation, if any.
    ///
    /// `None` means the event is permanently silent (severed proxy).
    fn backing(&self) -> Option<Participant>;

    /// Whether the owning behaviour changed during the current wave
    fn fired(&self) -> bool;

    fn add_correlated(&self, node: &Participant) {
        if let Some(backing) = self.backing() {
            backing.add_correlated(node);
        }
    }

    fn remove_correlated(&self, node: &Participant) {
        if let Some(backing) = self.backing() {
            backing.remove_correlated(node);
        }
    }
}

/// A behaviour's boolean change signal
#[derive(Clone, Default)]
pub struct Event {
    source: Option<Weak<dyn EventSource>>,
}

impl Event {
    pub(crate) fn bound(source: Weak<dyn EventSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// The event that never fires; correlation and deferral are no-ops.
    pub fn never() -> Self {
        Self { source: None }
    }

    fn source(&self) -> Option<Rc<dyn EventSource>> {
        self.source.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn backing(&self) -> Option<Participant> {
        self.source().and_then(|source| source.backing())
    }

    /// Register `node` to be pulled into any wave this event's owner joins
    pub fn add_correlated_node(&self, node: &Participant) {
        if let Some(source) = self.source() {
            source.add_correlated(node);
        }
    }

    /// Remove one correlation link for `node`
    pub fn remove_correlated_node(&self, node: &Participant) {
        if let Some(source) = self.source() {
            source.remove_correlated(node);
        }
    }

    /// Declare that `waiter` must resolve after this event's owner.
    ///
    /// A no-op when the owner is absent or not engaged in `waiter`'s wave.
    pub fn defer(&self, waiter: &Participant) -> Result<()> {
        match self.backing() {
            Some(owner) => waiter.defer(&owner),
            None => Ok(()),
        }
    }

    /// Defer, and queue `callback` to run just before `waiter` resolves.
    ///
    /// The callback is queued even when the owner is absent, so consumers
    /// that depend on it for progress still run it.
    pub fn defer_by(&self, waiter: &Participant, callback: PreResolveFn) -> Result<()> {
        if let Some(owner) = self.backing() {
            waiter.defer(&owner)?;
        }
        waiter.invoke_before_resolve(callback)
    }

    /// Whether the owning behaviour changed during the current wave
    pub fn value(&self) -> bool {
        self.source().map(|source| source.fired()).unwrap_or(false)
    }
}
