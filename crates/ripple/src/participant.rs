//! Per-node wave participation
//!
//! A participant is the scheduling handle a behaviour registers with a wave.
//! It tracks which wave the node is enrolled in, which other nodes it drags
//! along (correlation), which nodes wait on it (downstream), and how many of
//! its own dependencies are still unresolved. Resolution is driven by the
//! wave's queues, never by recursion, so graph diameter does not translate
//! into stack depth.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::types::{NodeState, ParticipantId, WaveId};
use crate::wave::Wave;

/// Callback queued to run just before its participant resolves.
///
/// It may install further deferrals, delaying the resolution it precedes.
pub type PreResolveFn = Box<dyn FnOnce(&Wave) -> Result<()>>;

/// Per-wave hooks a node supplies to its participant.
///
/// Held weakly: a dropped node leaves its participant inert but harmless.
pub(crate) trait WaveNode {
    fn on_boot(&self, wave: &Wave) -> Result<()> {
        let _ = wave;
        Ok(())
    }

    fn on_resolved(&self) -> Result<()> {
        Ok(())
    }

    fn on_cleanup(&self) {}
}

/// A counted correlation link
struct CorrelatedLink {
    node: Participant,
    count: usize,
}

struct ParticipantCore {
    id: ParticipantId,
    state: Cell<NodeState>,
    /// Wave this participant is currently enrolled in
    wave: Cell<Option<WaveId>>,
    /// Unresolved upstream dependencies within the current wave
    pending_deps: Cell<usize>,
    /// Nodes pulled into any wave this one joins, without ordering them.
    /// Counted: N adds need N removes to sever a link.
    correlated: RefCell<IndexMap<ParticipantId, CorrelatedLink>>,
    /// Participants waiting on this one; each entry is one pending unit
    downstream: RefCell<Vec<Participant>>,
    /// Callbacks to run before this participant may resolve
    pre_resolve: RefCell<VecDeque<PreResolveFn>>,
    node: RefCell<Option<Weak<dyn WaveNode>>>,
}

/// Shared handle to a node's wave participation state
#[derive(Clone)]
pub struct Participant {
    core: Rc<ParticipantCore>,
}

impl Participant {
    pub(crate) fn new() -> Self {
        Self {
            core: Rc::new(ParticipantCore {
                id: ParticipantId::next(),
                state: Cell::new(NodeState::Ready),
                wave: Cell::new(None),
                pending_deps: Cell::new(0),
                correlated: RefCell::new(IndexMap::new()),
                downstream: RefCell::new(Vec::new()),
                pre_resolve: RefCell::new(VecDeque::new()),
                node: RefCell::new(None),
            }),
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.core.id
    }

    pub fn state(&self) -> NodeState {
        self.core.state.get()
    }

    /// Attach the node's hooks. Called once, right after the node is built.
    pub(crate) fn bind_node(&self, node: Weak<dyn WaveNode>) {
        *self.core.node.borrow_mut() = Some(node);
    }

    fn node(&self) -> Option<Rc<dyn WaveNode>> {
        self.core.node.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Total multiplicity of correlation links held by this participant
    pub(crate) fn correlation_count(&self) -> usize {
        self.core.correlated.borrow().values().map(|l| l.count).sum()
    }

    /// Add one correlation link to `node`
    pub(crate) fn add_correlated(&self, node: &Participant) {
        let mut correlated = self.core.correlated.borrow_mut();
        correlated
            .entry(node.id())
            .or_insert_with(|| CorrelatedLink {
                node: node.clone(),
                count: 0,
            })
            .count += 1;
        trace!(participant = %self.id(), node = %node.id(), "correlation added");
    }

    /// Remove one correlation link to `node`; absent links are a no-op
    pub(crate) fn remove_correlated(&self, node: &Participant) {
        let mut correlated = self.core.correlated.borrow_mut();
        if let Some(link) = correlated.get_mut(&node.id()) {
            link.count -= 1;
            if link.count == 0 {
                correlated.shift_remove(&node.id());
            }
            trace!(participant = %self.id(), node = %node.id(), "correlation removed");
        }
    }

    /// Enroll this participant in `wave`.
    ///
    /// Idempotent within one wave. Fails if the participant is enrolled in a
    /// different wave or the wave is past engagement.
    pub(crate) fn engage(&self, wave: &Wave) -> Result<()> {
        match self.core.wave.get() {
            Some(current) if current == wave.id() => return Ok(()),
            Some(current) => {
                return Err(Error::WaveConflict {
                    participant: self.id(),
                    engaged: current,
                    requested: wave.id(),
                });
            }
            None => {}
        }
        wave.admit(self)?;
        self.core.wave.set(Some(wave.id()));
        self.core.state.set(NodeState::Engaged);
        trace!(participant = %self.id(), wave = %wave.id(), "engaged");
        Ok(())
    }

    fn engaged_in(&self, wave: WaveId) -> bool {
        self.core.state.get() == NodeState::Engaged && self.core.wave.get() == Some(wave)
    }

    /// Enroll every correlated participant in `wave`
    pub(crate) fn engage_complete(&self, wave: &Wave) -> Result<()> {
        let nodes: Vec<Participant> = self
            .core
            .correlated
            .borrow()
            .values()
            .map(|l| l.node.clone())
            .collect();
        for node in nodes {
            node.engage(wave)?;
        }
        Ok(())
    }

    /// Declare that this participant must not resolve until `target` has.
    ///
    /// Legal only while this participant is engaged. A target that is not
    /// engaged in the same wave is already satisfied and the call is a no-op.
    pub(crate) fn defer(&self, target: &Participant) -> Result<()> {
        let wave = match (self.core.state.get(), self.core.wave.get()) {
            (NodeState::Engaged, Some(wave)) => wave,
            _ => {
                return Err(Error::DeferOutsideWave {
                    participant: self.id(),
                });
            }
        };
        if !target.engaged_in(wave) {
            return Ok(());
        }
        self.core.pending_deps.set(self.core.pending_deps.get() + 1);
        target.core.downstream.borrow_mut().push(self.clone());
        trace!(
            participant = %self.id(),
            target = %target.id(),
            pending = self.core.pending_deps.get(),
            "deferred"
        );
        Ok(())
    }

    /// Queue a callback to run before this participant resolves
    pub(crate) fn invoke_before_resolve(&self, callback: PreResolveFn) -> Result<()> {
        if self.core.state.get() != NodeState::Engaged {
            return Err(Error::DeferOutsideWave {
                participant: self.id(),
            });
        }
        self.core.pre_resolve.borrow_mut().push_back(callback);
        Ok(())
    }

    /// Run the node's boot hook, then attempt resolution
    pub(crate) fn boot(&self, wave: &Wave) -> Result<()> {
        if let Some(node) = self.node() {
            node.on_boot(wave)?;
        }
        self.try_resolve(wave)
    }

    /// Resolve if possible: drain pre-resolution callbacks while no
    /// dependencies are pending, then flip to RESOLVED; otherwise suspend
    /// until the pending upstream resolutions arrive.
    pub(crate) fn try_resolve(&self, wave: &Wave) -> Result<()> {
        if self.core.state.get() != NodeState::Engaged {
            return Ok(());
        }
        loop {
            if self.core.pending_deps.get() > 0 {
                trace!(
                    participant = %self.id(),
                    pending = self.core.pending_deps.get(),
                    "suspended"
                );
                return Ok(());
            }
            let callback = self.core.pre_resolve.borrow_mut().pop_front();
            match callback {
                Some(callback) => callback(wave)?,
                None => break,
            }
        }
        self.core.state.set(NodeState::Resolved);
        if let Some(node) = self.node() {
            node.on_resolved()?;
        }
        trace!(participant = %self.id(), "resolved");
        wave.note_resolved(self);
        Ok(())
    }

    /// One of this participant's dependencies resolved
    fn dep_resolved(&self, wave: &Wave) -> Result<()> {
        debug_assert_eq!(self.core.state.get(), NodeState::Engaged);
        let pending = self.core.pending_deps.get() - 1;
        self.core.pending_deps.set(pending);
        if pending == 0 {
            self.try_resolve(wave)?;
        }
        Ok(())
    }

    /// Release every participant waiting on this one
    pub(crate) fn notify_deps(&self, wave: &Wave) -> Result<()> {
        let waiters: Vec<Participant> = self.core.downstream.borrow_mut().drain(..).collect();
        for waiter in waiters {
            waiter.dep_resolved(wave)?;
        }
        Ok(())
    }

    /// Reset per-wave state and run the node's cleanup hook
    pub(crate) fn cleanup(&self) {
        debug_assert_eq!(self.core.pending_deps.get(), 0);
        debug_assert!(self.core.pre_resolve.borrow().is_empty());
        self.core.state.set(NodeState::Ready);
        self.core.wave.set(None);
        if let Some(node) = self.node() {
            node.on_cleanup();
        }
        debug!(participant = %self.id(), "cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WavePhase;

    struct MockNode {
        booted: Cell<u32>,
        resolved: Cell<u32>,
        cleaned: Cell<u32>,
    }

    impl MockNode {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                booted: Cell::new(0),
                resolved: Cell::new(0),
                cleaned: Cell::new(0),
            })
        }
    }

    impl WaveNode for MockNode {
        fn on_boot(&self, _wave: &Wave) -> Result<()> {
            self.booted.set(self.booted.get() + 1);
            Ok(())
        }

        fn on_resolved(&self) -> Result<()> {
            self.resolved.set(self.resolved.get() + 1);
            Ok(())
        }

        fn on_cleanup(&self) {
            self.cleaned.set(self.cleaned.get() + 1);
        }
    }

    fn bound_participant(node: &Rc<MockNode>) -> Participant {
        let participant = Participant::new();
        let node_dyn: Rc<dyn WaveNode> = node.clone();
        let weak: Weak<dyn WaveNode> = Rc::downgrade(&node_dyn);
        participant.bind_node(weak);
        participant
    }

    #[test]
    fn test_correlation_is_counted() {
        let a = Participant::new();
        let b = Participant::new();

        a.add_correlated(&b);
        a.add_correlated(&b);
        assert_eq!(a.correlation_count(), 2);

        a.remove_correlated(&b);
        assert_eq!(a.correlation_count(), 1);

        a.remove_correlated(&b);
        assert_eq!(a.correlation_count(), 0);

        // Removing an absent link is a no-op
        a.remove_correlated(&b);
        assert_eq!(a.correlation_count(), 0);
    }

    #[test]
    fn test_engage_is_idempotent_per_wave() {
        let wave = Wave::new();
        let p = Participant::new();

        p.engage(&wave).unwrap();
        p.engage(&wave).unwrap();

        assert_eq!(p.state(), NodeState::Engaged);
    }

    #[test]
    fn test_engage_rejects_second_wave() {
        let wave_a = Wave::new();
        let wave_b = Wave::new();
        let p = Participant::new();

        p.engage(&wave_a).unwrap();
        let err = p.engage(&wave_b).unwrap_err();

        assert!(matches!(err, Error::WaveConflict { .. }));
    }

    #[test]
    fn test_defer_requires_engagement() {
        let p = Participant::new();
        let target = Participant::new();

        let err = p.defer(&target).unwrap_err();
        assert!(matches!(err, Error::DeferOutsideWave { .. }));
    }

    #[test]
    fn test_defer_to_unengaged_target_is_noop() {
        let wave = Wave::new();
        let p = Participant::new();
        let target = Participant::new();

        p.engage(&wave).unwrap();
        p.defer(&target).unwrap();

        // No pending dependency was recorded; the participant resolves freely.
        let node = MockNode::new();
        let bound = bound_participant(&node);
        bound.engage(&wave).unwrap();
        wave.set_phase(WavePhase::Resolution);
        bound.boot(&wave).unwrap();
        assert_eq!(node.resolved.get(), 1);
    }

    #[test]
    fn test_boot_resolves_leaf_and_cleanup_resets() {
        let wave = Wave::new();
        let node = MockNode::new();
        let p = bound_participant(&node);

        p.engage(&wave).unwrap();
        wave.set_phase(WavePhase::Resolution);
        p.boot(&wave).unwrap();

        assert_eq!(node.booted.get(), 1);
        assert_eq!(node.resolved.get(), 1);
        assert_eq!(p.state(), NodeState::Resolved);

        p.cleanup();
        assert_eq!(node.cleaned.get(), 1);
        assert_eq!(p.state(), NodeState::Ready);
    }
}
