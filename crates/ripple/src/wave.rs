//! The propagation transaction
//!
//! A wave recomputes every behaviour affected by a batch of variable writes,
//! exactly once, in a topological order discovered on the fly. It runs three
//! strictly sequential phases: engagement closes over the correlated
//! reachability set, resolution boots every engaged participant and drains
//! resolutions queue-first (late-installed deferrals simply re-suspend their
//! owner), and cleanup resets per-wave state after every resolution hook has
//! run. A progress check between resolution and cleanup turns an
//! unresolvable configuration into a fatal error instead of a hang.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, error, instrument, trace};

use crate::error::{Error, Result};
use crate::participant::Participant;
use crate::types::{WaveId, WavePhase};

thread_local! {
    /// Wave currently running (or being seeded) on this thread
    static ACTIVE_WAVE: RefCell<Option<Wave>> = const { RefCell::new(None) };
}

struct WaveCore {
    id: WaveId,
    phase: Cell<WavePhase>,
    /// Participants awaiting engagement-closure processing
    engagement: RefCell<VecDeque<Participant>>,
    /// Just-resolved participants whose waiters have not been released yet
    notify: RefCell<VecDeque<Participant>>,
    /// Resolved participants, in resolution order
    resolved: RefCell<Vec<Participant>>,
}

/// One propagation transaction over the behaviour graph
#[derive(Clone)]
pub struct Wave {
    core: Rc<WaveCore>,
}

impl Wave {
    pub(crate) fn new() -> Self {
        let id = WaveId::next();
        trace!(wave = %id, "wave created");
        Self {
            core: Rc::new(WaveCore {
                id,
                phase: Cell::new(WavePhase::New),
                engagement: RefCell::new(VecDeque::new()),
                notify: RefCell::new(VecDeque::new()),
                resolved: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> WaveId {
        self.core.id
    }

    pub fn phase(&self) -> WavePhase {
        self.core.phase.get()
    }

    #[cfg(test)]
    pub(crate) fn set_phase(&self, phase: WavePhase) {
        self.core.phase.set(phase);
    }

    /// The wave active on this thread, if any
    pub fn current() -> Option<Wave> {
        ACTIVE_WAVE.with(|slot| slot.borrow().clone())
    }

    /// Run `body` inside a wave and propagate its writes.
    ///
    /// If a wave is already active on this thread the body joins it: writes
    /// participate in the enclosing transaction and propagation happens when
    /// the outermost `group` completes. Otherwise a fresh wave is installed,
    /// the body seeds it, and the wave runs to completion.
    pub fn group<R>(body: impl FnOnce(&Wave) -> Result<R>) -> Result<R> {
        if let Some(active) = Wave::current() {
            return body(&active);
        }
        let wave = Wave::new();
        let _guard = ActiveGuard::install(&wave);
        let value = body(&wave)?;
        wave.run()?;
        Ok(value)
    }

    /// Queue a participant for engagement.
    ///
    /// Only legal while the wave is seeding or closing its engagement set.
    pub(crate) fn admit(&self, participant: &Participant) -> Result<()> {
        let phase = self.core.phase.get();
        if !phase.accepts_participants() {
            error!(wave = %self.id(), ?phase, participant = %participant.id(), "admission refused");
            return Err(Error::EngagementClosed { wave: self.id() });
        }
        self.core
            .engagement
            .borrow_mut()
            .push_back(participant.clone());
        Ok(())
    }

    /// Record a resolution and queue the participant for waiter release
    pub(crate) fn note_resolved(&self, participant: &Participant) {
        self.core.resolved.borrow_mut().push(participant.clone());
        self.core.notify.borrow_mut().push_back(participant.clone());
    }

    #[instrument(skip(self), fields(wave = %self.core.id))]
    pub(crate) fn run(&self) -> Result<()> {
        self.core.phase.set(WavePhase::Engagement);
        let mut roster = Vec::new();
        loop {
            let next = self.core.engagement.borrow_mut().pop_front();
            let Some(participant) = next else { break };
            participant.engage_complete(self)?;
            roster.push(participant);
        }
        debug!(engaged = roster.len(), "engagement closed");

        self.core.phase.set(WavePhase::Resolution);
        for participant in &roster {
            participant.boot(self)?;
        }
        self.drain_notifications()?;

        let resolved = self.core.resolved.borrow().len();
        if resolved != roster.len() {
            error!(engaged = roster.len(), resolved, "wave stalled");
            return Err(Error::Stalled {
                wave: self.id(),
                engaged: roster.len(),
                resolved,
            });
        }

        self.core.phase.set(WavePhase::Cleanup);
        let resolved = self.core.resolved.take();
        for participant in &resolved {
            participant.cleanup();
        }
        self.core.phase.set(WavePhase::Dead);
        debug!(participants = resolved.len(), "wave complete");
        Ok(())
    }

    /// Release waiters of just-resolved participants until none remain.
    ///
    /// Iterative on purpose: a resolution chain as long as the graph's
    /// diameter must not consume stack.
    fn drain_notifications(&self) -> Result<()> {
        loop {
            let next = self.core.notify.borrow_mut().pop_front();
            let Some(participant) = next else { break };
            participant.notify_deps(self)?;
        }
        Ok(())
    }
}

/// Installs a wave as the thread's active wave; clears the slot on drop so
/// a panicking body cannot leave a dead wave installed.
struct ActiveGuard;

impl ActiveGuard {
    fn install(wave: &Wave) -> Self {
        ACTIVE_WAVE.with(|slot| {
            let mut slot = slot.borrow_mut();
            debug_assert!(slot.is_none());
            *slot = Some(wave.clone());
        });
        Self
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE_WAVE.with(|slot| {
            slot.borrow_mut().take();
        });
    }
}
