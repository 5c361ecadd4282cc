//! Engine errors

use thiserror::Error;

use crate::types::{ParticipantId, WaveId};

/// Engine result type
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
///
/// None of these are recovered internally; they surface to the caller of
/// [`Wave::group`](crate::wave::Wave::group) or a variable write, and the
/// graph must be considered corrupt afterwards.
#[derive(Debug, Error)]
pub enum Error {
    #[error("wave {wave} is past engagement")]
    EngagementClosed { wave: WaveId },

    #[error("participant {participant} is engaged in wave {engaged}, cannot join wave {requested}")]
    WaveConflict {
        participant: ParticipantId,
        engaged: WaveId,
        requested: WaveId,
    },

    #[error("participant {participant} deferred outside an active wave")]
    DeferOutsideWave { participant: ParticipantId },

    #[error("wave {wave} stalled: {engaged} engaged, {resolved} resolved")]
    Stalled {
        wave: WaveId,
        engaged: usize,
        resolved: usize,
    },

    #[error("session is already destroyed")]
    SessionDestroyed,

    #[error("lifespan is already disposed")]
    LifespanDisposed,
}
