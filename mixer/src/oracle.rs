use voice_core::{GainPair, ParticipantId};

/// Read-only world query the mixer consults once per listener per tick.
///
/// Implementations live outside the engine (game-world adapter, tests);
/// the engine only requires that concurrent reads from multiple mixing
/// units are safe.
#[cfg_attr(test, mockall::automock)]
pub trait WorldOracle: Send + Sync {
    /// The speakers whose audio is audible to the listener this tick,
    /// from proximity and channel membership. Never includes the listener
    /// itself.
    fn relevant_speakers(&self, listener: ParticipantId) -> Vec<ParticipantId>;

    /// The stereo gain applied to one speaker's audio toward the listener,
    /// recomputed fresh from current poses and preferences.
    fn gain(&self, listener: ParticipantId, speaker: ParticipantId) -> GainPair;
}
