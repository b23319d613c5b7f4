use mixer::WorldOracle;
use spatial::{positional_gain, shared_channel_gain, Pose};
use std::collections::HashMap;
use std::sync::RwLock;
use voice_core::{GainPair, ParticipantId};

/// In-memory stand-in for the game world.
///
/// Holds participant poses, radio-channel tuning and per-listener volume
/// preferences, and answers the engine's oracle queries from them. A real
/// deployment would back this with the game server's entity state; the
/// engine does not care.
pub struct SimWorld {
    state: RwLock<WorldState>,
    hearing_range: f64,
    proximity_factor: f64,
}

#[derive(Default)]
struct WorldState {
    poses: HashMap<ParticipantId, Pose>,
    radios: HashMap<ParticipantId, u32>,
    volumes: HashMap<ParticipantId, HashMap<ParticipantId, f64>>,
}

impl SimWorld {
    pub fn new(hearing_range: f64, proximity_factor: f64) -> Self {
        Self {
            state: RwLock::new(WorldState::default()),
            hearing_range,
            proximity_factor,
        }
    }

    /// Put a participant at a pose, adding it to the world if new.
    pub fn place(&self, participant: ParticipantId, pose: Pose) {
        self.state.write().unwrap().poses.insert(participant, pose);
    }

    /// Remove a participant from the world entirely.
    pub fn remove(&self, participant: ParticipantId) {
        let mut state = self.state.write().unwrap();
        state.poses.remove(&participant);
        state.radios.remove(&participant);
        state.volumes.remove(&participant);
    }

    /// Tune a participant's radio to a channel, or take it off the air.
    pub fn tune_radio(&self, participant: ParticipantId, channel: Option<u32>) {
        let mut state = self.state.write().unwrap();
        match channel {
            Some(channel) => {
                state.radios.insert(participant, channel);
            }
            None => {
                state.radios.remove(&participant);
            }
        }
    }

    /// Set how loudly the listener wants to hear the target, in percent
    /// (0 silences the target, 100 is unchanged).
    pub fn set_volume(&self, listener: ParticipantId, target: ParticipantId, percent: u32) {
        self.state
            .write()
            .unwrap()
            .volumes
            .entry(listener)
            .or_default()
            .insert(target, f64::from(percent.min(100)) / 100.0);
    }

    fn volume_for(state: &WorldState, listener: ParticipantId, target: ParticipantId) -> f64 {
        state
            .volumes
            .get(&listener)
            .and_then(|prefs| prefs.get(&target))
            .copied()
            .unwrap_or(1.0)
    }

    fn share_radio(state: &WorldState, a: ParticipantId, b: ParticipantId) -> bool {
        match (state.radios.get(&a), state.radios.get(&b)) {
            (Some(first), Some(second)) => first == second,
            _ => false,
        }
    }
}

impl WorldOracle for SimWorld {
    fn relevant_speakers(&self, listener: ParticipantId) -> Vec<ParticipantId> {
        let state = self.state.read().unwrap();
        let Some(pose) = state.poses.get(&listener) else {
            return Vec::new();
        };
        // Spatial neighbours within hearing range, plus everyone sharing
        // the listener's radio channel no matter how far away
        state
            .poses
            .iter()
            .filter(|(id, _)| **id != listener)
            .filter(|(id, other)| {
                other.position.distance(pose.position) <= self.hearing_range
                    || Self::share_radio(&state, listener, **id)
            })
            .map(|(id, _)| *id)
            .collect()
    }

    fn gain(&self, listener: ParticipantId, speaker: ParticipantId) -> GainPair {
        let state = self.state.read().unwrap();
        let (Some(listener_pose), Some(speaker_pose)) =
            (state.poses.get(&listener), state.poses.get(&speaker))
        else {
            return GainPair::silent();
        };
        let volume = Self::volume_for(&state, listener, speaker);
        if Self::share_radio(&state, listener, speaker) {
            shared_channel_gain(volume)
        } else {
            positional_gain(
                listener_pose,
                speaker_pose.position,
                volume,
                self.proximity_factor,
            )
        }
    }
}
