use crate::buffer::{FrameBuffer, OutputBuffer};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use voice_core::{ChannelId, ParticipantId};

/// Buffers and per-listener mixing state for one live participant.
///
/// A session owns its buffers exclusively; no two sessions ever share one.
/// Mixing units hold an `Arc` to the session they work on, so a session
/// closed mid-tick stays readable until the unit finishes and the work
/// degrades to a no-op instead of a fault.
#[derive(Debug)]
pub struct Session {
    participant: ParticipantId,
    channel: ChannelId,
    /// Frames received from this participant's voice stream.
    pub(crate) input: FrameBuffer,
    /// Mixed frames awaiting pickup by the transport.
    pub(crate) output: OutputBuffer,
    /// Per-speaker sequence numbers of the frames most recently mixed for
    /// this listener; an unchanged oldest frame is never mixed twice.
    pub(crate) mixed_watermarks: Mutex<HashMap<ParticipantId, u64>>,
}

impl Session {
    fn new(participant: ParticipantId, channel: ChannelId) -> Self {
        Self {
            participant,
            channel,
            input: FrameBuffer::new(),
            output: OutputBuffer::new(),
            mixed_watermarks: Mutex::new(HashMap::new()),
        }
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Frames queued from this participant's stream.
    pub fn queued_input(&self) -> usize {
        self.input.len()
    }

    /// Mixed frames waiting for the transport.
    pub fn pending_output(&self) -> usize {
        self.output.len()
    }
}

/// Tracks which participants currently hold a live voice session.
///
/// Open and close serialize against tick dispatch through the interior
/// lock; the scheduler snapshots the active set at the start of each tick.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ParticipantId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create buffers for a participant and mark it active. An already
    /// open session for the same identity is closed first; at most one
    /// live session exists per identity.
    pub fn open_session(&self, participant: ParticipantId, channel: ChannelId) -> Arc<Session> {
        let mut sessions = self.sessions.write().unwrap();
        if sessions.remove(&participant).is_some() {
            debug!("replacing existing session for {}", participant);
        }
        let session = Arc::new(Session::new(participant, channel));
        sessions.insert(participant, Arc::clone(&session));
        info!("session opened for {} in channel {}", participant, channel);
        session
    }

    /// Release a participant's buffers and remove it from future tick
    /// dispatch. Returns false when no session was open.
    pub fn close_session(&self, participant: ParticipantId) -> bool {
        let removed = self.sessions.write().unwrap().remove(&participant);
        if removed.is_some() {
            info!("session closed for {}", participant);
        }
        removed.is_some()
    }

    /// Close every session bound to the channel; returns the participants
    /// whose sessions were closed.
    pub fn close_channel(&self, channel: ChannelId) -> Vec<ParticipantId> {
        let mut sessions = self.sessions.write().unwrap();
        let closing: Vec<ParticipantId> = sessions
            .values()
            .filter(|s| s.channel == channel)
            .map(|s| s.participant)
            .collect();
        for participant in &closing {
            sessions.remove(participant);
        }
        if !closing.is_empty() {
            info!("channel {} closed, {} sessions released", channel, closing.len());
        }
        closing
    }

    pub fn session(&self, participant: ParticipantId) -> Option<Arc<Session>> {
        self.sessions.read().unwrap().get(&participant).cloned()
    }

    /// Snapshot of every live session, taken once per tick.
    pub fn active_sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().unwrap().is_empty()
    }

    /// The tick's trim step: consume one slot of latency by dropping the
    /// oldest queued frame from every non-empty ingestion buffer. Runs
    /// strictly after the tick barrier.
    pub(crate) fn trim_inputs(&self) {
        for session in self.sessions.read().unwrap().values() {
            session.input.drop_oldest();
        }
    }
}
