use serde::{Deserialize, Serialize};
use std;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a voice participant.
///
/// A participant is both a speaker (source of frames) and a listener
/// (destination of mixed frames) for the lifetime of its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only the first 8 characters for brevity
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Unique identifier for a voice channel.
///
/// Sessions bind to exactly one channel; closing the channel closes them all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ChannelId(Uuid);

impl ChannelId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a ChannelId from a UUID
    pub fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unified error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Mixer error: {0}")]
    Mixer(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error), // Catch-all for other errors
}

// PCM format shared by every frame in the pipeline
pub const SAMPLE_RATE: u32 = 48000;
pub const CHANNELS: u16 = 2; // Stereo, interleaved
pub const FRAME_MILLIS: u64 = 20;
pub const SAMPLES_PER_FRAME: usize = 960;
/// Bytes in one full 20ms frame: 960 samples x 2 channels x 2 bytes.
pub const FRAME_BYTES: usize = SAMPLES_PER_FRAME * CHANNELS as usize * 2;

pub mod events;
pub mod frame;

// Re-export commonly used types
pub use events::{SessionCommand, SessionEvent};
pub use frame::{GainPair, PcmFrame};
