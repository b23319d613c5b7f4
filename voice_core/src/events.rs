use crate::{ChannelId, ParticipantId};

/// Commands sent to the session handler by the channel-membership layer.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Register a participant and create its buffers
    OpenSession {
        /// Participant joining voice
        participant: ParticipantId,
        /// Channel the session is bound to
        channel: ChannelId,
    },

    /// Release a participant's buffers and stop dispatching it
    CloseSession {
        /// Participant leaving voice
        participant: ParticipantId,
    },

    /// Close every session bound to a channel
    CloseChannel {
        /// Channel being torn down
        channel: ChannelId,
    },

    /// Shut down the handler (used for testing and clean exit)
    Shutdown,
}

/// Events emitted by the session handler.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A session was opened and the participant is now active
    SessionOpened {
        participant: ParticipantId,
        channel: ChannelId,
    },
    /// A session was closed and its buffers released
    SessionClosed { participant: ParticipantId },
    /// A channel was closed along with every session bound to it
    ChannelClosed { channel: ChannelId },
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::SessionOpened {
                participant,
                channel,
            } => write!(f, "session opened: {} in {}", participant, channel),
            SessionEvent::SessionClosed { participant } => {
                write!(f, "session closed: {}", participant)
            }
            SessionEvent::ChannelClosed { channel } => write!(f, "channel closed: {}", channel),
        }
    }
}
