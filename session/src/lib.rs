//! Session lifecycle handling for proxvoice.
//!
//! This crate bridges the external channel-membership layer and the mixing
//! engine: join/leave/channel-close notifications arrive as commands over
//! an mpsc channel and are applied to the engine's session registry, with
//! the outcomes reported as events for the notification layer.

use log::{error, info};
use mixer::SessionRegistry;
use std::sync::Arc;
use tokio::sync::mpsc;
use voice_core::{Error, SessionCommand, SessionEvent};

/// Applies lifecycle commands to the session registry and reports outcomes.
pub struct SessionHandler {
    /// The registry owned by the mixing engine
    registry: Arc<SessionRegistry>,
    /// Channel for receiving lifecycle commands from the membership layer
    command_rx: mpsc::Receiver<SessionCommand>,
    /// Channel for sending session events to the notification layer
    event_tx: mpsc::Sender<SessionEvent>,
}

impl SessionHandler {
    pub fn new(
        registry: Arc<SessionRegistry>,
        command_rx: mpsc::Receiver<SessionCommand>,
        event_tx: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            registry,
            command_rx,
            event_tx,
        }
    }

    /// Run the handler, processing commands until shutdown or until the
    /// command channel closes.
    pub async fn run(&mut self) -> Result<(), Error> {
        while let Some(command) = self.command_rx.recv().await {
            // Check for shutdown command first
            if let SessionCommand::Shutdown = command {
                info!("Received shutdown command, exiting session handler");
                break;
            }

            if let Err(e) = self.handle_command(command).await {
                error!("Error handling session command: {}", e);
            }
        }

        Ok(())
    }

    /// Handle a single lifecycle command
    async fn handle_command(&mut self, command: SessionCommand) -> Result<(), Error> {
        match command {
            SessionCommand::OpenSession {
                participant,
                channel,
            } => {
                self.registry.open_session(participant, channel);
                self.emit(SessionEvent::SessionOpened {
                    participant,
                    channel,
                })
                .await?;
            }

            SessionCommand::CloseSession { participant } => {
                if self.registry.close_session(participant) {
                    self.emit(SessionEvent::SessionClosed { participant })
                        .await?;
                }
            }

            SessionCommand::CloseChannel { channel } => {
                for participant in self.registry.close_channel(channel) {
                    self.emit(SessionEvent::SessionClosed { participant })
                        .await?;
                }
                self.emit(SessionEvent::ChannelClosed { channel }).await?;
            }

            // Handled in run()
            SessionCommand::Shutdown => {}
        }
        Ok(())
    }

    async fn emit(&self, event: SessionEvent) -> Result<(), Error> {
        self.event_tx
            .send(event)
            .await
            .map_err(|e| Error::Session(format!("Failed to emit session event: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_core::{ChannelId, ParticipantId};

    struct Harness {
        registry: Arc<SessionRegistry>,
        command_tx: mpsc::Sender<SessionCommand>,
        event_rx: mpsc::Receiver<SessionEvent>,
        handler: tokio::task::JoinHandle<Result<(), Error>>,
    }

    fn spawn_handler() -> Harness {
        let registry = Arc::new(SessionRegistry::new());
        let (command_tx, command_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::channel(8);
        let mut handler = SessionHandler::new(Arc::clone(&registry), command_rx, event_tx);
        let handler = tokio::spawn(async move { handler.run().await });
        Harness {
            registry,
            command_tx,
            event_rx,
            handler,
        }
    }

    #[tokio::test]
    async fn open_then_close_emits_matching_events() {
        let mut harness = spawn_handler();
        let participant = ParticipantId::new();
        let channel = ChannelId::new();

        harness
            .command_tx
            .send(SessionCommand::OpenSession {
                participant,
                channel,
            })
            .await
            .unwrap();
        assert_eq!(
            harness.event_rx.recv().await,
            Some(SessionEvent::SessionOpened {
                participant,
                channel
            })
        );
        assert!(harness.registry.session(participant).is_some());

        harness
            .command_tx
            .send(SessionCommand::CloseSession { participant })
            .await
            .unwrap();
        assert_eq!(
            harness.event_rx.recv().await,
            Some(SessionEvent::SessionClosed { participant })
        );
        assert!(harness.registry.session(participant).is_none());

        harness
            .command_tx
            .send(SessionCommand::Shutdown)
            .await
            .unwrap();
        harness.handler.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn closing_unknown_session_emits_nothing() {
        let mut harness = spawn_handler();

        harness
            .command_tx
            .send(SessionCommand::CloseSession {
                participant: ParticipantId::new(),
            })
            .await
            .unwrap();
        // The next event observed is for the follow-up open, not the no-op close
        let participant = ParticipantId::new();
        let channel = ChannelId::new();
        harness
            .command_tx
            .send(SessionCommand::OpenSession {
                participant,
                channel,
            })
            .await
            .unwrap();
        assert_eq!(
            harness.event_rx.recv().await,
            Some(SessionEvent::SessionOpened {
                participant,
                channel
            })
        );
    }

    #[tokio::test]
    async fn close_channel_fans_out_to_every_session() {
        let mut harness = spawn_handler();
        let channel = ChannelId::new();
        let first = ParticipantId::new();
        let second = ParticipantId::new();

        for participant in [first, second] {
            harness
                .command_tx
                .send(SessionCommand::OpenSession {
                    participant,
                    channel,
                })
                .await
                .unwrap();
            harness.event_rx.recv().await.unwrap();
        }

        harness
            .command_tx
            .send(SessionCommand::CloseChannel { channel })
            .await
            .unwrap();

        let mut closed = Vec::new();
        loop {
            match harness.event_rx.recv().await.unwrap() {
                SessionEvent::SessionClosed { participant } => closed.push(participant),
                SessionEvent::ChannelClosed { channel: c } => {
                    assert_eq!(c, channel);
                    break;
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        closed.sort();
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(closed, expected);
        assert!(harness.registry.is_empty());
    }

    #[tokio::test]
    async fn handler_exits_when_command_channel_closes() {
        let harness = spawn_handler();
        drop(harness.command_tx);
        harness.handler.await.unwrap().unwrap();
    }
}
