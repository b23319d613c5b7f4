use crate::oracle::WorldOracle;
use crate::registry::SessionRegistry;
use crate::scheduler::TickScheduler;
use log::{info, trace};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use voice_core::{Error, ParticipantId, PcmFrame, FRAME_MILLIS};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Period of the mixing cycle; also bounds the per-tick barrier wait.
    pub tick_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(FRAME_MILLIS),
        }
    }
}

/// Facade over the mixing pipeline.
///
/// Owns the session registry and the tick loop and exposes the voice
/// transport boundary: frames in via [`on_frame_received`], mixed frames
/// out via [`poll_frame`]. World knowledge comes in through the
/// [`WorldOracle`] handed to [`new`].
///
/// [`on_frame_received`]: MixerEngine::on_frame_received
/// [`poll_frame`]: MixerEngine::poll_frame
/// [`new`]: MixerEngine::new
pub struct MixerEngine {
    registry: Arc<SessionRegistry>,
    scheduler: Arc<TickScheduler>,
    shutdown_tx: Option<watch::Sender<bool>>,
    tick_task: Option<JoinHandle<()>>,
}

impl MixerEngine {
    pub fn new(oracle: Arc<dyn WorldOracle>, config: EngineConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let scheduler = Arc::new(TickScheduler::new(
            Arc::clone(&registry),
            oracle,
            config.tick_interval,
        ));
        Self {
            registry,
            scheduler,
            shutdown_tx: None,
            tick_task: None,
        }
    }

    /// The session registry, for lifecycle handling and inspection.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Ingress from the voice transport: best effort, no acknowledgement.
    /// Frames from unknown speakers and frames beyond the queue limit are
    /// dropped silently.
    pub fn on_frame_received(&self, speaker: ParticipantId, frame: PcmFrame) {
        match self.registry.session(speaker) {
            Some(session) => {
                if !session.input.push(frame) {
                    trace!("input queue full for {}, frame dropped", speaker);
                }
            }
            None => trace!("frame from unknown speaker {} dropped", speaker),
        }
    }

    /// Egress to the voice transport: non-blocking pop of the listener's
    /// oldest mixed frame.
    pub fn poll_frame(&self, listener: ParticipantId) -> Option<PcmFrame> {
        self.registry.session(listener).and_then(|s| s.output.pop())
    }

    /// Start the periodic mixing loop.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.tick_task.is_some() {
            return Err(Error::InvalidState(
                "mixer engine already running".to_string(),
            ));
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(&self.scheduler);
        self.tick_task = Some(tokio::spawn(async move {
            scheduler.run(shutdown_rx).await;
        }));
        self.shutdown_tx = Some(shutdown_tx);
        info!("mixer engine started");
        Ok(())
    }

    /// Signal the mixing loop to stop; safe to call when not running.
    pub fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
            info!("mixer engine stopped");
        }
        self.tick_task.take();
    }

    /// Drive a single mixing cycle without the periodic loop; used by
    /// tests and embedders that own their own clock.
    pub async fn tick_once(&self) {
        self.scheduler.run_once().await;
    }
}

impl Drop for MixerEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
