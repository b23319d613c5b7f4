//! CLI demo for proxvoice.
//!
//! Simulates a handful of participants walking a game world while talking:
//! each one feeds tone frames into the mixing engine at the transport rate
//! and polls its own mixed output, with positions, facing directions and
//! radio channels served to the engine by an in-memory world oracle.

mod world;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use log::{debug, info};
use mixer::{EngineConfig, MixerEngine};
use session::SessionHandler;
use settings_manager::ConfigManager;
use spatial::{Pose, Vec3};
use std::sync::Arc;
use tokio::sync::mpsc;
use voice_core::{ChannelId, ParticipantId, PcmFrame, SessionCommand, SAMPLES_PER_FRAME};
use world::SimWorld;

/// proxvoice - positional voice mixing demo
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Number of simulated participants
    #[clap(short, long, default_value_t = 4)]
    participants: usize,

    /// How long to run the simulation, in seconds
    #[clap(short = 't', long, default_value_t = 5)]
    duration: u64,

    /// Override the configured proximity factor
    #[clap(long)]
    factor: Option<f64>,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

/// One 20ms frame of a square-wave tone, stereo interleaved.
fn tone_frame(step: u64, period_samples: usize, amplitude: i16) -> PcmFrame {
    let mut samples = Vec::with_capacity(SAMPLES_PER_FRAME * 2);
    for n in 0..SAMPLES_PER_FRAME {
        let phase = (step as usize * SAMPLES_PER_FRAME + n) % period_samples;
        let value = if phase < period_samples / 2 {
            amplitude
        } else {
            -amplitude
        };
        samples.push(value);
        samples.push(value);
    }
    PcmFrame::from_samples(&samples)
}

fn peak_level(frame: &PcmFrame) -> i16 {
    let mut peak = 0i16;
    let mut index = 0;
    while let Some(sample) = frame.sample(index) {
        peak = peak.max(sample.saturating_abs());
        index += 1;
    }
    peak
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configure logging based on debug flag
    if args.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
        debug!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("Starting proxvoice demo");

    let mut config = ConfigManager::new()?;
    if let Some(factor) = args.factor {
        config.settings_mut().proximity_factor = factor;
    }
    let settings = config.settings().clone();

    let world = Arc::new(SimWorld::new(
        settings.hearing_range,
        settings.proximity_factor,
    ));
    let mut engine = MixerEngine::new(world.clone(), EngineConfig {
        tick_interval: settings.tick_interval(),
    });

    // Session lifecycle plumbing, the way the membership layer would drive it
    let (command_tx, command_rx) = mpsc::channel(32);
    let (event_tx, mut event_rx) = mpsc::channel(32);
    let mut handler = SessionHandler::new(Arc::clone(engine.registry()), command_rx, event_tx);
    let handler_task = tokio::spawn(async move { handler.run().await });

    // Participants stand on a circle facing its centre; the first two also
    // share a radio channel so they hear each other regardless of distance
    let channel = ChannelId::new();
    let mut ids = Vec::with_capacity(args.participants);
    for index in 0..args.participants {
        let id = ParticipantId::new();
        let theta = index as f64 * std::f64::consts::TAU / args.participants.max(1) as f64;
        let position = Vec3::new(theta.cos() * 20.0, 0.0, theta.sin() * 20.0);
        let facing = Vec3::new(-theta.cos(), 0.0, -theta.sin());
        world.place(id, Pose::new(position, facing));
        if index < 2 {
            world.tune_radio(id, Some(7));
        }
        command_tx
            .send(SessionCommand::OpenSession {
                participant: id,
                channel,
            })
            .await?;
        ids.push(id);
    }
    for _ in 0..ids.len() {
        if let Some(event) = event_rx.recv().await {
            info!("{}", event);
        }
    }

    // Keep reporting lifecycle events while the simulation runs
    let event_drainer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            info!("{}", event);
        }
    });

    engine.start()?;
    let engine = Arc::new(engine);

    let ticks = args.duration * 1000 / settings.tick_interval_ms.max(1);
    let mut tasks = tokio::task::JoinSet::new();
    for (index, id) in ids.iter().copied().enumerate() {
        let engine = Arc::clone(&engine);
        let tick_interval = settings.tick_interval();
        // Give every participant a distinct tone so mixes are tellable apart
        let period_samples = 96 * (index + 1);
        tasks.spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval);
            let mut received = 0u64;
            for step in 0..ticks {
                ticker.tick().await;
                engine.on_frame_received(id, tone_frame(step, period_samples, 6000));
                if let Some(frame) = engine.poll_frame(id) {
                    received += 1;
                    debug!("{} heard a frame, peak {}", id, peak_level(&frame));
                }
            }
            (id, received)
        });
    }

    while let Some(result) = tasks.join_next().await {
        let (id, received) = result?;
        info!("{} received {} mixed frames", id, received);
    }

    // Tear down: close the channel (which closes every session), then the
    // handler and the engine
    command_tx
        .send(SessionCommand::CloseChannel { channel })
        .await?;
    command_tx.send(SessionCommand::Shutdown).await?;
    handler_task.await??;
    event_drainer.await?;

    if let Ok(mut engine) = Arc::try_unwrap(engine) {
        engine.stop();
    }
    info!("Demo finished after {}s", args.duration);
    Ok(())
}
