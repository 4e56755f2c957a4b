use std::{env, fmt, fs, path::Path, time::Instant};

use opencv::{core::Vector, imgcodecs};
use telemetry::{rec::Replay, spawn_subscriber, SteeringPublisher, TelemetryState};
use vision::{draw_overlay, FrameResult, SteeringPipeline};

use config::{DriverConfig, SourceConfig};
use frame_source::{FrameSource, VideoFrameSource};

mod config;
mod frame_source;

fn main() -> anyhow::Result<()> {
    setup_logging();

    let config = match env::args().nth(1) {
        Some(path) => {
            log::info!("Loading configuration from {path}");
            DriverConfig::load(path)?
        }
        None => {
            log::info!("No configuration given, using defaults");
            DriverConfig::default()
        }
    };

    let mut pipeline = SteeringPipeline::new(config.pipeline.clone())?;
    let mut source = VideoFrameSource::open(&config.source)?;

    let links = &config.telemetry;
    let state = TelemetryState::new();
    if let Some(addr) = &links.ground_steering_addr {
        spawn_subscriber("ground steering", addr.clone(), links.framing, state.clone());
    }
    if let Some(addr) = &links.distance_addr {
        spawn_subscriber("distance", addr.clone(), links.framing, state.clone());
    }
    let mut publisher = links
        .publish_addr
        .as_ref()
        .map(|addr| SteeringPublisher::new(addr.clone(), links.framing, links.sender_stamp));
    let mut replay = match &links.recording {
        Some(path) => {
            log::info!("Replaying recorded telemetry from {}", path.display());
            Some(Replay::open(path)?)
        }
        None => None,
    };

    if let Some(dir) = &config.debug.overlay_dir {
        fs::create_dir_all(dir)?;
    }

    log::info!("Starting main loop");
    let started = Instant::now();
    while let Some(frame) = source.next_frame()? {
        if let Some(replay) = replay.as_mut() {
            // recorded files are paced by the video clock, live cameras by the wall clock
            let elapsed = match config.source {
                SourceConfig::File { .. } => source.position()?,
                SourceConfig::Camera { .. } => started.elapsed(),
            };
            replay.advance(elapsed, &state)?;
        }
        let distance = state.distance().map(f64::from);
        let result = pipeline.process_frame(&frame, distance)?;
        let angle = result.estimate.angle;

        match state.ground_steering() {
            Some(truth) => log::info!(
                "frame {}: steering {angle:.4}, ground truth {truth:.4}",
                source.frames_read()
            ),
            None => log::info!("frame {}: steering {angle:.4}", source.frames_read()),
        }

        if let Some(publisher) = publisher.as_mut() {
            log_err("publish steering", || publisher.publish(angle));
        }

        if let Some(dir) = &config.debug.overlay_dir {
            if source.frames_read() % config.debug.overlay_every.max(1) == 0 {
                log_err("write overlay", || {
                    write_overlay(dir, source.frames_read(), &result, &pipeline)
                });
            }
        }
    }

    log::info!(
        "Source exhausted after {} frames, side assumption {:?}",
        source.frames_read(),
        pipeline.side_assumption()
    );

    Ok(())
}

fn write_overlay(dir: &Path, frame_no: u64, result: &FrameResult, pipeline: &SteeringPipeline) -> anyhow::Result<()> {
    let reference = pipeline.config().steering.reference();
    let img = draw_overlay(result, &reference)?;
    let path = dir.join(format!("overlay_{frame_no:06}.png"));
    let Some(path) = path.to_str() else {
        anyhow::bail!("Overlay path {} is not valid UTF-8", path.display());
    };
    imgcodecs::imwrite(path, &img, &Vector::new())?;

    Ok(())
}

fn log_err<T, E: fmt::Display>(what: &str, f: impl FnOnce() -> Result<T, E>) {
    if let Err(e) = f() {
        log::error!("Error: Failed to {what}\n{e}");
    }
}

fn setup_logging() {
    simple_log::quick!();
}
