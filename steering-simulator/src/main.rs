use std::{env, thread::sleep, time::Duration};

use nalgebra::Point2;
use opencv::core::{Mat, Scalar, CV_8UC3};
use rand::{thread_rng, Rng};
use telemetry::{rec::Replay, TelemetryState};
use vision::{steering_angle, Outcome, PipelineConfig, SteeringPipeline};

use simulated_cone::{ConeColor, SimCone};

mod simulated_cone;

const DEFAULT_FRAMES: u64 = 300;
const MAX_LATERAL: i32 = 120;
const FRAME_PERIOD: Duration = Duration::from_millis(33);

fn main() -> anyhow::Result<()> {
    setup_logging();

    let mut args = env::args().skip(1);
    let frames = match args.next() {
        Some(n) => n.parse()?,
        None => DEFAULT_FRAMES,
    };
    let config = match args.next() {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    // distance comes from a recorded session when one is given
    let mut replay = match args.next() {
        Some(path) => Some(Replay::open(path)?),
        None => None,
    };
    let recorded = TelemetryState::new();
    let damping = config.steering.damping;
    let reference = config.steering.reference();
    let (width, height) = (config.frame_width, config.frame_height);
    let mut pipeline = SteeringPipeline::new(config)?;

    let mut rng = thread_rng();
    let mut cones = [SimCone::initial(ConeColor::Blue), SimCone::initial(ConeColor::Yellow)];
    let mut lateral = 0;
    let mut walk = 0.5;
    let (mut compared, mut sign_matches) = (0u64, 0u64);

    log::info!("Simulating {frames} frames");
    for frame_no in 1..=frames {
        sleep(FRAME_PERIOD);

        lateral = (lateral + rng.gen_range(-8..=8)).clamp(-MAX_LATERAL, MAX_LATERAL);
        let distance = match replay.as_mut() {
            Some(replay) => {
                replay.advance(FRAME_PERIOD * frame_no as u32, &recorded)?;
                recorded.distance().map(f64::from)
            }
            None => {
                walk = f64::clamp(walk + rng.gen_range(-0.05..0.05), 0.1, 1.5);
                Some(walk)
            }
        };

        let mut frame = Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(128.0))?;
        for cone in cones.iter_mut() {
            cone.step(&mut rng, lateral);
            cone.draw(&mut frame)?;
        }

        let result = pipeline.process_frame(&frame, distance)?;
        let expected = expected_angle(&pipeline, &cones, &reference).map(|a| a * damping);
        log::debug!(
            "frame {frame_no}: lateral {lateral}, distance {distance:?}, {:?} {:?}",
            result.estimate.state,
            result.estimate.outcome
        );

        match expected {
            Some(expected) => {
                if result.estimate.outcome == Outcome::Accepted {
                    compared += 1;
                    if expected.signum() == result.estimate.angle.signum() {
                        sign_matches += 1;
                    }
                }
                log::info!("frame {frame_no}: steering {:.4}, expected {expected:.4}", result.estimate.angle);
            }
            None => log::info!("frame {frame_no}: steering {:.4}, no cones in view", result.estimate.angle),
        }
    }

    log::info!(
        "Done after {frames} frames, {sign_matches}/{compared} accepted estimates steered the expected way, side {:?}",
        pipeline.side_assumption()
    );

    Ok(())
}

/// Angle toward the midpoint of the visible cones, computed from where they
/// were drawn rather than from what the pipeline detected. Only defined when
/// both cones are visible.
fn expected_angle(pipeline: &SteeringPipeline, cones: &[SimCone], reference: &Point2<f64>) -> Option<f64> {
    let [a, b] = cones else {
        return None;
    };
    if !a.visible || !b.visible {
        return None;
    }
    let a = pipeline.rectifier().map_point(&a.center())?;
    let b = pipeline.rectifier().map_point(&b.center())?;

    Some(steering_angle(reference, &nalgebra::center(&a, &b)))
}

fn setup_logging() {
    simple_log::quick!();
}
