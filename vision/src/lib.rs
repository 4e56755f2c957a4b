pub mod config;
pub mod error;
mod preprocess;
mod utils;
mod vision;

use opencv::core::{Mat, Size};

use preprocess::check_frame_size;

pub use config::{ColorRange, DropoutPolicy, NoiseStrategy, PipelineConfig, Selection, SteeringConfig, WarpConfig};
pub use error::ConfigError;
pub use vision::{
    blobs::{Blob, BlobBounds, BlobExtractor, DetectionSet},
    noise::NoiseReducer,
    overlay::draw_overlay,
    rectify::PerspectiveRectifier,
    segmentation::ColorSegmenter,
    side::{ConeSide, SideAssumption, SideDisambiguator},
    steering::{steering_angle, DetectionState, Outcome, SteeringEstimate, SteeringEstimator},
};

/// Everything one frame produced. Masks are the rectified, cleaned masks and
/// are dropped with the result.
#[derive(Debug)]
pub struct FrameResult {
    pub estimate: SteeringEstimate,
    pub blue: DetectionSet,
    pub yellow: DetectionSet,
    pub blue_mask: Mat,
    pub yellow_mask: Mat,
    pub side: Option<ConeSide>,
}

/// Per-run context of the cone steering pipeline. Owns the cached homography,
/// the structuring element, the one-shot side decision and the last estimate.
pub struct SteeringPipeline {
    config: PipelineConfig,
    noise: NoiseReducer,
    rectifier: PerspectiveRectifier,
    blobs: BlobExtractor,
    side: SideAssumption,
    estimator: SteeringEstimator,
}

impl SteeringPipeline {
    pub fn new(config: PipelineConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let noise = NoiseReducer::new(config.noise)?;
        let rectifier = PerspectiveRectifier::new(&config.warp, Size::new(config.frame_width, config.frame_height))?;
        let blobs = BlobExtractor::new(&config.blobs);
        let estimator = SteeringEstimator::new(config.steering.clone())?;
        log::info!(
            "Pipeline ready for {}x{} frames, noise strategy {:?}",
            config.frame_width,
            config.frame_height,
            config.noise
        );

        Ok(Self {
            config,
            noise,
            rectifier,
            blobs,
            side: SideAssumption::default(),
            estimator,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn rectifier(&self) -> &PerspectiveRectifier {
        &self.rectifier
    }

    pub fn side_assumption(&self) -> Option<ConeSide> {
        self.side.get()
    }

    pub fn previous_estimate(&self) -> f64 {
        self.estimator.previous()
    }

    /// Runs every stage for both colors and estimates the steering angle.
    /// `distance` is the latest raw distance telemetry, if any was received.
    pub fn process_frame(&mut self, frame: &Mat, distance: Option<f64>) -> anyhow::Result<FrameResult> {
        check_frame_size(frame, self.config.frame_width, self.config.frame_height)?;

        let img_hsv = ColorSegmenter::to_hsv(frame)?;
        let (blue_mask, blue) = self.detect(&img_hsv, &self.config.blue)?;
        let (yellow_mask, yellow) = self.detect(&img_hsv, &self.config.yellow)?;

        let side = self.side.observe(&blue_mask, !blue.is_empty())?;
        let estimate = self.estimator.estimate(&blue, &yellow, side, distance);
        log::debug!(
            "Blue {}, yellow {}, {:?} -> {:.4} ({:?})",
            blue.len(),
            yellow.len(),
            estimate.state,
            estimate.angle,
            estimate.outcome
        );

        Ok(FrameResult {
            estimate,
            blue,
            yellow,
            blue_mask,
            yellow_mask,
            side,
        })
    }

    fn detect(&self, img_hsv: &Mat, range: &ColorRange) -> anyhow::Result<(Mat, DetectionSet)> {
        let mask = ColorSegmenter::segment(img_hsv, range)?;
        let cleaned = self.noise.reduce(&mask)?;
        let rectified = self.rectifier.rectify(&cleaned)?;
        let blobs = self.blobs.extract(&rectified)?;

        Ok((rectified, blobs))
    }
}
