use std::{fs, path::Path};

use anyhow::Context;
use itertools::Itertools;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Everything the pipeline needs to know at startup. Values are read once and
/// stay constant for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub frame_width: i32,
    pub frame_height: i32,
    pub blue: ColorRange,
    pub yellow: ColorRange,
    pub noise: NoiseStrategy,
    pub warp: WarpConfig,
    pub blobs: BlobConfig,
    pub steering: SteeringConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_width: 640,
            frame_height: 480,
            blue: ColorRange::BLUE,
            yellow: ColorRange::YELLOW,
            noise: NoiseStrategy::default(),
            warp: WarpConfig::default(),
            blobs: BlobConfig::default(),
            steering: SteeringConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_width <= 0 || self.frame_height <= 0 {
            return Err(ConfigError::InvalidFrameSize {
                width: self.frame_width,
                height: self.frame_height,
            });
        }
        self.blue.validate("blue")?;
        self.yellow.validate("yellow")?;
        self.noise.validate()?;
        self.warp.validate()?;
        self.steering.validate()?;

        Ok(())
    }
}

/// Inclusive HSV bounds for one marker color. Hue uses the OpenCV 8-bit
/// scale (0..=180).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorRange {
    pub const BLUE: ColorRange = ColorRange {
        lower: [42, 99, 44],
        upper: [155, 200, 79],
    };

    pub const YELLOW: ColorRange = ColorRange {
        lower: [18, 101, 104],
        upper: [53, 255, 255],
    };

    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn validate(&self, color: &'static str) -> Result<(), ConfigError> {
        for channel in 0..3 {
            let (min, max) = (self.lower[channel], self.upper[channel]);
            if min > max {
                return Err(ConfigError::InvertedColorRange { color, channel, min, max });
            }
        }
        if self.upper[0] > 180 {
            return Err(ConfigError::HueOutOfRange { color, value: self.upper[0] });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum NoiseStrategy {
    /// Opening then closing. Keeps blobs filled, which the centroid math needs.
    OpenClose { kernel_size: i32 },
    /// Blur, dilate and Canny. Produces outlines only.
    BlurEdges {
        blur_kernel: i32,
        dilate_iterations: i32,
        low_threshold: f64,
        high_threshold: f64,
    },
}

impl Default for NoiseStrategy {
    fn default() -> Self {
        NoiseStrategy::OpenClose { kernel_size: 5 }
    }
}

impl NoiseStrategy {
    pub fn blur_edges() -> Self {
        NoiseStrategy::BlurEdges {
            blur_kernel: 5,
            dilate_iterations: 2,
            low_threshold: 127.0,
            high_threshold: 255.0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            NoiseStrategy::OpenClose { kernel_size } if kernel_size <= 0 => {
                Err(ConfigError::InvalidKernelSize(kernel_size))
            }
            NoiseStrategy::BlurEdges { blur_kernel, .. } if blur_kernel <= 0 || blur_kernel % 2 == 0 => {
                Err(ConfigError::InvalidBlurKernel(blur_kernel))
            }
            NoiseStrategy::BlurEdges { dilate_iterations, .. } if dilate_iterations < 0 => {
                Err(ConfigError::InvalidKernelSize(dilate_iterations))
            }
            _ => Ok(()),
        }
    }
}

/// Calibration of the bird's-eye warp. Points are ordered top-left,
/// top-right, bottom-left, bottom-right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    pub source: [[f32; 2]; 4],
    pub destination: [[f32; 2]; 4],
    pub output_width: i32,
    pub output_height: i32,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            source: [[92.0, 276.0], [508.0, 276.0], [0.0, 386.0], [632.0, 386.0]],
            destination: [[0.0, 0.0], [640.0, 0.0], [0.0, 480.0], [640.0, 480.0]],
            output_width: 640,
            output_height: 480,
        }
    }
}

impl WarpConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_width <= 0 || self.output_height <= 0 {
            return Err(ConfigError::InvalidFrameSize {
                width: self.output_width,
                height: self.output_height,
            });
        }
        check_not_collinear("source", &self.source)?;
        check_not_collinear("destination", &self.destination)?;

        Ok(())
    }
}

fn check_not_collinear(which: &'static str, points: &[[f32; 2]; 4]) -> Result<(), ConfigError> {
    const MIN_DOUBLE_AREA: f32 = 1e-3;

    for (a, b, c) in points.iter().tuple_combinations() {
        let cross = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
        if cross.abs() < MIN_DOUBLE_AREA {
            return Err(ConfigError::CollinearWarpPoints { which, a: *a, b: *b, c: *c });
        }
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Contours with a zeroth moment at or below this are dropped. Zero-area
    /// contours are always dropped.
    pub min_area: f64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self { min_area: 0.0 }
    }
}

/// Which centroid of a color stands in for "the nearest cone".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// First contour in discovery order.
    FirstDiscovered,
    /// Euclidean nearest to the vehicle reference point.
    Nearest,
}

/// What to emit on a frame without any detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropoutPolicy {
    Hold,
    Zero,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    /// Vehicle forward projection in rectified coordinates.
    pub reference_point: [f64; 2],
    /// Multiplier applied to the raw angle.
    pub damping: f64,
    /// Damped angles outside [-max_abs_angle, max_abs_angle] are rejected
    /// and the previous estimate is kept.
    pub max_abs_angle: f64,
    /// Distance (meters) above which the output is forced to zero.
    pub distance_threshold: f64,
    /// Raw telemetry value times this gives meters.
    pub distance_scale: f64,
    pub selection: Selection,
    pub dropout: DropoutPolicy,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            reference_point: [320.0, 400.0],
            damping: 0.5,
            max_abs_angle: 0.3,
            distance_threshold: 1.0,
            distance_scale: 1.0,
            selection: Selection::FirstDiscovered,
            dropout: DropoutPolicy::Hold,
        }
    }
}

impl SteeringConfig {
    pub fn reference(&self) -> Point2<f64> {
        Point2::new(self.reference_point[0], self.reference_point[1])
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("damping", self.damping),
            ("max_abs_angle", self.max_abs_angle),
            ("distance_scale", self.distance_scale),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidSteering { name, value });
            }
        }
        if self.distance_threshold.is_nan() {
            return Err(ConfigError::InvalidSteering {
                name: "distance_threshold",
                value: self.distance_threshold,
            });
        }
        for value in self.reference_point {
            if !value.is_finite() {
                return Err(ConfigError::InvalidSteering { name: "reference_point", value });
            }
        }

        Ok(())
    }
}
