use thiserror::Error;

/// Problems with the startup configuration. The pipeline refuses to run when
/// any of these are found.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid {color} range: channel {channel} has min {min} > max {max}")]
    InvertedColorRange {
        color: &'static str,
        channel: usize,
        min: u8,
        max: u8,
    },

    #[error("invalid {color} range: hue bound {value} exceeds 180")]
    HueOutOfRange { color: &'static str, value: u8 },

    #[error("degenerate {which} warp points: {a:?}, {b:?} and {c:?} are collinear")]
    CollinearWarpPoints {
        which: &'static str,
        a: [f32; 2],
        b: [f32; 2],
        c: [f32; 2],
    },

    #[error("perspective transform is not invertible")]
    SingularHomography,

    #[error("invalid kernel size {0}, must be positive")]
    InvalidKernelSize(i32),

    #[error("invalid blur kernel size {0}, must be positive and odd")]
    InvalidBlurKernel(i32),

    #[error("invalid frame size {width}x{height}")]
    InvalidFrameSize { width: i32, height: i32 },

    #[error("frame is {actual_width}x{actual_height}, expected {width}x{height}")]
    FrameSizeMismatch {
        width: i32,
        height: i32,
        actual_width: i32,
        actual_height: i32,
    },

    #[error("unsupported frame type {0}, expected 8-bit BGR or BGRA")]
    UnsupportedFrameType(i32),

    #[error("invalid steering parameter {name} = {value}")]
    InvalidSteering { name: &'static str, value: f64 },
}
