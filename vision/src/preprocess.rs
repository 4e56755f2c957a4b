use opencv::{
    core::{Mat, MatTraitConst, CV_8UC3, CV_8UC4},
    imgproc::{cvt_color_def, COLOR_BGR2HSV},
};

use crate::error::ConfigError;

/// Converts a BGR or BGRA camera frame to HSV. Any other pixel layout is a
/// configuration problem with the frame source.
pub fn frame_to_hsv(img: &Mat) -> anyhow::Result<Mat> {
    let mut img_hsv = Mat::default();
    match img.typ() {
        CV_8UC3 | CV_8UC4 => {
            cvt_color_def(img, &mut img_hsv, COLOR_BGR2HSV)?;
        }
        other => {
            return Err(ConfigError::UnsupportedFrameType(other).into());
        }
    }

    Ok(img_hsv)
}

pub fn check_frame_size(img: &Mat, width: i32, height: i32) -> Result<(), ConfigError> {
    if img.cols() != width || img.rows() != height {
        return Err(ConfigError::FrameSizeMismatch {
            width,
            height,
            actual_width: img.cols(),
            actual_height: img.rows(),
        });
    }

    Ok(())
}
