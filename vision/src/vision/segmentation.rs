use opencv::{
    core::{in_range, Mat, Scalar},
    prelude::*,
};

use crate::{config::ColorRange, preprocess::frame_to_hsv};

/// Thresholds HSV frames against one marker's color range.
pub struct ColorSegmenter;

impl ColorSegmenter {
    pub fn to_hsv(frame: &Mat) -> anyhow::Result<Mat> {
        frame_to_hsv(frame)
    }

    /// Pixels whose three HSV channels all lie inside `range` become 255,
    /// everything else 0.
    pub fn segment(img_hsv: &Mat, range: &ColorRange) -> anyhow::Result<Mat> {
        let mut mask = Mat::default();
        in_range(img_hsv, &to_scalar(range.lower), &to_scalar(range.upper), &mut mask)?;
        debug_assert_eq!(mask.size()?, img_hsv.size()?);

        Ok(mask)
    }
}

fn to_scalar(bound: [u8; 3]) -> Scalar {
    Scalar::new(bound[0] as f64, bound[1] as f64, bound[2] as f64, 0.0)
}
