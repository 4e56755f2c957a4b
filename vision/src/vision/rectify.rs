use nalgebra::{Matrix3, Point2, Vector3};
use opencv::{
    core::{Mat, Point2f, Scalar, Size, Vector, BORDER_CONSTANT, DECOMP_LU},
    imgproc::{get_perspective_transform, warp_perspective, INTER_NEAREST},
    prelude::*,
};

use crate::{config::WarpConfig, error::ConfigError};

/// Bird's-eye warp between the camera trapezoid and the output rectangle.
/// Both directions are computed once from the calibration points and reused
/// for every frame.
pub struct PerspectiveRectifier {
    transform: Mat,
    inverse_transform: Mat,
    homography: Matrix3<f64>,
    inverse_homography: Matrix3<f64>,
    output_size: Size,
    input_size: Size,
}

impl PerspectiveRectifier {
    pub fn new(warp: &WarpConfig, input_size: Size) -> anyhow::Result<Self> {
        warp.validate()?;

        let source = to_points(&warp.source);
        let destination = to_points(&warp.destination);
        let transform = get_perspective_transform(&source, &destination, DECOMP_LU)?;
        let inverse_transform = get_perspective_transform(&destination, &source, DECOMP_LU)?;

        let homography = to_matrix(&transform)?;
        if homography.try_inverse().is_none() {
            return Err(ConfigError::SingularHomography.into());
        }
        let inverse_homography = to_matrix(&inverse_transform)?;

        log::debug!("Rectifier homography: {homography}");

        Ok(Self {
            transform,
            inverse_transform,
            homography,
            inverse_homography,
            output_size: Size::new(warp.output_width, warp.output_height),
            input_size,
        })
    }

    pub fn output_size(&self) -> Size {
        self.output_size
    }

    pub fn homography(&self) -> &Matrix3<f64> {
        &self.homography
    }

    /// Warps a camera-space mask into the top-down view. Nearest neighbour
    /// keeps binary masks binary; everything outside the source trapezoid
    /// becomes background.
    pub fn rectify(&self, mask: &Mat) -> anyhow::Result<Mat> {
        warp(mask, &self.transform, self.output_size)
    }

    pub fn unrectify(&self, mask: &Mat) -> anyhow::Result<Mat> {
        warp(mask, &self.inverse_transform, self.input_size)
    }

    pub fn map_point(&self, p: &Point2<f64>) -> Option<Point2<f64>> {
        project(&self.homography, p)
    }

    pub fn unmap_point(&self, p: &Point2<f64>) -> Option<Point2<f64>> {
        project(&self.inverse_homography, p)
    }
}

fn warp(img: &Mat, transform: &Mat, size: Size) -> anyhow::Result<Mat> {
    let mut warped = Mat::default();
    warp_perspective(
        img,
        &mut warped,
        transform,
        size,
        INTER_NEAREST,
        BORDER_CONSTANT,
        Scalar::default(),
    )?;

    Ok(warped)
}

fn to_points(points: &[[f32; 2]; 4]) -> Vector<Point2f> {
    points.iter().map(|p| Point2f::new(p[0], p[1])).collect()
}

fn to_matrix(transform: &Mat) -> anyhow::Result<Matrix3<f64>> {
    let mut m = Matrix3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            m[(r, c)] = *transform.at_2d::<f64>(r as i32, c as i32)?;
        }
    }

    Ok(m)
}

fn project(m: &Matrix3<f64>, p: &Point2<f64>) -> Option<Point2<f64>> {
    let v = m * Vector3::new(p.x, p.y, 1.0);
    if v.z.abs() < f64::EPSILON {
        return None;
    }

    Some(Point2::new(v.x / v.z, v.y / v.z))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use opencv::core::{count_non_zero, CV_8UC1};

    use super::*;

    fn rectifier() -> PerspectiveRectifier {
        PerspectiveRectifier::new(&WarpConfig::default(), Size::new(640, 480)).unwrap()
    }

    #[test]
    fn source_corners_map_to_destination_corners() {
        let rectifier = rectifier();
        let warp = WarpConfig::default();

        for (src, dst) in warp.source.iter().zip(warp.destination.iter()) {
            let mapped = rectifier.map_point(&Point2::new(src[0] as f64, src[1] as f64)).unwrap();
            assert_relative_eq!(mapped.x, dst[0] as f64, epsilon = 1e-3);
            assert_relative_eq!(mapped.y, dst[1] as f64, epsilon = 1e-3);
        }
    }

    #[test]
    fn point_round_trip_is_stable() {
        let rectifier = rectifier();
        let original = Point2::new(317.0, 341.0);

        let there = rectifier.map_point(&original).unwrap();
        let back = rectifier.unmap_point(&there).unwrap();

        assert!((back - original).norm() < 1.0);
    }

    #[test]
    fn pixels_outside_the_trapezoid_become_background() {
        let rectifier = rectifier();
        // everything above the trapezoid top edge (y = 276)
        let mut mask = Mat::new_rows_cols_with_default(480, 640, CV_8UC1, Scalar::all(0.0)).unwrap();
        for r in 0..200 {
            for c in 0..640 {
                *mask.at_2d_mut::<u8>(r, c).unwrap() = 255;
            }
        }

        let rectified = rectifier.rectify(&mask).unwrap();

        assert_eq!(rectified.size().unwrap(), Size::new(640, 480));
        assert_eq!(count_non_zero(&rectified).unwrap(), 0);
    }

    #[test]
    fn collinear_calibration_is_fatal() {
        let warp = WarpConfig {
            destination: [[0.0, 0.0], [320.0, 0.0], [640.0, 0.0], [640.0, 480.0]],
            ..WarpConfig::default()
        };
        assert!(PerspectiveRectifier::new(&warp, Size::new(640, 480)).is_err());
    }
}
