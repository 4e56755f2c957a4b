use nalgebra::Point2;
use opencv::{
    core::{Mat, Point, Scalar, CV_8UC3},
    imgproc::{circle, line, rectangle, FILLED, LINE_8},
    prelude::*,
};

use crate::FrameResult;

const BLUE: (f64, f64, f64) = (255.0, 80.0, 0.0);
const YELLOW: (f64, f64, f64) = (0.0, 220.0, 220.0);
const AIM: (f64, f64, f64) = (0.0, 0.0, 255.0);

/// Renders the rectified masks with blob boxes, centroids and the lines from
/// the vehicle reference point. Only used for offline inspection.
pub fn draw_overlay(result: &FrameResult, reference: &Point2<f64>) -> anyhow::Result<Mat> {
    let size = result.blue_mask.size()?;
    let mut img = Mat::new_rows_cols_with_default(size.height, size.width, CV_8UC3, Scalar::all(0.0))?;
    img.set_to(&dim(BLUE), &result.blue_mask)?;
    img.set_to(&dim(YELLOW), &result.yellow_mask)?;

    let origin = to_point(reference);
    for (blobs, color) in [(&result.blue, BLUE), (&result.yellow, YELLOW)] {
        let color = Scalar::new(color.0, color.1, color.2, 0.0);
        for blob in blobs.iter() {
            rectangle(&mut img, blob.bounds.to_rect(), color, 2, LINE_8, 0)?;
            circle(&mut img, to_point(&blob.centroid), 4, color, FILLED, LINE_8, 0)?;
            line(&mut img, origin, to_point(&blob.centroid), color, 1, LINE_8, 0)?;
        }
    }

    if let Some(aim) = &result.estimate.aim_point {
        let aim_color = Scalar::new(AIM.0, AIM.1, AIM.2, 0.0);
        line(&mut img, origin, to_point(aim), aim_color, 3, LINE_8, 0)?;
        circle(&mut img, to_point(aim), 6, aim_color, FILLED, LINE_8, 0)?;
    }

    Ok(img)
}

fn dim(color: (f64, f64, f64)) -> Scalar {
    Scalar::new(color.0 * 0.4, color.1 * 0.4, color.2 * 0.4, 0.0)
}

fn to_point(p: &Point2<f64>) -> Point {
    Point::new(p.x.round() as i32, p.y.round() as i32)
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector2;
    use opencv::core::{Vec3b, CV_8UC1};

    use super::*;
    use crate::vision::{
        blobs::{Blob, BlobBounds},
        steering::{DetectionState, Outcome, SteeringEstimate},
    };

    #[test]
    fn overlay_marks_aim_point_and_masks() {
        let mut blue_mask = Mat::new_rows_cols_with_default(100, 200, CV_8UC1, Scalar::all(0.0)).unwrap();
        *blue_mask.at_2d_mut::<u8>(5, 5).unwrap() = 255;
        let yellow_mask = Mat::new_rows_cols_with_default(100, 200, CV_8UC1, Scalar::all(0.0)).unwrap();
        let blob = Blob {
            centroid: Point2::new(50.0, 40.0),
            area: 100.0,
            bounds: BlobBounds { min: Vector2::new(45, 35), max: Vector2::new(55, 45) },
        };
        let result = FrameResult {
            estimate: SteeringEstimate {
                angle: 0.1,
                state: DetectionState::BlueOnly,
                outcome: Outcome::Accepted,
                aim_point: Some(Point2::new(150.0, 30.0)),
            },
            blue: vec![blob],
            yellow: Vec::new(),
            blue_mask,
            yellow_mask,
            side: None,
        };

        let img = draw_overlay(&result, &Point2::new(100.0, 90.0)).unwrap();

        assert_eq!(img.typ(), CV_8UC3);
        assert_eq!(img.size().unwrap(), result.blue_mask.size().unwrap());
        assert_eq!(*img.at_2d::<Vec3b>(30, 150).unwrap(), Vec3b::from([0, 0, 255]));
        assert_eq!(*img.at_2d::<Vec3b>(5, 5).unwrap(), Vec3b::from([102, 32, 0]));
        assert_eq!(*img.at_2d::<Vec3b>(99, 0).unwrap(), Vec3b::from([0, 0, 0]));
    }
}
