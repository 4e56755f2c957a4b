use nalgebra::Point2;
use opencv::core::Moments;

/// Centroid from image moments, or `None` for a degenerate contour. Zero
/// area (or anything not above `min_area`) never yields a position.
#[inline(always)]
pub fn centroid_from_moments(m: &Moments, min_area: f64) -> Option<Point2<f64>> {
    if m.m00.abs() <= f64::EPSILON || m.m00 <= min_area {
        return None;
    }

    let centroid = Point2::new(m.m10 / m.m00, m.m01 / m.m00);
    if centroid.x.is_finite() && centroid.y.is_finite() {
        Some(centroid)
    } else {
        None
    }
}
