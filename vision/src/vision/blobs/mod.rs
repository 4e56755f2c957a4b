pub mod bounds;
pub mod filter;

use opencv::{
    core::{Mat, Point, Vector},
    imgproc::{bounding_rect, find_contours_def, moments_def, CHAIN_APPROX_SIMPLE, RETR_EXTERNAL},
};

use crate::config::BlobConfig;

pub use bounds::{Blob, BlobBounds};
use filter::centroid_from_moments;

/// Valid blobs of one color in one frame, in contour discovery order.
pub type DetectionSet = Vec<Blob>;

pub struct BlobExtractor {
    min_area: f64,
}

impl BlobExtractor {
    pub fn new(config: &BlobConfig) -> Self {
        Self { min_area: config.min_area }
    }

    /// Traces outer boundaries of the rectified mask and turns each one with a
    /// non-zero area into a blob.
    pub fn extract(&self, mask: &Mat) -> anyhow::Result<DetectionSet> {
        let mut contours: Vector<Vector<Point>> = Vector::new();
        find_contours_def(mask, &mut contours, RETR_EXTERNAL, CHAIN_APPROX_SIMPLE)?;

        let mut blobs = Vec::with_capacity(contours.len());
        for contour in contours.iter() {
            let m = moments_def(&contour)?;
            let Some(centroid) = centroid_from_moments(&m, self.min_area) else {
                log::trace!("Dropping degenerate contour with {} points", contour.len());
                continue;
            };

            blobs.push(Blob {
                centroid,
                area: m.m00,
                bounds: BlobBounds::from_rect(bounding_rect(&contour)?),
            });
        }

        Ok(blobs)
    }
}
