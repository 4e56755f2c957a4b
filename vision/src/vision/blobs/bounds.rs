use nalgebra::{Point2, Vector2};
use opencv::core::Rect;

/// Axis aligned integer box around a blob, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobBounds {
    pub min: Vector2<i32>,
    pub max: Vector2<i32>,
}

impl BlobBounds {
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            min: Vector2::new(rect.x, rect.y),
            max: Vector2::new(rect.x + rect.width - 1, rect.y + rect.height - 1),
        }
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(self.min.x, self.min.y, self.max.x - self.min.x + 1, self.max.y - self.min.y + 1)
    }

    pub fn contains(&self, p: &Point2<f64>) -> bool {
        p.x >= self.min.x as f64 && p.x <= self.max.x as f64 && p.y >= self.min.y as f64 && p.y <= self.max.y as f64
    }
}

/// One detected cone in rectified coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub centroid: Point2<f64>,
    /// Zeroth moment of the boundary polygon.
    pub area: f64,
    pub bounds: BlobBounds,
}
