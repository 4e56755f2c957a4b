use nalgebra::{Point2, Vector2};
use opencv::{
    core::{Mat, Rect, Scalar},
    imgproc::{rectangle, FILLED, LINE_8},
};
use rand::Rng;

// BGR values that fall inside the default HSV ranges.
const BLUE_BGR: (f64, f64, f64) = (70.0, 29.0, 29.0);
const YELLOW_BGR: (f64, f64, f64) = (0.0, 220.0, 220.0);

const MIN_Y: i32 = 300;
const MAX_Y: i32 = 370;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConeColor {
    Blue,
    Yellow,
}

pub struct SimCone {
    pub color: ConeColor,
    /// Base position before the lateral drift is applied.
    pub base: Vector2<i32>,
    pub pos: Vector2<i32>,
    pub size: Vector2<i32>,
    pub visible: bool,
}

impl SimCone {
    pub fn initial(color: ConeColor) -> Self {
        let base = match color {
            ConeColor::Blue => Vector2::new(200, 335),
            ConeColor::Yellow => Vector2::new(440, 335),
        };
        Self {
            color,
            base,
            pos: base,
            size: Vector2::new(24, 30),
            visible: true,
        }
    }

    /// Moves the cone with the lane by `lateral` pixels and shakes it a bit
    /// vertically. Occasionally the cone drops out of view.
    pub fn step(&mut self, rng: &mut impl Rng, lateral: i32) {
        self.pos.x = (self.base.x + lateral).clamp(self.size.x, 640 - 2 * self.size.x);
        self.pos.y = (self.pos.y + rng.gen_range(-3..=3)).clamp(MIN_Y, MAX_Y);
        self.visible = rng.gen_bool(0.9);
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.pos.x - self.size.x / 2, self.pos.y - self.size.y / 2, self.size.x, self.size.y)
    }

    pub fn center(&self) -> Point2<f64> {
        let rect = self.rect();
        Point2::new(
            rect.x as f64 + (rect.width - 1) as f64 / 2.0,
            rect.y as f64 + (rect.height - 1) as f64 / 2.0,
        )
    }

    pub fn draw(&self, frame: &mut Mat) -> anyhow::Result<()> {
        if !self.visible {
            return Ok(());
        }
        let (b, g, r) = match self.color {
            ConeColor::Blue => BLUE_BGR,
            ConeColor::Yellow => YELLOW_BGR,
        };
        rectangle(frame, self.rect(), Scalar::new(b, g, r, 0.0), FILLED, LINE_8, 0)?;

        Ok(())
    }
}
