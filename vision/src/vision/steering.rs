use nalgebra::Point2;

use crate::{
    config::{DropoutPolicy, Selection, SteeringConfig},
    vision::{blobs::Blob, side::ConeSide},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionState {
    Both,
    BlueOnly,
    YellowOnly,
    None,
}

/// How the emitted angle came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fresh angle inside the band.
    Accepted,
    /// Fresh angle outside the band, previous estimate kept.
    Rejected,
    /// Nothing detected, dropout policy applied.
    Dropout,
    /// Distance reading above threshold, forced to zero.
    DistanceOverride,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SteeringEstimate {
    /// Radians, positive steers toward smaller x in the rectified view.
    pub angle: f64,
    pub state: DetectionState,
    pub outcome: Outcome,
    pub aim_point: Option<Point2<f64>>,
}

/// Turns the detections of one frame into a steering angle. The only memory
/// across frames is the previously emitted value.
pub struct SteeringEstimator {
    config: SteeringConfig,
    reference: Point2<f64>,
    previous: f64,
}

impl SteeringEstimator {
    pub fn new(config: SteeringConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let reference = config.reference();

        Ok(Self { config, reference, previous: 0.0 })
    }

    pub fn reference(&self) -> Point2<f64> {
        self.reference
    }

    pub fn previous(&self) -> f64 {
        self.previous
    }

    /// `distance` is the raw telemetry value, scaled to meters here.
    pub fn estimate(
        &mut self,
        blue: &[Blob],
        yellow: &[Blob],
        side: Option<ConeSide>,
        distance: Option<f64>,
    ) -> SteeringEstimate {
        let blue = self.select(blue);
        let yellow = self.select(yellow);

        let (state, aim) = match (blue, yellow) {
            (Some(b), Some(y)) => (DetectionState::Both, Some(nalgebra::center(&b, &y))),
            (Some(b), None) => (DetectionState::BlueOnly, Some(b)),
            (None, Some(y)) => (DetectionState::YellowOnly, Some(y)),
            (None, None) => (DetectionState::None, None),
        };

        let distance_m = distance.map(|d| d * self.config.distance_scale);
        if let Some(d) = distance_m.filter(|d| *d > self.config.distance_threshold) {
            log::debug!("Distance {d:.2} m above threshold, steering forced to zero");
            return self.emit(0.0, state, Outcome::DistanceOverride, aim);
        }

        let Some(aim) = aim else {
            let angle = match self.config.dropout {
                DropoutPolicy::Hold => self.previous,
                DropoutPolicy::Zero => 0.0,
            };
            return self.emit(angle, state, Outcome::Dropout, None);
        };

        let mut opposite = self.reference.x - aim.x;
        let adjacent = self.reference.y - aim.y;
        if let Some(sign) = lone_marker_sign(state, side) {
            opposite = sign * opposite.abs();
        }

        let damped = angle_from_offsets(opposite, adjacent) * self.config.damping;
        if damped.abs() <= self.config.max_abs_angle {
            self.emit(damped, state, Outcome::Accepted, Some(aim))
        } else {
            log::debug!("Rejecting out of band angle {damped:.4}, keeping {:.4}", self.previous);
            self.emit(self.previous, state, Outcome::Rejected, Some(aim))
        }
    }

    fn emit(&mut self, angle: f64, state: DetectionState, outcome: Outcome, aim_point: Option<Point2<f64>>) -> SteeringEstimate {
        self.previous = angle;
        SteeringEstimate { angle, state, outcome, aim_point }
    }

    fn select(&self, blobs: &[Blob]) -> Option<Point2<f64>> {
        match self.config.selection {
            Selection::FirstDiscovered => blobs.first(),
            Selection::Nearest => blobs.iter().min_by(|a, b| {
                let da = nalgebra::distance_squared(&a.centroid, &self.reference);
                let db = nalgebra::distance_squared(&b.centroid, &self.reference);
                da.total_cmp(&db)
            }),
        }
        .map(|b| b.centroid)
    }
}

/// Sign of the lateral offset when only one color is visible. The lone cone
/// marks one lane boundary, so the gap is on the other side of it.
fn lone_marker_sign(state: DetectionState, side: Option<ConeSide>) -> Option<f64> {
    match (state, side?) {
        (DetectionState::BlueOnly, ConeSide::BlueLeft) | (DetectionState::YellowOnly, ConeSide::BlueRight) => Some(-1.0),
        (DetectionState::BlueOnly, ConeSide::BlueRight) | (DetectionState::YellowOnly, ConeSide::BlueLeft) => Some(1.0),
        _ => None,
    }
}

/// Angle from the vehicle reference to the aim point before damping. A zero
/// or non-finite ratio resolves to zero.
pub fn steering_angle(reference: &Point2<f64>, aim: &Point2<f64>) -> f64 {
    angle_from_offsets(reference.x - aim.x, reference.y - aim.y)
}

fn angle_from_offsets(opposite: f64, adjacent: f64) -> f64 {
    if adjacent == 0.0 {
        return 0.0;
    }
    let ratio = opposite / adjacent;
    if !ratio.is_finite() {
        return 0.0;
    }

    ratio.atan()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    use super::*;
    use crate::vision::blobs::BlobBounds;

    fn blob(x: f64, y: f64) -> Blob {
        Blob {
            centroid: Point2::new(x, y),
            area: 100.0,
            bounds: BlobBounds {
                min: Vector2::new(x as i32 - 5, y as i32 - 5),
                max: Vector2::new(x as i32 + 5, y as i32 + 5),
            },
        }
    }

    fn estimator(reference: [f64; 2]) -> SteeringEstimator {
        SteeringEstimator::new(SteeringConfig {
            reference_point: reference,
            ..SteeringConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn aim_at_reference_is_straight_ahead() {
        let reference = Point2::new(320.0, 450.0);
        assert_eq!(steering_angle(&reference, &reference), 0.0);

        let mut estimator = estimator([320.0, 450.0]);
        let estimate = estimator.estimate(&[blob(320.0, 450.0)], &[], None, None);
        assert_eq!(estimate.angle, 0.0);
        assert_eq!(estimate.outcome, Outcome::Accepted);
    }

    #[test]
    fn symmetric_cones_give_zero() {
        let mut estimator = estimator([320.0, 450.0]);
        let estimate = estimator.estimate(&[blob(200.0, 450.0)], &[blob(440.0, 450.0)], None, None);

        assert_eq!(estimate.state, DetectionState::Both);
        assert_eq!(estimate.aim_point, Some(Point2::new(320.0, 450.0)));
        assert_eq!(estimate.angle, 0.0);
    }

    #[test]
    fn midpoint_angle_is_halved() {
        let mut estimator = estimator([320.0, 450.0]);
        let estimate = estimator.estimate(&[blob(300.0, 350.0)], &[blob(320.0, 350.0)], None, None);

        assert_relative_eq!(estimate.angle, 0.1f64.atan() / 2.0, epsilon = 1e-12);
        assert_eq!(estimate.outcome, Outcome::Accepted);
    }

    #[test]
    fn out_of_band_angle_keeps_previous_estimate() {
        let mut estimator = estimator([320.0, 450.0]);
        let first = estimator.estimate(&[blob(300.0, 350.0)], &[blob(320.0, 350.0)], None, None);

        // opposite = 100, adjacent = 100, atan(1) / 2 = 0.3927
        let second = estimator.estimate(&[blob(220.0, 350.0)], &[], None, None);

        assert_eq!(second.outcome, Outcome::Rejected);
        assert_eq!(second.angle, first.angle);
        assert_ne!(second.angle, 0.3);
        assert_eq!(estimator.previous(), first.angle);
    }

    #[test]
    fn out_of_band_lone_blue_with_known_side_keeps_previous_estimate() {
        let mut estimator = estimator([320.0, 450.0]);
        let first = estimator.estimate(
            &[blob(300.0, 350.0)],
            &[blob(320.0, 350.0)],
            Some(ConeSide::BlueLeft),
            None,
        );

        // sign forced negative by the side rule: -atan(1) / 2 = -0.3927
        let second = estimator.estimate(&[blob(220.0, 350.0)], &[], Some(ConeSide::BlueLeft), None);

        assert_eq!(second.state, DetectionState::BlueOnly);
        assert_eq!(second.outcome, Outcome::Rejected);
        assert_eq!(second.angle, first.angle);
        assert_ne!(second.angle, -0.3);
        assert_eq!(estimator.previous(), first.angle);

        let third = estimator.estimate(&[blob(290.0, 350.0)], &[], Some(ConeSide::BlueLeft), None);
        assert_eq!(third.outcome, Outcome::Accepted);
        assert_relative_eq!(third.angle, -(0.3f64.atan()) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn far_distance_forces_zero() {
        let mut estimator = estimator([320.0, 450.0]);
        estimator.estimate(&[blob(300.0, 350.0)], &[blob(320.0, 350.0)], None, None);

        let estimate = estimator.estimate(&[blob(280.0, 350.0)], &[blob(300.0, 350.0)], None, Some(5.0));

        assert_eq!(estimate.angle, 0.0);
        assert_eq!(estimate.outcome, Outcome::DistanceOverride);
        assert_eq!(estimate.state, DetectionState::Both);
    }

    #[test]
    fn distance_is_scaled_before_comparison() {
        let mut estimator = SteeringEstimator::new(SteeringConfig {
            reference_point: [320.0, 450.0],
            distance_scale: 0.01,
            ..SteeringConfig::default()
        })
        .unwrap();

        // 50 cm is below the 1 m threshold
        let near = estimator.estimate(&[blob(290.0, 350.0)], &[], None, Some(50.0));
        assert_eq!(near.outcome, Outcome::Accepted);

        let far = estimator.estimate(&[blob(290.0, 350.0)], &[], None, Some(150.0));
        assert_eq!(far.outcome, Outcome::DistanceOverride);
    }

    #[test]
    fn dropout_holds_or_zeroes() {
        let mut holding = estimator([320.0, 450.0]);
        let first = holding.estimate(&[blob(300.0, 350.0)], &[blob(320.0, 350.0)], None, None);
        let held = holding.estimate(&[], &[], None, None);
        assert_eq!(held.angle, first.angle);
        assert_eq!(held.state, DetectionState::None);
        assert_eq!(held.outcome, Outcome::Dropout);

        let mut zeroing = SteeringEstimator::new(SteeringConfig {
            reference_point: [320.0, 450.0],
            dropout: DropoutPolicy::Zero,
            ..SteeringConfig::default()
        })
        .unwrap();
        zeroing.estimate(&[blob(300.0, 350.0)], &[blob(320.0, 350.0)], None, None);
        assert_eq!(zeroing.estimate(&[], &[], None, None).angle, 0.0);
    }

    #[test]
    fn lone_marker_steers_toward_the_gap() {
        let expected = 0.2f64.atan() / 2.0;

        let mut estimator = estimator([320.0, 450.0]);
        let blue = estimator.estimate(&[blob(300.0, 350.0)], &[], Some(ConeSide::BlueLeft), None);
        assert_eq!(blue.state, DetectionState::BlueOnly);
        assert_relative_eq!(blue.angle, -expected, epsilon = 1e-12);

        let yellow = estimator.estimate(&[], &[blob(340.0, 350.0)], Some(ConeSide::BlueLeft), None);
        assert_eq!(yellow.state, DetectionState::YellowOnly);
        assert_relative_eq!(yellow.angle, expected, epsilon = 1e-12);

        let mirrored = estimator.estimate(&[blob(340.0, 350.0)], &[], Some(ConeSide::BlueRight), None);
        assert_relative_eq!(mirrored.angle, expected, epsilon = 1e-12);
    }

    #[test]
    fn unknown_side_keeps_geometric_sign() {
        let mut estimator = estimator([320.0, 450.0]);
        let estimate = estimator.estimate(&[], &[blob(340.0, 350.0)], None, None);
        assert_relative_eq!(estimate.angle, -(0.2f64.atan()) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn selection_policies() {
        let blues = [blob(100.0, 100.0), blob(310.0, 440.0)];

        let mut first = estimator([320.0, 450.0]);
        assert_eq!(first.estimate(&blues, &[], None, None).aim_point, Some(Point2::new(100.0, 100.0)));

        let mut nearest = SteeringEstimator::new(SteeringConfig {
            reference_point: [320.0, 450.0],
            selection: Selection::Nearest,
            ..SteeringConfig::default()
        })
        .unwrap();
        assert_eq!(nearest.estimate(&blues, &[], None, None).aim_point, Some(Point2::new(310.0, 440.0)));
    }

    #[test]
    fn zero_adjacent_resolves_to_zero() {
        assert_eq!(angle_from_offsets(50.0, 0.0), 0.0);
        assert_eq!(angle_from_offsets(f64::INFINITY, 1.0), 0.0);
    }
}
