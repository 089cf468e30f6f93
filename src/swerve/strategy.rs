// Swerve inverse kinematics
//
// Robot frame: +x right, +y forward. Rotation is rad/s, positive clockwise.
// Steering angles are radians measured from +y toward +x, so a wheel at angle
// `a` pushes along (sin a, cos a).

use std::f64::consts::{PI, TAU};

use tracing::debug;

use super::{AngleRestriction, SteeringGroup, Vector2};
use crate::error::ConstructionError;

/// Turns a commanded body motion into steering angles and wheel speeds
pub trait SteeringStrategy {
    fn apply(&self, groups: &mut [SteeringGroup], direction: Vector2, rotation: f64);
}

/// Velocity of the ground contact at `position` for the commanded body motion
pub fn wheel_velocity(direction: Vector2, rotation: f64, position: Vector2) -> Vector2 {
    Vector2::new(
        direction.x + rotation * position.y,
        direction.y - rotation * position.x,
    )
}

/// Steering angle for `velocity` and its half-turn complement, both in (-pi, pi]
pub fn steer_candidates(velocity: Vector2) -> (f64, f64) {
    let mut steer = velocity.x.atan2(velocity.y);
    // atan2(-0.0, negative) is -pi
    if steer <= -PI {
        steer += TAU;
    }
    let opposite = if steer > 0.0 { steer - PI } else { steer + PI };
    (steer, opposite)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteerSelection {
    pub angle: f64,
    /// Wheel speeds of the group are negated
    pub reverse: bool,
}

/// Choose between the direct angle and its complement.
///
/// The candidate nearer the measured angle is tried first; when it is illegal
/// the other one is tried, and when both are illegal the restriction's
/// closest legal angle to the first choice is used.
pub fn select_steer_angle(
    restriction: &dyn AngleRestriction,
    measured: f64,
    steer: f64,
    opposite: f64,
) -> SteerSelection {
    let direct_first = (measured - steer).abs() < (measured - opposite).abs();
    let (primary, fallback) = if direct_first {
        (steer, opposite)
    } else {
        (opposite, steer)
    };

    if restriction.is_valid(primary) {
        SteerSelection {
            angle: primary,
            reverse: false,
        }
    } else if restriction.is_valid(fallback) {
        SteerSelection {
            angle: fallback,
            reverse: direct_first,
        }
    } else {
        SteerSelection {
            angle: restriction.closest_legal(primary),
            reverse: !direct_first,
        }
    }
}

/// Per-group steering from the group's centroid ("motorcycle" approximation),
/// per-wheel speed from each wheel's own position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChainedMotorcycleStrategy {
    desaturate_to: Option<f64>,
}

impl ChainedMotorcycleStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scale all wheel speeds down together whenever one would exceed `limit` m/s
    pub fn with_desaturation(limit: f64) -> Result<Self, ConstructionError> {
        if !(limit.is_finite() && limit > 0.0) {
            return Err(ConstructionError::NonPositive {
                what: "Desaturation limit",
                value: limit,
            });
        }
        Ok(Self {
            desaturate_to: Some(limit),
        })
    }

    fn desaturate(&self, speeds: &mut [Vec<f64>]) {
        let Some(limit) = self.desaturate_to else {
            return;
        };
        let fastest = speeds.iter().flatten().fold(0.0f64, |m, s| m.max(s.abs()));
        if fastest > limit {
            let scale = limit / fastest;
            debug!("Desaturating wheel speeds by {:.3}", scale);
            speeds.iter_mut().flatten().for_each(|s| *s *= scale);
        }
    }
}

impl SteeringStrategy for ChainedMotorcycleStrategy {
    fn apply(&self, groups: &mut [SteeringGroup], direction: Vector2, rotation: f64) {
        for group in groups.iter_mut() {
            let velocity = wheel_velocity(direction, rotation, group.centroid());
            let (steer, opposite) = steer_candidates(velocity);
            let selection =
                select_steer_angle(group.restriction(), group.measured_angle(), steer, opposite);
            debug!(
                "{}: steer {:.3} rad (reverse={})",
                group.name(),
                selection.angle,
                selection.reverse
            );
            group.set_reverse_speed(selection.reverse);
            group.set_angle(selection.angle);
        }

        let mut speeds: Vec<Vec<f64>> = groups
            .iter()
            .map(|group| {
                let sign = if group.reverse_speed() { -1.0 } else { 1.0 };
                group
                    .wheels()
                    .iter()
                    .map(|wheel| sign * wheel_velocity(direction, rotation, wheel.position()).magnitude())
                    .collect()
            })
            .collect();
        self.desaturate(&mut speeds);

        for (group, speeds) in groups.iter_mut().zip(speeds) {
            for (wheel, speed) in group.wheels_mut().iter_mut().zip(speeds) {
                wheel.set_velocity(speed);
            }
        }
    }
}
