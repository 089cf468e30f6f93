use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Planar vector in the robot frame: +x right, +y forward, meters or m/s
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn magnitude(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dot(self, other: Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Arithmetic mean of the points, `None` when there are none
    pub fn mean<I>(points: I) -> Option<Vector2>
    where
        I: IntoIterator<Item = Vector2>,
    {
        let (sum, count) = points
            .into_iter()
            .fold((Vector2::ZERO, 0usize), |(sum, n), p| (sum + p, n + 1));
        (count > 0).then(|| sum * (1.0 / count as f64))
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Vector2;

    fn mul(self, rhs: f64) -> Vector2 {
        Vector2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vector2 {
    type Output = Vector2;

    fn neg(self) -> Vector2 {
        Vector2::new(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        let points = [Vector2::new(0.25, 0.25), Vector2::new(-0.25, 0.25)];
        assert_eq!(Vector2::mean(points), Some(Vector2::new(0.0, 0.25)));
        assert_eq!(Vector2::mean(Vec::new()), None);
    }

    #[test]
    fn test_magnitude_and_ops() {
        let v = Vector2::new(3.0, 4.0);
        assert_eq!(v.magnitude(), 5.0);
        assert_eq!(v - v, Vector2::ZERO);
        assert_eq!(-v * 2.0, Vector2::new(-6.0, -8.0));
        assert_eq!(v.dot(Vector2::new(-4.0, 3.0)), 0.0);
    }
}
