//! Scan Geometry
//!
//! Polar scan samples as reported by the sensor and the Cartesian points the
//! clusterer works on. Angles are degrees, distances are meters, the sensor
//! sits at the origin.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// One range measurement from a sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanSample {
    /// Bearing in degrees; any value, the transform is periodic
    pub angle: f64,
    /// Distance to the return in meters
    pub distance: f64,
}

impl ScanSample {
    pub fn new(angle: f64, distance: f64) -> Self {
        ScanSample { angle, distance }
    }

    /// A sample is usable when both values are finite and the distance is
    /// not negative.
    pub fn is_valid(&self) -> bool {
        self.angle.is_finite() && self.distance.is_finite() && self.distance >= 0.0
    }

    /// Convert to a Cartesian point
    pub fn to_cartesian(&self) -> Point2D {
        polar_to_cartesian(self.angle, self.distance)
    }
}

impl From<(f64, f64)> for ScanSample {
    fn from((angle, distance): (f64, f64)) -> Self {
        ScanSample::new(angle, distance)
    }
}

/// A point in the sensor plane, meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Point2D { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        nalgebra::distance(&self.as_point(), &other.as_point())
    }

    /// Distance from the sensor
    pub fn range(&self) -> f64 {
        self.as_point().coords.norm()
    }

    pub(crate) fn as_point(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

impl From<Point2<f64>> for Point2D {
    fn from(p: Point2<f64>) -> Self {
        Point2D::new(p.x, p.y)
    }
}

/// Polar to Cartesian transform.
///
/// `x = distance * cos(angle)`, `y = distance * sin(angle)` with the angle
/// given in degrees. No range checking is done here; use
/// [`ScanSample::is_valid`] first.
pub fn polar_to_cartesian(angle_deg: f64, distance: f64) -> Point2D {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    Point2D::new(distance * cos, distance * sin)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_cardinal_directions() {
        let p = polar_to_cartesian(0.0, 2.0);
        assert!((p.x - 2.0).abs() < EPSILON);
        assert!(p.y.abs() < EPSILON);

        let p = polar_to_cartesian(90.0, 2.0);
        assert!(p.x.abs() < EPSILON);
        assert!((p.y - 2.0).abs() < EPSILON);

        let p = polar_to_cartesian(180.0, 1.0);
        assert!((p.x + 1.0).abs() < EPSILON);
        assert!(p.y.abs() < EPSILON);

        let p = polar_to_cartesian(270.0, 1.0);
        assert!(p.x.abs() < EPSILON);
        assert!((p.y + 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_range_is_preserved() {
        for angle in [0.0, 13.5, 45.0, 123.4, 271.0, 359.9, 720.5, -30.0] {
            for distance in [0.0, 0.05, 1.0, 7.25, 12.0] {
                let p = polar_to_cartesian(angle, distance);
                assert!(
                    (p.range() - distance).abs() < EPSILON,
                    "angle {} distance {} gave range {}",
                    angle,
                    distance,
                    p.range()
                );
            }
        }
    }

    #[test]
    fn test_angle_wraps() {
        let a = polar_to_cartesian(10.0, 3.0);
        let b = polar_to_cartesian(370.0, 3.0);
        assert!(a.distance_to(&b) < EPSILON);
    }

    #[test]
    fn test_sample_validity() {
        assert!(ScanSample::new(0.0, 0.0).is_valid());
        assert!(ScanSample::new(400.0, 1.5).is_valid());
        assert!(!ScanSample::new(10.0, -0.1).is_valid());
        assert!(!ScanSample::new(f64::NAN, 1.0).is_valid());
        assert!(!ScanSample::new(10.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_distance_to() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < EPSILON);
    }
}
