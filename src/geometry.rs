//! Fundamental geometric types for planar frame modelling.
//!
//! Coordinates are in millimetres in the plane of the frame: X runs along the
//! span, Y is vertical (positive upwards).

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Position in the plane of the frame measured in millimetres.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Distance along the global X axis.
    pub x: f64,
    /// Distance along the global Y axis.
    pub y: f64,
}

impl Point {
    /// Create a [`Point`] with explicit coordinates.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Convert the point into an algebraic vector.
    #[must_use]
    pub fn to_vector(self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    /// Straight-line distance to `other`.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        (other.to_vector() - self.to_vector()).norm()
    }
}

impl From<Vector2<f64>> for Point {
    fn from(value: Vector2<f64>) -> Self {
        Self::new(value.x, value.y)
    }
}

impl From<Point> for Vector2<f64> {
    fn from(value: Point) -> Self {
        value.to_vector()
    }
}

/// Solved movement of a node: two translations (mm) and a rotation (rad).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Displacement {
    /// Translation along the global X axis.
    pub x: f64,
    /// Translation along the global Y axis.
    pub y: f64,
    /// Rotation about the out-of-plane axis, counter-clockwise positive.
    pub rotation: f64,
}

impl Displacement {
    /// Create a [`Displacement`] with explicit components.
    #[must_use]
    pub const fn new(x: f64, y: f64, rotation: f64) -> Self {
        Self { x, y, rotation }
    }

    /// Translational part as an algebraic vector.
    #[must_use]
    pub fn translation(self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

/// Internal forces at a position along a member.
///
/// Axial force is tension positive (N); bending moment is sagging positive
/// with respect to the member's local axis (N.mm).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InternalForces {
    /// Axial force.
    pub axial: f64,
    /// Shear force normal to the member axis.
    pub shear: f64,
    /// Bending moment.
    pub moment: f64,
}

/// Convenience helper for creating [`Point`] instances.
///
/// # Examples
/// ```
/// use portalx::point;
///
/// let eaves = point(0.0, 4_000.0);
/// assert_eq!(eaves.y, 4_000.0);
/// ```
#[must_use]
pub const fn point(x: f64, y: f64) -> Point {
    Point::new(x, y)
}
