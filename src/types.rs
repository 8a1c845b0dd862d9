//! Common types and traits for 3D geometry.
//!
//! This module defines the small value types shared by the packing engine:
//! vectors, axis handles and axis-aligned bounding boxes.

use std::ops::Add;

/// Global numerical tolerance for floating-point comparisons.
///
/// Used for boundary and interval tests where inputs are exact up to rounding noise.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// One of the three container axes.
///
/// X runs along the truck length (x = 0 is the access side), Y along its
/// width and Z is height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// The two axes orthogonal to this one.
    #[inline]
    pub const fn others(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::X, Axis::Z),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }
}

/// Represents a 3D vector or point in space.
///
/// Used for positions, extents and container dimensions.
///
/// # Examples
/// ```
/// use truck_loadout::types::Vec3;
///
/// let origin = Vec3::new(1.0, 2.0, 3.0);
/// let extents = Vec3::new(10.0, 20.0, 30.0);
/// assert_eq!(origin + extents, Vec3::new(11.0, 22.0, 33.0));
/// assert_eq!(extents.volume(), 6000.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new 3D vector.
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (origin).
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Converts to tuple format for API compatibility.
    #[inline]
    pub const fn as_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    /// Returns the component along `axis`.
    #[inline]
    pub const fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Calculates the volume (product of all components).
    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// Component-wise division, used for normalizing against container dimensions.
    #[inline]
    pub fn normalized_by(&self, dims: &Self) -> Self {
        Self::new(self.x / dims.x, self.y / dims.y, self.z / dims.z)
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl From<(f64, f64, f64)> for Vec3 {
    #[inline]
    fn from(tuple: (f64, f64, f64)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }
}

impl From<Vec3> for (f64, f64, f64) {
    #[inline]
    fn from(vec: Vec3) -> Self {
        vec.as_tuple()
    }
}

/// Trait for objects with 3D dimensions.
pub trait Dimensional {
    /// Returns the dimensions of the object.
    fn dimensions(&self) -> Vec3;

    /// Calculates the volume.
    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }
}

/// Trait for objects with weight.
pub trait Weighted {
    /// Returns the weight.
    fn weight(&self) -> f64;
}

/// Represents an Axis-Aligned Bounding Box (AABB).
///
/// Intervals are treated as open: two boxes that only touch on a face do not intersect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner (position)
    pub min: Vec3,
    /// Maximum corner (position + dimensions)
    pub max: Vec3,
}

impl BoundingBox {
    /// Creates a bounding box from position and dimensions.
    #[inline]
    pub fn from_position_and_dims(position: Vec3, dims: Vec3) -> Self {
        Self {
            min: position,
            max: position + dims,
        }
    }

    /// Checks whether the open intervals of both boxes overlap on `axis`.
    #[inline]
    pub fn overlaps_on(&self, other: &Self, axis: Axis) -> bool {
        self.max.get(axis) > other.min.get(axis) + EPSILON_GENERAL
            && other.max.get(axis) > self.min.get(axis) + EPSILON_GENERAL
    }

    /// Checks if two bounding boxes intersect.
    ///
    /// Separating Axis Theorem for AABBs: disjoint as soon as one axis separates them.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        Axis::ALL.iter().all(|&axis| self.overlaps_on(other, axis))
    }

    /// Checks whether the XY projections (footprints) overlap with positive area.
    #[inline]
    pub fn footprint_overlaps(&self, other: &Self) -> bool {
        self.overlaps_on(other, Axis::X) && self.overlaps_on(other, Axis::Y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b.get(Axis::Y), 5.0);
    }

    #[test]
    fn test_vec3_volume_and_normalization() {
        let dims = Vec3::new(10.0, 20.0, 30.0);
        assert!((dims.volume() - 6000.0).abs() < EPSILON_GENERAL);

        let half = Vec3::new(5.0, 10.0, 15.0).normalized_by(&dims);
        assert_eq!(half, Vec3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_touching_boxes_do_not_intersect() {
        let a = BoundingBox::from_position_and_dims(Vec3::zero(), Vec3::new(2.0, 2.0, 2.0));
        let b = BoundingBox::from_position_and_dims(
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 2.0, 2.0),
        );
        let c = BoundingBox::from_position_and_dims(
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(2.0, 2.0, 2.0),
        );

        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
    }

    #[test]
    fn test_footprint_overlap_ignores_height() {
        let floor = BoundingBox::from_position_and_dims(Vec3::zero(), Vec3::new(2.0, 2.0, 2.0));
        let above = BoundingBox::from_position_and_dims(
            Vec3::new(1.0, 0.0, 5.0),
            Vec3::new(2.0, 2.0, 1.0),
        );

        assert!(floor.footprint_overlaps(&above));
        assert!(!floor.intersects(&above));
    }

    #[test]
    fn test_axis_others() {
        assert_eq!(Axis::X.others(), (Axis::Y, Axis::Z));
        assert_eq!(Axis::Z.others(), (Axis::X, Axis::Y));
    }
}
