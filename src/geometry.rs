//! Placement geometry: positions, overlap tests and footprint sampling.
//!
//! A [`Position`] is a candidate or committed placement of a box: its origin
//! (lower left front corner) plus the oriented extents chosen for that placement.

use crate::types::{Axis, BoundingBox, EPSILON_GENERAL, Vec3};

/// A placement instance: origin plus oriented extents (L, W, H).
///
/// # Examples
/// ```
/// use truck_loadout::geometry::Position;
/// use truck_loadout::types::Vec3;
///
/// let pos = Position::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(2.0, 2.0, 2.0));
/// assert_eq!(pos.top_z(), 2.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub origin: Vec3,
    pub dims: Vec3,
}

impl Position {
    #[inline]
    pub const fn new(origin: Vec3, dims: Vec3) -> Self {
        Self { origin, dims }
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.origin.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.origin.y
    }

    #[inline]
    pub fn z(&self) -> f64 {
        self.origin.z
    }

    /// Z coordinate of the top face.
    #[inline]
    pub fn top_z(&self) -> f64 {
        self.origin.z + self.dims.z
    }

    /// Coordinate of the face on the negative side of `axis`.
    #[inline]
    pub fn min_on(&self, axis: Axis) -> f64 {
        self.origin.get(axis)
    }

    /// Coordinate of the face on the positive side of `axis`.
    #[inline]
    pub fn max_on(&self, axis: Axis) -> f64 {
        self.origin.get(axis) + self.dims.get(axis)
    }

    /// Center of the footprint in the XY plane.
    #[inline]
    pub fn footprint_center(&self) -> (f64, f64) {
        (
            self.origin.x + self.dims.x / 2.0,
            self.origin.y + self.dims.y / 2.0,
        )
    }

    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_position_and_dims(self.origin, self.dims)
    }

    /// Whether the box rests on the container floor.
    #[inline]
    pub fn is_on_floor(&self) -> bool {
        self.origin.z.abs() <= EPSILON_GENERAL
    }

    /// Dedup key: origin and extents rounded to `decimals` decimal places.
    pub fn rounded_key(&self, decimals: u32) -> [i64; 6] {
        let scale = 10f64.powi(decimals as i32);
        let r = |v: f64| (v * scale).round() as i64;
        [
            r(self.origin.x),
            r(self.origin.y),
            r(self.origin.z),
            r(self.dims.x),
            r(self.dims.y),
            r(self.dims.z),
        ]
    }
}

/// Checks whether two placements overlap in space.
///
/// Touching faces do not count as overlap.
#[inline]
pub fn intersects(a: &Position, b: &Position) -> bool {
    a.bounding_box().intersects(&b.bounding_box())
}

/// Checks whether the footprints of two placements overlap with positive area.
#[inline]
pub fn footprints_overlap(a: &Position, b: &Position) -> bool {
    a.bounding_box().footprint_overlaps(&b.bounding_box())
}

/// Sample coordinates along one footprint edge.
///
/// Returns the midpoints of `n` equal sub-intervals of `[start, start + len]`,
/// where `n` is the smallest count keeping the spacing at or below `step`.
pub fn sample_axis(start: f64, len: f64, step: f64) -> Vec<f64> {
    let count = ((len / step) - EPSILON_GENERAL).ceil().max(1.0) as usize;
    let spacing = len / count as f64;
    (0..count)
        .map(|i| start + (i as f64 + 0.5) * spacing)
        .collect()
}

/// All sample points of a placement's footprint on a grid no coarser than `step`.
pub fn footprint_samples(pos: &Position, step: f64) -> impl Iterator<Item = (f64, f64)> {
    let xs = sample_axis(pos.origin.x, pos.dims.x, step);
    let ys = sample_axis(pos.origin.y, pos.dims.y, step);
    xs.into_iter()
        .flat_map(move |x| ys.clone().into_iter().map(move |y| (x, y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_at(x: f64, y: f64, z: f64, edge: f64) -> Position {
        Position::new(Vec3::new(x, y, z), Vec3::new(edge, edge, edge))
    }

    #[test]
    fn adjacent_positions_do_not_intersect() {
        let a = cube_at(0.0, 0.0, 0.0, 2.0);
        assert!(!intersects(&a, &cube_at(2.0, 0.0, 0.0, 2.0)));
        assert!(!intersects(&a, &cube_at(0.0, 0.0, 2.0, 2.0)));
        assert!(intersects(&a, &cube_at(1.5, 1.5, 1.5, 2.0)));
    }

    #[test]
    fn stacked_positions_share_footprint() {
        let a = cube_at(0.0, 0.0, 0.0, 2.0);
        let b = cube_at(0.0, 0.0, 2.0, 2.0);
        assert!(footprints_overlap(&a, &b));
        assert!(!footprints_overlap(&a, &cube_at(2.0, 0.0, 0.0, 2.0)));
    }

    #[test]
    fn sample_axis_covers_interval_with_midpoints() {
        let samples = sample_axis(1.0, 1.0, 0.25);
        assert_eq!(samples.len(), 4);
        assert!((samples[0] - 1.125).abs() < 1e-12);
        assert!((samples[3] - 1.875).abs() < 1e-12);

        let short = sample_axis(0.0, 0.05, 0.1);
        assert_eq!(short.len(), 1);
        assert!((short[0] - 0.025).abs() < 1e-12);
    }

    #[test]
    fn footprint_samples_form_full_grid() {
        let pos = Position::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(2.0, 1.0, 1.0));
        let samples: Vec<_> = footprint_samples(&pos, 0.5).collect();
        assert_eq!(samples.len(), 4 * 2);
        assert!(samples.iter().all(|&(x, y)| x > 0.0 && x < 2.0 && y > 0.0 && y < 1.0));
    }

    #[test]
    fn rounded_key_collapses_rounding_noise() {
        let a = Position::new(Vec3::new(0.1 + 0.2, 0.0, 0.0), Vec3::new(1.0, 2.0, 3.0));
        let b = Position::new(Vec3::new(0.3, 0.0, 0.0), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(a.rounded_key(2), b.rounded_key(2));
    }
}
