//! Flush-placement candidate generation.
//!
//! Candidates are the positions where a box touches an already committed box on
//! one of its six faces. Every candidate returned here already passed
//! [`Container::can_place`].

use std::collections::HashSet;

use crate::container::Container;
use crate::geometry::Position;
use crate::model::CargoBox;
use crate::types::Vec3;

/// The six flush directions, in generation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::PosX,
        Direction::NegX,
        Direction::PosY,
        Direction::NegY,
        Direction::PosZ,
        Direction::NegZ,
    ];

    /// Origin of a box with extents `dims` placed flush against `anchor` in this direction.
    pub fn flush_origin(self, anchor: &Position, dims: Vec3) -> Vec3 {
        let o = anchor.origin;
        let a = anchor.dims;
        match self {
            Direction::PosX => Vec3::new(o.x + a.x, o.y, o.z),
            Direction::NegX => Vec3::new(o.x - dims.x, o.y, o.z),
            Direction::PosY => Vec3::new(o.x, o.y + a.y, o.z),
            Direction::NegY => Vec3::new(o.x, o.y - dims.y, o.z),
            Direction::PosZ => Vec3::new(o.x, o.y, o.z + a.z),
            Direction::NegZ => Vec3::new(o.x, o.y, o.z - dims.z),
        }
    }
}

/// Feasible positions for `cargo` in `container`, deduplicated and in
/// deterministic order (orientation, committed box, direction).
pub fn generate_candidates(container: &Container, cargo: &CargoBox) -> Vec<Position> {
    let decimals = container.config().dedup_decimals;
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    let mut consider = |pos: Position| {
        // only feasible positions claim a dedup key
        if container.can_place(cargo, &pos).is_ok() && seen.insert(pos.rounded_key(decimals)) {
            candidates.push(pos);
        }
    };

    if container.is_empty() {
        for dims in cargo.orientations() {
            consider(Position::new(Vec3::zero(), dims));
        }
    } else {
        for dims in cargo.orientations() {
            for placed in container.placements() {
                for direction in Direction::ALL {
                    let origin = direction.flush_origin(&placed.position, dims);
                    consider(Position::new(origin, dims));
                }
            }
        }
    }

    log::trace!(
        "{} candidates for {} over {} placed boxes",
        candidates.len(),
        cargo.id,
        container.len()
    );
    candidates
}
