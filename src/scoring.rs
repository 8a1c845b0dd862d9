//! Arrangement scoring: stability, unloading effort and the composite costs.
//!
//! All scores are "lower is better". Stability enters negatively, weighted by
//! `stability_weight` (alpha); every box left out of a pass adds `unplaced_penalty`.

use crate::container::Container;
use crate::geometry::Position;
use crate::model::{CargoBox, Placement};
use crate::types::Axis;

/// Which side of a box along an axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Min,
    Max,
}

impl Side {
    const BOTH: [Side; 2] = [Side::Min, Side::Max];
}

fn face_coord(pos: &Position, axis: Axis, side: Side) -> f64 {
    match side {
        Side::Min => pos.min_on(axis),
        Side::Max => pos.max_on(axis),
    }
}

fn opposite_face(pos: &Position, axis: Axis, side: Side) -> f64 {
    match side {
        Side::Min => pos.max_on(axis),
        Side::Max => pos.min_on(axis),
    }
}

fn face_supported(container: &Container, index: usize, axis: Axis, side: Side) -> bool {
    let config = container.config();
    let pos = &container.placements()[index].position;
    let face = face_coord(pos, axis, side);

    let wall = match side {
        Side::Min => 0.0,
        Side::Max => container.dims().get(axis),
    };
    if (face - wall).abs() <= config.wall_tolerance {
        return true;
    }

    if axis == Axis::Z && side == Side::Min {
        let (cx, cy) = pos.footprint_center();
        if container.height_map().height_at(cx, cy) >= pos.z() - config.support_tolerance {
            return true;
        }
    }

    let (u, v) = axis.others();
    let bounds = pos.bounding_box();
    container
        .placements()
        .iter()
        .enumerate()
        .filter(|&(other_index, _)| other_index != index)
        .any(|(_, other)| {
            let other = &other.position;
            let other_bounds = other.bounding_box();
            (opposite_face(other, axis, side) - face).abs() <= config.face_tolerance
                && bounds.overlaps_on(&other_bounds, u)
                && bounds.overlaps_on(&other_bounds, v)
        })
}

/// Supported faces of the placement at `index`, from 0 to 6.
pub fn supported_faces(container: &Container, index: usize) -> usize {
    Axis::ALL
        .iter()
        .flat_map(|&axis| Side::BOTH.iter().map(move |&side| (axis, side)))
        .filter(|&(axis, side)| face_supported(container, index, axis, side))
        .count()
}

/// Sum of supported faces over all committed placements. Higher is better.
pub fn measure_stability(container: &Container) -> usize {
    (0..container.len())
        .map(|index| supported_faces(container, index))
        .sum()
}

/// Counts ordered pairs where a later-delivered box sits closer to the door.
///
/// A pair (a, b) counts when `b` has the higher delivery rank but the smaller
/// x coordinate. Lower is better.
pub fn measure_unloading_effort(placements: &[Placement]) -> usize {
    placements
        .iter()
        .map(|a| {
            placements
                .iter()
                .filter(|b| {
                    b.cargo.delivery_sequence > a.cargo.delivery_sequence
                        && b.position.x() < a.position.x()
                })
                .count()
        })
        .sum()
}

fn composite(container: &Container) -> f64 {
    let alpha = container.config().stability_weight;
    measure_unloading_effort(container.placements()) as f64
        - alpha * measure_stability(container) as f64
}

/// One-step lookahead: commits `cargo` at `pos`, scores, and reverts.
///
/// The container is left exactly as it was on return.
pub fn lookahead_score(container: &mut Container, cargo: &CargoBox, pos: &Position) -> f64 {
    let patch = container.place_speculative(cargo.clone(), *pos);
    let score = composite(container);
    container.revert(patch);
    score
}

/// Final cost of an arrangement given the number of boxes that should have been loaded.
pub fn final_arrangement_score(container: &Container, total_boxes: usize) -> f64 {
    let unplaced = total_boxes.saturating_sub(container.len());
    composite(container) + container.config().unplaced_penalty * unplaced as f64
}
