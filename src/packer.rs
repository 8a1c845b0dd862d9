//! Epsilon-greedy single-pass packer.
//!
//! One pass takes every box once: pick one of the two highest-ranked remaining
//! boxes, score all of its flush candidates with a one-step lookahead, and
//! commit either the best candidate or (with probability `epsilon`) a random
//! other one. Boxes without a feasible candidate stay out of the pass.

use std::cmp::Ordering;

use rand::Rng;
use thiserror::Error;

use crate::candidates::generate_candidates;
use crate::container::{Container, PlacementViolation};
use crate::geometry::Position;
use crate::model::CargoBox;
use crate::optimizer::PackEvent;
use crate::scoring::lookahead_score;

/// Why a box was left out of a pass.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum UnplacedReason {
    #[error("No feasible flush position in the cargo space")]
    NoFeasiblePosition,
    #[error("Chosen position rejected on commit: {0}")]
    Rejected(PlacementViolation),
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::NoFeasiblePosition => "no_feasible_position",
            UnplacedReason::Rejected(violation) => violation.code(),
        }
    }
}

/// A box that could not be loaded, with the reason.
#[derive(Clone, Debug)]
pub struct UnplacedBox {
    pub cargo: CargoBox,
    pub reason: UnplacedReason,
}

/// How many of the highest-ranked boxes compete in each selection step.
pub const SELECTION_POOL: usize = 2;

/// Orders `unplaced` by descending rank (stable) and removes one of the top
/// [`SELECTION_POOL`] boxes, chosen uniformly.
pub fn select_box<R: Rng + ?Sized>(unplaced: &mut Vec<CargoBox>, rng: &mut R) -> Option<CargoBox> {
    if unplaced.is_empty() {
        return None;
    }
    unplaced.sort_by(|a, b| b.delivery_sequence.cmp(&a.delivery_sequence));
    let pool = unplaced.len().min(SELECTION_POOL);
    let index = rng.random_range(0..pool);
    Some(unplaced.remove(index))
}

/// Picks an index into candidates sorted by ascending score.
///
/// Exploits (index 0) with probability `1 - epsilon`, otherwise explores a
/// uniformly chosen non-best candidate. Falls back to the best when it is the
/// only one.
pub fn choose_candidate<R: Rng + ?Sized>(count: usize, epsilon: f64, rng: &mut R) -> Option<usize> {
    if count == 0 {
        return None;
    }
    let exploit = rng.random_bool((1.0 - epsilon).clamp(0.0, 1.0));
    if exploit || count == 1 {
        Some(0)
    } else {
        Some(rng.random_range(1..count))
    }
}

/// Scores every candidate with a lookahead and sorts ascending (stable).
pub fn rank_candidates(
    container: &mut Container,
    cargo: &CargoBox,
    candidates: Vec<Position>,
) -> Vec<(Position, f64)> {
    let mut scored: Vec<(Position, f64)> = candidates
        .into_iter()
        .map(|pos| {
            let score = lookahead_score(container, cargo, &pos);
            (pos, score)
        })
        .collect();
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    scored
}

/// Runs one packing pass over a container.
#[derive(Debug)]
pub struct EpsilonGreedyPacker {
    container: Container,
    epsilon: f64,
    restart: usize,
}

impl EpsilonGreedyPacker {
    pub fn new(container: Container, epsilon: f64) -> Self {
        Self {
            container,
            epsilon,
            restart: 0,
        }
    }

    /// Tags emitted events with the restart index.
    pub fn with_restart(mut self, restart: usize) -> Self {
        self.restart = restart;
        self
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn into_container(self) -> Container {
        self.container
    }

    /// Packs `boxes` once and returns those that were left out.
    pub fn pack<R: Rng + ?Sized>(
        &mut self,
        boxes: &[CargoBox],
        rng: &mut R,
        mut on_event: impl FnMut(&PackEvent),
    ) -> Vec<UnplacedBox> {
        let mut remaining = boxes.to_vec();
        let mut unplaced = Vec::new();

        while let Some(cargo) = select_box(&mut remaining, rng) {
            match self.place_one(&cargo, rng) {
                Ok((pos, score)) => {
                    log::debug!(
                        "restart {}: placed {} at ({:.2}, {:.2}, {:.2}) score {:.2}",
                        self.restart,
                        cargo.id,
                        pos.x(),
                        pos.y(),
                        pos.z(),
                        score
                    );
                    on_event(&PackEvent::BoxPlaced {
                        restart: self.restart,
                        id: cargo.id.clone(),
                        pos: pos.origin.as_tuple(),
                        dims: pos.dims.as_tuple(),
                        score,
                    });
                    self.container.place(cargo, pos);
                }
                Err(reason) => {
                    log::debug!("restart {}: skipped {}: {}", self.restart, cargo.id, reason);
                    on_event(&PackEvent::BoxSkipped {
                        restart: self.restart,
                        id: cargo.id.clone(),
                        reason_code: reason.code().to_string(),
                        reason: reason.to_string(),
                    });
                    unplaced.push(UnplacedBox { cargo, reason });
                }
            }
        }

        unplaced
    }

    fn place_one<R: Rng + ?Sized>(
        &mut self,
        cargo: &CargoBox,
        rng: &mut R,
    ) -> Result<(Position, f64), UnplacedReason> {
        let candidates = generate_candidates(&self.container, cargo);
        let scored = rank_candidates(&mut self.container, cargo, candidates);
        let index = choose_candidate(scored.len(), self.epsilon, rng)
            .ok_or(UnplacedReason::NoFeasiblePosition)?;
        let (pos, score) = scored[index];
        self.container
            .can_place(cargo, &pos)
            .map_err(UnplacedReason::Rejected)?;
        Ok((pos, score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContainerSpec;
    use crate::optimizer::PackingConfig;
    use crate::types::Vec3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn cargo(id: &str, dims: (f64, f64, f64), rank: u32) -> CargoBox {
        CargoBox::new(id, dims, 1.0, false, rank, 1).unwrap()
    }

    fn packer(dims: (f64, f64, f64), epsilon: f64) -> EpsilonGreedyPacker {
        let spec = ContainerSpec::new(dims, 1_000.0).unwrap();
        EpsilonGreedyPacker::new(Container::new(spec, PackingConfig::default()).unwrap(), epsilon)
    }

    #[test]
    fn select_box_draws_from_the_two_highest_ranks() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut remaining = vec![
                cargo("Box_1", (1.0, 1.0, 1.0), 1),
                cargo("Box_3", (1.0, 1.0, 1.0), 3),
                cargo("Box_2", (1.0, 1.0, 1.0), 2),
            ];
            let picked = select_box(&mut remaining, &mut rng).unwrap();
            assert!(picked.delivery_sequence >= 2);
            assert_eq!(remaining.len(), 2);
        }
        assert!(select_box(&mut Vec::new(), &mut rng).is_none());
    }

    #[test]
    fn choose_candidate_is_greedy_without_exploration() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(choose_candidate(5, 0.0, &mut rng), Some(0));
        }
        assert_eq!(choose_candidate(0, 0.5, &mut rng), None);
    }

    #[test]
    fn choose_candidate_explores_only_the_rest() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let index = choose_candidate(4, 1.0, &mut rng).unwrap();
            assert!((1..4).contains(&index));
        }
        // a lone candidate is taken even when exploring
        assert_eq!(choose_candidate(1, 1.0, &mut rng), Some(0));
    }

    #[test]
    fn two_cubes_fill_the_container_side_by_side() {
        let mut packer = packer((4.0, 2.0, 2.0), 0.0);
        let boxes = vec![
            cargo("Box_1", (2.0, 2.0, 2.0), 1),
            cargo("Box_2", (2.0, 2.0, 2.0), 2),
        ];
        let mut rng = StdRng::seed_from_u64(11);
        let unplaced = packer.pack(&boxes, &mut rng, |_| {});

        assert!(unplaced.is_empty());
        let origins: Vec<_> = packer
            .container()
            .placements()
            .iter()
            .map(|p| p.position.origin)
            .collect();
        assert_eq!(origins, [Vec3::zero(), Vec3::new(2.0, 0.0, 0.0)]);
    }

    #[test]
    fn boxes_without_room_are_reported_with_events() {
        let mut packer = packer((2.0, 2.0, 2.0), 0.1).with_restart(4);
        let boxes = vec![
            cargo("Box_1", (2.0, 2.0, 2.0), 1),
            cargo("Box_2", (2.0, 2.0, 2.0), 2),
        ];
        let mut events = Vec::new();
        let mut rng = StdRng::seed_from_u64(5);
        let unplaced = packer.pack(&boxes, &mut rng, |event| events.push(event.clone()));

        assert_eq!(unplaced.len(), 1);
        assert_eq!(unplaced[0].reason, UnplacedReason::NoFeasiblePosition);
        assert_eq!(unplaced[0].reason.code(), "no_feasible_position");
        assert_eq!(packer.container().len(), 1);

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], PackEvent::BoxPlaced { restart: 4, .. }));
        assert!(matches!(events[1], PackEvent::BoxSkipped { restart: 4, .. }));
    }

    #[test]
    fn rank_candidates_sorts_ascending() {
        let spec = ContainerSpec::new((6.0, 2.0, 2.0), 1_000.0).unwrap();
        let mut container = Container::new(spec, PackingConfig::default()).unwrap();
        container.place(
            cargo("Box_1", (2.0, 2.0, 2.0), 1),
            Position::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(2.0, 2.0, 2.0)),
        );
        let next = cargo("Box_2", (2.0, 2.0, 2.0), 2);
        let candidates = generate_candidates(&container, &next);
        assert_eq!(candidates.len(), 2);

        let scored = rank_candidates(&mut container, &next, candidates);
        assert!(scored[0].1 <= scored[1].1);
        // behind Box_1 keeps the door side clear for the earlier delivery
        assert_eq!(scored[0].0.origin, Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(container.len(), 1);
    }
}
