//! Multi-restart optimizer for truck loading.
//!
//! Each restart packs the full box list into a fresh container with its own
//! seeded RNG; the arrangement with the lowest final score wins. The module
//! also owns the tunables (`PackingConfig`), progress events and the
//! serializable report types built from the winning arrangement.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::container::Container;
use crate::heightmap::grid_shape;
use crate::model::{CargoBox, ContainerSpec, Placement, ValidationError};
use crate::packer::{EpsilonGreedyPacker, UnplacedBox};
use crate::scoring::final_arrangement_score;
use crate::types::EPSILON_GENERAL;

/// How the exploration rate develops across restarts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EpsilonSchedule {
    /// Every restart uses the configured epsilon.
    #[default]
    Fixed,
    /// Explore heavily early, exploit late.
    Annealing,
}

impl EpsilonSchedule {
    /// Epsilon for the 1-based `restart` out of `total`.
    ///
    /// ```
    /// use truck_loadout::optimizer::EpsilonSchedule;
    ///
    /// assert_eq!(EpsilonSchedule::Fixed.epsilon_for(3, 10, 0.1), 0.1);
    /// assert_eq!(EpsilonSchedule::Annealing.epsilon_for(1, 10, 0.1), 0.8);
    /// assert_eq!(EpsilonSchedule::Annealing.epsilon_for(10, 10, 0.1), 0.2);
    /// ```
    pub fn epsilon_for(self, restart: usize, total: usize, base: f64) -> f64 {
        match self {
            EpsilonSchedule::Fixed => base,
            EpsilonSchedule::Annealing => {
                let fraction = restart as f64 / total.max(1) as f64;
                if fraction <= 0.1 {
                    0.8
                } else if fraction <= 0.2 {
                    0.7
                } else if fraction <= 0.7 {
                    0.5
                } else {
                    0.2
                }
            }
        }
    }

    /// Parses `fixed` or `annealing` (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "fixed" => Some(EpsilonSchedule::Fixed),
            "annealing" => Some(EpsilonSchedule::Annealing),
            _ => None,
        }
    }
}

/// Tunables of the packing engine.
///
/// Lengths share the unit of the container dimensions.
#[derive(Copy, Clone, Debug)]
pub struct PackingConfig {
    /// Cell edge of the support height map
    pub grid_step: f64,
    /// Maximum spacing of the footprint samples used by the overhang check
    pub sample_step: f64,
    /// How far below a box's bottom a supporting surface may lie
    pub support_tolerance: f64,
    /// Maximum gap between two faces that still counts as contact
    pub face_tolerance: f64,
    /// Maximum gap between a face and a container wall that counts as contact
    pub wall_tolerance: f64,
    /// Weight of stability against unloading effort (alpha)
    pub stability_weight: f64,
    /// Cost added per box left out of an arrangement
    pub unplaced_penalty: f64,
    /// Probability of exploring a non-best candidate
    pub epsilon: f64,
    /// Number of independent packing passes
    pub restarts: usize,
    pub epsilon_schedule: EpsilonSchedule,
    /// Base seed; restart k uses `seed + k`. Drawn at random when unset.
    pub seed: Option<u64>,
    /// Run restarts on the rayon pool
    pub parallel_restarts: bool,
    /// Decimal places used when deduplicating candidates
    pub dedup_decimals: u32,
}

impl PackingConfig {
    pub const DEFAULT_GRID_STEP: f64 = 0.1;
    pub const DEFAULT_SAMPLE_STEP: f64 = 0.1;
    pub const DEFAULT_SUPPORT_TOLERANCE: f64 = 0.05;
    pub const DEFAULT_FACE_TOLERANCE: f64 = 0.1;
    pub const DEFAULT_WALL_TOLERANCE: f64 = 0.05;
    pub const DEFAULT_STABILITY_WEIGHT: f64 = 0.5;
    pub const DEFAULT_UNPLACED_PENALTY: f64 = 10.0;
    pub const DEFAULT_EPSILON: f64 = 0.1;
    pub const DEFAULT_RESTARTS: usize = 3;
    pub const DEFAULT_DEDUP_DECIMALS: u32 = 2;
    pub const MAX_RESTARTS: usize = 500;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }

    /// Checks that all tunables are usable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let positive = [
            ("grid_step", self.grid_step),
            ("sample_step", self.sample_step),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ValidationError::InvalidConfiguration(format!(
                    "{name} must be positive, got: {value}"
                )));
            }
        }
        let non_negative = [
            ("support_tolerance", self.support_tolerance),
            ("face_tolerance", self.face_tolerance),
            ("wall_tolerance", self.wall_tolerance),
            ("stability_weight", self.stability_weight),
            ("unplaced_penalty", self.unplaced_penalty),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ValidationError::InvalidConfiguration(format!(
                    "{name} must not be negative, got: {value}"
                )));
            }
        }
        if self.sample_step > self.grid_step + EPSILON_GENERAL {
            return Err(ValidationError::InvalidConfiguration(format!(
                "sample_step ({}) must not exceed grid_step ({})",
                self.sample_step, self.grid_step
            )));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(ValidationError::InvalidConfiguration(format!(
                "epsilon must be within [0, 1], got: {}",
                self.epsilon
            )));
        }
        if self.restarts == 0 || self.restarts > Self::MAX_RESTARTS {
            return Err(ValidationError::InvalidConfiguration(format!(
                "restarts must be within 1..={}, got: {}",
                Self::MAX_RESTARTS,
                self.restarts
            )));
        }
        Ok(())
    }

    /// Like [`validate`](Self::validate), and also checks the height map size for `spec`.
    pub fn validate_for(&self, spec: &ContainerSpec) -> Result<(), ValidationError> {
        self.validate()?;
        grid_shape(spec.dims.x, spec.dims.y, self.grid_step).map(|_| ())
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            grid_step: Self::DEFAULT_GRID_STEP,
            sample_step: Self::DEFAULT_SAMPLE_STEP,
            support_tolerance: Self::DEFAULT_SUPPORT_TOLERANCE,
            face_tolerance: Self::DEFAULT_FACE_TOLERANCE,
            wall_tolerance: Self::DEFAULT_WALL_TOLERANCE,
            stability_weight: Self::DEFAULT_STABILITY_WEIGHT,
            unplaced_penalty: Self::DEFAULT_UNPLACED_PENALTY,
            epsilon: Self::DEFAULT_EPSILON,
            restarts: Self::DEFAULT_RESTARTS,
            epsilon_schedule: EpsilonSchedule::Fixed,
            seed: None,
            parallel_restarts: false,
            dedup_decimals: Self::DEFAULT_DEDUP_DECIMALS,
        }
    }
}

/// Builder for [`PackingConfig`].
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    pub fn grid_step(mut self, step: f64) -> Self {
        self.config.grid_step = step;
        self
    }

    pub fn sample_step(mut self, step: f64) -> Self {
        self.config.sample_step = step;
        self
    }

    pub fn support_tolerance(mut self, tolerance: f64) -> Self {
        self.config.support_tolerance = tolerance;
        self
    }

    pub fn face_tolerance(mut self, tolerance: f64) -> Self {
        self.config.face_tolerance = tolerance;
        self
    }

    pub fn wall_tolerance(mut self, tolerance: f64) -> Self {
        self.config.wall_tolerance = tolerance;
        self
    }

    /// Sets alpha, the weight of stability in every score.
    pub fn stability_weight(mut self, alpha: f64) -> Self {
        self.config.stability_weight = alpha;
        self
    }

    pub fn unplaced_penalty(mut self, penalty: f64) -> Self {
        self.config.unplaced_penalty = penalty;
        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    pub fn restarts(mut self, restarts: usize) -> Self {
        self.config.restarts = restarts;
        self
    }

    pub fn epsilon_schedule(mut self, schedule: EpsilonSchedule) -> Self {
        self.config.epsilon_schedule = schedule;
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn parallel_restarts(mut self, parallel: bool) -> Self {
        self.config.parallel_restarts = parallel;
        self
    }

    pub fn dedup_decimals(mut self, decimals: u32) -> Self {
        self.config.dedup_decimals = decimals;
        self
    }

    /// Creates the final configuration.
    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// Events emitted while optimizing, suitable for streaming to clients.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum PackEvent {
    /// A restart begins with an empty container.
    RestartStarted { restart: usize, epsilon: f64 },
    /// A box was committed.
    BoxPlaced {
        restart: usize,
        id: String,
        pos: (f64, f64, f64),
        dims: (f64, f64, f64),
        score: f64,
    },
    /// A box was left out of the current restart.
    BoxSkipped {
        restart: usize,
        id: String,
        reason_code: String,
        reason: String,
    },
    RestartFinished {
        restart: usize,
        score: f64,
        placed: usize,
        unplaced: usize,
    },
    /// All restarts done; the best arrangement is final.
    Finished {
        best_score: f64,
        placed: usize,
        unplaced: usize,
    },
}

/// One committed box of the final arrangement, with normalized coordinates.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "box_id": "Box_1", "pos_x": 0.0, "pos_y": 0.0, "pos_z": 0.0,
    "length": 8.0, "width": 6.0, "height": 2.0,
    "x_norm": 0.0, "y_norm": 0.0, "z_norm": 0.0,
    "group": 1, "fragile": false, "delivery_sequence": 1, "weight": 500.0, "placed": true
}))]
pub struct ArrangedBox {
    pub box_id: String,
    pub pos_x: f64,
    pub pos_y: f64,
    pub pos_z: f64,
    /// Oriented extents as committed
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub x_norm: f64,
    pub y_norm: f64,
    pub z_norm: f64,
    pub group: u32,
    pub fragile: bool,
    pub delivery_sequence: u32,
    pub weight: f64,
    pub placed: bool,
}

impl ArrangedBox {
    pub fn from_placement(placement: &Placement, spec: &ContainerSpec) -> Self {
        let origin = placement.position.origin;
        let dims = placement.position.dims;
        let norm = origin.normalized_by(&spec.dims);
        Self {
            box_id: placement.cargo.id.clone(),
            pos_x: origin.x,
            pos_y: origin.y,
            pos_z: origin.z,
            length: dims.x,
            width: dims.y,
            height: dims.z,
            x_norm: norm.x,
            y_norm: norm.y,
            z_norm: norm.z,
            group: placement.cargo.group,
            fragile: placement.cargo.fragile,
            delivery_sequence: placement.cargo.delivery_sequence,
            weight: placement.cargo.weight,
            placed: true,
        }
    }
}

/// Summary of an input box, normalized against the container.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct BoxInputSummary {
    pub box_id: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub weight: f64,
    pub group: u32,
    pub fragile: bool,
    pub delivery_sequence: u32,
    /// Dimensions divided by the container dimensions
    pub dims_norm: [f64; 3],
    /// Weight divided by the container capacity
    pub weight_norm: f64,
}

/// Summarizes every input box relative to `spec`.
pub fn summarize_inputs(boxes: &[CargoBox], spec: &ContainerSpec) -> Vec<BoxInputSummary> {
    boxes
        .iter()
        .map(|cargo| {
            let norm = cargo.dims().normalized_by(&spec.dims);
            BoxInputSummary {
                box_id: cargo.id.clone(),
                length: cargo.length,
                width: cargo.width,
                height: cargo.height,
                weight: cargo.weight,
                group: cargo.group,
                fragile: cargo.fragile,
                delivery_sequence: cargo.delivery_sequence,
                dims_norm: [norm.x, norm.y, norm.z],
                weight_norm: cargo.weight / spec.capacity,
            }
        })
        .collect()
}

/// Outcome of an optimizer run: the best arrangement plus run statistics.
#[derive(Clone, Debug)]
pub struct PackingResult {
    pub spec: ContainerSpec,
    pub placements: Vec<Placement>,
    pub unplaced: Vec<UnplacedBox>,
    pub best_score: f64,
    /// 1-based restart that produced the best arrangement
    pub best_restart: usize,
    /// Final score of every restart, in restart order
    pub restart_scores: Vec<f64>,
    pub total_boxes: usize,
    /// Base seed the restarts were derived from
    pub seed: u64,
}

impl PackingResult {
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn placed_count(&self) -> usize {
        self.placements.len()
    }

    pub fn unplaced_count(&self) -> usize {
        self.unplaced.len()
    }

    pub fn total_packed_weight(&self) -> f64 {
        self.placements.iter().map(|p| p.cargo.weight).sum()
    }

    /// Capacity minus packed weight; negative when overloaded.
    pub fn remaining_capacity(&self) -> f64 {
        self.spec.capacity - self.total_packed_weight()
    }

    pub fn utilization_percent(&self) -> f64 {
        let total = self.spec.volume();
        if total <= 0.0 {
            return 0.0;
        }
        let used: f64 = self
            .placements
            .iter()
            .map(|p| p.position.dims.volume())
            .sum();
        (used / total) * 100.0
    }

    /// The best arrangement in commit order.
    pub fn arrangement(&self) -> Vec<ArrangedBox> {
        self.placements
            .iter()
            .map(|p| ArrangedBox::from_placement(p, &self.spec))
            .collect()
    }
}

struct RestartOutcome {
    restart: usize,
    score: f64,
    container: Container,
    unplaced: Vec<UnplacedBox>,
}

/// Runs the optimizer without progress reporting.
pub fn optimize(
    boxes: &[CargoBox],
    spec: ContainerSpec,
    config: PackingConfig,
) -> Result<PackingResult, ValidationError> {
    optimize_with_progress(boxes, spec, config, |_| {})
}

/// Runs all restarts and reports progress through `on_event`.
///
/// Events of parallel restarts are buffered and replayed in restart order, so
/// the event sequence is the same in both modes. Fails before any event is
/// emitted when `config` cannot be used with `spec`.
pub fn optimize_with_progress(
    boxes: &[CargoBox],
    spec: ContainerSpec,
    config: PackingConfig,
    mut on_event: impl FnMut(&PackEvent),
) -> Result<PackingResult, ValidationError> {
    let empty = Container::new(spec, config)?;
    let restarts = config.restarts;
    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    log::info!(
        "Optimizing {} boxes over {} restarts (seed {}, {})",
        boxes.len(),
        restarts,
        seed,
        if config.parallel_restarts {
            "parallel"
        } else {
            "sequential"
        }
    );

    let outcomes: Vec<RestartOutcome> = if config.parallel_restarts {
        let buffered: Vec<(RestartOutcome, Vec<PackEvent>)> = (1..=restarts)
            .into_par_iter()
            .map(|restart| {
                let mut events = Vec::new();
                let outcome = run_restart(restart, boxes, &empty, seed, |event| {
                    events.push(event.clone())
                });
                (outcome, events)
            })
            .collect();
        buffered
            .into_iter()
            .map(|(outcome, events)| {
                events.iter().for_each(&mut on_event);
                outcome
            })
            .collect()
    } else {
        (1..=restarts)
            .map(|restart| run_restart(restart, boxes, &empty, seed, &mut on_event))
            .collect()
    };

    let restart_scores: Vec<f64> = outcomes.iter().map(|o| o.score).collect();
    let best = outcomes
        .into_iter()
        .reduce(|best, next| if next.score < best.score { next } else { best });

    let result = match best {
        Some(best) => PackingResult {
            spec,
            placements: best.container.into_placements(),
            unplaced: best.unplaced,
            best_score: best.score,
            best_restart: best.restart,
            restart_scores,
            total_boxes: boxes.len(),
            seed,
        },
        None => PackingResult {
            spec,
            placements: Vec::new(),
            unplaced: Vec::new(),
            best_score: 0.0,
            best_restart: 0,
            restart_scores,
            total_boxes: boxes.len(),
            seed,
        },
    };

    log::info!(
        "Best arrangement from restart {}: score {:.2}, {} placed, {} unplaced",
        result.best_restart,
        result.best_score,
        result.placed_count(),
        result.unplaced_count()
    );
    on_event(&PackEvent::Finished {
        best_score: result.best_score,
        placed: result.placed_count(),
        unplaced: result.unplaced_count(),
    });
    Ok(result)
}

/// Packs all boxes into a copy of the `empty` container.
fn run_restart(
    restart: usize,
    boxes: &[CargoBox],
    empty: &Container,
    seed: u64,
    mut on_event: impl FnMut(&PackEvent),
) -> RestartOutcome {
    let config = empty.config();
    let epsilon = config
        .epsilon_schedule
        .epsilon_for(restart, config.restarts, config.epsilon);
    on_event(&PackEvent::RestartStarted { restart, epsilon });

    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(restart as u64));
    let mut packer = EpsilonGreedyPacker::new(empty.clone(), epsilon).with_restart(restart);
    let unplaced = packer.pack(boxes, &mut rng, &mut on_event);
    let container = packer.into_container();
    let score = final_arrangement_score(&container, boxes.len());

    log::debug!(
        "restart {restart}: epsilon {epsilon:.2}, score {score:.2}, {} placed, {} unplaced",
        container.len(),
        unplaced.len()
    );
    on_event(&PackEvent::RestartFinished {
        restart,
        score,
        placed: container.len(),
        unplaced: unplaced.len(),
    });

    RestartOutcome {
        restart,
        score,
        container,
        unplaced,
    }
}
