//! The truck's cargo space: feasibility checks and committed placements.
//!
//! `Container` is the single source of truth for what has been loaded. Checking
//! (`can_place`) and committing (`place`) are separate steps so the scoring code
//! can commit speculatively and revert without re-validating.

use thiserror::Error;

use crate::geometry::{Position, footprint_samples, footprints_overlap, intersects};
use crate::heightmap::{HeightMap, HeightPatch};
use crate::model::{CargoBox, ContainerSpec, Placement, ValidationError};
use crate::optimizer::PackingConfig;
use crate::types::{Axis, Dimensional, EPSILON_GENERAL, Vec3, Weighted};

/// Reason a position was rejected by [`Container::can_place`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PlacementViolation {
    #[error("[Boundary fail] box leaves the cargo space")]
    Boundary,
    #[error("[Overlap fail with box {other}]")]
    Overlap { other: String },
    #[error("[Fragility fail] footprint shared with box {other}")]
    Fragility { other: String },
    #[error("[Overhang fail] sample=({x:.2},{y:.2}), sup={support:.2}, boxZ={z:.2}")]
    Overhang { x: f64, y: f64, support: f64, z: f64 },
}

impl PlacementViolation {
    pub fn code(&self) -> &'static str {
        match self {
            PlacementViolation::Boundary => "boundary",
            PlacementViolation::Overlap { .. } => "overlap",
            PlacementViolation::Fragility { .. } => "fragility",
            PlacementViolation::Overhang { .. } => "overhang",
        }
    }
}

/// Cargo space with its committed placements and support height map.
#[derive(Clone, Debug)]
pub struct Container {
    spec: ContainerSpec,
    config: PackingConfig,
    placements: Vec<Placement>,
    height_map: HeightMap,
}

impl Container {
    /// Creates an empty container.
    ///
    /// Fails when `config` is unusable or its height map over `spec` would be too large.
    pub fn new(spec: ContainerSpec, config: PackingConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        let height_map = HeightMap::new(spec.dims.x, spec.dims.y, config.grid_step)?;
        Ok(Self {
            spec,
            config,
            placements: Vec::new(),
            height_map,
        })
    }

    /// Dimensions (length, width, height).
    pub fn dims(&self) -> Vec3 {
        self.spec.dims
    }

    pub fn config(&self) -> &PackingConfig {
        &self.config
    }

    /// Committed placements in commit order.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn into_placements(self) -> Vec<Placement> {
        self.placements
    }

    pub fn height_map(&self) -> &HeightMap {
        &self.height_map
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    /// Checks whether `cargo` may be committed at `pos`.
    ///
    /// Rules run in a fixed order and the first failure is reported:
    /// boundary, overlap, fragility, overhang.
    pub fn can_place(&self, cargo: &CargoBox, pos: &Position) -> Result<(), PlacementViolation> {
        self.check_boundary(pos)?;
        self.check_overlap(pos)?;
        self.check_fragility(cargo, pos)?;
        self.check_overhang(pos)
    }

    fn check_boundary(&self, pos: &Position) -> Result<(), PlacementViolation> {
        let dims = self.spec.dims;
        let inside = Axis::ALL.iter().all(|&axis| {
            pos.min_on(axis) >= -EPSILON_GENERAL
                && pos.max_on(axis) <= dims.get(axis) + EPSILON_GENERAL
        });
        if inside {
            Ok(())
        } else {
            Err(PlacementViolation::Boundary)
        }
    }

    fn check_overlap(&self, pos: &Position) -> Result<(), PlacementViolation> {
        match self
            .placements
            .iter()
            .find(|placed| intersects(&placed.position, pos))
        {
            Some(placed) => Err(PlacementViolation::Overlap {
                other: placed.cargo.id.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Fragile boxes never carry load: nothing may sit above a fragile box's
    /// footprint, and a fragile candidate may not go under something already loaded.
    fn check_fragility(&self, cargo: &CargoBox, pos: &Position) -> Result<(), PlacementViolation> {
        let violation = self.placements.iter().find(|placed| {
            if !footprints_overlap(&placed.position, pos) {
                return false;
            }
            let placed_above = placed.position.z() > pos.z() + EPSILON_GENERAL;
            let candidate_above = pos.z() > placed.position.z() + EPSILON_GENERAL;
            (cargo.fragile && placed_above) || (placed.cargo.fragile && candidate_above)
        });
        match violation {
            Some(placed) => Err(PlacementViolation::Fragility {
                other: placed.cargo.id.clone(),
            }),
            None => Ok(()),
        }
    }

    fn check_overhang(&self, pos: &Position) -> Result<(), PlacementViolation> {
        if pos.is_on_floor() {
            return Ok(());
        }
        let z = pos.z();
        let threshold = z - self.config.support_tolerance;
        for (x, y) in footprint_samples(pos, self.config.sample_step) {
            let support = self.height_map.height_at(x, y);
            if support < threshold {
                return Err(PlacementViolation::Overhang { x, y, support, z });
            }
        }
        Ok(())
    }

    /// Commits `cargo` at `pos` without validation.
    pub fn place(&mut self, cargo: CargoBox, pos: Position) {
        self.height_map
            .update(pos.x(), pos.y(), pos.dims.x, pos.dims.y, pos.top_z());
        self.placements.push(Placement::new(cargo, pos));
    }

    /// Commits like [`place`](Self::place) and returns the patch needed to undo it.
    pub fn place_speculative(&mut self, cargo: CargoBox, pos: Position) -> HeightPatch {
        let patch = self
            .height_map
            .capture(pos.x(), pos.y(), pos.dims.x, pos.dims.y);
        self.place(cargo, pos);
        patch
    }

    /// Undoes the most recent speculative commit.
    pub fn revert(&mut self, patch: HeightPatch) -> Option<Placement> {
        let removed = self.placements.pop();
        self.height_map.restore(patch);
        removed
    }

    /// Rebuilds the height map from scratch out of the committed placements.
    pub fn rebuild_height_map(&mut self) {
        self.height_map.reset();
        for placed in &self.placements {
            let pos = placed.position;
            self.height_map
                .update(pos.x(), pos.y(), pos.dims.x, pos.dims.y, pos.top_z());
        }
    }

    /// Total weight of all committed boxes.
    pub fn total_weight(&self) -> f64 {
        self.placements.iter().map(Weighted::weight).sum()
    }

    /// Capacity minus loaded weight. Informational: capacity is not a placement rule.
    pub fn remaining_capacity(&self) -> f64 {
        self.spec.capacity - self.total_weight()
    }

    /// Volume occupied by committed boxes.
    pub fn used_volume(&self) -> f64 {
        self.placements.iter().map(Dimensional::volume).sum()
    }

    /// Volume utilization in percent (0.0 to 100.0).
    pub fn utilization_percent(&self) -> f64 {
        let total = self.spec.volume();
        if total <= 0.0 {
            return 0.0;
        }
        (self.used_volume() / total) * 100.0
    }
}
