//! Data models for the truck loading simulation.
//!
//! This module defines the fundamental data structures fed into the packing engine:
//! - `CargoBox`: A single box to be loaded, with delivery rank and fragility
//! - `Placement`: A box together with the position it was committed at
//! - `ContainerSpec`: The truck's cargo space and weight capacity
//! - `BoxType`: An input line describing a quantity of identical boxes

use std::cmp::Ordering;

use serde::Deserialize;
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::geometry::Position;
use crate::types::{Dimensional, Vec3, Weighted};

/// Upper bound on the number of boxes a single request may expand to.
pub const MAX_BOX_COUNT: usize = 2_000;

/// Validation error for box and container data.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_capacity(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidWeight(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_box_weight(value: f64, name: &str) -> Result<(), ValidationError> {
    if value < 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidWeight(format!(
            "{} must not be negative, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_dims(dims: Vec3, prefix: &str) -> Result<(), ValidationError> {
    validate_dimension(dims.x, &format!("{prefix}length"))?;
    validate_dimension(dims.y, &format!("{prefix}width"))?;
    validate_dimension(dims.z, &format!("{prefix}height"))?;
    Ok(())
}

/// A single box to be loaded into the truck.
///
/// Immutable once created. Height never rotates ("this side up"), so a box
/// exposes exactly two orientations.
///
/// # Fields
/// * `id` - Identifier, `Box_<n>` when generated from box types
/// * `delivery_sequence` - Delivery rank, lower values are unloaded first
/// * `group` - Box type group, informational only
#[derive(Clone, Debug, PartialEq)]
pub struct CargoBox {
    pub id: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub weight: f64,
    pub fragile: bool,
    pub delivery_sequence: u32,
    pub group: u32,
}

impl CargoBox {
    /// Creates a new box after validating dimensions and weight.
    ///
    /// Dimensions must be positive; weight may be zero.
    ///
    /// # Examples
    /// ```
    /// use truck_loadout::model::CargoBox;
    ///
    /// let ok = CargoBox::new("Box_1", (8.0, 6.0, 2.0), 500.0, false, 1, 1);
    /// assert!(ok.is_ok());
    ///
    /// let invalid = CargoBox::new("Box_2", (-8.0, 6.0, 2.0), 500.0, false, 2, 1);
    /// assert!(invalid.is_err());
    /// ```
    pub fn new(
        id: impl Into<String>,
        dims: (f64, f64, f64),
        weight: f64,
        fragile: bool,
        delivery_sequence: u32,
        group: u32,
    ) -> Result<Self, ValidationError> {
        validate_dims(Vec3::from(dims), "Box ")?;
        validate_box_weight(weight, "Box weight")?;
        Ok(Self {
            id: id.into(),
            length: dims.0,
            width: dims.1,
            height: dims.2,
            weight,
            fragile,
            delivery_sequence,
            group,
        })
    }

    /// Nominal extents (length, width, height).
    #[inline]
    pub fn dims(&self) -> Vec3 {
        Vec3::new(self.length, self.width, self.height)
    }

    /// The two usable orientations: (L, W, H) and (W, L, H).
    #[inline]
    pub fn orientations(&self) -> [Vec3; 2] {
        [
            Vec3::new(self.length, self.width, self.height),
            Vec3::new(self.width, self.length, self.height),
        ]
    }

    /// The smaller of the two planar extents.
    #[inline]
    pub fn min_planar_dim(&self) -> f64 {
        self.length.min(self.width)
    }
}

impl Dimensional for CargoBox {
    fn dimensions(&self) -> Vec3 {
        self.dims()
    }
}

impl Weighted for CargoBox {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// A box committed to the container at a specific position.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub cargo: CargoBox,
    pub position: Position,
}

impl Placement {
    pub fn new(cargo: CargoBox, position: Position) -> Self {
        Self { cargo, position }
    }
}

impl Dimensional for Placement {
    /// Oriented extents as committed.
    fn dimensions(&self) -> Vec3 {
        self.position.dims
    }
}

impl Weighted for Placement {
    fn weight(&self) -> f64 {
        self.cargo.weight
    }
}

/// The truck's cargo space.
///
/// # Fields
/// * `dims` - Length (x, away from the door), width (y) and height (z)
/// * `capacity` - Weight capacity, reported but not enforced during placement
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContainerSpec {
    pub dims: Vec3,
    pub capacity: f64,
}

impl ContainerSpec {
    /// Creates a validated container specification.
    pub fn new(dims: (f64, f64, f64), capacity: f64) -> Result<Self, ValidationError> {
        let dims = Vec3::from(dims);
        validate_dims(dims, "Container ")?;
        validate_capacity(capacity, "Container capacity")?;
        Ok(Self { dims, capacity })
    }

    /// Volume of the cargo space.
    pub fn volume(&self) -> f64 {
        self.dims.volume()
    }
}

impl Dimensional for ContainerSpec {
    fn dimensions(&self) -> Vec3 {
        self.dims
    }
}

/// A line of the box configuration: `quantity` identical boxes.
#[derive(Clone, Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "M", "length": 16.0, "width": 12.0, "height": 6.0,
    "weight": 5000.0, "quantity": 3, "fragile": false
}))]
pub struct BoxType {
    pub name: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub weight: f64,
    pub quantity: u32,
    #[serde(default)]
    pub fragile: bool,
}

impl BoxType {
    fn min_planar_dim(&self) -> f64 {
        self.length.min(self.width)
    }
}

/// Expands box types into individual boxes.
///
/// Types are processed in ascending order of their smaller planar dimension
/// (stable for ties). Every generated box gets the id `Box_<n>` and the
/// delivery rank `n`, counting from 1 across all types; the group id counts
/// types in processing order, also from 1.
///
/// # Examples
/// ```
/// use truck_loadout::model::{BoxType, expand_box_types};
///
/// let types = vec![
///     BoxType { name: "L".into(), length: 20.0, width: 16.0, height: 12.0,
///               weight: 10.0, quantity: 1, fragile: false },
///     BoxType { name: "XS".into(), length: 8.0, width: 6.0, height: 2.0,
///               weight: 0.5, quantity: 2, fragile: true },
/// ];
/// let boxes = expand_box_types(&types).unwrap();
/// assert_eq!(boxes.len(), 3);
/// assert_eq!(boxes[0].id, "Box_1");
/// assert!(boxes[0].fragile);
/// assert_eq!(boxes[2].delivery_sequence, 3);
/// assert_eq!(boxes[2].group, 2);
/// ```
pub fn expand_box_types(types: &[BoxType]) -> Result<Vec<CargoBox>, ValidationError> {
    let total: usize = types.iter().map(|t| t.quantity as usize).sum();
    if total > MAX_BOX_COUNT {
        return Err(ValidationError::InvalidConfiguration(format!(
            "At most {} boxes are supported, got: {}",
            MAX_BOX_COUNT, total
        )));
    }

    let mut ordered: Vec<&BoxType> = types.iter().collect();
    ordered.sort_by(|a, b| {
        a.min_planar_dim()
            .partial_cmp(&b.min_planar_dim())
            .unwrap_or(Ordering::Equal)
    });

    let mut boxes = Vec::with_capacity(total);
    let mut sequence = 1u32;
    for (group_idx, box_type) in ordered.into_iter().enumerate() {
        for _ in 0..box_type.quantity {
            boxes.push(CargoBox::new(
                format!("Box_{sequence}"),
                (box_type.length, box_type.width, box_type.height),
                box_type.weight,
                box_type.fragile,
                sequence,
                group_idx as u32 + 1,
            )?);
            sequence += 1;
        }
    }
    Ok(boxes)
}
