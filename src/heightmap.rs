//! Rasterized support surface of a container.
//!
//! The footprint is split into square cells of edge `step`. Each cell stores the
//! highest top surface recorded over it, so support queries cost O(footprint cells)
//! regardless of how many boxes are loaded, at the price of one cell of
//! discretization error.

use crate::model::ValidationError;
use crate::types::EPSILON_GENERAL;

/// Upper bound on the number of cells of one height map.
pub const MAX_GRID_CELLS: usize = 4_000_000;

/// Cells overwritten by a speculative update, with their previous values.
///
/// Restoring a patch undoes exactly one `update`, which is equivalent to
/// rebuilding the map from the remaining placements.
#[derive(Clone, Debug)]
pub struct HeightPatch {
    x_range: (usize, usize),
    y_range: (usize, usize),
    previous: Vec<f64>,
}

/// Height map over the container floor.
#[derive(Clone, Debug)]
pub struct HeightMap {
    step: f64,
    cols: usize,
    rows: usize,
    cells: Vec<f64>,
}

impl HeightMap {
    /// Creates a flat map covering `length × width` with cells of edge `step`.
    pub fn new(length: f64, width: f64, step: f64) -> Result<Self, ValidationError> {
        let (cols, rows) = grid_shape(length, width, step)?;
        Ok(Self {
            step,
            cols,
            rows,
            cells: vec![0.0; cols * rows],
        })
    }

    #[inline]
    fn index(&self, ix: usize, iy: usize) -> usize {
        ix * self.rows + iy
    }

    #[inline]
    fn clamp_cell(&self, coord: f64, count: usize) -> usize {
        let raw = (coord / self.step).floor();
        if raw <= 0.0 || raw.is_nan() {
            0
        } else {
            (raw as usize).min(count - 1)
        }
    }

    /// Recorded support height at (x, y).
    ///
    /// Out-of-range coordinates are clamped to the nearest cell.
    pub fn height_at(&self, x: f64, y: f64) -> f64 {
        let ix = self.clamp_cell(x, self.cols);
        let iy = self.clamp_cell(y, self.rows);
        self.cells[self.index(ix, iy)]
    }

    /// Highest recorded value anywhere on the map.
    pub fn max_height(&self) -> f64 {
        self.cells.iter().copied().fold(0.0, f64::max)
    }

    /// Cell index range whose centers lie within `[start, start + len]`.
    ///
    /// Falls back to the cell under the interval's midpoint when the interval is
    /// narrower than a cell and contains no center.
    fn covered_cells(&self, start: f64, len: f64, count: usize) -> (usize, usize) {
        let first = (start / self.step - 0.5 - EPSILON_GENERAL).ceil();
        let last = ((start + len) / self.step - 0.5 + EPSILON_GENERAL).floor();
        let max = (count - 1) as f64;
        let first = first.clamp(0.0, max);
        let last = last.clamp(0.0, max);
        if first > last {
            let mid = self.clamp_cell(start + len / 2.0, count);
            (mid, mid)
        } else {
            (first as usize, last as usize)
        }
    }

    fn region(
        &self,
        x0: f64,
        y0: f64,
        length: f64,
        width: f64,
    ) -> ((usize, usize), (usize, usize)) {
        (
            self.covered_cells(x0, length, self.cols),
            self.covered_cells(y0, width, self.rows),
        )
    }

    /// Raises every cell covered by the rectangle to at least `top_z`.
    pub fn update(&mut self, x0: f64, y0: f64, length: f64, width: f64, top_z: f64) {
        let ((x_first, x_last), (y_first, y_last)) = self.region(x0, y0, length, width);
        for ix in x_first..=x_last {
            for iy in y_first..=y_last {
                let idx = self.index(ix, iy);
                if self.cells[idx] < top_z {
                    self.cells[idx] = top_z;
                }
            }
        }
    }

    /// Snapshots the cells an `update` over the same rectangle would touch.
    pub fn capture(&self, x0: f64, y0: f64, length: f64, width: f64) -> HeightPatch {
        let (x_range, y_range) = self.region(x0, y0, length, width);
        let cells = (x_range.1 - x_range.0 + 1) * (y_range.1 - y_range.0 + 1);
        let mut previous = Vec::with_capacity(cells);
        for ix in x_range.0..=x_range.1 {
            for iy in y_range.0..=y_range.1 {
                previous.push(self.cells[self.index(ix, iy)]);
            }
        }
        HeightPatch {
            x_range,
            y_range,
            previous,
        }
    }

    /// Writes back the values saved in `patch`.
    pub fn restore(&mut self, patch: HeightPatch) {
        let mut values = patch.previous.into_iter();
        for ix in patch.x_range.0..=patch.x_range.1 {
            for iy in patch.y_range.0..=patch.y_range.1 {
                if let Some(value) = values.next() {
                    let idx = self.index(ix, iy);
                    self.cells[idx] = value;
                }
            }
        }
    }

    /// Resets every cell to the floor.
    pub fn reset(&mut self) {
        self.cells.fill(0.0);
    }
}

fn cell_count(extent: f64, step: f64) -> usize {
    ((extent / step) - EPSILON_GENERAL).ceil().max(1.0) as usize
}

/// Grid shape (cells along x, cells along y) for a `length × width` floor.
///
/// Fails when the step is not positive or the grid would exceed [`MAX_GRID_CELLS`].
pub fn grid_shape(length: f64, width: f64, step: f64) -> Result<(usize, usize), ValidationError> {
    if !(step.is_finite() && step > 0.0) {
        return Err(ValidationError::InvalidConfiguration(format!(
            "grid_step must be positive, got: {step}"
        )));
    }
    let cols = cell_count(length, step);
    let rows = cell_count(width, step);
    match cols.checked_mul(rows) {
        Some(cells) if cells <= MAX_GRID_CELLS => Ok((cols, rows)),
        _ => Err(ValidationError::InvalidConfiguration(format!(
            "a {length} x {width} floor at grid_step {step} needs more than {MAX_GRID_CELLS} height map cells"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_map_is_flat_floor() {
        let map = HeightMap::new(4.0, 2.0, 0.1).unwrap();
        assert_eq!((map.cols, map.rows), (40, 20));
        assert_eq!(map.height_at(1.0, 1.0), 0.0);
        assert_eq!(map.max_height(), 0.0);
    }

    #[test]
    fn oversized_grids_are_rejected() {
        assert_eq!(grid_shape(240.0, 96.0, 0.1).unwrap(), (2400, 960));
        assert!(matches!(
            HeightMap::new(1e10, 1e10, 0.1),
            Err(ValidationError::InvalidConfiguration(_))
        ));
        // cols * rows would overflow usize
        assert!(grid_shape(1e300, 1e300, 1e-3).is_err());
        assert!(grid_shape(4.0, 4.0, 0.0).is_err());
    }

    #[test]
    fn update_covers_cells_with_centers_inside_rectangle() {
        let mut map = HeightMap::new(4.0, 2.0, 0.5).unwrap();
        map.update(0.0, 0.0, 2.0, 2.0, 2.0);

        assert_eq!(map.height_at(0.1, 0.1), 2.0);
        assert_eq!(map.height_at(1.9, 1.9), 2.0);
        // first cell beyond the box edge stays on the floor
        assert_eq!(map.height_at(2.1, 1.0), 0.0);
    }

    #[test]
    fn queries_outside_the_grid_are_clamped() {
        let mut map = HeightMap::new(4.0, 2.0, 0.5).unwrap();
        map.update(3.5, 1.5, 0.5, 0.5, 3.0);

        assert_eq!(map.height_at(10.0, 10.0), 3.0);
        assert_eq!(map.height_at(4.0, 2.0), 3.0);
        assert_eq!(map.height_at(-5.0, -5.0), 0.0);
    }

    #[test]
    fn update_never_lowers_a_cell() {
        let mut map = HeightMap::new(4.0, 4.0, 0.5).unwrap();
        map.update(0.0, 0.0, 4.0, 4.0, 3.0);
        map.update(1.0, 1.0, 1.0, 1.0, 1.0);
        map.update(0.0, 0.0, 1.0, 1.0, 5.0);

        assert_eq!(map.height_at(1.25, 1.25), 3.0);
        assert_eq!(map.height_at(0.25, 0.25), 5.0);
        assert_eq!(map.height_at(3.75, 3.75), 3.0);
    }

    #[test]
    fn narrow_rectangle_updates_cell_under_its_midpoint() {
        let mut map = HeightMap::new(1.0, 1.0, 0.5).unwrap();
        map.update(0.55, 0.55, 0.1, 0.1, 1.0);
        assert_eq!(map.height_at(0.6, 0.6), 1.0);
        assert_eq!(map.height_at(0.2, 0.2), 0.0);
    }

    #[test]
    fn capture_and_restore_undo_an_update() {
        let mut map = HeightMap::new(4.0, 4.0, 0.5).unwrap();
        map.update(0.0, 0.0, 2.0, 2.0, 1.0);
        let before = map.clone();

        let patch = map.capture(1.0, 1.0, 2.0, 2.0);
        map.update(1.0, 1.0, 2.0, 2.0, 4.0);
        assert_eq!(map.height_at(1.25, 1.25), 4.0);

        map.restore(patch);
        assert_eq!(map.cells, before.cells);
    }

    #[test]
    fn reset_returns_to_floor() {
        let mut map = HeightMap::new(2.0, 2.0, 0.5).unwrap();
        map.update(0.0, 0.0, 2.0, 2.0, 1.5);
        map.reset();
        assert_eq!(map.max_height(), 0.0);
    }
}
