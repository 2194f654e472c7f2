//! Row-grouped plant layout.
//!
//! Plants are laid out on a grid of rows (along x) and columns (along y).
//! Rows come in groups; a wider gap separates consecutive groups. Every
//! position is jittered with a triangular distribution, lifted onto the
//! terrain through a [`HeightField`], and given a uniformly drawn yaw.

use std::f64::consts::PI;

use rand::distr::Uniform;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Triangular};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::terrain::HeightField;

/// Position and heading of one placed plant. `yaw` is in radians.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
}

/// Parameters controlling the plant grid.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutParams {
    pub total_rows: usize,
    pub rows_per_group: usize,
    /// Distance between neighbouring rows of the same group
    pub row_spacing: f64,
    /// Extra distance inserted before each new row group
    pub row_group_gap: f64,
    pub avg_footprint: f64,
    pub cols_per_row: usize,
    pub min_yaw: f64,
    pub max_yaw: f64,
    /// Maximum jitter offset on each axis
    pub jitter: f64,
}

impl LayoutParams {
    /// Yaw spans the full circle and jitter defaults to a tenth of the gap.
    pub fn new(
        total_rows: usize,
        rows_per_group: usize,
        row_spacing: f64,
        row_group_gap: f64,
        avg_footprint: f64,
        cols_per_row: usize,
    ) -> Self {
        Self {
            total_rows,
            rows_per_group,
            row_spacing,
            row_group_gap,
            avg_footprint,
            cols_per_row,
            min_yaw: -PI,
            max_yaw: PI,
            jitter: row_group_gap / 10.0,
        }
    }

    pub fn with_yaw_range(mut self, min_yaw: f64, max_yaw: f64) -> Self {
        self.min_yaw = min_yaw;
        self.max_yaw = max_yaw;
        self
    }

    /// Place plants exactly on the grid.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Distance between neighbouring plants within a row.
    pub fn column_spacing(&self) -> f64 {
        self.avg_footprint + self.row_group_gap / 3.0
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("row spacing", self.row_spacing),
            ("row group gap", self.row_group_gap),
            ("plant footprint", self.avg_footprint),
            ("minimum yaw", self.min_yaw),
            ("maximum yaw", self.max_yaw),
            ("jitter", self.jitter),
        ];
        if let Some((name, _)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::Config(format!("{} must be finite", name)));
        }
        if self.rows_per_group == 0 {
            return Err(Error::Config("rows per group must be at least 1".to_string()));
        }
        if self.row_spacing <= 0.0 {
            return Err(Error::Config(format!(
                "row spacing must be positive, got {}",
                self.row_spacing
            )));
        }
        if self.row_group_gap < 0.0 {
            return Err(Error::Config(format!(
                "row group gap must not be negative, got {}",
                self.row_group_gap
            )));
        }
        if self.column_spacing() <= 0.0 {
            return Err(Error::Config(format!(
                "plant spacing must be positive, got {}",
                self.column_spacing()
            )));
        }
        if self.min_yaw > self.max_yaw {
            return Err(Error::Config(format!(
                "yaw range is empty: [{}, {}]",
                self.min_yaw, self.max_yaw
            )));
        }
        if self.jitter < 0.0 {
            return Err(Error::Config(format!("jitter must not be negative, got {}", self.jitter)));
        }
        Ok(())
    }
}

/// Number of plants that fit in a row of the given length, with exact
/// halves rounded to even.
pub fn columns_for_row_length(row_length: f64, avg_footprint: f64, row_group_gap: f64) -> usize {
    let spacing = avg_footprint + row_group_gap / 3.0;
    if spacing <= 0.0 || !row_length.is_finite() || row_length <= 0.0 {
        return 0;
    }
    (row_length / spacing).round_ties_even() as usize
}

/// Centered x coordinate of every row.
///
/// A group gap is added before row `i` whenever `i % rows_per_group == 0`
/// and `i != 0`.
pub fn row_positions(params: &LayoutParams) -> Vec<f64> {
    let mut offset = 0.0;
    let mut rows = Vec::with_capacity(params.total_rows);
    for i in 0..params.total_rows {
        if params.rows_per_group > 0 && i % params.rows_per_group == 0 && i != 0 {
            offset += params.row_group_gap;
        }
        rows.push(offset);
        offset += params.row_spacing;
    }
    center(&mut rows);
    rows
}

/// Centered y coordinate of every plant within a row.
pub fn column_positions(params: &LayoutParams) -> Vec<f64> {
    let spacing = params.column_spacing();
    let mut columns: Vec<f64> = (0..params.cols_per_row).map(|i| i as f64 * spacing).collect();
    center(&mut columns);
    columns
}

/// Shift by half of the maximum so the extent is symmetric about zero.
fn center(values: &mut [f64]) {
    let Some(max) = values.iter().copied().reduce(f64::max) else {
        return;
    };
    for v in values.iter_mut() {
        *v -= max / 2.0;
    }
}

/// Deterministic random source for a layout run.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Computes plant placements over a height field.
#[derive(Clone, Debug)]
pub struct LayoutPlanner {
    params: LayoutParams,
    jitter: Triangular<f64>,
    yaw: Uniform<f64>,
}

impl LayoutPlanner {
    /// Validates the parameters before any placement is drawn.
    pub fn new(params: LayoutParams) -> Result<Self> {
        params.validate()?;

        let jitter = Triangular::new(-1.0, 1.0, 0.0)
            .map_err(|e| Error::Config(format!("jitter distribution: {}", e)))?;
        let yaw = Uniform::new_inclusive(params.min_yaw, params.max_yaw)
            .map_err(|e| Error::Config(format!("yaw range: {}", e)))?;

        Ok(Self { params, jitter, yaw })
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    /// Row-major placements: `total_rows * cols_per_row` of them.
    pub fn generate<R: Rng + ?Sized>(&self, height_field: &HeightField, rng: &mut R) -> Vec<Placement> {
        let rows = row_positions(&self.params);
        let columns = column_positions(&self.params);
        let amplitude = self.params.jitter;

        log::debug!(
            "Layout grid: {} rows x {} columns, jitter {:.3}",
            rows.len(),
            columns.len(),
            amplitude
        );

        let mut placements = Vec::with_capacity(rows.len() * columns.len());
        for &row in &rows {
            for &column in &columns {
                let x = row + self.jitter.sample(rng) * amplitude;
                let y = column + self.jitter.sample(rng) * amplitude;
                placements.push(Placement {
                    x,
                    y,
                    z: height_field.query(x, y),
                    yaw: self.yaw.sample(rng),
                });
            }
        }

        log::info!("Number of plants: {}", placements.len());
        placements
    }
}
