//! Terrain sample points loaded from mesh vertices.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use glam::DVec3;
use serde::Deserialize;

use crate::core::{Error, Result};

/// Vertical axis convention of a source mesh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpAxis {
    /// Mesh is already Z-up, coordinates are used as-is.
    #[default]
    Z,
    /// Mesh is Y-up (the OBJ default); `(x, y, z)` becomes `(x, -z, y)`.
    Y,
}

impl UpAxis {
    fn to_z_up(self, v: DVec3) -> DVec3 {
        match self {
            UpAxis::Z => v,
            UpAxis::Y => DVec3::new(v.x, -v.z, v.y),
        }
    }
}

/// Ordered `(x, y, z)` samples of a terrain surface, already scaled.
#[derive(Clone, Debug, PartialEq)]
pub struct PointCloud {
    points: Vec<DVec3>,
}

impl PointCloud {
    pub fn new(points: Vec<DVec3>) -> Self {
        Self { points }
    }

    /// Parse the vertex records of a Wavefront OBJ stream.
    ///
    /// Only `v` lines are read; faces, normals, texture coordinates and
    /// material statements are ignored. Each vertex is converted to Z-up
    /// and multiplied component-wise by `scale`.
    pub fn from_obj<R: BufRead>(reader: R, scale: DVec3, up_axis: UpAxis) -> Result<Self> {
        let mut points = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let mut fields = line.split_whitespace();
            if fields.next() != Some("v") {
                continue;
            }

            let mut coords = [0.0f64; 3];
            for coord in coords.iter_mut() {
                let field = fields.next().ok_or_else(|| {
                    Error::Terrain(format!("line {}: vertex needs three coordinates", line_no + 1))
                })?;
                *coord = field.parse().map_err(|e| {
                    Error::Terrain(format!("line {}: bad coordinate `{}`: {}", line_no + 1, field, e))
                })?;
            }

            points.push(up_axis.to_z_up(DVec3::from_array(coords)) * scale);
        }

        if points.is_empty() {
            return Err(Error::Terrain("mesh has no vertices".to_string()));
        }

        Ok(Self { points })
    }

    /// Load vertices from an OBJ file on disk.
    pub fn load_obj(path: &Path, scale: DVec3, up_axis: UpAxis) -> Result<Self> {
        log::info!("Loading terrain from {}", path.display());
        let file = File::open(path)?;
        let cloud = Self::from_obj(BufReader::new(file), scale, up_axis)?;
        log::debug!("Read {} terrain vertices", cloud.len());
        Ok(cloud)
    }

    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
