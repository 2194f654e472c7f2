//! Generation configuration read from `configuration.yaml`.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use glam::DVec3;
use serde::Deserialize;

use super::layout::{columns_for_row_length, LayoutParams};
use crate::core::{Error, Result};
use crate::terrain::UpAxis;

/// Configuration for a full generation run.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Total number of plant rows.
    pub number_of_rows: usize,
    /// Rows per group; groups are separated by an extra gap.
    pub rows_in_group: usize,
    /// Length of each row in meters; sets the number of plants per row.
    pub row_length: f64,
    /// Row spacing, group gap and jitter scale.
    pub magic_number: f64,
    pub avg_plant_footprint: f64,
    /// Model directories containing this name are used as plants.
    pub plant_name: String,
    /// Terrain mesh `<terrains_dir>/<terrain_name>.obj` and its Gazebo model name.
    pub terrain_name: String,
    /// Write the placement manifest.
    pub generate_blender_model: bool,
    /// Check that plant models are available.
    pub generate_gazebo_models: bool,
    /// Write the Gazebo world file.
    pub generate_gazebo_world: bool,

    /// Random seed; drawn from entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_min_yaw")]
    pub min_yaw: f64,
    #[serde(default = "default_max_yaw")]
    pub max_yaw: f64,
    /// Overrides `magic_number` as the distance between rows.
    #[serde(default)]
    pub row_spacing: Option<f64>,
    #[serde(default = "default_terrain_scale")]
    pub terrain_scale: [f64; 3],
    #[serde(default)]
    pub terrain_up_axis: UpAxis,

    #[serde(default = "default_terrains_dir")]
    pub terrains_dir: PathBuf,
    /// Builtin templates are used when absent.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
    #[serde(default = "default_worlds_dir")]
    pub worlds_dir: PathBuf,
    #[serde(default = "default_placements_path")]
    pub placements_path: PathBuf,
}

fn default_min_yaw() -> f64 {
    -PI
}

fn default_max_yaw() -> f64 {
    PI
}

fn default_terrain_scale() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

fn default_terrains_dir() -> PathBuf {
    PathBuf::from("terrains")
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("gazebo/models")
}

fn default_worlds_dir() -> PathBuf {
    PathBuf::from("gazebo/worlds")
}

fn default_placements_path() -> PathBuf {
    PathBuf::from("placements.json")
}

impl GenerationConfig {
    /// Parse and validate YAML configuration text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| Error::Config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.plant_name.trim().is_empty() {
            return Err(Error::Config("plant_name must not be empty".to_string()));
        }
        if self.terrain_name.trim().is_empty() {
            return Err(Error::Config("terrain_name must not be empty".to_string()));
        }
        if !(self.magic_number.is_finite() && self.magic_number > 0.0) {
            return Err(Error::Config(format!(
                "magic_number must be positive, got {}",
                self.magic_number
            )));
        }
        if !(self.row_length.is_finite() && self.row_length >= 0.0) {
            return Err(Error::Config(format!(
                "row_length must not be negative, got {}",
                self.row_length
            )));
        }
        if !(self.avg_plant_footprint.is_finite() && self.avg_plant_footprint > 0.0) {
            return Err(Error::Config(format!(
                "avg_plant_footprint must be positive, got {}",
                self.avg_plant_footprint
            )));
        }
        if self.terrain_scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(Error::Config(format!(
                "terrain_scale must be finite and non-zero, got {:?}",
                self.terrain_scale
            )));
        }
        self.layout_params().validate()
    }

    /// Plants per row derived from the row length.
    pub fn models_per_row(&self) -> usize {
        columns_for_row_length(self.row_length, self.avg_plant_footprint, self.magic_number)
    }

    pub fn layout_params(&self) -> LayoutParams {
        LayoutParams::new(
            self.number_of_rows,
            self.rows_in_group,
            self.row_spacing.unwrap_or(self.magic_number),
            self.magic_number,
            self.avg_plant_footprint,
            self.models_per_row(),
        )
        .with_yaw_range(self.min_yaw, self.max_yaw)
    }

    pub fn terrain_scale(&self) -> DVec3 {
        DVec3::from_array(self.terrain_scale)
    }

    pub fn terrain_mesh_path(&self, workdir: &Path) -> PathBuf {
        workdir
            .join(&self.terrains_dir)
            .join(format!("{}.obj", self.terrain_name))
    }

    pub fn world_path(&self, workdir: &Path) -> PathBuf {
        workdir
            .join(&self.worlds_dir)
            .join(format!("{}.world", self.plant_name))
    }

    pub fn models_dir(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.models_dir)
    }

    pub fn templates_dir(&self, workdir: &Path) -> Option<PathBuf> {
        self.templates_dir.as_ref().map(|dir| workdir.join(dir))
    }

    pub fn placements_path(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.placements_path)
    }
}
