//! Placement manifest handed to the scene-building host.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::layout::Placement;
use crate::core::Result;

/// Current version of the manifest format
pub const MANIFEST_VERSION: u32 = 1;

/// Ordered plant placements of one run, with what is needed to replay it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementManifest {
    pub version: u32,
    pub seed: u64,
    pub plant_name: String,
    pub terrain_name: String,
    pub placements: Vec<Placement>,
}

impl PlacementManifest {
    pub fn new(
        seed: u64,
        plant_name: impl Into<String>,
        terrain_name: impl Into<String>,
        placements: Vec<Placement>,
    ) -> Self {
        Self {
            version: MANIFEST_VERSION,
            seed,
            plant_name: plant_name.into(),
            terrain_name: terrain_name.into(),
            placements,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save as pretty JSON, creating parent directories.
    pub fn save_sync(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
