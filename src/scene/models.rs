//! Discovery of simulator models available for placement.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::core::{Error, Result};

/// Non-empty, sorted list of model names for one plant species.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelCatalog {
    plant: String,
    dir: PathBuf,
    names: Vec<String>,
}

impl ModelCatalog {
    /// Collect the model directories under `models_dir` whose name contains
    /// `plant_name`.
    pub fn discover(models_dir: &Path, plant_name: &str) -> Result<Self> {
        let mut names = Vec::new();

        if models_dir.is_dir() {
            for entry in fs::read_dir(models_dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    if name.contains(plant_name) {
                        names.push(name.to_string());
                    }
                }
            }
        }

        let catalog = Self::from_names(plant_name, models_dir, names)?;
        log::info!("Found {} models", catalog.names.len());
        log::debug!("Models: {:?}", catalog.names);
        Ok(catalog)
    }

    pub fn from_names(plant_name: &str, dir: &Path, mut names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::ModelsMissing {
                plant: plant_name.to_string(),
                dir: dir.to_path_buf(),
            });
        }
        names.sort();
        names.dedup();
        Ok(Self {
            plant: plant_name.to_string(),
            dir: dir.to_path_buf(),
            names,
        })
    }

    pub fn plant(&self) -> &str {
        &self.plant
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Uniformly pick one model.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        &self.names[rng.random_range(0..self.names.len())]
    }
}
