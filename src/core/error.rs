//! Error types for the world generator

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the generator
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Terrain error: {0}")]
    Terrain(String),

    #[error("Template `{0}` not found")]
    TemplateMissing(String),

    #[error("Template `{template}` has no binding for placeholder `{name}`")]
    UnboundPlaceholder { template: String, name: String },

    #[error("Template `{template}` has no `${name}` placeholder for nested content")]
    NestedPlaceholderMissing { template: String, name: String },

    #[error("No models matching `{plant}` found in {}", dir.display())]
    ModelsMissing { plant: String, dir: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;
