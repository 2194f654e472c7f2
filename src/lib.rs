//! Cropfield - procedural crop-row vegetation layout over terrain meshes,
//! emitted as Gazebo world descriptions.

pub mod core;
pub mod terrain;
pub mod generation;
pub mod scene;

pub use crate::core::{Error, Result};
