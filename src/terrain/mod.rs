//! Terrain sampling and height reconstruction

pub mod point_cloud;
pub mod triangulation;
pub mod height_field;

pub use point_cloud::{PointCloud, UpAxis};
pub use triangulation::Triangulation;
pub use height_field::HeightField;
