//! World description output: templates, model catalog and world assembly

pub mod template;
pub mod models;
pub mod world;

pub use template::{Bindings, Template, TemplateSet};
pub use models::ModelCatalog;
pub use world::{render_world, WorldBuilder};
