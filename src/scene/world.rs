//! Gazebo world document assembly.
//!
//! The world template holds one nested-content placeholder (`$include`).
//! Every placed object is rendered from the include template into a
//! fragment; fragments are kept in insertion order and substituted into the
//! world template in a single final pass. The terrain is always the first
//! fragment.

use rand::Rng;

use super::models::ModelCatalog;
use super::template::{Bindings, Template, TemplateSet};
use crate::core::{Error, Result};
use crate::generation::layout::Placement;

pub const WORLD_TEMPLATE: &str = "world_template";
pub const INCLUDE_TEMPLATE: &str = "include_template";

/// Placeholder receiving nested fragments.
pub const NESTED_PLACEHOLDER: &str = "include";

/// The world template, which must contain the nested-content placeholder.
pub fn world_template(templates: &TemplateSet) -> Result<&Template> {
    let world = templates.get(WORLD_TEMPLATE)?;
    if !world.placeholders().contains(&NESTED_PLACEHOLDER) {
        return Err(Error::NestedPlaceholderMissing {
            template: world.name().to_string(),
            name: NESTED_PLACEHOLDER.to_string(),
        });
    }
    Ok(world)
}

/// Builds a world document from ordered include fragments.
#[derive(Debug)]
pub struct WorldBuilder<'a> {
    world: &'a Template,
    include: &'a Template,
    fragments: Vec<String>,
}

impl<'a> WorldBuilder<'a> {
    /// Start a world containing only the terrain model, at the origin.
    pub fn new(templates: &'a TemplateSet, terrain_name: &str) -> Result<Self> {
        let mut builder = Self {
            world: world_template(templates)?,
            include: templates.get(INCLUDE_TEMPLATE)?,
            fragments: Vec::new(),
        };
        builder.push_include(terrain_name, terrain_name, "0 0 0 0 0 0")?;
        Ok(builder)
    }

    /// Add a plant model, named `name`, at a placement.
    pub fn add_plant(&mut self, name: &str, model: &str, placement: &Placement) -> Result<()> {
        let pose = format!(
            "{} {} {} 0 0 {}",
            placement.x, placement.y, placement.z, placement.yaw
        );
        self.push_include(name, model, &pose)
    }

    fn push_include(&mut self, name: &str, model: &str, pose: &str) -> Result<()> {
        let bindings = Bindings::new()
            .with("name", name)
            .with("uri", format!("model://{}", model))
            .with("pose", pose)
            .with(NESTED_PLACEHOLDER, "");
        let fragment = self.include.render_strict(&bindings)?;
        self.fragments.push(fragment);
        Ok(())
    }

    /// Number of fragments so far, terrain included.
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Fold the fragments into the world template.
    pub fn finish(self) -> Result<String> {
        let bindings = Bindings::new().with(NESTED_PLACEHOLDER, self.fragments.concat());
        self.world.render_strict(&bindings)
    }
}

/// Render the whole world: terrain first, then one plant per placement.
///
/// Plants are named `<plant_name><n>` counting from 1 in placement order,
/// each using a model drawn uniformly from `models`.
pub fn render_world<R: Rng + ?Sized>(
    templates: &TemplateSet,
    terrain_name: &str,
    models: &ModelCatalog,
    placements: &[Placement],
    rng: &mut R,
) -> Result<String> {
    let mut builder = WorldBuilder::new(templates, terrain_name)?;
    for (i, placement) in placements.iter().enumerate() {
        let name = format!("{}{}", models.plant(), i + 1);
        let model = models.choose(rng);
        builder.add_plant(&name, model, placement)?;
    }
    log::debug!("World assembled from {} fragments", builder.fragment_count());
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::layout::seeded_rng;
    use std::path::Path;

    fn catalog() -> ModelCatalog {
        let names = vec!["olive1".to_string(), "olive2".to_string()];
        ModelCatalog::from_names("olive", Path::new("models"), names).unwrap()
    }

    fn placements(n: usize) -> Vec<Placement> {
        (0..n)
            .map(|i| Placement { x: i as f64 * 2.0 - 3.0, y: 0.5, z: 1.25, yaw: 0.1 * i as f64 })
            .collect()
    }

    #[test]
    fn test_fragment_count_and_order() {
        let templates = TemplateSet::builtin();
        let world = render_world(&templates, "hills", &catalog(), &placements(4), &mut seeded_rng(1)).unwrap();

        assert_eq!(world.matches("<include>").count(), 5);
        assert!(!world.contains('$'));

        let terrain = world.find("<name>hills</name>").unwrap();
        let mut last = terrain;
        for i in 1..=4 {
            let at = world.find(&format!("<name>olive{}</name>", i)).unwrap();
            assert!(at > last, "olive{} out of order", i);
            last = at;
        }
        assert!(world.contains("<uri>model://hills</uri>"));
        assert!(world.contains("<pose>0 0 0 0 0 0</pose>"));
        assert!(world.contains("<pose>-3 0.5 1.25 0 0 0</pose>"));
        assert!(world.trim_end().ends_with("</sdf>"));
    }

    #[test]
    fn test_empty_layout_is_terrain_only() {
        let templates = TemplateSet::builtin();
        let world = render_world(&templates, "flat", &catalog(), &[], &mut seeded_rng(1)).unwrap();
        assert_eq!(world.matches("<include>").count(), 1);
        assert!(world.contains("<name>flat</name>"));
    }

    #[test]
    fn test_models_drawn_from_catalog() {
        let templates = TemplateSet::builtin();
        let world = render_world(&templates, "hills", &catalog(), &placements(30), &mut seeded_rng(8)).unwrap();
        let plants = world.matches("<uri>model://olive").count();
        assert_eq!(plants, 30);
        assert!(world.contains("model://olive1<") && world.contains("model://olive2<"));
    }

    #[test]
    fn test_fold_matches_staged_substitution() {
        let mut templates = TemplateSet::new();
        templates.insert(Template::parse(WORLD_TEMPLATE, "<world>\n$include</world>\n"));
        templates.insert(Template::parse(INCLUDE_TEMPLATE, "<i n=\"$name\" p=\"$pose\"/>\n$include"));

        let pts = placements(3);
        let mut builder = WorldBuilder::new(&templates, "t").unwrap();
        for (i, p) in pts.iter().enumerate() {
            builder.add_plant(&format!("p{}", i + 1), "m", p).unwrap();
        }
        let folded = builder.finish().unwrap();

        // Re-template the half-filled document once per fragment.
        let include = templates.get(INCLUDE_TEMPLATE).unwrap();
        let leaf = |name: &str, pose: &str| {
            include.render(&Bindings::new().with("name", name).with("pose", pose).with("uri", "model://m"))
        };
        let mut staged = templates.get(WORLD_TEMPLATE).unwrap().bind(
            &Bindings::new().with(NESTED_PLACEHOLDER, leaf("t", "0 0 0 0 0 0")),
        );
        for (i, p) in pts.iter().enumerate() {
            let pose = format!("{} {} {} 0 0 {}", p.x, p.y, p.z, p.yaw);
            staged = staged.bind(&Bindings::new().with(NESTED_PLACEHOLDER, leaf(&format!("p{}", i + 1), &pose)));
        }
        let staged = staged.render_strict(&Bindings::new().with(NESTED_PLACEHOLDER, "")).unwrap();

        assert_eq!(folded, staged);
    }

    #[test]
    fn test_missing_template_fails_fast() {
        let mut templates = TemplateSet::new();
        templates.insert(Template::parse(WORLD_TEMPLATE, "$include"));
        let err = WorldBuilder::new(&templates, "t").unwrap_err();
        assert!(matches!(err, Error::TemplateMissing(name) if name == INCLUDE_TEMPLATE));
    }

    #[test]
    fn test_world_without_nested_placeholder_is_error() {
        let mut templates = TemplateSet::new();
        templates.insert(Template::parse(WORLD_TEMPLATE, "<world>$$include</world>"));
        templates.insert(Template::parse(INCLUDE_TEMPLATE, "<include>$name</include>$include"));
        let err = WorldBuilder::new(&templates, "t").unwrap_err();
        assert!(matches!(
            err,
            Error::NestedPlaceholderMissing { ref template, .. } if template == WORLD_TEMPLATE
        ));
    }

    #[test]
    fn test_extra_placeholder_in_include_is_error() {
        let mut templates = TemplateSet::new();
        templates.insert(Template::parse(WORLD_TEMPLATE, "$include"));
        templates.insert(Template::parse(INCLUDE_TEMPLATE, "$name $scale $include"));
        let err = WorldBuilder::new(&templates, "t").unwrap_err();
        assert!(matches!(err, Error::UnboundPlaceholder { .. }));
    }
}
