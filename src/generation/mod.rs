//! World generation pipeline — lays plants out over a terrain and writes
//! the outputs of each enabled stage.
//!
//! The pipeline orchestrates:
//! 1. Terrain height field construction from the terrain mesh vertices
//! 2. Row-grouped plant layout over the height field
//! 3. Plant model discovery
//! 4. World document rendering
//! 5. Writing the placement manifest and the world file

pub mod config;
pub mod layout;
pub mod manifest;

pub use config::GenerationConfig;
pub use layout::{LayoutParams, LayoutPlanner, Placement};
pub use manifest::PlacementManifest;

use std::path::PathBuf;

use crate::core::Result;
use crate::scene::world::{world_template, INCLUDE_TEMPLATE};
use crate::scene::{render_world, ModelCatalog, TemplateSet};
use crate::terrain::{HeightField, PointCloud};

/// What a pipeline run produced.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// Seed the layout was drawn with; reusing it replays the run.
    pub seed: u64,
    pub placements: Vec<Placement>,
    /// Plant models found, when model discovery ran.
    pub models: Option<ModelCatalog>,
    /// Rendered world document, when the world stage ran.
    pub world: Option<String>,
    pub manifest_path: Option<PathBuf>,
    pub world_path: Option<PathBuf>,
}

/// Runs the enabled generation stages for one configuration.
pub struct GenerationPipeline {
    config: GenerationConfig,
    workdir: PathBuf,
    seed: u64,
    dry_run: bool,
}

impl GenerationPipeline {
    /// Validate the configuration; relative paths resolve against `workdir`.
    pub fn new(config: GenerationConfig, workdir: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        Ok(Self {
            config,
            workdir: workdir.into(),
            seed,
            dry_run: false,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run every stage but write nothing.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Templates from the configured directory, or the builtin set.
    pub fn load_templates(&self) -> Result<TemplateSet> {
        let templates = match self.config.templates_dir(&self.workdir) {
            Some(dir) => TemplateSet::load_dir(&dir)?,
            None => TemplateSet::builtin(),
        };
        world_template(&templates)?;
        templates.get(INCLUDE_TEMPLATE)?;
        Ok(templates)
    }

    /// Height field over the configured terrain mesh.
    pub fn load_height_field(&self) -> Result<HeightField> {
        let cloud = PointCloud::load_obj(
            &self.config.terrain_mesh_path(&self.workdir),
            self.config.terrain_scale(),
            self.config.terrain_up_axis,
        )?;
        HeightField::new(cloud)
    }

    /// Load the terrain and run every enabled stage.
    pub fn run(&self) -> Result<GenerationReport> {
        let templates = self.world_templates()?;
        let models = self.discover_models()?;
        let height_field = self.load_height_field()?;
        self.execute(&height_field, templates.as_ref(), models)
    }

    /// Run every enabled stage over an already built height field.
    pub fn run_on(&self, height_field: &HeightField) -> Result<GenerationReport> {
        let templates = self.world_templates()?;
        let models = self.discover_models()?;
        self.execute(height_field, templates.as_ref(), models)
    }

    fn world_templates(&self) -> Result<Option<TemplateSet>> {
        if self.config.generate_gazebo_world {
            self.load_templates().map(Some)
        } else {
            Ok(None)
        }
    }

    fn discover_models(&self) -> Result<Option<ModelCatalog>> {
        if self.config.generate_gazebo_models || self.config.generate_gazebo_world {
            let dir = self.config.models_dir(&self.workdir);
            ModelCatalog::discover(&dir, &self.config.plant_name).map(Some)
        } else {
            Ok(None)
        }
    }

    fn execute(
        &self,
        height_field: &HeightField,
        templates: Option<&TemplateSet>,
        models: Option<ModelCatalog>,
    ) -> Result<GenerationReport> {
        log::info!("Layout seed: {}", self.seed);
        let mut rng = layout::seeded_rng(self.seed);

        // 1. Plan placements
        let planner = LayoutPlanner::new(self.config.layout_params())?;
        let placements = planner.generate(height_field, &mut rng);

        // 2. Render the world fully in memory before anything is written
        let world = match (templates, &models) {
            (Some(templates), Some(models)) => Some(render_world(
                templates,
                &self.config.terrain_name,
                models,
                &placements,
                &mut rng,
            )?),
            _ => None,
        };

        let mut report = GenerationReport {
            seed: self.seed,
            placements,
            models,
            world,
            manifest_path: None,
            world_path: None,
        };

        if self.dry_run {
            log::info!("Dry run, no files written");
            return Ok(report);
        }

        // 3. Placement manifest for the host-side scene builder, then the
        // world file, written all or none
        let manifest_path = self
            .config
            .generate_blender_model
            .then(|| self.config.placements_path(&self.workdir));
        let world_path = report.world.as_ref().map(|_| self.config.world_path(&self.workdir));

        let mut outputs = Vec::new();
        if let Some(path) = &manifest_path {
            let manifest = PlacementManifest::new(
                self.seed,
                self.config.plant_name.clone(),
                self.config.terrain_name.clone(),
                report.placements.clone(),
            );
            outputs.push((path.clone(), manifest.to_json()?));
        }
        if let (Some(path), Some(world)) = (&world_path, &report.world) {
            outputs.push((path.clone(), world.clone()));
        }
        write_outputs(&outputs)?;

        if let Some(path) = &manifest_path {
            log::info!("Wrote {} placements to {}", report.placements.len(), path.display());
        }
        if let Some(path) = &world_path {
            log::info!("Wrote world to {}", path.display());
        }
        report.manifest_path = manifest_path;
        report.world_path = world_path;

        Ok(report)
    }
}

/// Write every `(path, contents)` pair, or none of them.
///
/// Contents go to `<path>.partial` siblings first and are renamed into
/// place once all of them are on disk.
fn write_outputs(outputs: &[(PathBuf, String)]) -> Result<()> {
    let staged: Vec<PathBuf> = outputs
        .iter()
        .map(|(path, _)| {
            let mut name = path.as_os_str().to_owned();
            name.push(".partial");
            PathBuf::from(name)
        })
        .collect();

    let cleanup = |paths: &[PathBuf]| {
        for path in paths {
            let _ = std::fs::remove_file(path);
        }
    };

    for (i, ((path, contents), partial)) in outputs.iter().zip(&staged).enumerate() {
        let written = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(partial, contents));
        if let Err(e) = written {
            cleanup(&staged[..i]);
            return Err(e.into());
        }
    }

    for (i, ((path, _), partial)) in outputs.iter().zip(&staged).enumerate() {
        if let Err(e) = std::fs::rename(partial, path) {
            let renamed: Vec<PathBuf> = outputs[..i].iter().map(|(p, _)| p.clone()).collect();
            cleanup(&renamed);
            cleanup(&staged[i..]);
            return Err(e.into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use std::fmt::Write as _;
    use std::fs;
    use std::path::Path;

    const CONFIG: &str = "\
number_of_rows: 4
rows_in_group: 2
row_length: 6.0
magic_number: 1.5
avg_plant_footprint: 1.0
plant_name: olive
terrain_name: hills
generate_blender_model: true
generate_gazebo_models: true
generate_gazebo_world: true
";

    /// Gently sloped 40 m x 40 m grid mesh, Z-up.
    fn write_terrain(workdir: &Path) {
        let mut obj = String::from("o Terrain\n");
        for j in 0..=8 {
            for i in 0..=8 {
                let (x, y) = (i as f64 * 5.0 - 20.0, j as f64 * 5.0 - 20.0);
                writeln!(obj, "v {} {} {}", x, y, 0.05 * x + 0.02 * y * y * 0.1).unwrap();
            }
        }
        let dir = workdir.join("terrains");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("hills.obj"), obj).unwrap();
    }

    fn write_models(workdir: &Path) {
        for name in ["olive1", "olive2", "hills"] {
            fs::create_dir_all(workdir.join("gazebo/models").join(name)).unwrap();
        }
    }

    fn setup(config: &str) -> (tempfile::TempDir, GenerationPipeline) {
        let dir = tempfile::tempdir().unwrap();
        write_terrain(dir.path());
        write_models(dir.path());
        let config = GenerationConfig::from_yaml_str(config).unwrap();
        let pipeline = GenerationPipeline::new(config, dir.path()).unwrap().with_seed(2022);
        (dir, pipeline)
    }

    #[test]
    fn test_full_run_writes_outputs() {
        let (dir, pipeline) = setup(CONFIG);
        let report = pipeline.run().unwrap();

        // 6 m rows at 1.5 m spacing: 4 plants per row
        assert_eq!(report.placements.len(), 16);
        assert_eq!(report.models.as_ref().unwrap().names(), ["olive1", "olive2"]);

        let world_path = dir.path().join("gazebo/worlds/olive.world");
        assert_eq!(report.world_path.as_deref(), Some(world_path.as_path()));
        let world = fs::read_to_string(&world_path).unwrap();
        assert_eq!(world.matches("<include>").count(), 17);
        assert!(!world.contains('$'));
        assert!(world.contains("<name>olive16</name>"));

        let manifest = PlacementManifest::load_sync(&dir.path().join("placements.json")).unwrap();
        assert_eq!(manifest.seed, 2022);
        assert_eq!(manifest.placements, report.placements);
    }

    #[test]
    fn test_same_seed_same_world() {
        let (_dir_a, a) = setup(CONFIG);
        let (_dir_b, b) = setup(CONFIG);
        let a = a.dry_run(true).run().unwrap();
        let b = b.dry_run(true).run().unwrap();
        assert_eq!(a.world, b.world);
        assert_eq!(a.placements, b.placements);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (dir, pipeline) = setup(CONFIG);
        let report = pipeline.dry_run(true).run().unwrap();
        assert!(report.world.is_some());
        assert!(report.world_path.is_none());
        assert!(!dir.path().join("gazebo/worlds").exists());
        assert!(!dir.path().join("placements.json").exists());
    }

    #[test]
    fn test_missing_models_aborts_without_output() {
        let (dir, pipeline) = setup(&CONFIG.replace("plant_name: olive", "plant_name: vine"));
        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, Error::ModelsMissing { .. }));
        assert!(!dir.path().join("placements.json").exists());
        assert!(!dir.path().join("gazebo/worlds").exists());
    }

    #[test]
    fn test_missing_template_aborts() {
        let config = format!("{}templates_dir: tpl\n", CONFIG);
        let (dir, pipeline) = setup(&config);
        fs::create_dir_all(dir.path().join("tpl")).unwrap();
        fs::write(dir.path().join("tpl/world_template"), "<w>$include</w>").unwrap();

        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, Error::TemplateMissing(_)));
        assert!(!dir.path().join("placements.json").exists());
    }

    #[test]
    fn test_failed_world_write_leaves_no_manifest() {
        let (dir, pipeline) = setup(CONFIG);
        fs::create_dir_all(dir.path().join("gazebo")).unwrap();
        fs::write(dir.path().join("gazebo/worlds"), "not a directory").unwrap();

        assert!(matches!(pipeline.run(), Err(Error::Io(_))));
        assert!(!dir.path().join("placements.json").exists());
        assert!(!dir.path().join("placements.json.partial").exists());
    }

    #[test]
    fn test_world_template_without_include_aborts() {
        let config = format!("{}templates_dir: tpl\n", CONFIG);
        let (dir, pipeline) = setup(&config);
        fs::create_dir_all(dir.path().join("tpl")).unwrap();
        fs::write(dir.path().join("tpl/world_template"), "<world></world>").unwrap();
        fs::write(dir.path().join("tpl/include_template"), "<include>$name $uri $pose</include>$include")
            .unwrap();

        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, Error::NestedPlaceholderMissing { .. }));
        assert!(!dir.path().join("gazebo/worlds").exists());
    }

    #[test]
    fn test_missing_terrain_is_io_error() {
        let (dir, pipeline) = setup(CONFIG);
        fs::remove_file(dir.path().join("terrains/hills.obj")).unwrap();
        assert!(matches!(pipeline.run(), Err(Error::Io(_))));
    }

    #[test]
    fn test_stages_disabled() {
        let config = CONFIG
            .replace("generate_blender_model: true", "generate_blender_model: false")
            .replace("generate_gazebo_models: true", "generate_gazebo_models: false")
            .replace("generate_gazebo_world: true", "generate_gazebo_world: false");
        let (dir, pipeline) = setup(&config);
        let report = pipeline.run().unwrap();
        assert_eq!(report.placements.len(), 16);
        assert!(report.models.is_none() && report.world.is_none());
        assert!(!dir.path().join("placements.json").exists());
    }

    #[test]
    fn test_zero_rows_gives_terrain_only_world() {
        let (_dir, pipeline) = setup(&CONFIG.replace("number_of_rows: 4", "number_of_rows: 0"));
        let report = pipeline.run().unwrap();
        assert!(report.placements.is_empty());
        let world = report.world.unwrap();
        assert_eq!(world.matches("<include>").count(), 1);
        assert!(world.contains("<uri>model://hills</uri>"));
    }

    #[test]
    fn test_placements_lie_on_terrain() {
        let (_dir, pipeline) = setup(CONFIG);
        let field = pipeline.load_height_field().unwrap();
        let report = pipeline.dry_run(true).run_on(&field).unwrap();
        for p in &report.placements {
            assert_eq!(p.z, field.query(p.x, p.y));
        }
    }
}
