//! World generator binary — lays plant rows over a terrain mesh and writes
//! a Gazebo world plus a placement manifest.
//!
//! Usage: cargo run --release --bin generate_world -- [OPTIONS]
//!
//! Expected layout of the working directory (paths configurable):
//!   configuration.yaml
//!   terrains/<terrain_name>.obj       # terrain mesh, vertices only are read
//!   gazebo/models/<plant_name>N/      # plant models, picked at random
//!
//! Output:
//!   placements.json                   # when generate_blender_model is set
//!   gazebo/worlds/<plant_name>.world  # when generate_gazebo_world is set

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use cropfield::generation::{GenerationConfig, GenerationPipeline};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration, relative to the working directory
    #[arg(short, long, default_value = "configuration.yaml")]
    config: PathBuf,

    /// Directory that relative asset and output paths resolve against
    #[arg(short, long, default_value = ".")]
    workdir: PathBuf,

    /// Layout seed (overrides the configuration)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Plan and render without writing any file
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    cropfield::core::logging::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> cropfield::Result<()> {
    let start = Instant::now();
    let config = GenerationConfig::load(&args.workdir.join(&args.config))?;

    log::info!("=== World Generator ===");
    log::info!("Plant:   {}", config.plant_name);
    log::info!("Terrain: {}", config.terrain_name);
    log::info!(
        "Rows:    {} in groups of {}, {} plants per row",
        config.number_of_rows,
        config.rows_in_group,
        config.models_per_row()
    );

    let mut pipeline = GenerationPipeline::new(config, &args.workdir)?.dry_run(args.dry_run);
    if let Some(seed) = args.seed {
        pipeline = pipeline.with_seed(seed);
    }

    let report = pipeline.run()?;
    log::info!(
        "Done: {} plants (seed {}) in {:.2}s",
        report.placements.len(),
        report.seed,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
