use clap::{Args, Parser, Subcommand};
use gathering::{
  mesh::write_obj,
  ode::IntegratorType,
  simulation::{parse_vector, ForceSchedule, ForceStep, Simulation},
  voxel::VoxelObject,
  SimulationSettings,
};
use nalgebra::Vector3;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
  name = "gathering",
  about = "Particles gathering inside a vessel under a global force",
  version
)]
struct Opts {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Simulate particles in a vessel and save the resulting images
  Run(RunOpts),

  /// Write a voxel test vessel as an OBJ file
  GenerateInstance {
    #[arg(short, long, default_value = "cube_cross.obj")]
    output: PathBuf,

    /// Edge length of one voxel
    #[arg(short, long, default_value_t = 1.0)]
    scale: f32,
  },
}

#[derive(Args)]
struct RunOpts {
  /// Closed OBJ mesh of the vessel
  mesh_file: PathBuf,

  #[arg(short = 'n', long, default_value_t = 1000)]
  particles: usize,

  #[arg(long)]
  width: Option<u32>,

  #[arg(long)]
  height: Option<u32>,

  #[arg(long)]
  substep: Option<f32>,

  /// TOML settings file
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[arg(long, value_enum)]
  integrator: Option<IntegratorType>,

  /// Force applied when no schedule is given
  #[arg(long, default_value = "0.2,0.2,0.2", value_parser = parse_vector)]
  force: Vector3<f32>,

  #[arg(short, long, default_value_t = 10.0)]
  duration: f32,

  /// Force steps such as `5:up*0.2` or `3:0,0.1,0`, applied in order
  #[arg(long = "schedule")]
  schedule: Vec<ForceStep>,

  #[arg(long, default_value_t = 4)]
  slices: usize,

  #[arg(short, long, default_value = "images")]
  output_dir: PathBuf,

  /// Show every step in a window
  #[arg(long)]
  show: bool,
}

fn run(opts: RunOpts) -> gathering::Result<()> {
  let mut settings = match &opts.config {
    Some(path) => SimulationSettings::load_from(path)?,
    None => SimulationSettings::load()?,
  };
  if let Some(width) = opts.width {
    settings.resolution.width = width;
  }
  if let Some(height) = opts.height {
    settings.resolution.height = height;
  }
  if let Some(substep) = opts.substep {
    settings.integration.substep = substep;
  }
  if let Some(integrator) = opts.integrator {
    settings.integration.integrator = integrator;
  }

  let (mass_mean, mass_stddev) =
    (settings.particles.mass_mean, settings.particles.mass_stddev);
  let mut simulation = Simulation::new(&opts.mesh_file, settings)?;
  simulation.add_particles(opts.particles, mass_mean, mass_stddev)?;
  simulation.set_progress(true);

  let headless = !opts.show;
  if opts.schedule.is_empty() {
    let step = ForceStep::new(opts.duration, opts.force);
    step.validate()?;
    let mut schedule: ForceSchedule = vec![step].into();
    simulation.run_time(opts.duration, &mut schedule, headless)?;
  } else {
    let mut schedule: ForceSchedule = opts.schedule.into_iter().collect();
    simulation.run(&mut schedule, headless)?;
  }

  simulation.save_images(&opts.output_dir, opts.slices)
}

fn generate_instance(output: PathBuf, scale: f32) -> gathering::Result<()> {
  let mesh = VoxelObject::cube_cross()?.to_mesh("cube_cross", scale);
  write_obj(&mesh, BufWriter::new(File::create(&output)?))?;
  log::info!(
    "wrote {} with {} triangles",
    output.display(),
    mesh.faces.len()
  );
  Ok(())
}

fn main() -> gathering::Result<()> {
  env_logger::init();

  let opts = Opts::parse();

  match opts.command {
    Command::Run(run_opts) => run(run_opts),
    Command::GenerateInstance { output, scale } => {
      generate_instance(output, scale)
    }
  }
}
