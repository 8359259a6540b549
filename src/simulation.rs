use crate::{
  config::SimulationSettings,
  error::{ensure_finite, ensure_positive},
  imaging::{slice_camera, slice_ranges, view_cameras, ImageContainer},
  mesh::load_mesh,
  simulated_scene::{SimulatedScene, Vessel, S},
  GatheringError, Result, Scene,
};
use image::GrayImage;
use indicatif::ProgressBar;
use nalgebra::Vector3;
use std::collections::VecDeque;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
  None,
  Up,
  Right,
  Down,
  Left,
  Front,
  Back,
}

impl Direction {
  pub fn vector(self) -> Vector3<S> {
    match self {
      Direction::None => Vector3::zeros(),
      Direction::Up => Vector3::new(0.0, 1.0, 0.0),
      Direction::Right => Vector3::new(1.0, 0.0, 0.0),
      Direction::Down => Vector3::new(0.0, -1.0, 0.0),
      Direction::Left => Vector3::new(-1.0, 0.0, 0.0),
      Direction::Front => Vector3::new(0.0, 0.0, 1.0),
      Direction::Back => Vector3::new(0.0, 0.0, -1.0),
    }
  }
}

impl FromStr for Direction {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    Ok(match s.trim().to_ascii_lowercase().as_str() {
      "none" => Direction::None,
      "up" => Direction::Up,
      "right" => Direction::Right,
      "down" => Direction::Down,
      "left" => Direction::Left,
      "front" => Direction::Front,
      "back" => Direction::Back,
      other => return Err(format!("unknown direction `{}`", other)),
    })
  }
}

/// Parses `x,y,z`.
pub fn parse_vector(s: &str) -> std::result::Result<Vector3<S>, String> {
  let parts = s
    .split(',')
    .map(|part| {
      part
        .trim()
        .parse::<S>()
        .map_err(|_| format!("invalid number `{}`", part.trim()))
    })
    .collect::<std::result::Result<Vec<_>, _>>()?;

  match parts[..] {
    [x, y, z] => Ok(Vector3::new(x, y, z)),
    _ => Err(format!("expected 3 components, got {}", parts.len())),
  }
}

/// A global force applied for `duration` simulation time.
#[derive(Clone, Debug, PartialEq)]
pub struct ForceStep {
  pub duration: S,
  pub force: Vector3<S>,
}

impl ForceStep {
  pub fn new(duration: S, force: Vector3<S>) -> Self {
    Self { duration, force }
  }

  pub fn towards(duration: S, direction: Direction, strength: S) -> Self {
    Self::new(duration, direction.vector() * strength)
  }

  /// Durations must be finite and not negative, forces finite.
  pub fn validate(&self) -> Result<()> {
    ensure_finite("duration", self.duration)?;
    if self.duration < 0.0 {
      return Err(GatheringError::invalid_parameter(
        "duration",
        format!("expected a value >= 0, got {}", self.duration),
      ));
    }
    if !self.force.iter().all(|c| c.is_finite()) {
      return Err(GatheringError::invalid_parameter(
        "force",
        format!("components must be finite, got {:?}", self.force.as_slice()),
      ));
    }
    Ok(())
  }
}

/// Accepts `duration:x,y,z`, `duration:direction` and
/// `duration:direction*strength`, e.g. `5:up*0.2`.
impl FromStr for ForceStep {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    let (duration, force) = s
      .split_once(':')
      .ok_or_else(|| format!("expected `duration:force`, got `{}`", s))?;
    let duration: S = duration
      .trim()
      .parse()
      .map_err(|_| format!("invalid duration `{}`", duration.trim()))?;

    let force = if force.contains(',') {
      parse_vector(force)?
    } else {
      let (direction, strength) = match force.split_once('*') {
        Some((direction, strength)) => (
          direction,
          strength
            .trim()
            .parse::<S>()
            .map_err(|_| format!("invalid strength `{}`", strength.trim()))?,
        ),
        None => (force, 1.0),
      };
      direction.parse::<Direction>()?.vector() * strength
    };

    let step = Self::new(duration, force);
    step.validate().map_err(|e| e.to_string())?;
    Ok(step)
  }
}

/// Force steps applied front to back.
pub type ForceSchedule = VecDeque<ForceStep>;

/// A vessel filled with particles, stepped with a fixed substep and
/// captured into grayscale images.
pub struct Simulation {
  mesh_path: PathBuf,
  settings: SimulationSettings,
  substep: S,
  scene: SimulatedScene,
  images: ImageContainer,
  show_progress: bool,
  #[cfg(feature = "viewer")]
  viewer: Option<crate::display::Viewer>,
}

impl Simulation {
  /// Loads the vessel from `file`. The simulation starts without particles.
  pub fn new<P: AsRef<Path>>(
    file: P,
    settings: SimulationSettings,
  ) -> Result<Self> {
    let mesh_path = file.as_ref().to_path_buf();
    let resolution = settings.resolution;
    if resolution.width == 0 || resolution.height == 0 {
      return Err(GatheringError::invalid_parameter(
        "resolution",
        format!(
          "images need a positive size, got {}x{}",
          resolution.width, resolution.height
        ),
      ));
    }
    ensure_positive("substep", settings.integration.substep)?;
    ensure_finite("images.margin", settings.images.margin)?;

    let start = Instant::now();
    let mesh = load_mesh(&mesh_path)?;
    let vessel = Vessel::new(&mesh, settings.vessel.cells)?;
    let scene = SimulatedScene::new(
      vessel,
      settings.particles.clone(),
      &settings.integration,
    )?;

    log::info!(
      "loaded vessel `{}` ({} triangles) in {:.2?}",
      mesh_path.display(),
      scene.vessel().triangles().len(),
      start.elapsed()
    );

    Ok(Self {
      mesh_path,
      substep: settings.integration.substep,
      images: ImageContainer::new(resolution.width, resolution.height),
      settings,
      scene,
      show_progress: false,
      #[cfg(feature = "viewer")]
      viewer: None,
    })
  }

  pub fn add_particles(
    &mut self,
    n: usize,
    mass_mean: S,
    mass_stddev: S,
  ) -> Result<()> {
    self.scene.add_particles(n, mass_mean, mass_stddev)
  }

  pub fn mesh_path(&self) -> &Path {
    &self.mesh_path
  }

  pub fn settings(&self) -> &SimulationSettings {
    &self.settings
  }

  pub fn scene(&self) -> &SimulatedScene {
    &self.scene
  }

  pub fn substep(&self) -> S {
    self.substep
  }

  pub fn set_substep(&mut self, substep: S) -> Result<()> {
    ensure_positive("substep", substep)?;
    self.substep = substep;
    Ok(())
  }

  /// Shows an indicatif progress bar while running.
  pub fn set_progress(&mut self, enabled: bool) {
    self.show_progress = enabled;
  }

  fn progress_bar(&self, steps: Option<usize>) -> ProgressBar {
    match (self.show_progress, steps) {
      (false, _) => ProgressBar::hidden(),
      (true, Some(steps)) => ProgressBar::new(steps as u64),
      (true, None) => ProgressBar::new_spinner(),
    }
  }

  fn headless_or_fallback(&self, headless: bool) -> bool {
    if !headless && !cfg!(feature = "viewer") {
      log::warn!("built without the `viewer` feature, running headless");
      return true;
    }
    headless
  }

  /// Sets the global force from the schedule front, then advances one
  /// substep.
  fn step(&mut self, schedule: &mut ForceSchedule) {
    let force = match schedule.front_mut() {
      Some(front) => {
        let force = front.force;
        front.duration -= self.substep;
        if front.duration <= 0.0 {
          schedule.pop_front();
        }
        force
      }
      None => Vector3::zeros(),
    };

    self.scene.set_global_force(force);
    self.scene.update(self.substep);
  }

  /// Draws the current state, `false` once the window was closed.
  #[cfg(feature = "viewer")]
  fn present(&mut self) -> bool {
    let scene = &self.scene;
    self
      .viewer
      .get_or_insert_with(|| crate::display::Viewer::new("gathering", scene))
      .render(scene)
  }

  #[cfg(not(feature = "viewer"))]
  fn present(&mut self) -> bool {
    true
  }

  fn log_rate(&self, steps: usize, start: Instant) {
    let secs = start.elapsed().as_secs_f32();
    if secs > 0.0 {
      log::debug!(
        "{} steps in {:.2}s ({:.1} steps/s, {} particles)",
        steps,
        secs,
        steps as f32 / secs,
        self.scene.positions().len()
      );
    }
  }

  /// Runs `steps` substeps, stopping early if the window is closed.
  /// Returns the number of substeps taken.
  pub fn run_steps(
    &mut self,
    steps: usize,
    schedule: &mut ForceSchedule,
    headless: bool,
  ) -> usize {
    let headless = self.headless_or_fallback(headless);
    let progress = self.progress_bar(Some(steps));
    let start = Instant::now();

    let mut done = 0;
    while done < steps {
      self.step(schedule);
      done += 1;
      progress.inc(1);
      if !headless && !self.present() {
        break;
      }
    }

    progress.finish_and_clear();
    self.log_rate(done, start);
    done
  }

  /// Runs `floor(duration / substep)` substeps.
  pub fn run_time(
    &mut self,
    duration: S,
    schedule: &mut ForceSchedule,
    headless: bool,
  ) -> Result<usize> {
    ensure_finite("duration", duration)?;
    if duration < 0.0 {
      return Err(GatheringError::invalid_parameter(
        "duration",
        format!("expected a value >= 0, got {}", duration),
      ));
    }

    let steps = (duration / self.substep).floor() as usize;
    log::debug!("running {} steps of {}", steps, self.substep);
    Ok(self.run_steps(steps, schedule, headless))
  }

  /// Runs until the schedule is used up, or with a window until it is
  /// closed.
  pub fn run(
    &mut self,
    schedule: &mut ForceSchedule,
    headless: bool,
  ) -> Result<usize> {
    schedule.iter().try_for_each(ForceStep::validate)?;

    let headless = self.headless_or_fallback(headless);
    let total: S = schedule.iter().map(|step| step.duration.max(0.0)).sum();
    let progress = self.progress_bar(if headless {
      Some((total / self.substep).ceil() as usize)
    } else {
      None
    });
    let start = Instant::now();

    let mut done = 0;
    loop {
      if headless && schedule.is_empty() {
        break;
      }
      self.step(schedule);
      done += 1;
      progress.inc(1);
      if !headless && !self.present() {
        break;
      }
    }

    progress.finish_and_clear();
    self.log_rate(done, start);
    Ok(done)
  }

  /// Displays the current state without stepping until the window is
  /// closed.
  pub fn show_current_state(&mut self) {
    if self.headless_or_fallback(false) {
      return;
    }
    while self.present() {}
  }

  /// `slice_count` slices through the vessel along z, front to back.
  pub fn take_images(&mut self, slice_count: usize) -> &[GrayImage] {
    let start = Instant::now();
    let bounds = *self.scene.vessel().bounds();
    let camera = slice_camera(&bounds, self.settings.images.margin);
    let shots: Vec<_> = slice_ranges(&bounds, slice_count)
      .into_iter()
      .map(|range| (camera.clone(), range))
      .collect();

    let images = self.images.render(
      &shots,
      self.scene.positions(),
      self.scene.radius(),
      &self.settings.images,
    );
    log::info!("captured {} slices in {:.2?}", slice_count, start.elapsed());
    images
  }

  /// Overviews from +x, from above and from +z.
  pub fn take_views(&mut self) -> &[GrayImage] {
    let bounds = *self.scene.vessel().bounds();
    let shots = view_cameras(&bounds, self.settings.images.margin);
    self.images.render(
      &shots,
      self.scene.positions(),
      self.scene.radius(),
      &self.settings.images,
    )
  }

  /// Writes the overviews as `0.png` to `2.png` and the slices as
  /// `slice_<i>.png` into `dir`.
  pub fn save_images<P: AsRef<Path>>(
    &mut self,
    dir: P,
    slice_count: usize,
  ) -> Result<()> {
    let dir = dir.as_ref();
    if dir.exists() && !dir.is_dir() {
      return Err(GatheringError::invalid_parameter(
        "output_dir",
        format!("{} exists and isn't a directory", dir.display()),
      ));
    }
    create_dir_all(dir)?;

    for (i, image) in self.take_views().iter().enumerate() {
      image.save(dir.join(format!("{}.png", i)))?;
    }
    for (i, image) in self.take_images(slice_count).iter().enumerate() {
      image.save(dir.join(format!("slice_{}.png", i)))?;
    }

    log::info!("saved images to {}", dir.display());
    Ok(())
  }
}
