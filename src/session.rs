use crate::config::SimulationSettings;
use crate::error::ensure_finite;
use crate::simulated_scene::S;
use crate::simulation::{ForceSchedule, ForceStep, Simulation};
use crate::{GatheringError, Result};
use image::GrayImage;
use nalgebra::Vector3;
use std::path::Path;

pub struct Session {
  simulation: Simulation,
}

impl Session {
  /// Loads the vessel in `file` and seeds `cnt_particles` particles in it.
  /// Images will be `image_width` x `image_height` pixels. Other settings
  /// come from the defaults and `GATHERING_*` environment variables.
  pub fn load<P: AsRef<Path>>(
    file: P,
    cnt_particles: usize,
    image_width: u32,
    image_height: u32,
  ) -> Result<Self> {
    Self::load_with_settings(
      file,
      cnt_particles,
      image_width,
      image_height,
      SimulationSettings::load()?,
    )
  }

  pub fn load_with_settings<P: AsRef<Path>>(
    file: P,
    cnt_particles: usize,
    image_width: u32,
    image_height: u32,
    mut settings: SimulationSettings,
  ) -> Result<Self> {
    if image_width == 0 {
      return Err(GatheringError::invalid_parameter(
        "image_width",
        "must be positive",
      ));
    }
    if image_height == 0 {
      return Err(GatheringError::invalid_parameter(
        "image_height",
        "must be positive",
      ));
    }
    settings.resolution.width = image_width;
    settings.resolution.height = image_height;

    let (mass_mean, mass_stddev) =
      (settings.particles.mass_mean, settings.particles.mass_stddev);
    let mut simulation = Simulation::new(file, settings)?;
    simulation.add_particles(cnt_particles, mass_mean, mass_stddev)?;

    log::info!(
      "session loaded `{}` with {} particles, images {}x{}",
      simulation.mesh_path().display(),
      cnt_particles,
      image_width,
      image_height
    );
    Ok(Self { simulation })
  }

  pub fn set_substep_size(&mut self, substep: S) -> Result<()> {
    self.simulation.set_substep(substep)?;
    log::debug!("substep set to {}", substep);
    Ok(())
  }

  /// Applies the force `(x, y, z)` for `floor(duration / substep)` steps.
  /// With `headless` unset the steps are also shown in a window.
  pub fn apply_force(
    &mut self,
    duration: S,
    headless: bool,
    x: S,
    y: S,
    z: S,
  ) -> Result<()> {
    ensure_finite("x", x)?;
    ensure_finite("y", y)?;
    ensure_finite("z", z)?;

    let mut schedule: ForceSchedule =
      vec![ForceStep::new(duration, Vector3::new(x, y, z))].into();
    let steps = self
      .simulation
      .run_time(duration, &mut schedule, headless)?;
    log::debug!("applied force ({}, {}, {}) for {} steps", x, y, z, steps);
    Ok(())
  }

  /// `slice_count` slices through the vessel, front to back.
  pub fn take_images(&mut self, slice_count: usize) -> &[GrayImage] {
    self.simulation.take_images(slice_count)
  }

  pub fn simulation(&self) -> &Simulation {
    &self.simulation
  }

  pub fn simulation_mut(&mut self) -> &mut Simulation {
    &mut self.simulation
  }

  pub fn close(self) {
    log::info!(
      "closing session for `{}`",
      self.simulation.mesh_path().display()
    );
  }
}

/// Holds the active session, if any.
#[derive(Default)]
pub struct SessionSlot {
  active: Option<Session>,
}

impl SessionSlot {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active.is_some()
  }

  fn session(&mut self) -> Result<&mut Session> {
    self.active.as_mut().ok_or(GatheringError::NoActiveSession)
  }

  /// Closes the active session, if any, then loads a new one. The slot is
  /// left empty when loading fails.
  pub fn load<P: AsRef<Path>>(
    &mut self,
    file: P,
    cnt_particles: usize,
    image_width: u32,
    image_height: u32,
  ) -> Result<()> {
    if let Some(previous) = self.active.take() {
      previous.close();
    }
    self.active =
      Some(Session::load(file, cnt_particles, image_width, image_height)?);
    Ok(())
  }

  pub fn load_with_settings<P: AsRef<Path>>(
    &mut self,
    file: P,
    cnt_particles: usize,
    image_width: u32,
    image_height: u32,
    settings: SimulationSettings,
  ) -> Result<()> {
    if let Some(previous) = self.active.take() {
      previous.close();
    }
    self.active = Some(Session::load_with_settings(
      file,
      cnt_particles,
      image_width,
      image_height,
      settings,
    )?);
    Ok(())
  }

  pub fn set_substep_size(&mut self, substep: S) -> Result<()> {
    self.session()?.set_substep_size(substep)
  }

  pub fn apply_force(
    &mut self,
    duration: S,
    headless: bool,
    x: S,
    y: S,
    z: S,
  ) -> Result<()> {
    self.session()?.apply_force(duration, headless, x, y, z)
  }

  pub fn take_images(&mut self, slice_count: usize) -> Result<&[GrayImage]> {
    Ok(self.session()?.take_images(slice_count))
  }

  pub fn close(&mut self) -> Result<()> {
    self
      .active
      .take()
      .ok_or(GatheringError::NoActiveSession)?
      .close();
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_slot_rejects_every_call() {
    let mut slot = SessionSlot::new();
    assert!(!slot.is_active());
    assert!(matches!(
      slot.set_substep_size(0.03),
      Err(GatheringError::NoActiveSession)
    ));
    assert!(matches!(
      slot.apply_force(1.0, true, 0.0, 0.0, 0.0),
      Err(GatheringError::NoActiveSession)
    ));
    assert!(matches!(
      slot.take_images(4),
      Err(GatheringError::NoActiveSession)
    ));
    assert!(matches!(slot.close(), Err(GatheringError::NoActiveSession)));
  }

  #[test]
  fn failed_load_leaves_slot_empty() {
    let mut slot = SessionSlot::new();
    let result = slot.load_with_settings(
      "missing/vessel.obj",
      10,
      64,
      64,
      SimulationSettings::default(),
    );
    assert!(matches!(result, Err(GatheringError::ResourceNotFound(_))));
    assert!(!slot.is_active());
  }

  #[test]
  fn zero_image_size_rejected() {
    for (width, height, name) in [(0, 10, "image_width"), (10, 0, "image_height")]
    {
      match Session::load_with_settings(
        "missing/vessel.obj",
        10,
        width,
        height,
        SimulationSettings::default(),
      ) {
        Err(GatheringError::InvalidParameter { name: got, .. }) => {
          assert_eq!(got, name)
        }
        other => panic!("expected invalid parameter, got {:?}", other.err()),
      }
    }
  }
}
