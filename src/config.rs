use crate::ode::IntegratorType;
use crate::Result;
use figment::{
  providers::{Env, Format, Serialized, Toml},
  Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resolution {
  pub width: u32,
  pub height: u32,
}

impl Default for Resolution {
  fn default() -> Self {
    Self {
      width: 1280,
      height: 720,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSettings {
  pub radius: f32,
  pub mass_mean: f32,
  pub mass_stddev: f32,
  /// Coefficient of restitution for both particle and wall contacts.
  pub restitution: f32,
  /// Velocities are divided by this after every step.
  pub drag: f32,
  /// Seed of the mass sampler.
  pub seed: u64,
}

impl Default for ParticleSettings {
  fn default() -> Self {
    Self {
      radius: 0.05,
      mass_mean: 1.0,
      mass_stddev: 0.01,
      restitution: 0.5,
      drag: 1.01,
      seed: 0,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationSettings {
  pub substep: f32,
  pub integrator: IntegratorType,
}

impl Default for IntegrationSettings {
  fn default() -> Self {
    Self {
      substep: 0.03,
      integrator: IntegratorType::SemiImplicitEuler,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VesselSettings {
  /// Cells per axis of the broad phase grid, also the seeding resolution.
  pub cells: usize,
}

impl Default for VesselSettings {
  fn default() -> Self {
    Self { cells: 100 }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
  /// Extra world space around the vessel in every view.
  pub margin: f32,
  pub background: u8,
  pub foreground: u8,
}

impl Default for ImageSettings {
  fn default() -> Self {
    Self {
      margin: 1.0,
      background: 0,
      foreground: 255,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
  pub resolution: Resolution,
  pub particles: ParticleSettings,
  pub integration: IntegrationSettings,
  pub vessel: VesselSettings,
  pub images: ImageSettings,
}

impl SimulationSettings {
  /// Defaults overridden by `GATHERING_*` environment variables.
  pub fn load() -> Result<Self> {
    Self::figment(None).extract().map_err(Into::into)
  }

  /// Defaults, then `path`, then `GATHERING_*` environment variables.
  pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
    Self::figment(Some(path.as_ref()))
      .extract()
      .map_err(Into::into)
  }

  fn figment(path: Option<&Path>) -> Figment {
    let mut figment =
      Figment::from(Serialized::defaults(SimulationSettings::default()));

    if let Some(path) = path {
      figment = figment.merge(Toml::file(path));
    }

    // GATHERING_PARTICLES__RADIUS=0.1 -> particles.radius = 0.1
    figment.merge(Env::prefixed("GATHERING_").split("__"))
  }
}
