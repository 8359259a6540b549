use crate::{
  config::{IntegrationSettings, ParticleSettings},
  geometry::{limit_speed, Aabb},
  grid::Grid,
  ode::{Integrator, SwappableIntegrator},
  simulated_scene::{ParticleModel, ParticleState, Vessel, S},
  CameraInfo, GatheringError, Result, Scene,
};
use nalgebra::{Point3, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::Normal;
use rayon::prelude::*;

/// Above this many particles contact detection runs on the rayon pool.
const PARALLEL_THRESHOLD: usize = 300;

/// Velocity change of particle `first`, the negated change goes to `second`.
#[derive(Clone, Copy, Debug)]
struct ParticleContact {
  first: usize,
  second: usize,
  nudge: Vector3<S>,
}

/// Velocity and position correction of one particle against the walls.
#[derive(Clone, Copy, Debug)]
struct WallContact {
  nudge: Vector3<S>,
  push: Vector3<S>,
}

/// Particles inside a vessel, advanced by free flight and then corrected by
/// impulses from particle/particle and particle/wall contacts.
pub struct SimulatedScene {
  vessel: Vessel,
  model: ParticleModel,
  state: ParticleState,
  old_positions: Vec<Vector3<S>>,
  pending_velocities: Vec<Vector3<S>>,
  particle_grid: Grid,
  integrator: SwappableIntegrator<ParticleModel>,
  params: ParticleSettings,
  rng: StdRng,
  time: S,
}

impl SimulatedScene {
  pub fn new(
    vessel: Vessel,
    params: ParticleSettings,
    integration: &IntegrationSettings,
  ) -> Result<Self> {
    crate::error::ensure_positive("particles.radius", params.radius)?;
    crate::error::ensure_positive("particles.drag", params.drag)?;
    crate::error::ensure_finite("particles.restitution", params.restitution)?;

    let particle_grid =
      Grid::with_min_cell_size(*vessel.bounds(), 6.0 * params.radius)?;

    Ok(Self {
      vessel,
      model: ParticleModel::new(2.0 * params.radius / integration.substep),
      state: ParticleState::default(),
      old_positions: Vec::new(),
      pending_velocities: Vec::new(),
      particle_grid,
      integrator: SwappableIntegrator::new(integration.integrator),
      rng: StdRng::seed_from_u64(params.seed),
      params,
      time: 0.0,
    })
  }

  /// Seeds `n` particles at rest in free interior cells with masses drawn
  /// from `|N(mass_mean, mass_stddev)|`.
  pub fn add_particles(
    &mut self,
    n: usize,
    mass_mean: S,
    mass_stddev: S,
  ) -> Result<()> {
    let normal = Normal::new(mass_mean, mass_stddev).map_err(|e| {
      GatheringError::invalid_parameter("mass_stddev", e.to_string())
    })?;

    let positions = self.vessel.seed_positions(n, &self.state.positions)?;
    let masses: Vec<S> = (0..n)
      .map(|_| self.rng.sample(normal).abs().max(S::EPSILON))
      .collect();

    self.state.add_at_rest(&positions);
    self.model.add_masses(masses);
    self
      .pending_velocities
      .resize(self.state.len(), Vector3::zeros());

    log::info!(
      "added {} particles, {} in total",
      n,
      self.state.len()
    );
    Ok(())
  }

  pub fn vessel(&self) -> &Vessel {
    &self.vessel
  }

  pub fn positions(&self) -> &[Vector3<S>] {
    &self.state.positions
  }

  pub fn velocities(&self) -> &[Vector3<S>] {
    &self.state.velocities
  }

  pub fn masses(&self) -> &[S] {
    self.model.masses()
  }

  pub fn radius(&self) -> S {
    self.params.radius
  }

  pub fn time(&self) -> S {
    self.time
  }

  pub fn global_force(&self) -> &Vector3<S> {
    self.model.global_force()
  }

  pub fn set_global_force(&mut self, force: Vector3<S>) {
    self.model.set_global_force(force);
  }

  fn rebuild_particle_grid(&mut self) {
    self.particle_grid.clear();
    for (idx, pos) in self.state.positions.iter().enumerate() {
      let coords = self.particle_grid.coords(pos);
      self.particle_grid.insert(coords, idx);
    }
  }

  fn particle_contacts(
    &self,
    idx: usize,
    neighbours: &mut Vec<usize>,
  ) -> Vec<ParticleContact> {
    let positions = &self.state.positions;
    let velocities = &self.state.velocities;
    let pos = positions[idx];
    let coords = self.particle_grid.coords(&pos);
    let octant = self.particle_grid.octant(coords, &pos);
    let min_dist = 2.0 * self.params.radius;

    neighbours.clear();
    self
      .particle_grid
      .close_unique_elements(coords, idx, octant, neighbours);

    neighbours
      .iter()
      .filter_map(|&other| {
        let delta_pos = positions[other] - pos;
        let dist_sq = delta_pos.norm_squared();
        if dist_sq >= min_dist * min_dist || dist_sq == 0.0 {
          return None;
        }

        let delta_vel = velocities[other] - velocities[idx];
        // only pairs moving towards each other
        if delta_pos.dot(&delta_vel) >= 0.0 {
          return None;
        }

        let normal = delta_pos / dist_sq.sqrt();
        let delta_vel = delta_vel * (1.0 + self.params.restitution);
        Some(ParticleContact {
          first: idx,
          second: other,
          nudge: normal * (delta_vel.dot(&normal) * 0.5),
        })
      })
      .collect()
  }

  fn collide_particles(&mut self) {
    let count = self.state.len();
    let contacts: Vec<ParticleContact> = if count > PARALLEL_THRESHOLD {
      (0..count)
        .into_par_iter()
        .map_init(Vec::new, |neighbours, idx| {
          self.particle_contacts(idx, neighbours)
        })
        .flatten_iter()
        .collect()
    } else {
      let mut neighbours = Vec::new();
      (0..count)
        .flat_map(|idx| self.particle_contacts(idx, &mut neighbours))
        .collect()
    };

    for contact in contacts {
      self.pending_velocities[contact.first] += contact.nudge;
      self.pending_velocities[contact.second] -= contact.nudge;
    }
  }

  fn wall_contact(
    &self,
    idx: usize,
    candidates: &mut Vec<usize>,
  ) -> Option<WallContact> {
    let pos = self.state.positions[idx];
    let vel = self.state.velocities[idx];
    let travelled = self.old_positions[idx] - pos;
    let radius = self.params.radius;

    self
      .vessel
      .candidate_triangles(&Aabb::around_sphere(&pos, radius), candidates);

    let triangles = self.vessel.triangles();
    let mut contact: Option<WallContact> = None;
    for triangle in candidates.iter().map(|&t| &triangles[t]) {
      let outwards = vel.dot(&triangle.normal);
      if outwards <= 0.0 || !triangle.touches_sphere(&pos, radius) {
        continue;
      }

      let entry = contact.get_or_insert(WallContact {
        nudge: Vector3::zeros(),
        push: Vector3::zeros(),
      });
      entry.nudge += triangle.normal
        * (-(1.0 + self.params.restitution) * outwards)
        + travelled * 0.5;
      entry.push -= triangle.normal * (1.01 * travelled.norm());
    }
    contact
  }

  fn collide_walls(&mut self) {
    let count = self.state.len();
    let contacts: Vec<Option<WallContact>> = if count > PARALLEL_THRESHOLD {
      (0..count)
        .into_par_iter()
        .map_init(Vec::new, |candidates, idx| {
          self.wall_contact(idx, candidates)
        })
        .collect()
    } else {
      let mut candidates = Vec::new();
      (0..count)
        .map(|idx| self.wall_contact(idx, &mut candidates))
        .collect()
    };

    for (idx, contact) in contacts.into_iter().enumerate() {
      if let Some(WallContact { nudge, push }) = contact {
        self.pending_velocities[idx] += nudge;
        self.state.positions[idx] += push;
      }
    }
  }
}

impl Scene for SimulatedScene {
  fn default_camera_info(&self) -> CameraInfo {
    let bounds = self.vessel.bounds();
    let center = bounds.center();
    let eye = center + bounds.half_extents() * 3.0;
    CameraInfo {
      eye: Point3::from(eye),
      at: Point3::from(center),
    }
  }

  fn update(&mut self, delta_secs: f32) {
    let max_speed = 2.0 * self.params.radius / delta_secs;
    self.model.set_max_speed(max_speed);

    self.old_positions.clone_from(&self.state.positions);
    self.integrator.step(
      &self.model,
      &mut self.state,
      &mut self.time,
      &delta_secs,
    );
    for vel in &mut self.state.velocities {
      *vel = limit_speed(vel, max_speed);
    }

    self.rebuild_particle_grid();
    self.collide_particles();
    self.collide_walls();

    let drag = self.params.drag;
    for (vel, pending) in self
      .state
      .velocities
      .iter_mut()
      .zip(self.pending_velocities.iter_mut())
    {
      *vel = (*vel + *pending) / drag;
      *pending = Vector3::zeros();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::SimulationSettings;
  use crate::voxel::VoxelObject;

  fn box_scene(cells: usize, scale: f32) -> SimulatedScene {
    let settings = SimulationSettings::default();
    let mesh = VoxelObject::solid([1, 1, 1]).unwrap().to_mesh("box", scale);
    let vessel = Vessel::new(&mesh, cells).unwrap();
    SimulatedScene::new(vessel, settings.particles, &settings.integration)
      .unwrap()
  }

  fn place(scene: &mut SimulatedScene, particles: &[(Vector3<S>, Vector3<S>)]) {
    let positions: Vec<_> = particles.iter().map(|(p, _)| *p).collect();
    scene.state.add_at_rest(&positions);
    for (vel, (_, v)) in scene.state.velocities.iter_mut().zip(particles) {
      *vel = *v;
    }
    scene.model.add_masses(vec![1.0; particles.len()]);
    scene
      .pending_velocities
      .resize(particles.len(), Vector3::zeros());
  }

  #[test]
  fn seeded_particles_have_positive_masses() {
    let mut scene = box_scene(10, 1.0);
    scene.add_particles(20, 1.0, 0.01).unwrap();
    assert_eq!(scene.positions().len(), 20);
    assert_eq!(scene.masses().len(), 20);
    assert!(scene.masses().iter().all(|&m| m > 0.9 && m < 1.1));
    assert!(scene.velocities().iter().all(|v| *v == Vector3::zeros()));

    scene.add_particles(5, 1.0, 0.01).unwrap();
    assert_eq!(scene.positions().len(), 25);

    assert!(scene.add_particles(1, 1.0, -1.0).is_err());
  }

  #[test]
  fn seeding_is_deterministic() {
    let mut a = box_scene(10, 1.0);
    let mut b = box_scene(10, 1.0);
    a.add_particles(30, 1.0, 0.01).unwrap();
    b.add_particles(30, 1.0, 0.01).unwrap();
    assert_eq!(a.masses(), b.masses());
    assert_eq!(a.positions(), b.positions());
  }

  #[test]
  fn approaching_pair_bounces() {
    let mut scene = box_scene(4, 4.0);
    place(
      &mut scene,
      &[
        (Vector3::new(1.96, 2.0, 2.0), Vector3::new(0.1, 0.0, 0.0)),
        (Vector3::new(2.04, 2.0, 2.0), Vector3::new(-0.1, 0.0, 0.0)),
      ],
    );

    scene.update(0.03);
    let v = scene.velocities();
    assert!(v[0][0] < 0.0, "{:?}", v[0]);
    assert!(v[1][0] > 0.0, "{:?}", v[1]);
    crate::assert_float_eq!(v[0][0], -v[1][0]);
  }

  #[test]
  fn separating_pair_is_left_alone() {
    let mut scene = box_scene(4, 4.0);
    place(
      &mut scene,
      &[
        (Vector3::new(1.96, 2.0, 2.0), Vector3::new(-0.1, 0.0, 0.0)),
        (Vector3::new(2.04, 2.0, 2.0), Vector3::new(0.1, 0.0, 0.0)),
      ],
    );

    scene.update(0.03);
    let v = scene.velocities();
    crate::assert_float_eq!(v[0][0], -0.1 / 1.01);
    crate::assert_float_eq!(v[1][0], 0.1 / 1.01);
  }

  #[test]
  fn wall_reflects_outgoing_particle() {
    let mut scene = box_scene(4, 1.0);
    place(
      &mut scene,
      &[(Vector3::new(0.5, 0.5, 0.93), Vector3::new(0.0, 0.0, 1.0))],
    );

    scene.update(0.03);
    assert!(scene.velocities()[0][2] < 0.0);
    assert!(scene.positions()[0][2] < 1.0);
  }

  #[test]
  fn particles_stay_inside_under_force() {
    let mut scene = box_scene(10, 1.0);
    scene.add_particles(50, 1.0, 0.01).unwrap();
    scene.set_global_force(Vector3::new(0.2, 0.2, 0.2));
    for _ in 0..200 {
      scene.update(0.03);
    }

    let bounds = scene.vessel().bounds();
    let slack = Vector3::repeat(scene.radius());
    let grown = Aabb::new(bounds.min - slack, bounds.max + slack);
    for p in scene.positions() {
      assert!(grown.contains(p), "{:?} escaped", p);
    }
    // the force pushes everything towards the +x+y+z corner
    let mean: Vector3<S> =
      scene.positions().iter().sum::<Vector3<S>>() / scene.positions().len() as S;
    assert!(mean.min() > 0.5);
  }

  #[test]
  fn default_step_moves_with_updated_velocity() {
    let mut scene = box_scene(4, 4.0);
    place(&mut scene, &[(Vector3::new(2.0, 2.0, 2.0), Vector3::zeros())]);
    scene.set_global_force(Vector3::new(0.0, 1.0, 0.0));

    scene.update(0.03);
    crate::assert_float_eq!(scene.positions()[0][1], 2.0 + 0.03 * 0.03);
    crate::assert_float_eq!(scene.velocities()[0][1], 0.03 / 1.01);
  }

  #[test]
  fn speed_is_limited_by_step_size() {
    let mut scene = box_scene(4, 4.0);
    place(
      &mut scene,
      &[(Vector3::new(2.0, 2.0, 2.0), Vector3::new(50.0, 0.0, 0.0))],
    );
    scene.update(0.03);
    let max_speed = 2.0 * scene.radius() / 0.03;
    assert!(scene.velocities()[0].norm() < max_speed);
  }
}
