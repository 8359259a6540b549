use crate::{
  geometry::limit_speed,
  ode::{Model, ModelState},
  simulated_scene::S,
};
use nalgebra::base::iter::{MatrixIter, MatrixIterMut};
use nalgebra::dimension::*;
use nalgebra::storage::Owned;
use nalgebra::Vector3;
use std::iter::{Chain, Flatten, Map};
use std::slice::{Iter, IterMut};

/// Free flight of particles under one global force, without contacts.
///
/// Positions follow the speed limited velocity and velocities follow
/// `force / mass`.
#[derive(Clone, Debug)]
pub struct ParticleModel {
  masses: Vec<S>,
  global_force: Vector3<S>,
  max_speed: S,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleState {
  pub positions: Vec<Vector3<S>>,
  pub velocities: Vec<Vector3<S>>,
}

impl ParticleModel {
  pub fn new(max_speed: S) -> Self {
    Self {
      masses: Vec::new(),
      global_force: Vector3::zeros(),
      max_speed,
    }
  }

  pub fn masses(&self) -> &[S] {
    &self.masses
  }

  pub fn add_masses(&mut self, masses: impl IntoIterator<Item = S>) {
    self.masses.extend(masses);
  }

  pub fn global_force(&self) -> &Vector3<S> {
    &self.global_force
  }

  pub fn set_global_force(&mut self, force: Vector3<S>) {
    self.global_force = force;
  }

  pub fn max_speed(&self) -> S {
    self.max_speed
  }

  pub fn set_max_speed(&mut self, max_speed: S) {
    self.max_speed = max_speed;
  }
}

impl ParticleState {
  pub fn len(&self) -> usize {
    self.positions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.positions.is_empty()
  }

  /// Appends particles at rest.
  pub fn add_at_rest(&mut self, positions: &[Vector3<S>]) {
    self.positions.extend_from_slice(positions);
    self
      .velocities
      .resize(self.positions.len(), Vector3::zeros());
  }
}

type BaseIntoIterGen<I, M> = Flatten<Map<I, M>>;

fn float_iter_vector(
  vec: &Vector3<S>,
) -> MatrixIter<S, U3, U1, Owned<S, U3, U1>> {
  vec.iter()
}

type FloatIterVector =
  for<'a> fn(&'a Vector3<S>) -> MatrixIter<'a, S, U3, U1, Owned<S, U3, U1>>;

type BaseIntoIter<'a> = BaseIntoIterGen<Iter<'a, Vector3<S>>, FloatIterVector>;

impl<'a> IntoIterator for &'a ParticleState {
  type Item = &'a S;

  type IntoIter = Chain<BaseIntoIter<'a>, BaseIntoIter<'a>>;

  #[inline]
  fn into_iter(self) -> Self::IntoIter {
    self
      .positions
      .iter()
      .map(float_iter_vector as FloatIterVector)
      .flatten()
      .chain(
        self
          .velocities
          .iter()
          .map(float_iter_vector as FloatIterVector)
          .flatten(),
      )
  }
}

fn float_iter_vector_mut(
  vec: &mut Vector3<S>,
) -> MatrixIterMut<S, U3, U1, Owned<S, U3, U1>> {
  vec.iter_mut()
}

type FloatIterVectorMut = for<'a> fn(
  &'a mut Vector3<S>,
) -> MatrixIterMut<'a, S, U3, U1, Owned<S, U3, U1>>;

type BaseIntoIterMut<'a> =
  BaseIntoIterGen<IterMut<'a, Vector3<S>>, FloatIterVectorMut>;

impl<'a> IntoIterator for &'a mut ParticleState {
  type Item = &'a mut S;

  type IntoIter = Chain<BaseIntoIterMut<'a>, BaseIntoIterMut<'a>>;

  #[inline]
  fn into_iter(self) -> Self::IntoIter {
    self
      .positions
      .iter_mut()
      .map(float_iter_vector_mut as FloatIterVectorMut)
      .flatten()
      .chain(
        self
          .velocities
          .iter_mut()
          .map(float_iter_vector_mut as FloatIterVectorMut)
          .flatten(),
      )
  }
}

impl ModelState<S> for ParticleState {
  fn new() -> Self {
    Self::default()
  }

  fn zeros_as(&mut self, other: &Self) {
    self.positions.clear();
    self.positions.resize(other.positions.len(), Vector3::zeros());
    self.velocities.clear();
    self
      .velocities
      .resize(other.velocities.len(), Vector3::zeros());
  }
}

impl Model for ParticleModel {
  type S = S;
  type State = ParticleState;

  fn derivative(&self, x: &Self::State, dxdt: &mut Self::State, _: &Self::S) {
    for (dpos, vel) in dxdt.positions.iter_mut().zip(&x.velocities) {
      *dpos = limit_speed(vel, self.max_speed);
    }

    for (dvel, mass) in dxdt.velocities.iter_mut().zip(&self.masses) {
      *dvel = self.global_force / *mass;
    }
  }

  fn position_len(&self, x: &Self::State) -> Option<usize> {
    Some(3 * x.positions.len())
  }
}
