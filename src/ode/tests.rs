use crate::assert_float_eq;
use crate::ode::{Integrator, IntegratorType, Model, ModelState, SwappableIntegrator};
use proptest::prelude::*;

#[derive(Clone, Debug)]
struct Values(Vec<f32>);

impl<'a> IntoIterator for &'a Values {
  type Item = &'a f32;
  type IntoIter = std::slice::Iter<'a, f32>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.iter()
  }
}

impl<'a> IntoIterator for &'a mut Values {
  type Item = &'a mut f32;
  type IntoIter = std::slice::IterMut<'a, f32>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.iter_mut()
  }
}

impl ModelState<f32> for Values {
  fn new() -> Self {
    Values(Vec::new())
  }

  fn zeros_as(&mut self, other: &Self) {
    self.0.clear();
    self.0.resize(other.0.len(), 0.0);
  }
}

/// `[x, v]` under constant acceleration.
struct Projectile {
  accel: f32,
}

impl Model for Projectile {
  type S = f32;
  type State = Values;

  fn derivative(&self, x: &Values, dxdt: &mut Values, _: &f32) {
    dxdt.0[0] = x.0[1];
    dxdt.0[1] = self.accel;
  }

  fn position_len(&self, _: &Values) -> Option<usize> {
    Some(1)
  }
}

/// `x' = -x`
struct Decay;

impl Model for Decay {
  type S = f32;
  type State = Values;

  fn derivative(&self, x: &Values, dxdt: &mut Values, _: &f32) {
    for (d, v) in dxdt.0.iter_mut().zip(&x.0) {
      *d = -v;
    }
  }
}

fn decay_error(integrator_type: IntegratorType) -> f32 {
  let mut integrator = SwappableIntegrator::new(integrator_type);
  let mut state = Values(vec![1.0]);
  let mut time = 0.0;
  integrator.n_steps(&Decay, &mut state, &mut time, &0.1, 10);

  assert_float_eq!(time, 1.0);
  (state.0[0] - (-1.0f32).exp()).abs()
}

#[test]
fn euler_projectile() {
  let mut integrator = SwappableIntegrator::new(IntegratorType::Euler);
  let mut state = Values(vec![0.0, 0.0]);
  let mut time = 0.0;
  integrator.n_steps(&Projectile { accel: 2.0 }, &mut state, &mut time, &0.5, 2);

  // v is exact, x lags one step behind
  assert_float_eq!(state.0[1], 2.0);
  assert_float_eq!(state.0[0], 0.5);
}

#[test]
fn semi_implicit_euler_projectile() {
  let mut integrator =
    SwappableIntegrator::new(IntegratorType::SemiImplicitEuler);
  let mut state = Values(vec![0.0, 0.0]);
  let mut time = 0.0;
  integrator.n_steps(&Projectile { accel: 2.0 }, &mut state, &mut time, &0.5, 2);

  // x moves with the updated v, one step ahead of forward Euler
  assert_float_eq!(state.0[1], 2.0);
  assert_float_eq!(state.0[0], 1.5);
  assert_float_eq!(time, 1.0);
}

#[test]
fn semi_implicit_euler_without_split_is_forward_euler() {
  let forward = decay_error(IntegratorType::Euler);
  let semi_implicit = decay_error(IntegratorType::SemiImplicitEuler);
  assert_float_eq!(forward, semi_implicit);
}

#[test]
fn decay_accuracy_ordering() {
  let euler = decay_error(IntegratorType::Euler);
  let midpoint = decay_error(IntegratorType::Midpoint);
  let rk4 = decay_error(IntegratorType::Rk4);

  assert!(euler > midpoint);
  assert!(midpoint > rk4);
  assert!(rk4 < 1e-5);
}

proptest! {
#[test]
fn second_order_exact_on_constant_accel(
  accel in -10.0f32..10.0,
  v0 in -5.0f32..5.0,
  steps in 1usize..20,
  use_rk4 in any::<bool>(),
) {
  let integrator_type = if use_rk4 {
    IntegratorType::Rk4
  } else {
    IntegratorType::Midpoint
  };
  let mut integrator = SwappableIntegrator::new(integrator_type);
  let mut state = Values(vec![0.0, v0]);
  let mut time = 0.0;
  let dt = 0.05;
  integrator.n_steps(&Projectile { accel }, &mut state, &mut time, &dt, steps);

  let t = dt * steps as f32;
  assert_float_eq!(state.0[1], v0 + accel * t, 1e-3);
  assert_float_eq!(state.0[0], v0 * t + 0.5 * accel * t * t, 1e-3);
}
}
