use crate::ode::{Integrator, Model, ModelState, NullSettings};

pub type RK4Settings = NullSettings;

/// Classic fourth order Runge-Kutta.
pub struct RK4<M: Model>
where
  for<'a> &'a M::State: IntoIterator<Item = &'a M::S>,
  for<'a> &'a mut M::State: IntoIterator<Item = &'a mut M::S>,
{
  dxdt: M::State,
  intermediate_state: M::State,
  k: [M::State; 4],
}

impl<M: Model> Integrator<M> for RK4<M>
where
  for<'a> &'a M::State: IntoIterator<Item = &'a M::S>,
  for<'a> &'a mut M::State: IntoIterator<Item = &'a mut M::S>,
{
  type Settings = RK4Settings;

  fn new(_: Self::Settings) -> Self {
    Self {
      dxdt: M::State::new(),
      intermediate_state: M::State::new(),
      k: [
        M::State::new(),
        M::State::new(),
        M::State::new(),
        M::State::new(),
      ],
    }
  }

  fn step_internal(
    &mut self,
    model: &M,
    state: &mut M::State,
    time: &M::S,
    time_step: &M::S,
  ) {
    self.dxdt.zeros_as(state);
    self.intermediate_state.zeros_as(state);

    // k_i is evaluated at t + offset_i * dt, the next stage starts from
    // x + weight_i * k_i
    let offsets = [0.0f32, 0.5, 0.5, 1.0];
    let weights = [Some(0.5f32), Some(0.5), Some(1.0), None];

    for (k_idx, (offset, weight)) in
      offsets.iter().zip(weights.iter()).enumerate()
    {
      let stage_time = *time + M::S::from(*offset) * *time_step;
      if k_idx == 0 {
        model.derivative(state, &mut self.dxdt, &stage_time);
      } else {
        model.derivative(
          &self.intermediate_state,
          &mut self.dxdt,
          &stage_time,
        );
      }

      self.k[k_idx].zeros_as(state);

      let weight = weight.map(<M::S as From<f32>>::from);

      for (((k_val, next_state), value), dxdt) in (&mut self.k[k_idx])
        .into_iter()
        .zip(&mut self.intermediate_state)
        .zip(&*state)
        .zip(&self.dxdt)
      {
        *k_val = *time_step * *dxdt;
        if let Some(weight) = weight {
          *next_state = *value + weight * *k_val;
        }
      }
    }

    let two = M::S::from(2.0f32);
    let sixth = M::S::from(1.0f32 / 6.0);

    for ((((k_0, k_1), k_2), k_3), value) in (&self.k[0])
      .into_iter()
      .zip(&self.k[1])
      .zip(&self.k[2])
      .zip(&self.k[3])
      .zip(state)
    {
      *value += (*k_0 + two * *k_1 + two * *k_2 + *k_3) * sixth;
    }
  }
}
