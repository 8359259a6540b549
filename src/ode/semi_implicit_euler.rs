use crate::ode::integrator::add_scaled;
use crate::ode::{Integrator, Model, ModelState, NullSettings};

pub type SemiImplicitEulerSettings = NullSettings;

/// Symplectic Euler for `[x, v]` states: velocities are advanced first and
/// positions then move with the new velocities. Models without a
/// [`Model::position_len`] split get a plain forward Euler step.
pub struct SemiImplicitEuler<M: Model>
where
  for<'a> &'a M::State: IntoIterator<Item = &'a M::S>,
  for<'a> &'a mut M::State: IntoIterator<Item = &'a mut M::S>,
{
  rate: M::State,
}

impl<M: Model> Integrator<M> for SemiImplicitEuler<M>
where
  for<'a> &'a M::State: IntoIterator<Item = &'a M::S>,
  for<'a> &'a mut M::State: IntoIterator<Item = &'a mut M::S>,
{
  type Settings = SemiImplicitEulerSettings;

  fn new(_: SemiImplicitEulerSettings) -> Self {
    Self {
      rate: M::State::new(),
    }
  }

  fn step_internal(
    &mut self,
    model: &M,
    state: &mut M::State,
    time: &M::S,
    time_step: &M::S,
  ) {
    self.rate.zeros_as(state);
    model.derivative(state, &mut self.rate, time);

    let split = match model.position_len(state) {
      Some(split) => split,
      None => {
        add_scaled::<M>(state, &self.rate, *time_step);
        return;
      }
    };

    let velocities = (&mut *state).into_iter().zip(&self.rate).skip(split);
    for (value, rate) in velocities {
      *value += *rate * *time_step;
    }

    model.derivative(state, &mut self.rate, time);

    for (value, rate) in state.into_iter().zip(&self.rate).take(split) {
      *value += *rate * *time_step;
    }
  }
}
