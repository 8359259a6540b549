use crate::ode::integrator::add_scaled;
use crate::ode::{Integrator, Model, ModelState, NullSettings};

pub type EulerSettings = NullSettings;

/// Forward Euler, `x += dt * f(x, t)`. Positions move with the velocity
/// from the start of the step.
pub struct Euler<M: Model>
where
  for<'a> &'a M::State: IntoIterator<Item = &'a M::S>,
  for<'a> &'a mut M::State: IntoIterator<Item = &'a mut M::S>,
{
  rate: M::State,
}

impl<M: Model> Integrator<M> for Euler<M>
where
  for<'a> &'a M::State: IntoIterator<Item = &'a M::S>,
  for<'a> &'a mut M::State: IntoIterator<Item = &'a mut M::S>,
{
  type Settings = EulerSettings;

  fn new(_: EulerSettings) -> Self {
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
    add_scaled::<M>(state, &self.rate, *time_step);
  }
}
