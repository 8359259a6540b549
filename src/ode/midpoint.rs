use crate::ode::integrator::add_scaled;
use crate::ode::{Integrator, Model, ModelState, NullSettings};

pub type MidpointSettings = NullSettings;

/// Second order Runge-Kutta: the full step uses the rate at the midpoint
/// reached by half a forward Euler step.
pub struct Midpoint<M: Model>
where
  for<'a> &'a M::State: IntoIterator<Item = &'a M::S>,
  for<'a> &'a mut M::State: IntoIterator<Item = &'a mut M::S>,
{
  rate: M::State,
  half_way: M::State,
}

impl<M: Model> Integrator<M> for Midpoint<M>
where
  for<'a> &'a M::State: IntoIterator<Item = &'a M::S>,
  for<'a> &'a mut M::State: IntoIterator<Item = &'a mut M::S>,
{
  type Settings = MidpointSettings;

  fn new(_: MidpointSettings) -> Self {
    Self {
      rate: M::State::new(),
      half_way: M::State::new(),
    }
  }

  fn step_internal(
    &mut self,
    model: &M,
    state: &mut M::State,
    time: &M::S,
    time_step: &M::S,
  ) {
    let half_step = *time_step * M::S::from(0.5f32);

    self.rate.zeros_as(state);
    model.derivative(state, &mut self.rate, time);

    self.half_way.clone_from(state);
    add_scaled::<M>(&mut self.half_way, &self.rate, half_step);

    model.derivative(&self.half_way, &mut self.rate, &(*time + half_step));
    add_scaled::<M>(state, &self.rate, *time_step);
  }
}
