use crate::ode::Model;

/// `target += scale * rate`, component by component.
pub(crate) fn add_scaled<M: Model>(
  target: &mut M::State,
  rate: &M::State,
  scale: M::S,
) where
  for<'a> &'a M::State: IntoIterator<Item = &'a M::S>,
  for<'a> &'a mut M::State: IntoIterator<Item = &'a mut M::S>,
{
  for (value, rate) in target.into_iter().zip(rate) {
    *value += *rate * scale;
  }
}

/// A fixed step scheme advancing a [`Model`] state.
pub trait Integrator<M: Model>
where
  for<'a> &'a M::State: IntoIterator<Item = &'a M::S>,
  for<'a> &'a mut M::State: IntoIterator<Item = &'a mut M::S>,
{
  type Settings: Clone;

  fn new(settings: Self::Settings) -> Self;

  /// Advances `state` from `time` by `time_step`. `time` itself is left to
  /// the caller.
  fn step_internal(
    &mut self,
    model: &M,
    state: &mut M::State,
    time: &M::S,
    time_step: &M::S,
  );

  fn step(
    &mut self,
    model: &M,
    state: &mut M::State,
    time: &mut M::S,
    time_step: &M::S,
  ) {
    self.step_internal(model, state, time, time_step);
    *time += *time_step;
  }

  fn n_steps(
    &mut self,
    model: &M,
    state: &mut M::State,
    time: &mut M::S,
    time_step: &M::S,
    steps: usize,
  ) {
    (0..steps).for_each(|_| self.step(model, state, time, time_step));
  }
}
