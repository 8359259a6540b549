use nalgebra::RealField;

/// Flat view of an ODE state. Integrators only ever walk the components in
/// iteration order, so layouts must be stable between calls.
pub trait ModelState<S>
where
  Self: Clone,
  for<'a> &'a Self: IntoIterator<Item = &'a S>,
  for<'a> &'a mut Self: IntoIterator<Item = &'a mut S>,
{
  fn new() -> Self;

  /// Resizes to the shape of `other`, every component zero.
  fn zeros_as(&mut self, other: &Self);
}

pub trait Model
where
  for<'a> &'a Self::State: IntoIterator<Item = &'a Self::S>,
  for<'a> &'a mut Self::State: IntoIterator<Item = &'a mut Self::S>,
{
  type S: RealField + Copy + From<f32>;

  type State: ModelState<Self::S>;

  fn derivative(&self, x: &Self::State, dxdt: &mut Self::State, t: &Self::S);

  /// Second order systems laid out as `[x, v]` return how many leading
  /// components are positions.
  fn position_len(&self, _x: &Self::State) -> Option<usize> {
    None
  }
}
