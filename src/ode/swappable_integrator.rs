use crate::ode::{
  Euler, EulerSettings, Integrator, Midpoint, MidpointSettings, Model,
  RK4Settings, SemiImplicitEuler, SemiImplicitEulerSettings, RK4,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(
  Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum IntegratorType {
  Euler,
  SemiImplicitEuler,
  Midpoint,
  Rk4,
}

pub enum SwappableIntegrator<M: Model>
where
  for<'a> &'a M::State: IntoIterator<Item = &'a M::S>,
  for<'a> &'a mut M::State: IntoIterator<Item = &'a mut M::S>,
{
  Euler(Euler<M>),
  SemiImplicitEuler(SemiImplicitEuler<M>),
  Midpoint(Midpoint<M>),
  RK4(RK4<M>),
}

impl<M: Model> Integrator<M> for SwappableIntegrator<M>
where
  for<'a> &'a M::State: IntoIterator<Item = &'a M::S>,
  for<'a> &'a mut M::State: IntoIterator<Item = &'a mut M::S>,
{
  type Settings = IntegratorType;

  fn new(t: IntegratorType) -> Self {
    match t {
      IntegratorType::Euler => Self::Euler(Euler::new(EulerSettings {})),
      IntegratorType::SemiImplicitEuler => Self::SemiImplicitEuler(
        SemiImplicitEuler::new(SemiImplicitEulerSettings {}),
      ),
      IntegratorType::Midpoint => {
        Self::Midpoint(Midpoint::new(MidpointSettings {}))
      }
      IntegratorType::Rk4 => Self::RK4(RK4::new(RK4Settings {})),
    }
  }

  fn step_internal(
    &mut self,
    model: &M,
    state: &mut M::State,
    time: &M::S,
    time_step: &M::S,
  ) {
    match self {
      Self::Euler(method) => {
        method.step_internal(model, state, time, time_step)
      }
      Self::SemiImplicitEuler(method) => {
        method.step_internal(model, state, time, time_step)
      }
      Self::Midpoint(method) => {
        method.step_internal(model, state, time, time_step)
      }
      Self::RK4(method) => method.step_internal(model, state, time, time_step),
    }
  }
}
