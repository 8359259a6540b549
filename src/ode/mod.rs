pub mod euler;
pub mod integrator;
pub mod midpoint;
pub mod model;
pub mod null_settings;
pub mod rk4;
pub mod semi_implicit_euler;
pub mod swappable_integrator;

pub use euler::{Euler, EulerSettings};
pub use integrator::Integrator;
pub use midpoint::{Midpoint, MidpointSettings};
pub use model::{Model, ModelState};
pub use null_settings::NullSettings;
pub use rk4::{RK4Settings, RK4};
pub use semi_implicit_euler::{SemiImplicitEuler, SemiImplicitEulerSettings};
pub use swappable_integrator::{IntegratorType, SwappableIntegrator};

#[cfg(test)]
mod tests;
