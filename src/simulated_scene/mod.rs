pub mod base;
pub mod scene_model;
pub mod vessel;

pub use base::SimulatedScene;
pub use scene_model::{ParticleModel, ParticleState};
pub use vessel::Vessel;

pub type S = f32;
