pub mod config;
#[cfg(feature = "viewer")]
pub mod display;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod imaging;
pub mod mesh;
pub mod ode;
pub mod scene;
pub mod session;
pub mod simulated_scene;
pub mod simulation;
pub mod utils;
pub mod voxel;

pub use config::SimulationSettings;
pub use error::{GatheringError, Result};
pub use imaging::ImageContainer;
pub use mesh::{load_mesh, load_mesh_with_transform, LoadedMesh};
pub use scene::{CameraInfo, Scene};
pub use session::{Session, SessionSlot};
pub use simulated_scene::SimulatedScene;
pub use simulation::{Direction, ForceSchedule, ForceStep, Simulation};
pub use voxel::VoxelObject;
