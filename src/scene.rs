use nalgebra::Point3;

#[derive(Clone, Debug, PartialEq)]
pub struct CameraInfo {
  pub eye: Point3<f32>,
  pub at: Point3<f32>,
}

pub trait Scene {
  fn default_camera_info(&self) -> CameraInfo;

  /// Advances the scene by one step of `delta_secs`.
  fn update(&mut self, delta_secs: f32);
}
