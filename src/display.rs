use crate::simulated_scene::SimulatedScene;
use crate::{CameraInfo, Scene};
use kiss3d::camera::FirstPerson;
use kiss3d::light::Light;
use kiss3d::nalgebra::{Point3, Translation3, Vector3};
use kiss3d::resource::Mesh as Kiss3dMesh;
use kiss3d::scene::SceneNode;
use kiss3d::window::Window;
use std::cell::RefCell;
use std::rc::Rc;

// kiss3d meshes index vertices with u16
const TRIANGLES_PER_MESH: usize = u16::MAX as usize / 3;

fn point(v: &nalgebra::Vector3<f32>) -> Point3<f32> {
  Point3::new(v[0], v[1], v[2])
}

/// Interactive window showing the vessel as a wireframe and the particles
/// as spheres.
pub struct Viewer {
  window: Window,
  camera: FirstPerson,
  particles: Vec<SceneNode>,
}

impl Viewer {
  pub fn new(window_name: &str, scene: &SimulatedScene) -> Self {
    let mut window = Window::new(window_name);
    window.set_light(Light::StickToCamera);

    for chunk in scene.vessel().triangles().chunks(TRIANGLES_PER_MESH) {
      let coords = chunk
        .iter()
        .flat_map(|t| [point(&t.a), point(&t.b), point(&t.c)])
        .collect();
      let faces = (0..chunk.len() as u16)
        .map(|i| Point3::new(3 * i, 3 * i + 1, 3 * i + 2))
        .collect();

      let mesh =
        Rc::new(RefCell::new(Kiss3dMesh::new(coords, faces, None, None, false)));
      let mut node = window.add_mesh(mesh, Vector3::new(1.0, 1.0, 1.0));
      node.enable_backface_culling(false);
      node.set_surface_rendering_activation(false);
      node.set_lines_color(Some(Point3::new(0.6, 0.6, 0.6)));
      node.set_lines_width(1.0);
    }

    let CameraInfo { eye, at } = scene.default_camera_info();
    let camera = FirstPerson::new(
      Point3::new(eye.x, eye.y, eye.z),
      Point3::new(at.x, at.y, at.z),
    );

    let mut viewer = Self {
      window,
      camera,
      particles: Vec::new(),
    };
    viewer.sync(scene);
    viewer
  }

  fn sync(&mut self, scene: &SimulatedScene) {
    while self.particles.len() < scene.positions().len() {
      let mut node = self.window.add_sphere(scene.radius());
      node.set_color(1.0, 0.8, 0.2);
      self.particles.push(node);
    }

    for (node, pos) in self.particles.iter_mut().zip(scene.positions()) {
      node.set_local_translation(Translation3::new(pos[0], pos[1], pos[2]));
    }
  }

  /// Draws one frame, `false` once the window was closed.
  pub fn render(&mut self, scene: &SimulatedScene) -> bool {
    self.sync(scene);
    self.window.render_with_camera(&mut self.camera)
  }
}
