use crate::config::ImageSettings;
use crate::geometry::Aabb;
use crate::simulated_scene::S;
use image::{GrayImage, Luma};
use nalgebra::Vector3;
use rayon::prelude::*;

/// Depth in front of the vessel where the first slice starts.
const SLICE_LEAD: S = 0.1;

#[derive(Clone, Debug)]
pub struct OrthoCamera {
  eye: Vector3<S>,
  forward: Vector3<S>,
  right: Vector3<S>,
  up: Vector3<S>,
  half_width: S,
  half_height: S,
}

impl OrthoCamera {
  /// Camera at `eye` looking along `forward`, the image covering
  /// `±half_width` to the right and `±half_height` along `up`.
  pub fn new(
    eye: Vector3<S>,
    forward: &Vector3<S>,
    up: &Vector3<S>,
    half_width: S,
    half_height: S,
  ) -> Self {
    let forward = forward.normalize();
    let right = forward.cross(up).normalize();
    Self {
      eye,
      forward,
      up: right.cross(&forward),
      right,
      half_width,
      half_height,
    }
  }

  pub fn depth(&self, p: &Vector3<S>) -> S {
    (p - self.eye).dot(&self.forward)
  }

  /// Continuous pixel coordinates of `p`, `(0, 0)` is the top left corner.
  pub fn project(&self, p: &Vector3<S>, width: u32, height: u32) -> (S, S) {
    let rel = p - self.eye;
    let x = (rel.dot(&self.right) + self.half_width) / (2.0 * self.half_width);
    let y =
      (self.half_height - rel.dot(&self.up)) / (2.0 * self.half_height);
    (x * width as S, y * height as S)
  }

  /// Fills the disc of world space `radius` around `center`. The pixel
  /// holding the centre is always lit so tiny discs stay visible.
  pub fn draw_disc(
    &self,
    image: &mut GrayImage,
    center: &Vector3<S>,
    radius: S,
    value: u8,
  ) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return;
    }
    let pixel_w = 2.0 * self.half_width / width as S;
    let pixel_h = 2.0 * self.half_height / height as S;
    let (cx, cy) = self.project(center, width, height);

    let clamp_x = |v: S| v.floor().max(0.0).min((width - 1) as S) as u32;
    let clamp_y = |v: S| v.floor().max(0.0).min((height - 1) as S) as u32;

    let in_x = (0.0..width as S).contains(&cx);
    let in_y = (0.0..height as S).contains(&cy);
    if in_x && in_y {
      image.put_pixel(cx as u32, cy as u32, Luma([value]));
    }

    let (rx, ry) = (radius / pixel_w, radius / pixel_h);
    if cx + rx < 0.0 || cy + ry < 0.0 {
      return;
    }
    if cx - rx >= width as S || cy - ry >= height as S {
      return;
    }

    for row in clamp_y(cy - ry)..=clamp_y(cy + ry) {
      let dy = (row as S + 0.5 - cy) * pixel_h;
      for col in clamp_x(cx - rx)..=clamp_x(cx + rx) {
        let dx = (col as S + 0.5 - cx) * pixel_w;
        if dx * dx + dy * dy <= radius * radius {
          image.put_pixel(col, row, Luma([value]));
        }
      }
    }
  }

  /// Draws the cross sections of all spheres with the depth slab
  /// `[near, far]`.
  pub fn render_slab(
    &self,
    image: &mut GrayImage,
    positions: &[Vector3<S>],
    radius: S,
    (near, far): (S, S),
    value: u8,
  ) {
    for pos in positions {
      let depth = self.depth(pos);
      let outside = if depth < near {
        near - depth
      } else if depth > far {
        depth - far
      } else {
        0.0
      };
      if outside >= radius {
        continue;
      }

      let disc = (radius * radius - outside * outside).sqrt();
      self.draw_disc(image, pos, disc, value);
    }
  }
}

/// The three overview cameras (from +x, from above, from +z) with their
/// depth ranges.
pub fn view_cameras(bounds: &Aabb, margin: S) -> [(OrthoCamera, (S, S)); 3] {
  let c = bounds.center();
  let h = bounds.half_extents();
  let x = Vector3::x();
  let y = Vector3::y();
  let z = Vector3::z();
  let range = |half: S| (-margin, 2.0 * half + margin);

  [
    (
      OrthoCamera::new(c + x * h.x, &-x, &y, h.z + margin, h.y + margin),
      range(h.x),
    ),
    (
      OrthoCamera::new(
        c + Vector3::new(0.1, h.y, 0.1),
        &-y,
        &z,
        h.x + margin,
        h.z + margin,
      ),
      range(h.y),
    ),
    (slice_camera(bounds, margin), range(h.z)),
  ]
}

/// Camera on the +z face of the vessel looking through it.
pub fn slice_camera(bounds: &Aabb, margin: S) -> OrthoCamera {
  let c = bounds.center();
  let h = bounds.half_extents();
  OrthoCamera::new(
    c + Vector3::z() * h.z,
    &-Vector3::z(),
    &Vector3::y(),
    h.x + margin,
    h.y + margin,
  )
}

/// Depth ranges of `count` equally thick slices covering the vessel front
/// to back.
pub fn slice_ranges(bounds: &Aabb, count: usize) -> Vec<(S, S)> {
  let thickness = (bounds.size().z + SLICE_LEAD) / count as S;
  (0..count)
    .map(|i| {
      (
        -SLICE_LEAD + i as S * thickness,
        -SLICE_LEAD + (i + 1) as S * thickness,
      )
    })
    .collect()
}

/// Image buffers reused between captures.
#[derive(Debug, Clone)]
pub struct ImageContainer {
  width: u32,
  height: u32,
  images: Vec<GrayImage>,
}

impl ImageContainer {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      width,
      height,
      images: Vec::new(),
    }
  }

  pub fn resolution(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  pub fn images(&self) -> &[GrayImage] {
    &self.images
  }

  /// `count` images cleared to `background`.
  fn prepare(&mut self, count: usize, background: u8) -> &mut [GrayImage] {
    let (width, height) = (self.width, self.height);
    self.images.truncate(count);
    for image in &mut self.images {
      if image.dimensions() != (width, height) {
        *image = GrayImage::new(width, height);
      }
      image.pixels_mut().for_each(|p| *p = Luma([background]));
    }
    self.images.resize_with(count, || {
      GrayImage::from_pixel(width, height, Luma([background]))
    });
    &mut self.images
  }

  /// Renders one image per camera and slab, in parallel.
  pub fn render(
    &mut self,
    shots: &[(OrthoCamera, (S, S))],
    positions: &[Vector3<S>],
    radius: S,
    settings: &ImageSettings,
  ) -> &[GrayImage] {
    let images = self.prepare(shots.len(), settings.background);
    images
      .par_iter_mut()
      .zip(shots.par_iter())
      .for_each(|(image, (camera, slab))| {
        camera.render_slab(image, positions, radius, *slab, settings.foreground)
      });
    &self.images
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn bounds() -> Aabb {
    Aabb::new(Vector3::zeros(), Vector3::repeat(2.0))
  }

  fn lit(image: &GrayImage) -> usize {
    image.pixels().filter(|p| p[0] > 0).count()
  }

  fn slices(
    container: &mut ImageContainer,
    positions: &[Vector3<S>],
    count: usize,
  ) -> Vec<GrayImage> {
    let camera = slice_camera(&bounds(), 1.0);
    let shots: Vec<_> = slice_ranges(&bounds(), count)
      .into_iter()
      .map(|range| (camera.clone(), range))
      .collect();
    container
      .render(&shots, positions, 0.05, &ImageSettings::default())
      .to_vec()
  }

  #[test]
  fn slice_ranges_cover_vessel() {
    let ranges = slice_ranges(&bounds(), 4);
    assert_eq!(ranges.len(), 4);
    crate::assert_float_eq!(ranges[0].0, -0.1);
    crate::assert_float_eq!(ranges[3].1, 2.0);
    crate::assert_float_eq!(ranges[1].0, ranges[0].1);
    assert!(slice_ranges(&bounds(), 0).is_empty());
  }

  #[test]
  fn particle_lights_expected_pixel_in_one_slice() {
    let mut container = ImageContainer::new(40, 40);
    // depth 0.5 lies in the second of four slices
    let images = slices(&mut container, &[Vector3::new(1.03, 0.97, 1.5)], 4);

    assert_eq!(images.len(), 4);
    assert_eq!(images[1].get_pixel(20, 20)[0], 255);
    assert_eq!(images[1].get_pixel(0, 0)[0], 0);
    for i in [0, 2, 3] {
      assert_eq!(lit(&images[i]), 0, "slice {} should be empty", i);
    }
  }

  #[test]
  fn rows_start_at_the_top() {
    let mut container = ImageContainer::new(40, 40);
    let images = slices(&mut container, &[Vector3::new(1.03, 1.83, 1.5)], 1);
    // y grows upwards in the world, downwards in the image
    assert_eq!(images[0].get_pixel(20, 11)[0], 255);
    assert_eq!(images[0].get_pixel(20, 28)[0], 0);
  }

  #[test]
  fn sphere_cut_by_slab_is_smaller() {
    let camera = slice_camera(&bounds(), 1.0);
    let mut full = GrayImage::new(400, 400);
    let mut cut = GrayImage::new(400, 400);
    let p = [Vector3::new(1.0, 1.0, 1.0)];
    camera.render_slab(&mut full, &p, 0.05, (0.9, 1.1), 255);
    camera.render_slab(&mut cut, &p, 0.05, (1.04, 1.2), 255);
    assert!(lit(&cut) > 0);
    assert!(lit(&cut) < lit(&full));

    let mut none = GrayImage::new(400, 400);
    camera.render_slab(&mut none, &p, 0.05, (1.06, 1.2), 255);
    assert_eq!(lit(&none), 0);
  }

  #[test]
  fn views_see_every_particle() {
    let mut container = ImageContainer::new(64, 48);
    let shots = view_cameras(&bounds(), 1.0);
    let images = container.render(
      &shots,
      &[Vector3::new(0.5, 1.5, 0.3)],
      0.05,
      &ImageSettings::default(),
    );
    assert_eq!(images.len(), 3);
    for image in images {
      assert_eq!(image.dimensions(), (64, 48));
      assert!(lit(image) > 0);
    }
  }

  #[test]
  fn buffers_are_cleared_between_captures() {
    let mut container = ImageContainer::new(40, 40);
    let images = slices(&mut container, &[Vector3::new(1.0, 1.0, 1.0)], 1);
    assert!(lit(&images[0]) > 0);

    let images = slices(&mut container, &[], 3);
    assert_eq!(images.len(), 3);
    assert!(images.iter().all(|image| lit(image) == 0));
    assert_eq!(container.images().len(), 3);
    assert_eq!(container.resolution(), (40, 40));
  }
}
