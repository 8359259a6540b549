use crate::grid::Array3;
use crate::mesh::{Face, LoadedMesh};
use crate::Result;
use nalgebra::Vector3;
use std::collections::HashMap;

const CUBE_CROSS: [[[u8; 5]; 5]; 5] = [
  [[0, 0, 0, 0, 0], [0, 0, 0, 0, 0], [1, 1, 1, 1, 1], [0, 0, 0, 0, 0], [0, 0, 0, 0, 0]],
  [[0, 0, 0, 0, 0], [0, 0, 0, 0, 0], [1, 0, 1, 0, 1], [0, 0, 0, 0, 0], [0, 0, 0, 0, 0]],
  [[1, 1, 1, 1, 1], [1, 0, 1, 0, 1], [1, 1, 1, 1, 1], [1, 0, 1, 0, 1], [1, 1, 1, 1, 1]],
  [[0, 0, 0, 0, 0], [0, 0, 0, 0, 0], [1, 0, 1, 0, 1], [0, 0, 0, 0, 0], [0, 0, 0, 0, 0]],
  [[0, 0, 0, 0, 0], [0, 0, 0, 0, 0], [1, 1, 1, 1, 1], [0, 0, 0, 0, 0], [0, 0, 0, 0, 0]],
];

#[derive(Debug, Clone)]
pub struct VoxelObject {
  occupied: Array3<bool>,
}

impl VoxelObject {
  pub fn new(size: [usize; 3]) -> Result<Self> {
    Ok(Self {
      occupied: Array3::new(size, false)?,
    })
  }

  /// Completely filled box of `size` voxels.
  pub fn solid(size: [usize; 3]) -> Result<Self> {
    Ok(Self {
      occupied: Array3::new(size, true)?,
    })
  }

  /// Three perpendicular bars with hollow pockets, 5 voxels wide.
  pub fn cube_cross() -> Result<Self> {
    let mut object = Self::new([5, 5, 5])?;
    for (x, plane) in CUBE_CROSS.iter().enumerate() {
      for (y, row) in plane.iter().enumerate() {
        for (z, &value) in row.iter().enumerate() {
          object.set([x, y, z], value == 1);
        }
      }
    }
    Ok(object)
  }

  pub fn set(&mut self, coords: [usize; 3], value: bool) {
    if let Some(cell) = self.occupied.get_mut(coords) {
      *cell = value;
    }
  }

  pub fn is_occupied(&self, coords: [usize; 3]) -> bool {
    self.occupied.get(coords).copied().unwrap_or(false)
  }

  fn is_occupied_offset(&self, coords: [usize; 3], offset: [isize; 3]) -> bool {
    self
      .occupied
      .get_offset(coords, offset)
      .copied()
      .unwrap_or(false)
  }

  /// Surface between occupied and empty voxels, two triangles per exposed
  /// voxel face, wound counter clockwise seen from outside.
  ///
  /// Normals are shared per direction in the order -x, +x, -y, +y, -z, +z.
  pub fn to_mesh(&self, name: &str, scale: f32) -> LoadedMesh {
    let mut mesh = LoadedMesh {
      name: Some(name.to_string()),
      ..LoadedMesh::default()
    };
    let mut vertex_ids: HashMap<[usize; 3], usize> = HashMap::new();

    for axis in 0..3 {
      for forward in 0..2 {
        let mut normal = Vector3::zeros();
        normal[axis] = if forward == 1 { 1.0 } else { -1.0 };
        mesh.normals.push(normal);
      }
    }

    for coords in self.occupied.coords() {
      if !self.is_occupied(coords) {
        continue;
      }

      for direction in 0..6 {
        let axis = direction / 2;
        let forward = direction % 2;
        let left = (axis + 2) % 3;
        let right = (axis + 1) % 3;

        let mut offset = [0isize; 3];
        offset[axis] = forward as isize * 2 - 1;
        if self.is_occupied_offset(coords, offset) {
          continue;
        }

        let mut corner = |d_left: usize, d_right: usize| {
          let mut p = coords;
          p[axis] += forward;
          p[left] += d_left;
          p[right] += d_right;
          let next_id = mesh.vertices.len();
          *vertex_ids.entry(p).or_insert_with(|| {
            mesh.vertices.push(Vector3::new(
              p[0] as f32 * scale,
              p[1] as f32 * scale,
              p[2] as f32 * scale,
            ));
            next_id
          })
        };

        let zero = corner(0, 0);
        let only_left = corner(1, 0);
        let both = corner(1, 1);
        let only_right = corner(0, 1);

        // left x right points along -axis
        let quad = if forward == 1 {
          [[zero, only_right, both], [zero, both, only_left]]
        } else {
          [[zero, only_left, both], [zero, both, only_right]]
        };
        for vertices in &quad {
          mesh.faces.push(Face {
            vertices: *vertices,
            normals: Some([direction; 3]),
          });
        }
      }
    }

    mesh
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn single_voxel_is_closed_cube() {
    let mesh = VoxelObject::solid([1, 1, 1]).unwrap().to_mesh("cube", 2.0);
    assert_eq!(mesh.vertices.len(), 8);
    assert_eq!(mesh.faces.len(), 12);

    let (triangles, skipped) = mesh.triangles();
    assert_eq!(skipped, 0);
    let center = Vector3::repeat(1.0);
    for triangle in &triangles {
      // every normal points away from the centre
      assert!((triangle.a - center).dot(&triangle.normal) > 0.0);
      // winding and vertex normals agree
      let winding = (triangle.b - triangle.a).cross(&(triangle.c - triangle.a));
      assert!(winding.dot(&triangle.normal) > 0.0);
    }
  }

  #[test]
  fn shared_faces_are_removed() {
    let mesh = VoxelObject::solid([2, 1, 1]).unwrap().to_mesh("bar", 1.0);
    // 10 exposed faces
    assert_eq!(mesh.faces.len(), 20);
    assert_eq!(mesh.vertices.len(), 12);
  }

  #[test]
  fn cube_cross_matches_layout() {
    let object = VoxelObject::cube_cross().unwrap();
    assert!(object.is_occupied([2, 2, 2]));
    assert!(object.is_occupied([0, 2, 4]));
    assert!(!object.is_occupied([0, 0, 0]));
    assert!(!object.is_occupied([2, 1, 1]));
    assert!(!object.is_occupied([5, 0, 0]));

    let mesh = object.to_mesh("cube_cross", 1.0);
    let (triangles, _) = mesh.triangles();
    assert_eq!(triangles.len(), mesh.faces.len());
  }
}
