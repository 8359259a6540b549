use crate::geometry::{Aabb, Ray, Triangle};
use crate::grid::{CellCoords, Grid};
use crate::mesh::LoadedMesh;
use crate::simulated_scene::S;
use crate::{GatheringError, Result};
use nalgebra::Vector3;
use std::collections::HashSet;

/// The closed triangle surface particles are kept inside of.
#[derive(Clone, Debug)]
pub struct Vessel {
  triangles: Vec<Triangle>,
  bounds: Aabb,
  cells: Grid,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Hit {
  distance: S,
  entering: bool,
}

impl Vessel {
  /// Builds the vessel and its broad phase grid with `cells_per_axis` cells
  /// along each axis.
  pub fn new(mesh: &LoadedMesh, cells_per_axis: usize) -> Result<Self> {
    if cells_per_axis == 0 {
      return Err(GatheringError::invalid_parameter(
        "vessel.cells",
        "need at least one cell per axis",
      ));
    }

    let (triangles, skipped) = mesh.triangles();
    if skipped > 0 {
      log::warn!("skipped {} degenerate vessel triangles", skipped);
    }

    let bounds = Aabb::from_points(
      triangles.iter().flat_map(|t| [&t.a, &t.b, &t.c]),
    )
    .ok_or_else(|| {
      GatheringError::InvalidMesh("mesh has no usable faces".to_string())
    })?;

    let size = bounds.size();
    if !size.iter().all(|extent| extent.is_finite()) {
      return Err(GatheringError::InvalidMesh(format!(
        "vessel extent {} x {} x {} isn't finite",
        size[0], size[1], size[2]
      )));
    }
    if (0..3).any(|i| size[i] <= 0.0) {
      return Err(GatheringError::InvalidMesh(format!(
        "vessel is flat, extent {} x {} x {}",
        size[0], size[1], size[2]
      )));
    }

    let mut cells = Grid::new([cells_per_axis; 3], bounds)?;
    for (idx, triangle) in triangles.iter().enumerate() {
      cells.insert_area(&triangle.bb, idx);
    }

    log::debug!(
      "vessel with {} triangles, bounds {:?} to {:?}",
      triangles.len(),
      bounds.min.as_slice(),
      bounds.max.as_slice()
    );

    Ok(Self {
      triangles,
      bounds,
      cells,
    })
  }

  pub fn triangles(&self) -> &[Triangle] {
    &self.triangles
  }

  pub fn bounds(&self) -> &Aabb {
    &self.bounds
  }

  pub fn cells(&self) -> &Grid {
    &self.cells
  }

  /// Indices of triangles whose boxes overlap `bb`, sorted and unique.
  pub fn candidate_triangles(&self, bb: &Aabb, output: &mut Vec<usize>) {
    output.clear();
    if let Some((min, max)) = self.cells.coords_area(bb) {
      for x in min[0]..=max[0] {
        for y in min[1]..=max[1] {
          for z in min[2]..=max[2] {
            output.extend(
              self
                .cells
                .cell([x, y, z])
                .iter()
                .filter(|&&idx| self.triangles[idx].bb.intersects(bb)),
            );
          }
        }
      }
    }
    output.sort_unstable();
    output.dedup();
  }

  /// Hits along a ray parallel to +x through the cell row at `y, z`,
  /// ordered by distance. Coincident hits of the same kind (a shared edge)
  /// are reported once.
  fn row_hits(&self, ray: &Ray, y: usize, z: usize) -> Vec<Hit> {
    let res = self.cells.resolution();
    let mut row_triangles: Vec<usize> = (0..res[0])
      .flat_map(|x| self.cells.cell([x, y, z]).iter().copied())
      .collect();
    row_triangles.sort_unstable();
    row_triangles.dedup();

    let mut hits: Vec<Hit> = row_triangles
      .iter()
      .filter_map(|&idx| {
        let triangle = &self.triangles[idx];
        triangle.intersect(ray).map(|distance| Hit {
          distance,
          entering: ray.direction.dot(&triangle.normal) < 0.0,
        })
      })
      .collect();
    hits.sort_by(|l, r| l.distance.total_cmp(&r.distance));

    let tolerance = self.bounds.size().max() * 1e-5;
    hits.dedup_by(|next, prev| {
      next.entering == prev.entering
        && (next.distance - prev.distance).abs() <= tolerance
    });
    hits
  }

  /// Cells whose centre lies inside the vessel, eroded once so no chosen
  /// cell touches the surface.
  ///
  /// Order is x outermost, then y, then z.
  pub fn interior_cells(&self) -> Vec<CellCoords> {
    let res = self.cells.resolution();
    let mut inside = self.cells.blank_cells(false);
    let start_x = self.bounds.min[0] - 1.0;

    for y in 0..res[1] {
      for z in 0..res[2] {
        let center = self.cells.cell_center([0, y, z]);
        let ray = Ray {
          origin: Vector3::new(start_x, center[1], center[2]),
          direction: Vector3::new(1.0, 0.0, 0.0),
        };

        let hits = self.row_hits(&ray, y, z);
        let mut next_hit = 0;
        let mut is_inside = false;
        for x in 0..res[0] {
          let distance = self.cells.cell_center([x, y, z])[0] - start_x;
          while next_hit < hits.len() && hits[next_hit].distance <= distance {
            is_inside = hits[next_hit].entering;
            next_hit += 1;
          }
          inside[[x, y, z]] = is_inside;
        }
      }
    }

    const FACE_NEIGHBOURS: [[isize; 3]; 6] = [
      [-1, 0, 0],
      [1, 0, 0],
      [0, -1, 0],
      [0, 1, 0],
      [0, 0, -1],
      [0, 0, 1],
    ];

    inside
      .coords()
      .filter(|&coords| {
        inside[coords]
          && FACE_NEIGHBOURS.iter().all(|&offset| {
            inside.get_offset(coords, offset).copied().unwrap_or(false)
          })
      })
      .collect()
  }

  /// Centres of `n` interior cells spread evenly over the interior, skipping
  /// cells that already hold one of `occupied`.
  pub fn seed_positions(
    &self,
    n: usize,
    occupied: &[Vector3<S>],
  ) -> Result<Vec<Vector3<S>>> {
    if n == 0 {
      return Ok(Vec::new());
    }

    let taken: HashSet<CellCoords> =
      occupied.iter().map(|p| self.cells.coords(p)).collect();
    let free: Vec<CellCoords> = self
      .interior_cells()
      .into_iter()
      .filter(|coords| !taken.contains(coords))
      .collect();

    if free.len() < n {
      return Err(GatheringError::InsufficientSpace {
        requested: n,
        available: free.len(),
      });
    }

    Ok(
      (0..n)
        .map(|i| self.cells.cell_center(free[i * free.len() / n]))
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::voxel::VoxelObject;

  fn box_vessel(cells: usize) -> Vessel {
    let mesh = VoxelObject::solid([1, 1, 1]).unwrap().to_mesh("box", 1.0);
    Vessel::new(&mesh, cells).unwrap()
  }

  #[test]
  fn bounds_are_exact() {
    let mesh = VoxelObject::solid([2, 1, 1]).unwrap().to_mesh("bar", 0.5);
    let vessel = Vessel::new(&mesh, 4).unwrap();
    assert_eq!(vessel.bounds().min, Vector3::zeros());
    assert_eq!(vessel.bounds().max, Vector3::new(1.0, 0.5, 0.5));
    assert_eq!(vessel.triangles().len(), 20);
  }

  #[test]
  fn flat_and_empty_meshes_rejected() {
    let empty = LoadedMesh::default();
    assert!(matches!(
      Vessel::new(&empty, 4),
      Err(GatheringError::InvalidMesh(_))
    ));

    let flat = crate::mesh::parse_mesh(
      "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n".as_bytes(),
      None,
    )
    .unwrap();
    assert!(matches!(
      Vessel::new(&flat, 4),
      Err(GatheringError::InvalidMesh(_))
    ));

    let cube = VoxelObject::solid([1, 1, 1]).unwrap().to_mesh("box", 1.0);
    assert!(Vessel::new(&cube, 0).is_err());
  }

  #[test]
  fn oversized_cell_grid_rejected() {
    let mesh = VoxelObject::solid([1, 1, 1]).unwrap().to_mesh("box", 1.0);
    assert!(matches!(
      Vessel::new(&mesh, 300),
      Err(GatheringError::InvalidParameter { .. })
    ));
  }

  #[test]
  fn infinite_extent_rejected() {
    let mut mesh = VoxelObject::solid([1, 1, 1]).unwrap().to_mesh("box", 1.0);
    for vertex in &mut mesh.vertices {
      vertex[0] = S::INFINITY;
    }
    assert!(matches!(
      Vessel::new(&mesh, 4),
      Err(GatheringError::InvalidMesh(_))
    ));
  }

  #[test]
  fn box_interior_is_eroded_border() {
    let vessel = box_vessel(6);
    let interior = vessel.interior_cells();
    // 6^3 cells, the outer shell is removed by erosion
    assert_eq!(interior.len(), 4 * 4 * 4);
    assert_eq!(interior[0], [1, 1, 1]);
    assert!(interior
      .iter()
      .all(|c| c.iter().all(|&v| (1..=4).contains(&v))));
  }

  #[test]
  fn concave_interior_excludes_pockets() {
    let mesh = VoxelObject::cube_cross().unwrap().to_mesh("cube_cross", 1.0);
    let vessel = Vessel::new(&mesh, 25).unwrap();
    let interior = vessel.interior_cells();
    assert!(!interior.is_empty());

    let object = VoxelObject::cube_cross().unwrap();
    for coords in interior {
      let center = vessel.cells().cell_center(coords);
      let voxel = [
        center[0].floor() as usize,
        center[1].floor() as usize,
        center[2].floor() as usize,
      ];
      assert!(object.is_occupied(voxel), "{:?} is not solid", voxel);
    }
  }

  #[test]
  fn seeding_spreads_over_interior() {
    let vessel = box_vessel(6);
    let positions = vessel.seed_positions(8, &[]).unwrap();
    assert_eq!(positions.len(), 8);
    assert_eq!(positions[0], vessel.cells().cell_center([1, 1, 1]));
    for p in &positions {
      assert!(vessel.bounds().contains(p));
    }

    match vessel.seed_positions(65, &[]) {
      Err(GatheringError::InsufficientSpace {
        requested,
        available,
      }) => {
        assert_eq!(requested, 65);
        assert_eq!(available, 64);
      }
      other => panic!("expected insufficient space, got {:?}", other),
    }
  }

  #[test]
  fn seeding_skips_occupied_cells() {
    let vessel = box_vessel(6);
    let first = vessel.seed_positions(64, &[]).unwrap();
    assert!(matches!(
      vessel.seed_positions(1, &first),
      Err(GatheringError::InsufficientSpace { available: 0, .. })
    ));

    let half = vessel.seed_positions(32, &[]).unwrap();
    let rest = vessel.seed_positions(32, &half).unwrap();
    for p in &rest {
      assert!(!half.contains(p));
    }
  }

  #[test]
  fn candidates_are_unique_and_local() {
    let vessel = box_vessel(4);
    let mut candidates = Vec::new();

    // corner touches three faces, two triangles each at most
    vessel.candidate_triangles(
      &Aabb::around_sphere(&Vector3::new(0.02, 0.02, 0.02), 0.05),
      &mut candidates,
    );
    assert!(!candidates.is_empty());
    let mut unique = candidates.clone();
    unique.dedup();
    assert_eq!(unique, candidates);
    for &idx in &candidates {
      assert!(vessel.triangles()[idx].bb.min.min() <= 0.07);
    }

    // the centre is far from every wall
    vessel.candidate_triangles(
      &Aabb::around_sphere(&Vector3::repeat(0.5), 0.05),
      &mut candidates,
    );
    assert!(candidates.is_empty());
  }
}
