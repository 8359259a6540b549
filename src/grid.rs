use crate::geometry::Aabb;
use crate::simulated_scene::S;
use crate::{GatheringError, Result};
use nalgebra::Vector3;
use std::ops::{Index, IndexMut};

pub type CellCoords = [usize; 3];

/// Largest number of cells any array or grid may hold.
pub const MAX_CELLS: usize = 1 << 24;

/// Total cell count of `size`, rejecting sizes above [`MAX_CELLS`].
pub fn cell_count(size: [usize; 3]) -> Result<usize> {
  size
    .iter()
    .try_fold(1usize, |count, &len| count.checked_mul(len))
    .filter(|&count| count <= MAX_CELLS)
    .ok_or_else(|| {
      GatheringError::invalid_parameter(
        "cells",
        format!(
          "{} x {} x {} cells exceed the limit of {}",
          size[0], size[1], size[2], MAX_CELLS
        ),
      )
    })
}

/// Dense 3D array, x varies fastest in memory.
#[derive(Clone, Debug)]
pub struct Array3<T> {
  data: Vec<T>,
  size: [usize; 3],
}

impl<T: Clone> Array3<T> {
  pub fn new(size: [usize; 3], fill: T) -> Result<Self> {
    Ok(Self {
      data: vec![fill; cell_count(size)?],
      size,
    })
  }

  /// Array of the same size filled with `fill`.
  pub fn blank_like<U: Clone>(&self, fill: U) -> Array3<U> {
    Array3 {
      data: vec![fill; self.data.len()],
      size: self.size,
    }
  }
}

impl<T> Array3<T> {
  pub fn size(&self) -> [usize; 3] {
    self.size
  }

  fn linear_index(&self, [x, y, z]: CellCoords) -> Option<usize> {
    if x < self.size[0] && y < self.size[1] && z < self.size[2] {
      Some(x + y * self.size[0] + z * self.size[0] * self.size[1])
    } else {
      None
    }
  }

  pub fn get(&self, coords: CellCoords) -> Option<&T> {
    self.linear_index(coords).map(|i| &self.data[i])
  }

  pub fn get_mut(&mut self, coords: CellCoords) -> Option<&mut T> {
    self.linear_index(coords).map(move |i| &mut self.data[i])
  }

  /// Element at `coords + offset`, `None` when that leaves the array.
  pub fn get_offset(&self, coords: CellCoords, offset: [isize; 3]) -> Option<&T> {
    let mut shifted = [0; 3];
    for i in 0..3 {
      let v = coords[i] as isize + offset[i];
      if v < 0 {
        return None;
      }
      shifted[i] = v as usize;
    }
    self.get(shifted)
  }

  /// All coordinates, x outermost and z innermost.
  pub fn coords(&self) -> impl Iterator<Item = CellCoords> {
    let [sx, sy, sz] = self.size;
    (0..sx).flat_map(move |x| {
      (0..sy).flat_map(move |y| (0..sz).map(move |z| [x, y, z]))
    })
  }

  pub fn values_mut(&mut self) -> std::slice::IterMut<'_, T> {
    self.data.iter_mut()
  }
}

impl<T> Index<CellCoords> for Array3<T> {
  type Output = T;

  fn index(&self, coords: CellCoords) -> &T {
    match self.linear_index(coords) {
      Some(i) => &self.data[i],
      None => panic!("{:?} out of bounds for {:?}", coords, self.size),
    }
  }
}

impl<T> IndexMut<CellCoords> for Array3<T> {
  fn index_mut(&mut self, coords: CellCoords) -> &mut T {
    match self.linear_index(coords) {
      Some(i) => &mut self.data[i],
      None => panic!("{:?} out of bounds for {:?}", coords, self.size),
    }
  }
}

/// Uniform grid over a bounding box where each cell holds element indices.
///
/// Positions outside the box are clamped into the border cells.
#[derive(Clone, Debug)]
pub struct Grid {
  cells: Array3<Vec<usize>>,
  bounds: Aabb,
  cell_size: Vector3<S>,
  // offsets of the 2x2x2 block towards each octant of a cell
  neighbours: [Vec<[isize; 3]>; 8],
}

impl Grid {
  pub fn new(resolution: [usize; 3], bounds: Aabb) -> Result<Self> {
    let resolution = [
      resolution[0].max(1),
      resolution[1].max(1),
      resolution[2].max(1),
    ];
    let cell_size = bounds.size().component_div(&Vector3::new(
      resolution[0] as S,
      resolution[1] as S,
      resolution[2] as S,
    ));

    let mut neighbours: [Vec<[isize; 3]>; 8] = Default::default();
    for (octant, offsets) in neighbours.iter_mut().enumerate() {
      let low = |bit: usize| ((octant >> bit) & 1) as isize - 1;
      for x in low(0)..low(0) + 2 {
        for y in low(1)..low(1) + 2 {
          for z in low(2)..low(2) + 2 {
            offsets.push([x, y, z]);
          }
        }
      }
    }

    Ok(Self {
      cells: Array3::new(resolution, Vec::new())?,
      bounds,
      cell_size,
      neighbours,
    })
  }

  /// Grid whose cells are at least `min_cell_size` wide along every axis.
  pub fn with_min_cell_size(bounds: Aabb, min_cell_size: S) -> Result<Self> {
    let size = bounds.size();
    let per_axis = |i: usize| (size[i] / min_cell_size).floor().max(1.0) as usize;
    Self::new([per_axis(0), per_axis(1), per_axis(2)], bounds)
  }

  pub fn resolution(&self) -> [usize; 3] {
    self.cells.size()
  }

  /// Per-cell array matching this grid's resolution.
  pub fn blank_cells<U: Clone>(&self, fill: U) -> Array3<U> {
    self.cells.blank_like(fill)
  }

  pub fn bounds(&self) -> &Aabb {
    &self.bounds
  }

  pub fn cell_size(&self) -> &Vector3<S> {
    &self.cell_size
  }

  pub fn coords(&self, pos: &Vector3<S>) -> CellCoords {
    let res = self.resolution();
    let rel = (pos - self.bounds.min).component_div(&self.cell_size);
    let mut coords = [0; 3];
    for i in 0..3 {
      // NaN casts to 0
      coords[i] = (rel[i].floor().max(0.0) as usize).min(res[i] - 1);
    }
    coords
  }

  /// Inclusive range of cells overlapped by `aabb`, `None` if it misses
  /// the grid entirely.
  pub fn coords_area(&self, aabb: &Aabb) -> Option<(CellCoords, CellCoords)> {
    if !aabb.intersects(&self.bounds) {
      return None;
    }
    Some((self.coords(&aabb.min), self.coords(&aabb.max)))
  }

  pub fn cell_center(&self, [x, y, z]: CellCoords) -> Vector3<S> {
    self.bounds.min
      + self.cell_size.component_mul(&Vector3::new(
        x as S + 0.5,
        y as S + 0.5,
        z as S + 0.5,
      ))
  }

  pub fn cell(&self, coords: CellCoords) -> &[usize] {
    &self.cells[coords]
  }

  pub fn insert(&mut self, coords: CellCoords, idx: usize) {
    self.cells[coords].push(idx);
  }

  /// Inserts `idx` into every cell overlapped by `aabb`.
  pub fn insert_area(&mut self, aabb: &Aabb, idx: usize) {
    if let Some((min, max)) = self.coords_area(aabb) {
      for x in min[0]..=max[0] {
        for y in min[1]..=max[1] {
          for z in min[2]..=max[2] {
            self.cells[[x, y, z]].push(idx);
          }
        }
      }
    }
  }

  pub fn clear(&mut self) {
    self.cells.values_mut().for_each(Vec::clear);
  }

  /// Which octant of its cell `pos` lies in, as used by
  /// `close_unique_elements`.
  pub fn octant(&self, coords: CellCoords, pos: &Vector3<S>) -> usize {
    let deviation = pos - self.cell_center(coords);
    (0..3)
      .filter(|&i| deviation[i] > 0.0)
      .fold(0, |octant, i| octant | (1 << i))
  }

  /// Pushes every element with an index above `self_idx` found in the 2x2x2
  /// block of cells around `coords` towards `octant`.
  ///
  /// Reports each pair once as long as cells are at least two interaction
  /// radii wide.
  pub fn close_unique_elements(
    &self,
    coords: CellCoords,
    self_idx: usize,
    octant: usize,
    output: &mut Vec<usize>,
  ) {
    for offset in &self.neighbours[octant] {
      if let Some(cell) = self.cells.get_offset(coords, *offset) {
        output.extend(cell.iter().filter(|&&e| e > self_idx));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn unit_grid(res: usize) -> Grid {
    Grid::new(
      [res, res, res],
      Aabb::new(Vector3::zeros(), Vector3::repeat(1.0)),
    )
    .unwrap()
  }

  #[test]
  fn array_indexing() {
    let mut array = Array3::new([2, 3, 4], 0).unwrap();
    array[[1, 2, 3]] = 7;
    assert_eq!(array.get([1, 2, 3]), Some(&7));
    assert_eq!(array.get([2, 0, 0]), None);
    assert_eq!(array.get_offset([0, 0, 0], [-1, 0, 0]), None);
    assert_eq!(array.get_offset([0, 1, 2], [1, 1, 1]), Some(&7));
    assert_eq!(array.coords().count(), 24);
    assert_eq!(array.coords().nth(1), Some([0, 0, 1]));
  }

  #[test]
  fn coords_clamp_outside_positions() {
    let grid = unit_grid(4);
    assert_eq!(grid.coords(&Vector3::new(0.3, 0.6, 0.99)), [1, 2, 3]);
    assert_eq!(grid.coords(&Vector3::new(-5.0, 0.0, 7.0)), [0, 0, 3]);
    assert_eq!(grid.coords(&Vector3::new(1.0, 1.0, 1.0)), [3, 3, 3]);
  }

  #[test]
  fn cell_centers() {
    let grid = unit_grid(4);
    assert_eq!(grid.cell_center([0, 1, 3]), Vector3::new(0.125, 0.375, 0.875));
  }

  #[test]
  fn resolution_from_cell_size() {
    let grid = Grid::with_min_cell_size(
      Aabb::new(Vector3::zeros(), Vector3::new(1.0, 0.1, 3.0)),
      0.25,
    )
    .unwrap();
    assert_eq!(grid.resolution(), [4, 1, 12]);
  }

  #[test]
  fn oversized_grids_are_rejected() {
    assert!(cell_count([256, 256, 256]).is_ok());
    assert!(matches!(
      Array3::new([257, 256, 256], false),
      Err(GatheringError::InvalidParameter { .. })
    ));
    assert!(Array3::new([usize::MAX, 2, 1], 0u8).is_err());

    let huge = Aabb::new(Vector3::zeros(), Vector3::repeat(10000.0));
    assert!(Grid::with_min_cell_size(huge, 0.3).is_err());
    let endless = Aabb::new(Vector3::zeros(), Vector3::new(S::INFINITY, 1.0, 1.0));
    assert!(Grid::with_min_cell_size(endless, 0.3).is_err());
  }

  #[test]
  fn insert_area_covers_overlap() {
    let mut grid = unit_grid(4);
    grid.insert_area(
      &Aabb::new(Vector3::new(0.2, 0.2, 0.2), Vector3::new(0.3, 0.6, 0.2)),
      5,
    );
    assert_eq!(grid.cell([0, 0, 0]), &[5]);
    assert_eq!(grid.cell([1, 2, 0]), &[5]);
    assert!(grid.cell([0, 0, 1]).is_empty());

    grid.insert_area(
      &Aabb::new(Vector3::repeat(2.0), Vector3::repeat(3.0)),
      6,
    );
    assert!(!grid.cell([3, 3, 3]).contains(&6));

    grid.clear();
    assert!(grid.cell([0, 0, 0]).is_empty());
  }

  #[test]
  fn close_elements_in_octant() {
    let mut grid = unit_grid(4);
    let pos = Vector3::new(0.45, 0.45, 0.45); // upper octant of cell [1,1,1]
    let coords = grid.coords(&pos);
    grid.insert(coords, 0);
    grid.insert([2, 2, 2], 1);
    grid.insert([0, 0, 0], 2);
    grid.insert([2, 1, 1], 3);

    let octant = grid.octant(coords, &pos);
    assert_eq!(octant, 7);

    let mut close = Vec::new();
    grid.close_unique_elements(coords, 0, octant, &mut close);
    close.sort();
    assert_eq!(close, vec![1, 3]);

    // lower indices are skipped
    close.clear();
    grid.close_unique_elements([2, 2, 2], 1, 0, &mut close);
    assert_eq!(close, vec![3]);
  }
}
