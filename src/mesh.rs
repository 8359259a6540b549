use crate::geometry::Triangle;
use crate::{GatheringError, Result};
use nalgebra::{Point3, Transform3, Vector3};
use regex::Regex;
use std::fs::File;
use std::io::{prelude::*, BufReader, ErrorKind};
use std::path::Path;

/// A triangle referencing `LoadedMesh` vertices and, optionally, normals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Face {
  pub vertices: [usize; 3],
  pub normals: Option<[usize; 3]>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedMesh {
  pub name: Option<String>,
  pub vertices: Vec<Vector3<f32>>,
  pub normals: Vec<Vector3<f32>>,
  pub faces: Vec<Face>,
}

impl LoadedMesh {
  /// Collision triangles of the mesh and the number of degenerate faces
  /// that were dropped.
  ///
  /// Triangle normals follow the winding, unless the face's vertex normals
  /// agree on the opposite side, in which case the triangle is flipped.
  pub fn triangles(&self) -> (Vec<Triangle>, usize) {
    let mut skipped = 0;
    let triangles = self
      .faces
      .iter()
      .filter_map(|face| {
        let [a, b, c] = face.vertices;
        let triangle =
          Triangle::new(self.vertices[a], self.vertices[b], self.vertices[c]);
        if triangle.is_none() {
          skipped += 1;
        }
        let triangle = triangle?;

        let flip = face.normals.map_or(false, |normals| {
          let summed: Vector3<f32> =
            normals.iter().map(|&n| self.normals[n]).sum();
          summed.dot(&triangle.normal) < 0.0
        });

        Some(if flip { triangle.flipped() } else { triangle })
      })
      .collect();

    (triangles, skipped)
  }
}

fn parse_error(line: usize, message: impl Into<String>) -> GatheringError {
  GatheringError::Parse {
    line,
    message: message.into(),
  }
}

fn parse_vector(
  line_number: usize,
  captures: &regex::Captures,
) -> Result<Vector3<f32>> {
  let mut vec = Vector3::zeros();
  for i in 0..3 {
    let text = &captures[i + 1];
    vec[i] = text
      .parse::<f32>()
      .ok()
      .filter(|value| value.is_finite())
      .ok_or_else(|| {
        parse_error(line_number, format!("invalid number `{}`", text))
      })?;
  }
  Ok(vec)
}

/// OBJ indices start at 1, negative indices count back from the last
/// element defined so far.
fn resolve_index(line_number: usize, text: &str, count: usize) -> Result<usize> {
  let idx: i64 = text
    .parse()
    .map_err(|_| parse_error(line_number, format!("invalid index `{}`", text)))?;

  let resolved = if idx > 0 {
    idx - 1
  } else {
    count as i64 + idx
  };

  if idx == 0 || resolved < 0 || resolved >= count as i64 {
    Err(parse_error(
      line_number,
      format!("index {} out of range for {} elements", idx, count),
    ))
  } else {
    Ok(resolved as usize)
  }
}

pub fn parse_mesh<R: BufRead>(
  reader: R,
  transform: Option<&Transform3<f32>>,
) -> Result<LoadedMesh> {
  let object_re = Regex::new(r"^o\s+(.+?)\s*$").unwrap();
  let vertex_re = Regex::new(r"^v\s+(\S+)\s+(\S+)\s+(\S+)").unwrap();
  let normal_re = Regex::new(r"^vn\s+(\S+)\s+(\S+)\s+(\S+)").unwrap();
  let face_re = Regex::new(r"^f\s+(.+)$").unwrap();
  let corner_re = Regex::new(r"^(-?\d+)(?:/(-?\d*)(?:/(-?\d+))?)?$").unwrap();

  let mut mesh = LoadedMesh::default();

  for (line_idx, line) in reader.lines().enumerate() {
    let line = line?;
    let line = line.trim();
    let line_number = line_idx + 1;

    if let Some(captures) = vertex_re.captures(line) {
      let mut vert = parse_vector(line_number, &captures)?;
      if let Some(transform) = transform {
        vert = transform.transform_point(&Point3::from(vert)).coords;
      }
      mesh.vertices.push(vert);
    } else if let Some(captures) = normal_re.captures(line) {
      let mut normal = parse_vector(line_number, &captures)?;
      if let Some(transform) = transform {
        normal = transform.transform_vector(&normal);
      }
      mesh.normals.push(normal.try_normalize(0.0).unwrap_or(normal));
    } else if let Some(captures) = face_re.captures(line) {
      let mut corners = Vec::new();
      for corner in captures[1].split_whitespace() {
        let corner_captures = corner_re.captures(corner).ok_or_else(|| {
          parse_error(line_number, format!("invalid face corner `{}`", corner))
        })?;
        let vertex =
          resolve_index(line_number, &corner_captures[1], mesh.vertices.len())?;
        let normal = match corner_captures.get(3) {
          Some(normal) => Some(resolve_index(
            line_number,
            normal.as_str(),
            mesh.normals.len(),
          )?),
          None => None,
        };
        corners.push((vertex, normal));
      }

      if corners.len() < 3 {
        return Err(parse_error(
          line_number,
          format!("face needs at least 3 corners, got {}", corners.len()),
        ));
      }

      // fan triangulation
      for i in 1..corners.len() - 1 {
        let tri = [corners[0], corners[i], corners[i + 1]];
        let normals = match (tri[0].1, tri[1].1, tri[2].1) {
          (Some(a), Some(b), Some(c)) => Some([a, b, c]),
          _ => None,
        };
        mesh.faces.push(Face {
          vertices: [tri[0].0, tri[1].0, tri[2].0],
          normals,
        });
      }
    } else if let Some(captures) = object_re.captures(line) {
      mesh.name = Some(captures[1].to_string());
    }
  }

  Ok(mesh)
}

pub fn load_mesh_with_transform(
  path: &Path,
  transform: Option<&Transform3<f32>>,
) -> Result<LoadedMesh> {
  let file = File::open(path).map_err(|e| match e.kind() {
    ErrorKind::NotFound => GatheringError::ResourceNotFound(path.to_path_buf()),
    _ => GatheringError::Io(e),
  })?;

  parse_mesh(BufReader::new(file), transform)
}

pub fn load_mesh(path: &Path) -> Result<LoadedMesh> {
  load_mesh_with_transform(path, None)
}

/// Writes `mesh` as OBJ text. Faces with normals use the `v//vn` form.
pub fn write_obj<W: Write>(mesh: &LoadedMesh, mut writer: W) -> Result<()> {
  if let Some(name) = &mesh.name {
    writeln!(writer, "o {}", name)?;
  }
  for v in &mesh.vertices {
    writeln!(writer, "v {} {} {}", v[0], v[1], v[2])?;
  }
  for n in &mesh.normals {
    writeln!(writer, "vn {} {} {}", n[0], n[1], n[2])?;
  }
  for face in &mesh.faces {
    write!(writer, "f")?;
    for corner in 0..3 {
      let vertex = face.vertices[corner] + 1;
      match face.normals {
        Some(normals) => write!(writer, " {}//{}", vertex, normals[corner] + 1)?,
        None => write!(writer, " {}", vertex)?,
      }
    }
    writeln!(writer)?;
  }
  writer.flush()?;
  Ok(())
}
