use crate::simulated_scene::S;
use nalgebra::Vector3;

#[cfg(test)]
use crate::assert_float_eq;
#[cfg(test)]
use proptest::prelude::*;

/// Axis aligned bounding box, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
  pub min: Vector3<S>,
  pub max: Vector3<S>,
}

impl Aabb {
  pub fn new(min: Vector3<S>, max: Vector3<S>) -> Self {
    Self { min, max }
  }

  pub fn around_sphere(center: &Vector3<S>, radius: S) -> Self {
    let r = Vector3::repeat(radius);
    Self::new(center - r, center + r)
  }

  /// Smallest box containing all `points`, `None` if there are none.
  pub fn from_points<'a>(
    points: impl IntoIterator<Item = &'a Vector3<S>>,
  ) -> Option<Self> {
    points.into_iter().fold(None, |bb, p| {
      Some(match bb {
        None => Aabb::new(*p, *p),
        Some(bb) => bb.grow_to(p),
      })
    })
  }

  pub fn grow_to(&self, p: &Vector3<S>) -> Self {
    Self::new(self.min.inf(p), self.max.sup(p))
  }

  pub fn intersects(&self, other: &Aabb) -> bool {
    (0..3).all(|i| self.min[i] <= other.max[i] && self.max[i] >= other.min[i])
  }

  pub fn contains(&self, p: &Vector3<S>) -> bool {
    (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
  }

  pub fn size(&self) -> Vector3<S> {
    self.max - self.min
  }

  pub fn center(&self) -> Vector3<S> {
    (self.min + self.max) * 0.5
  }

  pub fn half_extents(&self) -> Vector3<S> {
    self.size() * 0.5
  }
}

#[derive(Debug, Clone, Copy)]
pub struct Ray {
  pub origin: Vector3<S>,
  pub direction: Vector3<S>,
}

#[derive(Debug, Clone)]
pub struct Triangle {
  pub a: Vector3<S>,
  pub b: Vector3<S>,
  pub c: Vector3<S>,
  /// Unit normal following the counter clockwise winding `a, b, c`.
  pub normal: Vector3<S>,
  pub bb: Aabb,
}

impl Triangle {
  /// `None` for degenerate (zero area) triangles.
  pub fn new(a: Vector3<S>, b: Vector3<S>, c: Vector3<S>) -> Option<Self> {
    let normal = (b - a).cross(&(c - a)).try_normalize(S::EPSILON)?;

    Some(Self {
      a,
      b,
      c,
      normal,
      bb: Aabb::new(a.inf(&b).inf(&c), a.sup(&b).sup(&c)),
    })
  }

  pub fn flipped(&self) -> Self {
    Self {
      a: self.a,
      b: self.c,
      c: self.b,
      normal: -self.normal,
      bb: self.bb,
    }
  }

  /// Distance along the ray to the hit point (Möller-Trumbore), `None` on a
  /// miss or a hit behind the origin. Edges count as hits, with a little
  /// slack so a ray through a shared edge hits at least one side.
  pub fn intersect(&self, ray: &Ray) -> Option<S> {
    const EDGE_SLACK: S = 1e-6;

    let ab = self.b - self.a;
    let ac = self.c - self.a;
    let p = ray.direction.cross(&ac);
    let det = ab.dot(&p);

    // ray parallel to the triangle plane
    if det.abs() < 1e-8 {
      return None;
    }
    let inv_det = 1.0 / det;

    let to_origin = ray.origin - self.a;
    let u = to_origin.dot(&p) * inv_det;
    if !(-EDGE_SLACK..=1.0 + EDGE_SLACK).contains(&u) {
      return None;
    }

    let q = to_origin.cross(&ab);
    let v = ray.direction.dot(&q) * inv_det;
    if v < -EDGE_SLACK || u + v > 1.0 + EDGE_SLACK {
      return None;
    }

    let t = ac.dot(&q) * inv_det;
    if t < 0.0 {
      None
    } else {
      Some(t)
    }
  }

  /// Point of the triangle closest to `p`.
  pub fn closest_point(&self, p: &Vector3<S>) -> Vector3<S> {
    let (a, b, c) = (self.a, self.b, self.c);
    let ab = b - a;
    let ac = c - a;

    // vertex region a
    let ap = p - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
      return a;
    }

    // vertex region b
    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
      return b;
    }

    // edge ab
    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
      return a + ab * (d1 / (d1 - d3));
    }

    // vertex region c
    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
      return c;
    }

    // edge ac
    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
      return a + ac * (d2 / (d2 - d6));
    }

    // edge bc
    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
      return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
    }

    // face
    let denom = 1.0 / (va + vb + vc);
    a + ab * (vb * denom) + ac * (vc * denom)
  }

  pub fn touches_sphere(&self, center: &Vector3<S>, radius: S) -> bool {
    (self.closest_point(center) - center).norm_squared() <= radius * radius
  }
}

/// Rescales `velocity` to 95% of `max_speed` once it reaches `max_speed`.
pub fn limit_speed(velocity: &Vector3<S>, max_speed: S) -> Vector3<S> {
  if velocity.norm_squared() >= max_speed * max_speed {
    velocity.normalize() * (max_speed * 0.95)
  } else {
    *velocity
  }
}

#[cfg(test)]
fn unit_triangle() -> Triangle {
  Triangle::new(
    Vector3::new(0.0, 0.0, 0.0),
    Vector3::new(1.0, 0.0, 0.0),
    Vector3::new(0.0, 1.0, 0.0),
  )
  .unwrap()
}

#[test]
fn triangle_normal_follows_winding() {
  let t = unit_triangle();
  assert_eq!(t.normal, Vector3::new(0.0, 0.0, 1.0));
  assert_eq!(t.flipped().normal, Vector3::new(0.0, 0.0, -1.0));
  assert_eq!(t.bb.max, Vector3::new(1.0, 1.0, 0.0));
}

#[test]
fn degenerate_triangle_rejected() {
  assert!(Triangle::new(
    Vector3::new(0.0, 0.0, 0.0),
    Vector3::new(1.0, 1.0, 1.0),
    Vector3::new(2.0, 2.0, 2.0),
  )
  .is_none());
}

#[test]
fn ray_hits_and_misses() {
  let t = unit_triangle();
  let down = Vector3::new(0.0, 0.0, -1.0);

  let hit = t.intersect(&Ray {
    origin: Vector3::new(0.25, 0.25, 2.0),
    direction: down,
  });
  assert_float_eq!(hit.unwrap(), 2.0);

  // outside the triangle
  assert!(t
    .intersect(&Ray {
      origin: Vector3::new(0.75, 0.75, 2.0),
      direction: down,
    })
    .is_none());

  // behind the origin
  assert!(t
    .intersect(&Ray {
      origin: Vector3::new(0.25, 0.25, -2.0),
      direction: down,
    })
    .is_none());

  // parallel
  assert!(t
    .intersect(&Ray {
      origin: Vector3::new(0.25, 0.25, 1.0),
      direction: Vector3::new(1.0, 0.0, 0.0),
    })
    .is_none());
}

#[test]
fn closest_point_regions() {
  let t = unit_triangle();
  // face
  let p = t.closest_point(&Vector3::new(0.2, 0.3, 3.0));
  assert_float_eq!(p[0], 0.2);
  assert_float_eq!(p[1], 0.3);
  assert_float_eq!(p[2], 0.0);
  // vertex
  assert_eq!(
    t.closest_point(&Vector3::new(-1.0, -1.0, 0.5)),
    Vector3::new(0.0, 0.0, 0.0)
  );
  // edge bc
  let p = t.closest_point(&Vector3::new(1.0, 1.0, 0.0));
  assert_float_eq!(p[0], 0.5);
  assert_float_eq!(p[1], 0.5);
}

#[test]
fn sphere_contact() {
  let t = unit_triangle();
  assert!(t.touches_sphere(&Vector3::new(0.3, 0.3, 0.04), 0.05));
  assert!(!t.touches_sphere(&Vector3::new(0.3, 0.3, 0.06), 0.05));
  // near an edge but off the face
  assert!(t.touches_sphere(&Vector3::new(0.5, -0.03, 0.0), 0.05));
  assert!(!t.touches_sphere(&Vector3::new(2.0, 2.0, 0.0), 0.05));
}

#[test]
fn aabb_queries() {
  let bb = Aabb::from_points(&[
    Vector3::new(1.0, -1.0, 0.0),
    Vector3::new(-1.0, 2.0, 3.0),
  ])
  .unwrap();
  assert_eq!(bb.min, Vector3::new(-1.0, -1.0, 0.0));
  assert_eq!(bb.max, Vector3::new(1.0, 2.0, 3.0));
  assert_eq!(bb.center(), Vector3::new(0.0, 0.5, 1.5));
  assert!(bb.contains(&Vector3::new(0.0, 0.0, 0.0)));
  assert!(bb.intersects(&Aabb::around_sphere(&Vector3::new(1.04, 0.0, 0.0), 0.05)));
  assert!(!bb.intersects(&Aabb::around_sphere(&Vector3::new(1.06, 0.0, 0.0), 0.05)));
  assert!(Aabb::from_points(&Vec::<Vector3<S>>::new()).is_none());
}

#[test]
fn speed_limit() {
  let slow = Vector3::new(0.1, 0.0, 0.0);
  assert_eq!(limit_speed(&slow, 1.0), slow);

  let fast = limit_speed(&Vector3::new(0.0, 3.0, 4.0), 1.0);
  assert_float_eq!(fast.norm(), 0.95);
  assert_float_eq!(fast[1] / fast[2], 0.75);
}

#[cfg(test)]
proptest! {
#[test]
fn closest_point_never_farther_than_vertices(
  p in prop::array::uniform3(-3.0f32..3.0),
) {
  let t = unit_triangle();
  let p = Vector3::from(p);
  let d = (t.closest_point(&p) - p).norm();
  for v in &[t.a, t.b, t.c] {
    prop_assert!(d <= (v - p).norm() + 1e-5);
  }
}
}
