//! Triangle-soup scene geometry and intersection primitives.

use crate::math::Vec3;
use crate::scene::material::Surface;

/// One triangle of the scene: three indices into the shared vertex array and
/// one index into the surface table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub vertices: [u32; 3],
    pub surface: u32,
}

/// An immutable triangle-soup scene.
#[derive(Debug, Clone)]
pub struct SceneData {
    pub triangles: Vec<Triangle>,
    pub vertices: Vec<Vec3>,
    pub surfaces: Vec<Surface>,
}

impl SceneData {
    pub fn new(triangles: Vec<Triangle>, vertices: Vec<Vec3>, surfaces: Vec<Surface>) -> Self {
        Self {
            triangles,
            vertices,
            surfaces,
        }
    }

    pub fn triangle_verts(&self, index: usize) -> [Vec3; 3] {
        let t = &self.triangles[index];
        [
            self.vertices[t.vertices[0] as usize],
            self.vertices[t.vertices[1] as usize],
            self.vertices[t.vertices[2] as usize],
        ]
    }

    pub fn triangle_surface(&self, index: usize) -> &Surface {
        &self.surfaces[self.triangles[index].surface as usize]
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::enclosing(&self.vertices)
    }
}

/// A ray with unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub position: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(position: Vec3, direction: Vec3) -> Self {
        Self {
            position,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.position + self.direction * t
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn enclosing(points: &[Vec3]) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        Self { min, max }
    }

    pub fn centre(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn padded(&self, padding: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(padding),
            max: self.max + Vec3::splat(padding),
        }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Surface area, used by the statistical reverb-time estimates.
    pub fn surface_area(&self) -> f32 {
        let d = self.dimensions();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    pub fn volume(&self) -> f32 {
        let d = self.dimensions();
        d.x * d.y * d.z
    }

    /// Slab-method entry/exit distances of `ray` through the box.
    pub fn intersection_distances(&self, ray: &Ray) -> Option<(f32, f32)> {
        let inv = ray.direction.recip();
        let mut t0 = f32::NEG_INFINITY;
        let mut t1 = f32::INFINITY;
        for axis in 0..3 {
            let (near, far) = if inv[axis] < 0.0 {
                (self.max[axis], self.min[axis])
            } else {
                (self.min[axis], self.max[axis])
            };
            let tn = (near - ray.position[axis]) * inv[axis];
            let tf = (far - ray.position[axis]) * inv[axis];
            if tn > t0 {
                t0 = tn;
            }
            if tf < t1 {
                t1 = tf;
            }
            if t1 < t0 {
                return None;
            }
        }
        Some((t0, t1))
    }
}

/// Result of a successful ray/triangle intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    pub distance: f32,
    /// Unit normal, oriented against the incoming ray direction.
    pub normal: Vec3,
}

const INTERSECTION_EPSILON: f32 = 1e-6;

/// Möller–Trumbore ray/triangle intersection.
///
/// Returns hits with `t > INTERSECTION_EPSILON` only, so a ray restarted at a
/// reflection point does not immediately re-hit its own triangle.
pub fn intersect_triangle(ray: &Ray, verts: &[Vec3; 3]) -> Option<TriangleHit> {
    let e1 = verts[1] - verts[0];
    let e2 = verts[2] - verts[0];
    let p = ray.direction.cross(e2);
    let det = e1.dot(p);
    if det.abs() < INTERSECTION_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = ray.position - verts[0];
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = ray.direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv_det;
    if t <= INTERSECTION_EPSILON {
        return None;
    }
    let mut normal = e1.cross(e2).normalize();
    if normal.dot(ray.direction) > 0.0 {
        normal = -normal;
    }
    Some(TriangleHit {
        distance: t,
        normal,
    })
}

/// Specular reflection of `incident` about unit `normal`.
pub fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - normal * (2.0 * incident.dot(normal))
}

/// Signed distance of `point` from the triangle's plane.
pub fn plane_distance(verts: &[Vec3; 3], point: Vec3) -> f32 {
    let normal = (verts[1] - verts[0]).cross(verts[2] - verts[0]).normalize();
    normal.dot(point - verts[0])
}

/// Mirror image of `point` in the triangle's plane.
pub fn mirror_in_plane(verts: &[Vec3; 3], point: Vec3) -> Vec3 {
    let normal = (verts[1] - verts[0]).cross(verts[2] - verts[0]).normalize();
    point - normal * (2.0 * normal.dot(point - verts[0]))
}

/// Separating-axis triangle/box overlap test.
///
/// The triangle is tested against the unit cube centred at the origin after
/// normalising by the box centre and half-dimensions, which keeps the axis
/// tests well conditioned for thin cells.
pub fn triangle_overlaps_aabb(verts: &[Vec3; 3], aabb: &Aabb) -> bool {
    let centre = aabb.centre();
    let half = aabb.dimensions() * 0.5;
    let v: Vec<Vec3> = verts.iter().map(|p| (*p - centre) / half).collect();
    let h = Vec3::ONE;

    // box face normals
    for axis in 0..3 {
        let min = v.iter().map(|p| p[axis]).fold(f32::INFINITY, f32::min);
        let max = v.iter().map(|p| p[axis]).fold(f32::NEG_INFINITY, f32::max);
        if min > h[axis] || max < -h[axis] {
            return false;
        }
    }

    // triangle face normal
    let e = [v[1] - v[0], v[2] - v[1], v[0] - v[2]];
    let normal = e[0].cross(e[1]);
    let d = normal.dot(v[0]);
    let r = h.x * normal.x.abs() + h.y * normal.y.abs() + h.z * normal.z.abs();
    if d.abs() > r {
        return false;
    }

    // nine edge cross-product axes
    for edge in &e {
        for axis in 0..3 {
            let mut a = Vec3::ZERO;
            a[axis] = 1.0;
            let sep = a.cross(*edge);
            if sep.length_squared() < 1e-12 {
                continue;
            }
            let radius = h.x * sep.x.abs() + h.y * sep.y.abs() + h.z * sep.z.abs();
            let p: Vec<f32> = v.iter().map(|p| p.dot(sep)).collect();
            let min = p.iter().copied().fold(f32::INFINITY, f32::min);
            let max = p.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if min > radius || max < -radius {
                return false;
            }
        }
    }

    true
}

/// Builds the closed 12-triangle scene for an axis-aligned box with a single
/// surface on every wall.
pub fn scene_from_box(aabb: &Aabb, surface: Surface) -> SceneData {
    let (lo, hi) = (aabb.min, aabb.max);
    let vertices = vec![
        Vec3::new(lo.x, lo.y, lo.z),
        Vec3::new(hi.x, lo.y, lo.z),
        Vec3::new(lo.x, hi.y, lo.z),
        Vec3::new(hi.x, hi.y, lo.z),
        Vec3::new(lo.x, lo.y, hi.z),
        Vec3::new(hi.x, lo.y, hi.z),
        Vec3::new(lo.x, hi.y, hi.z),
        Vec3::new(hi.x, hi.y, hi.z),
    ];
    let faces: [[u32; 3]; 12] = [
        // z = lo
        [0, 1, 2],
        [1, 3, 2],
        // z = hi
        [4, 6, 5],
        [5, 6, 7],
        // y = lo
        [0, 4, 1],
        [1, 4, 5],
        // y = hi
        [2, 3, 6],
        [3, 7, 6],
        // x = lo
        [0, 2, 4],
        [2, 6, 4],
        // x = hi
        [1, 5, 3],
        [3, 5, 7],
    ];
    let triangles = faces
        .iter()
        .map(|vertices| Triangle {
            vertices: *vertices,
            surface: 0,
        })
        .collect();
    SceneData::new(triangles, vertices, vec![surface])
}
