//! Uniform spatial hash over the scene triangles.
//!
//! Ray queries walk cells front-to-back with a 3D DDA and only test the
//! triangles registered in each visited cell, so a hit is always reported
//! before any cell whose entry distance exceeds the hit distance.

use crate::math::{IVec3, Vec3};
use crate::scene::geometry::{
    Aabb, Ray, SceneData, intersect_triangle, triangle_overlaps_aabb,
};

/// Default padding added around the scene bounds so rays started exactly on
/// a wall still begin inside the grid.
pub const DEFAULT_PADDING: f32 = 0.1;

/// A closest-hit query result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub triangle: usize,
    pub distance: f32,
    pub normal: Vec3,
}

/// The scene plus its uniform voxel acceleration structure.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    scene: SceneData,
    aabb: Aabb,
    dim: usize,
    cell_size: Vec3,
    cells: Vec<Vec<u32>>,
}

impl VoxelGrid {
    /// Builds a grid sized from the triangle count. Suits scenes from a
    /// handful of triangles up to architectural meshes.
    pub fn build(scene: SceneData) -> Self {
        let dim = ((scene.triangles.len() as f32).cbrt().ceil() as usize).clamp(4, 64);
        Self::build_with(scene, dim, DEFAULT_PADDING)
    }

    pub fn build_with(scene: SceneData, dim: usize, padding: f32) -> Self {
        let aabb = scene.aabb().padded(padding);
        let cell_size = aabb.dimensions() / dim as f32;
        let mut cells = vec![Vec::new(); dim * dim * dim];

        for (index, _) in scene.triangles.iter().enumerate() {
            let verts = scene.triangle_verts(index);
            let tri_aabb = Aabb::enclosing(&verts);
            let lo = Self::clamped_cell(&aabb, cell_size, dim, tri_aabb.min);
            let hi = Self::clamped_cell(&aabb, cell_size, dim, tri_aabb.max);
            for z in lo.z..=hi.z {
                for y in lo.y..=hi.y {
                    for x in lo.x..=hi.x {
                        let cell_aabb = Self::cell_aabb(&aabb, cell_size, IVec3::new(x, y, z));
                        if triangle_overlaps_aabb(&verts, &cell_aabb) {
                            cells[Self::flat(dim, IVec3::new(x, y, z))].push(index as u32);
                        }
                    }
                }
            }
        }

        log::info!(
            "voxel grid: {dim}^3 cells over {:?} for {} triangles",
            aabb.dimensions(),
            scene.triangles.len()
        );

        Self {
            scene,
            aabb,
            dim,
            cell_size,
            cells,
        }
    }

    pub fn scene(&self) -> &SceneData {
        &self.scene
    }

    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    fn flat(dim: usize, c: IVec3) -> usize {
        (c.x as usize) + dim * ((c.y as usize) + dim * (c.z as usize))
    }

    fn clamped_cell(aabb: &Aabb, cell_size: Vec3, dim: usize, p: Vec3) -> IVec3 {
        let rel = (p - aabb.min) / cell_size;
        IVec3::new(
            (rel.x.floor() as i32).clamp(0, dim as i32 - 1),
            (rel.y.floor() as i32).clamp(0, dim as i32 - 1),
            (rel.z.floor() as i32).clamp(0, dim as i32 - 1),
        )
    }

    fn cell_aabb(aabb: &Aabb, cell_size: Vec3, c: IVec3) -> Aabb {
        let min = aabb.min + cell_size * Vec3::new(c.x as f32, c.y as f32, c.z as f32);
        Aabb::new(min, min + cell_size)
    }

    /// Walks cells along `ray` front-to-back, calling `visitor` with the
    /// triangle indices in each cell and the cell's exit distance. The walk
    /// stops when the visitor returns a value.
    pub fn traverse<T>(
        &self,
        ray: &Ray,
        mut visitor: impl FnMut(&[u32], f32) -> Option<T>,
    ) -> Option<T> {
        let (t_entry, t_exit) = self.aabb.intersection_distances(ray)?;
        if t_exit < 0.0 {
            return None;
        }
        let t_start = t_entry.max(0.0);
        let entry = ray.at(t_start + 1e-5);
        let mut cell = Self::clamped_cell(&self.aabb, self.cell_size, self.dim, entry);

        let step = IVec3::new(
            if ray.direction.x > 0.0 { 1 } else { -1 },
            if ray.direction.y > 0.0 { 1 } else { -1 },
            if ray.direction.z > 0.0 { 1 } else { -1 },
        );

        let mut t_max = Vec3::ZERO;
        let mut t_delta = Vec3::ZERO;
        for axis in 0..3 {
            let d = ray.direction[axis];
            if d.abs() < 1e-12 {
                t_max[axis] = f32::INFINITY;
                t_delta[axis] = f32::INFINITY;
            } else {
                let next_boundary = self.aabb.min[axis]
                    + (cell[axis] + if d > 0.0 { 1 } else { 0 }) as f32 * self.cell_size[axis];
                t_max[axis] = (next_boundary - ray.position[axis]) / d;
                t_delta[axis] = self.cell_size[axis] / d.abs();
            }
        }

        loop {
            let cell_exit = t_max.min_element();
            let triangles = &self.cells[Self::flat(self.dim, cell)];
            if let Some(out) = visitor(triangles, cell_exit) {
                return Some(out);
            }
            if cell_exit > t_exit {
                return None;
            }
            let axis = if t_max.x <= t_max.y && t_max.x <= t_max.z {
                0
            } else if t_max.y <= t_max.z {
                1
            } else {
                2
            };
            cell[axis] += step[axis];
            if cell[axis] < 0 || cell[axis] >= self.dim as i32 {
                return None;
            }
            t_max[axis] += t_delta[axis];
        }
    }

    /// Nearest triangle intersection along `ray`, if any.
    pub fn closest_intersection(&self, ray: &Ray) -> Option<RayHit> {
        self.traverse(ray, |triangles, cell_exit| {
            let mut best: Option<RayHit> = None;
            for &index in triangles {
                let verts = self.scene.triangle_verts(index as usize);
                if let Some(hit) = intersect_triangle(ray, &verts) {
                    // a triangle can be registered in a later cell too; only
                    // accept hits inside the current cell's span
                    if hit.distance <= cell_exit + 1e-4
                        && best.is_none_or(|b| hit.distance < b.distance)
                    {
                        best = Some(RayHit {
                            triangle: index as usize,
                            distance: hit.distance,
                            normal: hit.normal,
                        });
                    }
                }
            }
            best
        })
    }

    /// Whether the open segment between `from` and `to` is blocked by any
    /// triangle.
    pub fn occluded(&self, from: Vec3, to: Vec3) -> bool {
        let delta = to - from;
        let length = delta.length();
        if length < 1e-6 {
            return false;
        }
        let ray = Ray::new(from, delta);
        self.closest_intersection(&ray)
            .is_some_and(|hit| hit.distance < length - 1e-4)
    }

    /// Parity test: counts surface crossings along +X from `p`.
    ///
    /// The test direction is nudged off-axis so lattice points never graze
    /// triangle edges exactly.
    pub fn point_inside(&self, p: Vec3) -> bool {
        let ray = Ray::new(p, Vec3::new(1.0, 1.3e-4, 2.7e-4));
        let mut crossings = 0usize;
        let mut counted = std::collections::HashSet::new();
        for (index, _) in self.scene.triangles.iter().enumerate() {
            let verts = self.scene.triangle_verts(index);
            if intersect_triangle(&ray, &verts).is_some() && counted.insert(index) {
                crossings += 1;
            }
        }
        crossings % 2 == 1
    }
}
