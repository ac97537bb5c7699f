//! Rectilinear waveguide mesh construction.
//!
//! The lattice covers the voxelised scene's padded bounds at the Courant
//! spacing `h = c·√3 / fs`. Each node knows its six axis neighbours by flat
//! index; nodes with a missing neighbour next to the surface carry one
//! boundary filter per missing port.

use crate::environment::Environment;
use crate::math::{IVec3, Vec3};
use crate::scene::VoxelGrid;
use crate::scene::geometry::Ray;
use crate::waveguide::boundary::ReflectanceFilter;

/// Sentinel for a missing neighbour.
pub const INVALID_PORT: u32 = u32::MAX;

/// The six axis directions, in port order: +x, -x, +y, -y, +z, -z.
pub const PORT_DIRECTIONS: [IVec3; 6] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
];

/// How a boundary node touches the surface, by missing-port count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Face,
    Edge,
    Corner,
}

/// Lattice geometry: world position of node `(x, y, z)` is
/// `min + (x, y, z) * spacing`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshDescriptor {
    pub min: Vec3,
    pub spacing: f32,
    pub dims: IVec3,
}

impl MeshDescriptor {
    pub fn node_count(&self) -> usize {
        (self.dims.x * self.dims.y * self.dims.z) as usize
    }

    pub fn index(&self, c: IVec3) -> usize {
        (c.x + self.dims.x * (c.y + self.dims.y * c.z)) as usize
    }

    pub fn coords(&self, index: usize) -> IVec3 {
        let i = index as i32;
        IVec3::new(
            i % self.dims.x,
            (i / self.dims.x) % self.dims.y,
            i / (self.dims.x * self.dims.y),
        )
    }

    pub fn position(&self, c: IVec3) -> Vec3 {
        self.min + Vec3::new(c.x as f32, c.y as f32, c.z as f32) * self.spacing
    }

    pub fn in_bounds(&self, c: IVec3) -> bool {
        c.cmpge(IVec3::ZERO).all() && c.cmplt(self.dims).all()
    }

    /// Flat index of the lattice node nearest to `p`, if `p` lies within
    /// the lattice bounds.
    pub fn nearest_index(&self, p: Vec3) -> Option<usize> {
        let rel = (p - self.min) / self.spacing;
        let c = IVec3::new(
            rel.x.round() as i32,
            rel.y.round() as i32,
            rel.z.round() as i32,
        );
        self.in_bounds(c).then(|| self.index(c))
    }
}

/// Courant-limit spacing for a 3D rectilinear FDTD lattice.
pub fn courant_spacing(speed_of_sound: f32, sample_rate: f32) -> f32 {
    speed_of_sound * 3f32.sqrt() / sample_rate
}

/// One missing port of a boundary node.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryPort {
    /// Port slot in `0..6`.
    pub port: usize,
    pub filter: ReflectanceFilter,
}

/// A node adjacent to the surface: its flat index, its classification, and
/// a filter per missing port.
#[derive(Debug, Clone)]
pub struct BoundaryNode {
    pub node: u32,
    pub kind: BoundaryKind,
    pub ports: Vec<BoundaryPort>,
}

#[derive(Debug, Clone, Copy)]
pub struct Node {
    pub ports: [u32; 6],
    pub inside: bool,
    /// Index into the mesh's boundary-node list, if any port is missing.
    pub boundary: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Mesh {
    descriptor: MeshDescriptor,
    nodes: Vec<Node>,
    boundary_nodes: Vec<BoundaryNode>,
    sample_rate: f32,
}

impl Mesh {
    /// Builds the lattice over `grid`'s bounds at `sample_rate`.
    pub fn build(grid: &VoxelGrid, environment: &Environment, sample_rate: f32) -> Self {
        let spacing = courant_spacing(environment.speed_of_sound, sample_rate);
        let bounds = *grid.aabb();
        let size = bounds.dimensions();
        let dims = IVec3::new(
            (size.x / spacing).floor() as i32 + 1,
            (size.y / spacing).floor() as i32 + 1,
            (size.z / spacing).floor() as i32 + 1,
        );
        let descriptor = MeshDescriptor {
            min: bounds.min,
            spacing,
            dims,
        };

        let node_count = descriptor.node_count();
        let inside: Vec<bool> = (0..node_count)
            .map(|i| grid.point_inside(descriptor.position(descriptor.coords(i))))
            .collect();

        let mut nodes = Vec::with_capacity(node_count);
        let mut boundary_nodes = Vec::new();
        for i in 0..node_count {
            let c = descriptor.coords(i);
            let mut ports = [INVALID_PORT; 6];
            let mut missing = Vec::new();
            for (slot, dir) in PORT_DIRECTIONS.iter().enumerate() {
                let n = c + *dir;
                if descriptor.in_bounds(n) && inside[descriptor.index(n)] {
                    ports[slot] = descriptor.index(n) as u32;
                } else if inside[i] {
                    missing.push(slot);
                }
            }

            let boundary = if inside[i] && !missing.is_empty() {
                let kind = match missing.len() {
                    1 => BoundaryKind::Face,
                    2 => BoundaryKind::Edge,
                    _ => BoundaryKind::Corner,
                };
                let position = descriptor.position(c);
                let ports = missing
                    .iter()
                    .map(|&slot| {
                        let filter = boundary_filter(grid, position, slot);
                        BoundaryPort { port: slot, filter }
                    })
                    .collect();
                boundary_nodes.push(BoundaryNode {
                    node: i as u32,
                    kind,
                    ports,
                });
                Some((boundary_nodes.len() - 1) as u32)
            } else {
                None
            };

            nodes.push(Node {
                ports,
                inside: inside[i],
                boundary,
            });
        }

        log::info!(
            "waveguide mesh: {}x{}x{} nodes at {spacing:.3} m, {} inside, {} boundary",
            dims.x,
            dims.y,
            dims.z,
            nodes.iter().filter(|n| n.inside).count(),
            boundary_nodes.len()
        );

        Self {
            descriptor,
            nodes,
            boundary_nodes,
            sample_rate,
        }
    }

    pub fn descriptor(&self) -> &MeshDescriptor {
        &self.descriptor
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn boundary_nodes(&self) -> &[BoundaryNode] {
        &self.boundary_nodes
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn is_inside(&self, index: usize) -> bool {
        self.nodes[index].inside
    }

    /// World positions of every node, for visualisation.
    pub fn node_positions(&self) -> Vec<Vec3> {
        (0..self.nodes.len())
            .map(|i| self.descriptor.position(self.descriptor.coords(i)))
            .collect()
    }
}

/// Resolves the wall surface closing a missing port by casting along the
/// port direction.
fn boundary_filter(grid: &VoxelGrid, position: Vec3, slot: usize) -> ReflectanceFilter {
    let dir = PORT_DIRECTIONS[slot];
    let ray = Ray::new(position, Vec3::new(dir.x as f32, dir.y as f32, dir.z as f32));
    match grid.closest_intersection(&ray) {
        Some(hit) => ReflectanceFilter::from_surface(grid.scene().triangle_surface(hit.triangle)),
        None => {
            log::warn!("no surface behind boundary port at {position:?}; assuming default");
            ReflectanceFilter::from_surface(&crate::scene::Surface::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Surface;
    use crate::scene::geometry::{Aabb, scene_from_box};

    fn build_box_mesh(side: f32, fs: f32) -> Mesh {
        let scene = scene_from_box(&Aabb::new(Vec3::ZERO, Vec3::splat(side)), Surface::default());
        let grid = VoxelGrid::build(scene);
        Mesh::build(&grid, &Environment::default(), fs)
    }

    #[test]
    fn test_courant_spacing() {
        let h = courant_spacing(340.0, 4000.0);
        assert!((h - 340.0 * 3f32.sqrt() / 4000.0).abs() < 1e-6);
    }

    #[test]
    fn test_descriptor_round_trip() {
        let d = MeshDescriptor {
            min: Vec3::ZERO,
            spacing: 0.1,
            dims: IVec3::new(5, 7, 9),
        };
        for i in 0..d.node_count() {
            assert_eq!(d.index(d.coords(i)), i);
        }
        assert_eq!(d.nearest_index(Vec3::new(0.21, 0.39, 0.0)), Some(d.index(IVec3::new(2, 4, 0))));
        assert_eq!(d.nearest_index(Vec3::new(-5.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_interior_nodes_have_six_ports() {
        let mesh = build_box_mesh(2.0, 4000.0);
        let centre = mesh
            .descriptor()
            .nearest_index(Vec3::splat(1.0))
            .unwrap();
        assert!(mesh.is_inside(centre));
        let node = &mesh.nodes()[centre];
        assert!(node.ports.iter().all(|&p| p != INVALID_PORT));
        assert!(node.boundary.is_none());
    }

    #[test]
    fn test_outside_nodes_are_marked() {
        let mesh = build_box_mesh(2.0, 4000.0);
        // grid bounds are padded, so corner lattice nodes sit outside the box
        assert!(!mesh.is_inside(0));
        assert!(mesh.nodes().iter().any(|n| n.inside));
    }

    #[test]
    fn test_boundary_nodes_classified() {
        let mesh = build_box_mesh(2.0, 4000.0);
        assert!(!mesh.boundary_nodes().is_empty());
        for b in mesh.boundary_nodes() {
            let expected = match b.ports.len() {
                1 => BoundaryKind::Face,
                2 => BoundaryKind::Edge,
                _ => BoundaryKind::Corner,
            };
            assert_eq!(b.kind, expected);
            assert!(mesh.is_inside(b.node as usize));
        }
        // a box mesh has all three classes
        assert!(
            mesh.boundary_nodes()
                .iter()
                .any(|b| b.kind == BoundaryKind::Face)
        );
        assert!(
            mesh.boundary_nodes()
                .iter()
                .any(|b| b.kind == BoundaryKind::Edge)
        );
    }
}
