//! Scene geometry, materials, and the voxel acceleration structure.
//!
//! A scene is an immutable triangle soup ([`SceneData`]) with per-triangle
//! surface indices. [`VoxelGrid::build`] wraps it in a uniform spatial hash
//! used by every ray query in the simulation: nearest-hit, occlusion, and
//! the parity inside-test that classifies waveguide nodes.

pub mod geometry;
pub mod material;
pub mod reverb_time;
pub mod voxel_grid;

pub use geometry::{Aabb, Ray, SceneData, Triangle, scene_from_box};
pub use material::Surface;
pub use voxel_grid::{RayHit, VoxelGrid};
