//! Finite-difference waveguide mesh simulation.
//!
//! One step is two dispatches over the lattice: boundary filters first
//! produce ghost pressures for every missing port, then every inside node
//! computes its next pressure from its six port contributions. The three
//! pressure buffers rotate between steps.

pub mod boundary;
pub mod kernel;
pub mod mesh;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::compute::ComputeContext;
use crate::environment::Environment;
use crate::error::{HallSonicError, Result};
use crate::math::Vec3;

use boundary::{FilterState, ReflectanceFilter};
pub use kernel::InputKernel;
pub use mesh::{Mesh, MeshDescriptor};

/// Receiver sample for one step: scalar pressure plus the intensity vector
/// estimated from the local pressure gradient, needed by directional
/// attenuators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStepOutput {
    pub pressure: f32,
    pub intensity: Vec3,
}

/// Runtime filter state for one missing port.
#[derive(Debug, Clone)]
struct PortGhost {
    slot: usize,
    filter: ReflectanceFilter,
    state: FilterState,
    ghost: f32,
}

/// Runtime state for one boundary node.
#[derive(Debug, Clone)]
struct BoundaryRuntime {
    node: u32,
    ports: Vec<PortGhost>,
}

/// Courant number squared for the 3D rectilinear scheme. At the Courant
/// limit the self term of the update vanishes, leaving
/// `p_next = (1/3)·sum(ports) - p_prev`.
const COURANT_SQUARED: f32 = 1.0 / 3.0;

/// Runs `steps` of the waveguide, soft-injecting `input` at `source_index`
/// and sampling `receiver_index` after every update.
///
/// Returns `Ok(None)` when `keep_going` is cleared mid-run. The optional
/// `visual` hook receives the full pressure field and the mesh time after
/// each step.
#[allow(clippy::too_many_arguments)]
pub fn run<C: ComputeContext>(
    ctx: &C,
    mesh: &Mesh,
    environment: &Environment,
    steps: usize,
    source_index: usize,
    input: &[f32],
    receiver_index: usize,
    keep_going: &AtomicBool,
    mut progress: impl FnMut(f64),
    visual: Option<&dyn Fn(&[f32], f64)>,
) -> Result<Option<Vec<RunStepOutput>>> {
    if !mesh.is_inside(source_index) {
        return Err(HallSonicError::SourceOutsideMesh);
    }
    if !mesh.is_inside(receiver_index) {
        return Err(HallSonicError::ReceiverOutsideMesh);
    }

    let node_count = mesh.nodes().len();
    let mut previous = vec![0.0f32; node_count];
    let mut current = vec![0.0f32; node_count];
    let mut next = vec![0.0f32; node_count];

    let mut boundary: Vec<BoundaryRuntime> = mesh
        .boundary_nodes()
        .iter()
        .map(|b| BoundaryRuntime {
            node: b.node,
            ports: b
                .ports
                .iter()
                .map(|p| PortGhost {
                    slot: p.port,
                    filter: p.filter,
                    state: FilterState::default(),
                    ghost: 0.0,
                })
                .collect(),
        })
        .collect();

    let sample_rate = mesh.sample_rate();
    let spacing = mesh.descriptor().spacing;
    let density = environment.ambient_density();
    let dt = 1.0 / sample_rate;

    let mut outputs = Vec::with_capacity(steps);
    let mut velocity = Vec3::ZERO;

    log::info!("waveguide: {steps} steps over {node_count} nodes");

    for step in 0..steps {
        if !keep_going.load(Ordering::Relaxed) {
            return Ok(None);
        }

        // soft source: add, never overwrite, so reflections pass through
        if let Some(sample) = input.get(step) {
            current[source_index] += sample;
        }

        // boundary filters see this step's pressures and produce the ghost
        // values that stand in for the missing neighbours
        {
            let current_ref: &[f32] = &current;
            ctx.dispatch_mut(&mut boundary, |_, b| {
                let x = current_ref[b.node as usize];
                for port in b.ports.iter_mut() {
                    port.ghost = port.state.process(&port.filter, x);
                }
            })?;
        }

        {
            let nodes = mesh.nodes();
            let current_ref: &[f32] = &current;
            let previous_ref: &[f32] = &previous;
            let boundary_ref: &[BoundaryRuntime] = &boundary;
            ctx.dispatch(&mut next, |i| {
                let node = &nodes[i];
                if !node.inside {
                    return 0.0;
                }
                let mut sum = 0.0;
                for (slot, &port) in node.ports.iter().enumerate() {
                    if port != mesh::INVALID_PORT {
                        sum += current_ref[port as usize];
                    } else if let Some(b) = node.boundary {
                        sum += boundary_ref[b as usize]
                            .ports
                            .iter()
                            .find(|p| p.slot == slot)
                            .map(|p| p.ghost)
                            .unwrap_or(0.0);
                    }
                }
                COURANT_SQUARED * sum - previous_ref[i]
            })?;
        }

        // rotate: next becomes current, current becomes previous
        std::mem::swap(&mut previous, &mut current);
        std::mem::swap(&mut current, &mut next);

        let pressure = current[receiver_index];
        if !pressure.is_finite() {
            return Err(HallSonicError::NumericalInstability { index: step });
        }

        let gradient = pressure_gradient(mesh, &current, receiver_index, spacing);
        velocity -= gradient * (dt / density);
        let intensity = velocity * pressure;

        outputs.push(RunStepOutput {
            pressure,
            intensity,
        });

        if let Some(visual) = visual {
            visual(&current, step as f64 / sample_rate as f64);
        }

        if steps > 1 {
            progress(step as f64 / (steps - 1) as f64);
        }
    }

    Ok(Some(outputs))
}

/// Central-difference pressure gradient at `index` from its six neighbours.
fn pressure_gradient(mesh: &Mesh, pressures: &[f32], index: usize, spacing: f32) -> Vec3 {
    let node = &mesh.nodes()[index];
    let mut gradient = Vec3::ZERO;
    for axis in 0..3 {
        let positive = node.ports[2 * axis];
        let negative = node.ports[2 * axis + 1];
        if positive != mesh::INVALID_PORT && negative != mesh::INVALID_PORT {
            gradient[axis] =
                (pressures[positive as usize] - pressures[negative as usize]) / (2.0 * spacing);
        }
    }
    gradient
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::CpuContext;
    use crate::scene::geometry::{Aabb, scene_from_box};
    use crate::scene::{Surface, VoxelGrid};

    fn box_mesh(side: f32, surface: Surface, fs: f32) -> Mesh {
        let scene = scene_from_box(&Aabb::new(Vec3::ZERO, Vec3::splat(side)), surface);
        let grid = VoxelGrid::build(scene);
        Mesh::build(&grid, &Environment::default(), fs)
    }

    fn run_simple(
        mesh: &Mesh,
        steps: usize,
        source: Vec3,
        receiver: Vec3,
    ) -> Vec<RunStepOutput> {
        let env = Environment::default();
        let input = InputKernel::default_kernel(mesh.sample_rate());
        let source_index = mesh.descriptor().nearest_index(source).unwrap();
        let receiver_index = mesh.descriptor().nearest_index(receiver).unwrap();
        let keep_going = AtomicBool::new(true);
        run(
            &CpuContext::new(),
            mesh,
            &env,
            steps,
            source_index,
            &input.kernel,
            receiver_index,
            &keep_going,
            |_| {},
            None,
        )
        .unwrap()
        .unwrap()
    }

    #[test]
    fn test_pressure_arrives_and_stays_bounded() {
        let mesh = box_mesh(1.5, Surface::uniform(0.3, 0.0), 4000.0);
        let outputs = run_simple(
            &mesh,
            400,
            Vec3::new(0.4, 0.75, 0.75),
            Vec3::new(1.1, 0.75, 0.75),
        );
        assert_eq!(outputs.len(), 400);

        let peak = outputs
            .iter()
            .map(|o| o.pressure.abs())
            .fold(0.0f32, f32::max);
        assert!(peak > 1e-6, "no signal reached the receiver");
        // stability: pressures stay bounded well past the excitation
        assert!(peak < 10.0, "pressure blew up: {peak}");
        let tail_peak = outputs[300..]
            .iter()
            .map(|o| o.pressure.abs())
            .fold(0.0f32, f32::max);
        assert!(tail_peak < 0.8 * peak, "tail {tail_peak} vs peak {peak}");
    }

    #[test]
    fn test_reciprocity_under_swap() {
        let mesh = box_mesh(1.5, Surface::uniform(0.2, 0.0), 4000.0);
        let a = Vec3::new(0.4, 0.7, 0.6);
        let b = Vec3::new(1.1, 0.8, 0.9);
        let forward = run_simple(&mesh, 200, a, b);
        let reverse = run_simple(&mesh, 200, b, a);
        for (f, r) in forward.iter().zip(&reverse) {
            assert!((f.pressure - r.pressure).abs() < 1e-5);
        }
    }

    #[test]
    fn test_source_outside_mesh_rejected() {
        let mesh = box_mesh(1.5, Surface::default(), 4000.0);
        let env = Environment::default();
        let keep_going = AtomicBool::new(true);
        // node 0 is a lattice corner, outside the closed box
        let inside = mesh
            .descriptor()
            .nearest_index(Vec3::splat(0.75))
            .unwrap();
        let err = run(
            &CpuContext::new(),
            &mesh,
            &env,
            10,
            0,
            &[1.0],
            inside,
            &keep_going,
            |_| {},
            None,
        )
        .unwrap_err();
        assert!(matches!(err, HallSonicError::SourceOutsideMesh));
    }

    #[test]
    fn test_cancellation_mid_run() {
        let mesh = box_mesh(1.5, Surface::default(), 4000.0);
        let env = Environment::default();
        let keep_going = AtomicBool::new(false);
        let inside = mesh
            .descriptor()
            .nearest_index(Vec3::splat(0.75))
            .unwrap();
        let out = run(
            &CpuContext::new(),
            &mesh,
            &env,
            10,
            inside,
            &[1.0],
            inside,
            &keep_going,
            |_| {},
            None,
        )
        .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_progress_reaches_one() {
        let mesh = box_mesh(1.5, Surface::default(), 4000.0);
        let env = Environment::default();
        let keep_going = AtomicBool::new(true);
        let inside = mesh
            .descriptor()
            .nearest_index(Vec3::splat(0.75))
            .unwrap();
        let mut last = 0.0;
        run(
            &CpuContext::new(),
            &mesh,
            &env,
            20,
            inside,
            &[1.0],
            inside,
            &keep_going,
            |p| last = p,
            None,
        )
        .unwrap()
        .unwrap();
        assert!((last - 1.0).abs() < 1e-9);
    }
}
