//! Simulation orchestration.
//!
//! [`HallSonicEngine`] owns the voxelised scene and the waveguide mesh,
//! validates the source and receiver placements at construction, and runs
//! both simulators in sequence: the ray tracer first, whose latest arrival
//! fixes the waveguide duration. A run yields an [`Intermediate`] that can
//! be rendered any number of times for different receiver configurations.

use std::sync::atomic::AtomicBool;

use crate::compute::{ComputeContext, CpuContext};
use crate::environment::Environment;
use crate::error::{HallSonicError, Result};
use crate::math::Vec3;
use crate::postprocess::{self, Attenuator, PostprocessOptions};
use crate::raytracer::{self, RaytracerDesc, Results};
use crate::scene::{SceneData, VoxelGrid};
use crate::waveguide::{self, InputKernel, Mesh, RunStepOutput};

/// Externally observable phases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Initialising,
    StartingRaytracer,
    RunningRaytracer,
    FinishingRaytracer,
    StartingWaveguide,
    RunningWaveguide,
    FinishingWaveguide,
    Postprocessing,
}

pub type StateCallback = Box<dyn Fn(State, f64) + Send + Sync>;
pub type WaveguideVisualCallback = Box<dyn Fn(&[f32], f64) + Send + Sync>;
pub type RaytracerVisualCallback = Box<dyn Fn(&[Vec3], Vec3) + Send + Sync>;

/// Optional hooks, fixed at construction. All are invoked from the driver
/// task and must be cheap; none may retain references past the call.
#[derive(Default)]
pub struct EngineCallbacks {
    pub state: Option<StateCallback>,
    pub waveguide_visual: Option<WaveguideVisualCallback>,
    pub raytracer_visual: Option<RaytracerVisualCallback>,
}

#[derive(Debug, Clone)]
pub struct EngineDesc {
    /// Sample rate of the waveguide mesh; it is valid up to a quarter of
    /// this.
    pub waveguide_sample_rate: f64,
    pub raytracer: RaytracerDesc,
    pub environment: Environment,
}

impl Default for EngineDesc {
    fn default() -> Self {
        Self {
            waveguide_sample_rate: 4000.0,
            raytracer: RaytracerDesc::default(),
            environment: Environment::default(),
        }
    }
}

/// Immutable product of a run. Rendering it is pure, so one simulation can
/// be rendered for any number of receiver configurations and output rates.
#[derive(Debug, Clone)]
pub struct Intermediate {
    results: Results,
    stream: Vec<RunStepOutput>,
    source: Vec3,
    receiver: Vec3,
    waveguide_sample_rate: f64,
    environment: Environment,
}

impl Intermediate {
    pub fn source(&self) -> Vec3 {
        self.source
    }

    pub fn receiver(&self) -> Vec3 {
        self.receiver
    }

    pub fn raytracer_results(&self) -> &Results {
        &self.results
    }

    pub fn waveguide_stream(&self) -> &[RunStepOutput] {
        &self.stream
    }

    /// Renders one channel at `output_rate`.
    pub fn postprocess(&self, attenuator: &Attenuator, output_rate: f64) -> Result<Vec<f32>> {
        self.postprocess_with(attenuator, output_rate, &PostprocessOptions::default())
    }

    pub fn postprocess_with(
        &self,
        attenuator: &Attenuator,
        output_rate: f64,
        options: &PostprocessOptions,
    ) -> Result<Vec<f32>> {
        let raytracer_p = postprocess::raytracer_channel(
            &self.results,
            attenuator,
            &self.environment,
            output_rate,
        );
        let waveguide_p = postprocess::waveguide_channel(
            &self.stream,
            attenuator,
            self.waveguide_sample_rate,
            output_rate,
            self.environment.acoustic_impedance,
        )?;
        Ok(postprocess::mixdown(
            &raytracer_p,
            &waveguide_p,
            self.waveguide_sample_rate,
            output_rate,
            options,
        ))
    }

    /// Renders one channel per attenuator.
    pub fn postprocess_channels(
        &self,
        attenuators: &[Attenuator],
        output_rate: f64,
    ) -> Result<Vec<Vec<f32>>> {
        attenuators
            .iter()
            .map(|a| self.postprocess(a, output_rate))
            .collect()
    }
}

impl<C: ComputeContext> std::fmt::Debug for HallSonicEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HallSonicEngine")
            .field("desc", &self.desc)
            .field("source", &self.source)
            .field("receiver", &self.receiver)
            .field("source_index", &self.source_index)
            .field("receiver_index", &self.receiver_index)
            .finish_non_exhaustive()
    }
}

pub struct HallSonicEngine<C: ComputeContext = CpuContext> {
    ctx: C,
    desc: EngineDesc,
    grid: VoxelGrid,
    mesh: Mesh,
    source: Vec3,
    receiver: Vec3,
    source_index: usize,
    receiver_index: usize,
    callbacks: EngineCallbacks,
}

impl HallSonicEngine<CpuContext> {
    /// Builds an engine on the host CPU.
    pub fn new(
        scene: SceneData,
        source: Vec3,
        receiver: Vec3,
        desc: EngineDesc,
        callbacks: EngineCallbacks,
    ) -> Result<Self> {
        Self::with_context(CpuContext::new(), scene, source, receiver, desc, callbacks)
    }
}

impl<C: ComputeContext> HallSonicEngine<C> {
    pub fn with_context(
        ctx: C,
        scene: SceneData,
        source: Vec3,
        receiver: Vec3,
        desc: EngineDesc,
        callbacks: EngineCallbacks,
    ) -> Result<Self> {
        if desc.waveguide_sample_rate <= 0.0 {
            return Err(HallSonicError::InvalidConfiguration(
                "waveguide sample rate must be positive".into(),
            ));
        }
        for surface in &scene.surfaces {
            surface.validate()?;
        }

        let grid = VoxelGrid::build(scene);
        let mesh = Mesh::build(
            &grid,
            &desc.environment,
            desc.waveguide_sample_rate as f32,
        );

        let source_index = mesh
            .descriptor()
            .nearest_index(source)
            .filter(|&i| mesh.is_inside(i))
            .ok_or(HallSonicError::SourceOutsideMesh)?;
        let receiver_index = mesh
            .descriptor()
            .nearest_index(receiver)
            .filter(|&i| mesh.is_inside(i))
            .ok_or(HallSonicError::ReceiverOutsideMesh)?;

        Ok(Self {
            ctx,
            desc,
            grid,
            mesh,
            source,
            receiver,
            source_index,
            receiver_index,
            callbacks,
        })
    }

    pub fn desc(&self) -> &EngineDesc {
        &self.desc
    }

    /// World positions of the mesh nodes, for visualisation.
    pub fn node_positions(&self) -> Vec<Vec3> {
        self.mesh.node_positions()
    }

    fn emit(&self, state: State, progress: f64) {
        if let Some(cb) = &self.callbacks.state {
            cb(state, progress);
        }
    }

    /// Runs the full simulation. Returns `Ok(None)` when `keep_going` is
    /// cleared; the engine stays reusable afterwards.
    pub fn run(&self, keep_going: &AtomicBool) -> Result<Option<Intermediate>> {
        let environment = self.desc.environment;

        self.emit(State::Initialising, 1.0);
        self.emit(State::StartingRaytracer, 1.0);

        let raytracer_adapter;
        let raytracer_visual: Option<&dyn Fn(&[Vec3], Vec3)> =
            match &self.callbacks.raytracer_visual {
                Some(cb) => {
                    raytracer_adapter = move |positions: &[Vec3], source: Vec3| {
                        cb(positions, source);
                    };
                    Some(&raytracer_adapter)
                }
                None => None,
            };

        let Some(results) = raytracer::run(
            &self.ctx,
            &self.grid,
            &environment,
            self.source,
            self.receiver,
            &self.desc.raytracer,
            keep_going,
            |p| self.emit(State::RunningRaytracer, p),
            raytracer_visual,
        )?
        else {
            return Ok(None);
        };

        self.emit(State::FinishingRaytracer, 1.0);
        self.emit(State::StartingWaveguide, 1.0);

        let input = InputKernel::default_kernel(self.desc.waveguide_sample_rate as f32);
        let max_time = results.max_time(environment.speed_of_sound) as f64;
        let steps = (max_time * self.desc.waveguide_sample_rate).ceil() as usize
            + input.opaque_kernel_size;

        let waveguide_adapter;
        let waveguide_visual: Option<&dyn Fn(&[f32], f64)> =
            match &self.callbacks.waveguide_visual {
                Some(cb) => {
                    waveguide_adapter = move |pressures: &[f32], time: f64| {
                        cb(pressures, time);
                    };
                    Some(&waveguide_adapter)
                }
                None => None,
            };

        let Some(mut stream) = waveguide::run(
            &self.ctx,
            &self.mesh,
            &environment,
            steps,
            self.source_index,
            &input.kernel,
            self.receiver_index,
            keep_going,
            |p| self.emit(State::RunningWaveguide, p),
            waveguide_visual,
        )?
        else {
            return Ok(None);
        };

        self.emit(State::FinishingWaveguide, 1.0);

        // realign the waveguide stream with t = 0
        let offset = input.correction_offset_in_samples.min(stream.len());
        stream.drain(..offset);

        Ok(Some(Intermediate {
            results,
            stream,
            source: self.source,
            receiver: self.receiver,
            waveguide_sample_rate: self.desc.waveguide_sample_rate,
            environment,
        }))
    }

    /// Renders an intermediate while reporting the post-processing phase
    /// through the engine's state callback.
    pub fn postprocess(
        &self,
        intermediate: &Intermediate,
        attenuator: &Attenuator,
        output_rate: f64,
    ) -> Result<Vec<f32>> {
        self.emit(State::Postprocessing, 1.0);
        let out = intermediate.postprocess(attenuator, output_rate);
        self.emit(State::Idle, 1.0);
        out
    }
}
