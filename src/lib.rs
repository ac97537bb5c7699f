//! # HallSonic
//!
//! An offline room-acoustics impulse-response simulator. Given a triangle
//! scene with per-surface acoustic materials, a source, and a receiver,
//! it renders a broadband impulse response per output channel, ready to be
//! convolved with dry audio.
//!
//! The simulator is hybrid: a stochastic ray tracer covers mid/high
//! frequencies (early specular reflections validated by image sources,
//! late diffuse energy by diffuse rain), while a rectilinear FDTD
//! waveguide mesh covers the low end where geometric acoustics breaks
//! down. The two streams are joined with a complementary crossover at a
//! quarter of the waveguide rate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hallsonic::*;
//! use std::sync::atomic::AtomicBool;
//!
//! // A 4 x 3 x 6 m shoebox room with moderately absorbing walls
//! let room = scene::Aabb::new(Vec3::ZERO, Vec3::new(4.0, 3.0, 6.0));
//! let scene = scene::scene_from_box(&room, scene::Surface::uniform(0.3, 0.1));
//!
//! // Build the engine: placements are validated against the mesh here
//! let engine = HallSonicEngine::new(
//!     scene,
//!     Vec3::new(1.0, 1.2, 1.0),
//!     Vec3::new(2.5, 1.2, 4.5),
//!     EngineDesc::default(),
//!     EngineCallbacks::default(),
//! )?;
//!
//! // Run both simulators; the flag cancels a run from another thread
//! let keep_going = AtomicBool::new(true);
//! let intermediate = engine.run(&keep_going)?.expect("not cancelled");
//!
//! // Render any number of channels from one run
//! let omni = intermediate.postprocess(&Attenuator::Null, 44_100.0)?;
//! let cardioid = intermediate.postprocess(
//!     &Attenuator::microphone(Vec3::Z, 0.5),
//!     44_100.0,
//! )?;
//! # Ok::<(), HallSonicError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`HallSonicEngine`]**: owns the voxelised scene and the waveguide
//!   mesh, orchestrates a run
//! - **[`Intermediate`]**: immutable product of a run; rendering it is
//!   pure and repeatable
//! - **[`Attenuator`]**: receiver model per channel (omni, polar
//!   microphone, or one binaural ear)
//! - **[`scene::VoxelGrid`]**: triangle scene behind a uniform spatial
//!   hash, shared by both simulators
//! - **[`compute::ComputeContext`]**: data-parallel kernel dispatch seam;
//!   [`compute::CpuContext`] runs kernels on a rayon pool
//! - **[`events::EventChannel`]**: forwards progress and visualisation
//!   callbacks across threads

pub mod bands;
pub mod compute;
pub mod engine;
pub mod environment;
pub mod error;
pub mod events;
pub mod math;
pub mod postprocess;
pub mod raytracer;
pub mod scene;
pub mod waveguide;

pub use bands::{Bands, NUM_BANDS};
pub use engine::{
    EngineCallbacks, EngineDesc, HallSonicEngine, Intermediate, State,
};
pub use environment::Environment;
pub use error::{HallSonicError, Result};
pub use events::{EventChannel, HallSonicEvent};
pub use math::{Orientation, Vec3};
pub use postprocess::{Attenuator, HrtfChannel, PostprocessOptions};
pub use raytracer::RaytracerDesc;
