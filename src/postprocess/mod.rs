//! Receiver-specific rendering of simulation output.
//!
//! The ray-traced impulses and the waveguide stream are rendered to one
//! channel each, then joined: the waveguide keeps everything below its
//! valid frequency, the ray tracer everything above, through a
//! complementary linear-phase crossover.

pub mod attenuator;
pub mod dc_blocker;
pub mod filters;
pub mod resample;

use crate::bands::NUM_BANDS;
use crate::environment::{Environment, intensity_to_pressure};
use crate::error::Result;
use crate::math::Vec3;
use crate::raytracer::results::{Impulse, Results};
use crate::waveguide::RunStepOutput;

pub use attenuator::{Attenuator, HrtfChannel};

#[derive(Debug, Clone, Copy)]
pub struct PostprocessOptions {
    /// Join the branches with the crossover and sum them. When disabled the
    /// longer branch is returned on its own, without level matching; useful
    /// for inspecting each method's raw output.
    pub crossover: bool,
}

impl Default for PostprocessOptions {
    fn default() -> Self {
        Self { crossover: true }
    }
}

/// The waveguide mesh is valid up to a quarter of its sample rate; the
/// crossover sits there.
pub fn crossover_frequency(waveguide_sample_rate: f64) -> f64 {
    waveguide_sample_rate / 4.0
}

/// Renders every ray-traced impulse into one channel at `output_rate`.
///
/// Direct and image-source volumes are pressure-like reflectance products:
/// they contribute `gain · volume / distance`. Diffuse volumes are
/// Monte-Carlo energies: they contribute `gain · sign·sqrt(|volume|)` with
/// the attenuator's diffuse-field gain, since their arrival direction is
/// not meaningful.
pub fn raytracer_channel(
    results: &Results,
    attenuator: &Attenuator,
    environment: &Environment,
    output_rate: f64,
) -> Vec<f32> {
    let speed = environment.speed_of_sound;
    let max_time = results.max_time(speed) as f64;
    let length = (max_time * output_rate).ceil() as usize + 2;

    let mut trains = vec![vec![0.0f32; length]; NUM_BANDS];

    let mut bin = |impulse: &Impulse, amplitudes: [f32; NUM_BANDS]| {
        let position = impulse.time(speed) as f64 * output_rate;
        let index = position.floor() as usize;
        let fraction = (position - position.floor()) as f32;
        for (band, train) in trains.iter_mut().enumerate() {
            if index + 1 < train.len() {
                train[index] += amplitudes[band] * (1.0 - fraction);
                train[index + 1] += amplitudes[band] * fraction;
            }
        }
    };

    let directional = results.direct.iter().chain(results.image_source.iter());
    for impulse in directional {
        let direction = arrival_direction(impulse.position, results.receiver);
        let gains = attenuator.band_gains(direction);
        let distance = impulse.distance.max(1e-3);
        let mut amplitudes = [0.0f32; NUM_BANDS];
        for band in 0..NUM_BANDS {
            amplitudes[band] = gains[band] * impulse.volume[band] / distance;
        }
        bin(impulse, amplitudes);
    }

    let diffuse_gains = attenuator.diffuse_field_gains();
    for layer in &results.diffuse {
        for impulse in layer {
            let mut amplitudes = [0.0f32; NUM_BANDS];
            for band in 0..NUM_BANDS {
                let energy = impulse.volume[band];
                amplitudes[band] = diffuse_gains[band] * energy.signum() * energy.abs().sqrt();
            }
            bin(impulse, amplitudes);
        }
    }

    let mut out = vec![0.0f32; length];
    for (band, train) in trains.iter().enumerate() {
        let Some((low, high)) = filters::band_cutoffs(band, output_rate) else {
            continue;
        };
        let kernel = filters::bandpass_kernel(low, high, filters::BAND_FILTER_LENGTH);
        let filtered = filters::convolve_same(train, &kernel);
        for (o, f) in out.iter_mut().zip(&filtered) {
            *o += f;
        }
    }

    dc_blocker::run_two_pass(&mut out);
    out
}

fn arrival_direction(position: Vec3, receiver: Vec3) -> Vec3 {
    let delta = position - receiver;
    if delta.length_squared() < 1e-12 {
        Vec3::X
    } else {
        delta.normalize()
    }
}

/// Renders the waveguide stream into one channel at `output_rate`:
/// directional intensity projection, zero-phase DC removal, resampling,
/// then intensity-to-pressure conversion.
pub fn waveguide_channel(
    stream: &[RunStepOutput],
    attenuator: &Attenuator,
    waveguide_sample_rate: f64,
    output_rate: f64,
    acoustic_impedance: f32,
) -> Result<Vec<f32>> {
    let mut scalars: Vec<f32> = stream
        .iter()
        .map(|step| {
            let magnitude = step.intensity.length();
            let gain = if magnitude > 1e-12 {
                // the intensity vector points along propagation; the source
                // appears to lie the opposite way
                let direction = -step.intensity / magnitude;
                mean_gain(attenuator, direction)
            } else {
                1.0
            };
            gain * magnitude * step.pressure.signum()
        })
        .collect();

    dc_blocker::run_two_pass(&mut scalars);

    let resampled = resample::adjust_sampling_rate(&scalars, waveguide_sample_rate, output_rate)?;

    Ok(resampled
        .iter()
        .map(|&s| intensity_to_pressure(s, acoustic_impedance))
        .collect())
}

/// Broadband gain of the attenuator: the waveguide stream is a single
/// stream, so per-band HRTF gains collapse to their mean.
fn mean_gain(attenuator: &Attenuator, direction: Vec3) -> f32 {
    let gains = attenuator.band_gains(direction);
    gains.sum() / NUM_BANDS as f32
}

/// Joins the two branches. Output length is the longer of the two.
pub fn mixdown(
    raytracer_p: &[f32],
    waveguide_p: &[f32],
    waveguide_sample_rate: f64,
    output_rate: f64,
    options: &PostprocessOptions,
) -> Vec<f32> {
    let length = raytracer_p.len().max(waveguide_p.len());

    if !options.crossover {
        // raw longer branch, no level matching
        let longer = if waveguide_p.len() >= raytracer_p.len() {
            waveguide_p
        } else {
            raytracer_p
        };
        let mut out = longer.to_vec();
        out.resize(length, 0.0);
        return out;
    }

    let mut low = waveguide_p.to_vec();
    low.resize(length, 0.0);
    let mut high = raytracer_p.to_vec();
    high.resize(length, 0.0);

    let cutoff = (crossover_frequency(waveguide_sample_rate) / output_rate) as f32;
    let (lowpass, highpass) =
        filters::crossover_pair(cutoff.min(0.499), filters::CROSSOVER_FILTER_LENGTH);

    let low = filters::convolve_same(&low, &lowpass);
    let high = filters::convolve_same(&high, &highpass);

    low.iter().zip(&high).map(|(l, h)| l + h).collect()
}

/// Scales a set of channels by their common peak so the loudest sample is
/// unity. Useful when comparing renders of the same scene.
pub fn normalize(channels: &mut [Vec<f32>]) {
    let peak = channels
        .iter()
        .flat_map(|c| c.iter())
        .fold(0.0f32, |a, v| a.max(v.abs()));
    if peak > 0.0 {
        for channel in channels.iter_mut() {
            for sample in channel.iter_mut() {
                *sample /= peak;
            }
        }
    }
}
