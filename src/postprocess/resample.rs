//! Sample-rate conversion of the waveguide stream.

use rubato::{FftFixedIn, Resampler};

use crate::error::{HallSonicError, Result};

const CHUNK_SIZE: usize = 1024;

/// Resamples a single channel from `from_rate` to `to_rate` with rubato's
/// FFT resampler. The resampler's own delay is trimmed and the output is
/// sized to `len * to_rate / from_rate`, so sample `n` of the output
/// corresponds to time `n / to_rate`.
pub fn adjust_sampling_rate(signal: &[f32], from_rate: f64, to_rate: f64) -> Result<Vec<f32>> {
    if signal.is_empty() || (from_rate - to_rate).abs() < f64::EPSILON {
        return Ok(signal.to_vec());
    }

    let expected = (signal.len() as f64 * to_rate / from_rate).round() as usize;

    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, 2, 1)
            .map_err(|e| HallSonicError::Resample(format!("failed to create resampler: {e}")))?;
    let delay = resampler.output_delay();

    let mut out = Vec::with_capacity(expected + delay);
    let mut index = 0;
    // feed the signal, then zeros, until the delayed tail has flushed
    while out.len() < expected + delay {
        let mut chunk = vec![0.0f32; CHUNK_SIZE];
        if index < signal.len() {
            let end = (index + CHUNK_SIZE).min(signal.len());
            chunk[..end - index].copy_from_slice(&signal[index..end]);
        }
        index += CHUNK_SIZE;

        let waves = resampler
            .process(&[chunk], None)
            .map_err(|e| HallSonicError::Resample(format!("resampling failed: {e}")))?;
        out.extend_from_slice(&waves[0]);
    }

    Ok(out[delay..delay + expected].to_vec())
}
