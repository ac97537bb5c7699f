//! Linear-phase FIR kernels: the per-band reconstruction bank and the
//! waveguide/raytracer crossover pair.

use crate::bands::{NUM_BANDS, band_range};

/// Default length of the per-band reconstruction filters.
pub const BAND_FILTER_LENGTH: usize = 255;

/// Default length of the crossover filters.
pub const CROSSOVER_FILTER_LENGTH: usize = 127;

/// Hann-windowed sinc low-pass with unit DC gain. `cutoff` is normalised to
/// the sample rate (cycles per sample, `0..0.5`). `length` must be odd.
pub fn lowpass_kernel(cutoff: f32, length: usize) -> Vec<f32> {
    debug_assert!(length % 2 == 1);
    let centre = (length / 2) as f32;
    let mut kernel: Vec<f32> = (0..length)
        .map(|i| {
            let n = i as f32 - centre;
            let sinc = if n == 0.0 {
                2.0 * cutoff
            } else {
                (2.0 * std::f32::consts::PI * cutoff * n).sin() / (std::f32::consts::PI * n)
            };
            let window =
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (length - 1) as f32).cos());
            sinc * window
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    if sum.abs() > 1e-12 {
        for v in kernel.iter_mut() {
            *v /= sum;
        }
    }
    kernel
}

/// Band-pass as the difference of two low-passes over `(low, high)`
/// normalised cutoffs.
pub fn bandpass_kernel(low: f32, high: f32, length: usize) -> Vec<f32> {
    let upper = lowpass_kernel(high, length);
    let lower = lowpass_kernel(low, length);
    upper.iter().zip(&lower).map(|(u, l)| u - l).collect()
}

/// Complementary linear-phase crossover pair at normalised `cutoff`: the
/// high-pass is the spectral inverse of the low-pass, so the two sum to a
/// pure delay.
pub fn crossover_pair(cutoff: f32, length: usize) -> (Vec<f32>, Vec<f32>) {
    let lowpass = lowpass_kernel(cutoff, length);
    let mut highpass: Vec<f32> = lowpass.iter().map(|v| -v).collect();
    highpass[length / 2] += 1.0;
    (lowpass, highpass)
}

/// Convolves `signal` with a linear-phase `kernel`, compensating the group
/// delay so the output has the same length and alignment as the input.
pub fn convolve_same(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    let centre = kernel.len() / 2;
    let mut out = vec![0.0f32; signal.len()];
    for (n, slot) in out.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for (j, k) in kernel.iter().enumerate() {
            let idx = n as isize + centre as isize - j as isize;
            if idx >= 0 && (idx as usize) < signal.len() {
                acc += k * signal[idx as usize];
            }
        }
        *slot = acc;
    }
    out
}

/// Normalised `(low, high)` cutoffs of band `b` at `sample_rate`, clamped
/// to just below Nyquist. Returns `None` when the whole band lies above it.
pub fn band_cutoffs(b: usize, sample_rate: f64) -> Option<(f32, f32)> {
    debug_assert!(b < NUM_BANDS);
    let (lo, hi) = band_range(b);
    let nyquist_margin = 0.499;
    let lo_norm = lo / sample_rate as f32;
    let hi_norm = hi / sample_rate as f32;
    if lo_norm >= nyquist_margin {
        return None;
    }
    Some((lo_norm, hi_norm.min(nyquist_margin)))
}
