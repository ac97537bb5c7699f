//! Band-limited input kernel for the soft source.

/// The injected excitation signal.
///
/// `opaque_kernel_size` is the number of steps the waveguide must run past
/// the last geometric arrival so the whole kernel passes the receiver;
/// `correction_offset_in_samples` is the kernel's group delay, trimmed from
/// the head of the receiver stream to realign it with `t = 0`.
#[derive(Debug, Clone)]
pub struct InputKernel {
    pub kernel: Vec<f32>,
    pub opaque_kernel_size: usize,
    pub correction_offset_in_samples: usize,
}

/// Length of the default kernel; odd so the group delay is a whole number
/// of samples.
const DEFAULT_KERNEL_LENGTH: usize = 63;

/// Normalised cutoff of the default kernel in cycles per sample. The mesh
/// is only valid up to a quarter of its sample rate, so the excitation
/// carries no energy above that.
const DEFAULT_CUTOFF: f32 = 0.25;

impl InputKernel {
    /// The default excitation: a Hann-windowed sinc low-passed at a quarter
    /// of the mesh rate, unit DC gain.
    pub fn default_kernel(_sample_rate: f32) -> Self {
        let length = DEFAULT_KERNEL_LENGTH;
        let centre = (length / 2) as f32;
        let mut kernel: Vec<f32> = (0..length)
            .map(|i| {
                let n = i as f32 - centre;
                let sinc = if n == 0.0 {
                    2.0 * DEFAULT_CUTOFF
                } else {
                    (2.0 * std::f32::consts::PI * DEFAULT_CUTOFF * n).sin()
                        / (std::f32::consts::PI * n)
                };
                let window = 0.5
                    * (1.0
                        - (2.0 * std::f32::consts::PI * i as f32 / (length - 1) as f32).cos());
                sinc * window
            })
            .collect();
        let sum: f32 = kernel.iter().sum();
        for v in kernel.iter_mut() {
            *v /= sum;
        }
        Self {
            kernel,
            opaque_kernel_size: length,
            correction_offset_in_samples: length / 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_shape() {
        let k = InputKernel::default_kernel(4000.0);
        assert_eq!(k.kernel.len(), k.opaque_kernel_size);
        assert_eq!(k.correction_offset_in_samples, k.kernel.len() / 2);
        // unit DC gain
        let sum: f32 = k.kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        // symmetric about its centre
        let len = k.kernel.len();
        for i in 0..len / 2 {
            assert!((k.kernel[i] - k.kernel[len - 1 - i]).abs() < 1e-6);
        }
        // peak at the centre
        let peak = k
            .kernel
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap()
            .0;
        assert_eq!(peak, len / 2);
    }

    #[test]
    fn test_kernel_is_band_limited() {
        let k = InputKernel::default_kernel(4000.0);
        // crude DFT magnitude above and below the cutoff
        let magnitude = |freq: f32| {
            let (mut re, mut im) = (0.0f32, 0.0f32);
            for (n, v) in k.kernel.iter().enumerate() {
                let phase = 2.0 * std::f32::consts::PI * freq * n as f32;
                re += v * phase.cos();
                im -= v * phase.sin();
            }
            (re * re + im * im).sqrt()
        };
        let passband = magnitude(0.05);
        let stopband = magnitude(0.45);
        assert!(passband > 0.9);
        assert!(stopband < 0.05);
    }
}
