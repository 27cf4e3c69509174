//! # Fast Fourier Transform (FFT) Module
//!
//! Valid-mode convolution for the band-pass stage. Capture blocks run to
//! tens of thousands of samples against a 250-tap filter, so long inputs go
//! through an FFT (RustFFT) while short ones use the direct sum.
//!
//! Both paths compute `y[n] = sum_k x[n + k] * h[taps - 1 - k]` for
//! `n in 0..=(x.len() - taps)`, i.e. only the output positions where the
//! filter fully overlaps the input.

use rustfft::{num_complex::Complex, FftPlanner};

/// Below this many multiply-adds the direct sum beats planning an FFT.
const DIRECT_WORK_LIMIT: usize = 1 << 16;

/// Convolves `input` with `kernel`, keeping only fully-overlapping outputs.
///
/// Returns an empty vector when either side is empty or the input is
/// shorter than the kernel.
pub fn convolve_valid(input: &[f32], kernel: &[f32]) -> Vec<f32> {
    if kernel.is_empty() || input.len() < kernel.len() {
        return Vec::new();
    }
    let out_len = input.len() - kernel.len() + 1;
    if out_len.saturating_mul(kernel.len()) <= DIRECT_WORK_LIMIT {
        convolve_direct(input, kernel)
    } else {
        convolve_fft(input, kernel)
    }
}

/// Direct valid-mode convolution.
pub(crate) fn convolve_direct(input: &[f32], kernel: &[f32]) -> Vec<f32> {
    if kernel.is_empty() || input.len() < kernel.len() {
        return Vec::new();
    }
    let taps = kernel.len();
    input
        .windows(taps)
        .map(|window| {
            window
                .iter()
                .zip(kernel.iter().rev())
                .map(|(&x, &h)| f64::from(x) * f64::from(h))
                .sum::<f64>() as f32
        })
        .collect()
}

/// FFT valid-mode convolution.
///
/// Both signals are zero-padded to a power of two covering the full linear
/// convolution so the circular product never wraps.
pub(crate) fn convolve_fft(input: &[f32], kernel: &[f32]) -> Vec<f32> {
    if kernel.is_empty() || input.len() < kernel.len() {
        return Vec::new();
    }
    let full_len = input.len() + kernel.len() - 1;
    let size = full_len.next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(size);
    let inverse = planner.plan_fft_inverse(size);

    let mut signal = padded(input, size);
    let mut response = padded(kernel, size);
    forward.process(&mut signal);
    forward.process(&mut response);

    for (s, r) in signal.iter_mut().zip(response.iter()) {
        *s *= *r;
    }
    inverse.process(&mut signal);

    // RustFFT leaves the inverse unnormalized.
    let norm = 1.0 / size as f64;
    let start = kernel.len() - 1;
    let out_len = input.len() - kernel.len() + 1;
    signal[start..start + out_len]
        .iter()
        .map(|c| (c.re * norm) as f32)
        .collect()
}

fn padded(samples: &[f32], size: usize) -> Vec<Complex<f64>> {
    let mut buffer: Vec<Complex<f64>> = samples
        .iter()
        .map(|&sample| Complex {
            re: f64::from(sample),
            im: 0.0,
        })
        .collect();
    buffer.resize(size, Complex { re: 0.0, im: 0.0 });
    buffer
}
