//! Linear convolution
//!
//! `fft_convolve` is what the pipeline uses; `direct_convolve` is the
//! O(n·m) reference it is tested against.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

/// Full linear convolution length: `n1 + n2 - 1`, or 0 if either is empty.
pub const fn convolved_len(n1: usize, n2: usize) -> usize {
    if n1 == 0 || n2 == 0 { 0 } else { n1 + n2 - 1 }
}

/// Direct-form convolution of `signal` with `kernel`.
pub fn direct_convolve(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0f32; convolved_len(signal.len(), kernel.len())];
    for (i, &s) in signal.iter().enumerate() {
        for (j, &k) in kernel.iter().enumerate() {
            out[i + j] += s * k;
        }
    }
    out
}

/// FFT convolution of `signal` with `kernel` (computed in f64).
///
/// Zero-pads both to the next power of two at or above the full output
/// length, so the circular product equals the linear one.
pub fn fft_convolve(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    let out_len = convolved_len(signal.len(), kernel.len());
    if out_len == 0 {
        return Vec::new();
    }
    let n = out_len.next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let pad = |xs: &[f32]| -> Vec<Complex<f64>> {
        let mut v: Vec<Complex<f64>> = xs.iter().map(|&x| Complex::new(f64::from(x), 0.0)).collect();
        v.resize(n, Complex::new(0.0, 0.0));
        v
    };
    let mut a = pad(signal);
    let mut b = pad(kernel);

    forward.process(&mut a);
    forward.process(&mut b);
    for (x, y) in a.iter_mut().zip(&b) {
        *x *= *y;
    }
    inverse.process(&mut a);

    // rustfft leaves the inverse unnormalized
    let scale = 1.0 / n as f64;
    a.into_iter()
        .take(out_len)
        .map(|c| (c.re * scale) as f32)
        .collect()
}
