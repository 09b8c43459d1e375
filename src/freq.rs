//! Frequency-domain kernels shared by the spectral and cepstral stages:
//! the scaled DFT pair, the band layout and the orthonormal DCT.

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array2, ArrayView1};
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::{FREQ_SIZE, NB_BANDS, OVERLAP_SIZE, WINDOW_SIZE};

/// Band edges in units of [`BAND_STRIDE`] bins (200 Hz steps at the low end).
pub const EBAND5MS: [usize; NB_BANDS] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 12, 14, 16, 20, 24, 28, 34, 40,
];

/// Bins per band-edge unit.
pub const BAND_STRIDE: usize = 4;

/// Forward/inverse DFT of one analysis window.
#[derive(Clone)]
pub struct Transform {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform")
            .field("len", &WINDOW_SIZE)
            .finish()
    }
}

impl Transform {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            forward: planner.plan_fft_forward(WINDOW_SIZE),
            inverse: planner.plan_fft_inverse(WINDOW_SIZE),
        }
    }

    /// DFT scaled by `1/WINDOW_SIZE`; returns the `FREQ_SIZE` non-negative bins.
    pub fn forward(&self, input: &[f32]) -> Vec<Complex32> {
        debug_assert_eq!(input.len(), WINDOW_SIZE);
        let mut buf: Vec<Complex32> = input.iter().map(|&v| Complex32::new(v, 0.0)).collect();
        self.forward.process(&mut buf);
        let norm = 1.0 / WINDOW_SIZE as f32;
        buf.truncate(FREQ_SIZE);
        for bin in buf.iter_mut() {
            *bin *= norm;
        }
        buf
    }

    /// Unscaled inverse DFT of a Hermitian spectrum given by its first `FREQ_SIZE` bins.
    pub fn inverse(&self, input: &[Complex32]) -> Vec<f32> {
        debug_assert_eq!(input.len(), FREQ_SIZE);
        let mut buf = vec![Complex32::new(0.0, 0.0); WINDOW_SIZE];
        buf[..FREQ_SIZE].copy_from_slice(input);
        for i in FREQ_SIZE..WINDOW_SIZE {
            buf[i] = buf[WINDOW_SIZE - i].conj();
        }
        self.inverse.process(&mut buf);
        buf.iter().map(|c| c.re).collect()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/// Half of the power-complementary analysis window.
pub fn half_window() -> [f32; OVERLAP_SIZE] {
    let mut w = [0.0f32; OVERLAP_SIZE];
    for (i, v) in w.iter_mut().enumerate() {
        let s = (0.5 * PI * (i as f64 + 0.5) / OVERLAP_SIZE as f64).sin();
        *v = (0.5 * PI * s * s).sin() as f32;
    }
    w
}

/// Apply the window symmetrically to both ends of `x`.
pub fn apply_window(x: &mut [f32], half_window: &[f32; OVERLAP_SIZE]) {
    let n = x.len();
    for (i, &w) in half_window.iter().enumerate() {
        x[i] *= w;
        x[n - 1 - i] *= w;
    }
}

/// Triangular band aggregation of bin power.
pub fn compute_band_energy(bins: &[Complex32]) -> [f32; NB_BANDS] {
    let mut sum = [0.0f32; NB_BANDS];
    for i in 0..NB_BANDS - 1 {
        let start = EBAND5MS[i] * BAND_STRIDE;
        let band_size = (EBAND5MS[i + 1] - EBAND5MS[i]) * BAND_STRIDE;
        for j in 0..band_size {
            let frac = j as f32 / band_size as f32;
            let power = bins[start + j].norm_sqr();
            sum[i] += (1.0 - frac) * power;
            sum[i + 1] += frac * power;
        }
    }
    sum[0] *= 2.0;
    sum[NB_BANDS - 1] *= 2.0;
    sum
}

/// Linear interpolation of per-band values back onto bins. The top bin is left at zero.
pub fn interp_band_gain(band: &[f32; NB_BANDS]) -> [f32; FREQ_SIZE] {
    let mut g = [0.0f32; FREQ_SIZE];
    for i in 0..NB_BANDS - 1 {
        let start = EBAND5MS[i] * BAND_STRIDE;
        let band_size = (EBAND5MS[i + 1] - EBAND5MS[i]) * BAND_STRIDE;
        for j in 0..band_size {
            let frac = j as f32 / band_size as f32;
            g[start + j] = (1.0 - frac) * band[i] + frac * band[i + 1];
        }
    }
    g
}

/// Orthonormal DCT-II over `NB_BANDS` points and its inverse.
#[derive(Debug, Clone)]
pub struct DctTable {
    // table[[i, j]] = cos((i + 0.5) j pi / N), DC column scaled by sqrt(1/2)
    table: Array2<f32>,
    scale: f32,
}

impl DctTable {
    pub fn new() -> Self {
        let n = NB_BANDS;
        let table = Array2::from_shape_fn((n, n), |(i, j)| {
            let mut v = ((i as f64 + 0.5) * j as f64 * PI / n as f64).cos();
            if j == 0 {
                v *= 0.5f64.sqrt();
            }
            v as f32
        });
        Self {
            table,
            scale: (2.0 / n as f64).sqrt() as f32,
        }
    }

    /// Forward transform: log band energies to cepstrum.
    pub fn dct(&self, input: &[f32; NB_BANDS]) -> [f32; NB_BANDS] {
        let out = self.table.t().dot(&ArrayView1::from(&input[..]));
        let mut result = [0.0f32; NB_BANDS];
        for (r, v) in result.iter_mut().zip(out.iter()) {
            *r = v * self.scale;
        }
        result
    }

    /// Inverse transform: cepstrum to log band energies.
    pub fn idct(&self, input: &[f32; NB_BANDS]) -> [f32; NB_BANDS] {
        let out = self.table.dot(&ArrayView1::from(&input[..]));
        let mut result = [0.0f32; NB_BANDS];
        for (r, v) in result.iter_mut().zip(out.iter()) {
            *r = v * self.scale;
        }
        result
    }
}

impl Default for DctTable {
    fn default() -> Self {
        Self::new()
    }
}
