//! Secondary pitch estimators that may override the period slot of the feature vector.
//!
//! The built-in [`NlpPitchEstimator`] is a non-linear pitch detector: squaring
//! the signal regenerates the fundamental from its harmonics, which is then
//! picked from the spectrum of a decimated copy.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::{PITCH_MAX_PERIOD, PITCH_MIN_PERIOD, SAMPLE_RATE};

/// Output of an alternate estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltPitch {
    /// Period in half-sample units, comparable with [`PitchEstimate::period`](crate::PitchEstimate).
    pub period_index: i32,
    /// Fundamental frequency in Hz.
    pub f0: f32,
    /// Voicing estimate in [0, 1]. Not written to the feature vector.
    pub voicing: f32,
}

/// A stateful pitch estimator fed with a rolling history of conditioned samples.
pub trait AltPitchEstimator: Send {
    /// Length of the history passed to [`estimate`](Self::estimate).
    /// May be shorter than a frame, in which case only the newest samples are kept.
    fn history_len(&self) -> usize;

    /// Estimate the pitch of `history`, whose newest sample is at the end.
    fn estimate(&mut self, history: &[f32]) -> AltPitch;
}

/// Analysis window of 40 ms at 16 kHz.
const NLP_HISTORY: usize = 640;
const DECIMATION: usize = 5;
const NLP_FFT_SIZE: usize = 512;
const FIR_TAPS: usize = 128;
/// Lowpass cutoff of the squared signal, in Hz.
const FIR_CUTOFF: f32 = 600.0;
/// Relative height a sub-multiple peak needs to replace the global maximum.
const SUBMULTIPLE_THRESHOLD: f32 = 0.3;

/// Non-linear pitch estimator.
pub struct NlpPitchEstimator {
    fft: Arc<dyn Fft<f32>>,
    fir: Vec<f32>,
    window: Vec<f32>,
    prev_f0: f32,
}

impl std::fmt::Debug for NlpPitchEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NlpPitchEstimator")
            .field("prev_f0", &self.prev_f0)
            .finish()
    }
}

impl NlpPitchEstimator {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(NLP_FFT_SIZE);

        // Hamming-windowed sinc, unity DC gain
        let fc = FIR_CUTOFF / SAMPLE_RATE as f32;
        let mid = (FIR_TAPS - 1) as f32 / 2.0;
        let mut fir: Vec<f32> = (0..FIR_TAPS)
            .map(|i| {
                let t = i as f32 - mid;
                let sinc = if t == 0.0 {
                    2.0 * fc
                } else {
                    (2.0 * PI * fc * t).sin() / (PI * t)
                };
                let w = 0.54 - 0.46 * (2.0 * PI * i as f32 / (FIR_TAPS - 1) as f32).cos();
                sinc * w
            })
            .collect();
        let sum: f32 = fir.iter().sum();
        for v in fir.iter_mut() {
            *v /= sum;
        }

        let dec_len = NLP_HISTORY / DECIMATION;
        let window = (0..dec_len)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / (dec_len - 1) as f32).cos())
            .collect();

        Self {
            fft,
            fir,
            window,
            prev_f0: 0.0,
        }
    }

    fn bin_to_hz(bin: f32) -> f32 {
        bin * SAMPLE_RATE as f32 / (NLP_FFT_SIZE * DECIMATION) as f32
    }

    fn hz_to_bin(hz: f32) -> f32 {
        hz * (NLP_FFT_SIZE * DECIMATION) as f32 / SAMPLE_RATE as f32
    }
}

impl Default for NlpPitchEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl AltPitchEstimator for NlpPitchEstimator {
    fn history_len(&self) -> usize {
        NLP_HISTORY
    }

    fn estimate(&mut self, history: &[f32]) -> AltPitch {
        debug_assert_eq!(history.len(), NLP_HISTORY);

        // Square and remove DC
        let mut sq: Vec<f32> = history.iter().map(|v| v * v).collect();
        let mean = sq.iter().sum::<f32>() / sq.len() as f32;
        for v in sq.iter_mut() {
            *v -= mean;
        }

        // Lowpass and decimate
        let dec_len = NLP_HISTORY / DECIMATION;
        let mut buf = vec![Complex32::new(0.0, 0.0); NLP_FFT_SIZE];
        for (k, w) in self.window.iter().enumerate() {
            let n = k * DECIMATION;
            let mut acc = 0.0f32;
            for (t, &h) in self.fir.iter().enumerate() {
                if n >= t {
                    acc += h * sq[n - t];
                }
            }
            buf[k] = Complex32::new(acc * w, 0.0);
        }
        debug_assert!(dec_len <= NLP_FFT_SIZE);
        self.fft.process(&mut buf);
        let fw: Vec<f32> = buf[..NLP_FFT_SIZE / 2].iter().map(|c| c.norm_sqr()).collect();

        // Period range 32..256 samples
        let min_bin = Self::hz_to_bin(SAMPLE_RATE as f32 / PITCH_MAX_PERIOD as f32).floor() as usize;
        let max_bin = Self::hz_to_bin(SAMPLE_RATE as f32 / PITCH_MIN_PERIOD as f32).ceil() as usize;

        let mut gmax = 0.0f32;
        let mut gmax_bin = min_bin;
        for (b, &v) in fw.iter().enumerate().take(max_bin + 1).skip(min_bin) {
            if v > gmax {
                gmax = v;
                gmax_bin = b;
            }
        }

        // Prefer a sub-multiple of the global peak when it is strong enough
        let prev_bin = Self::hz_to_bin(self.prev_f0);
        let mut best_bin = gmax_bin;
        let mut mult = 2;
        while gmax_bin / mult >= min_bin {
            let b = gmax_bin / mult;
            let bmin = ((0.8 * b as f32) as usize).max(min_bin).max(1);
            let bmax = (1.2 * b as f32) as usize;
            let thresh = if prev_bin > bmin as f32 && prev_bin < bmax as f32 {
                SUBMULTIPLE_THRESHOLD * 0.5 * gmax
            } else {
                SUBMULTIPLE_THRESHOLD * gmax
            };

            let mut lmax = 0.0f32;
            let mut lmax_bin = bmin;
            for (bin, &v) in fw.iter().enumerate().take(bmax + 1).skip(bmin) {
                if v > lmax {
                    lmax = v;
                    lmax_bin = bin;
                }
            }
            if lmax > thresh && lmax > fw[lmax_bin - 1] && lmax > fw[lmax_bin + 1] {
                best_bin = lmax_bin;
            }
            mult += 1;
        }

        // Parabolic refinement of the chosen peak
        let refined = if best_bin > 0 && best_bin + 1 < fw.len() {
            let (a, b, c) = (fw[best_bin - 1], fw[best_bin], fw[best_bin + 1]);
            let denom = a - 2.0 * b + c;
            if denom.abs() > f32::EPSILON {
                best_bin as f32 + (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
            } else {
                best_bin as f32
            }
        } else {
            best_bin as f32
        };

        let f0 = Self::bin_to_hz(refined).max(1.0);
        let total: f32 = fw[min_bin..=max_bin].iter().sum();
        let voicing = if total > 0.0 {
            (fw[best_bin] / total).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.prev_f0 = f0;

        let period_samples = SAMPLE_RATE as f32 / f0;
        let period_index = (2.0 * period_samples).round() as i32;
        let period_index = period_index.clamp(2 * PITCH_MIN_PERIOD as i32, 2 * PITCH_MAX_PERIOD as i32);

        AltPitch {
            period_index,
            f0,
            voicing,
        }
    }
}

/// Rolling history feeding an [`AltPitchEstimator`].
pub(crate) struct AltPitchTracker {
    estimator: Box<dyn AltPitchEstimator>,
    history: Vec<f32>,
}

impl AltPitchTracker {
    pub(crate) fn new(estimator: Box<dyn AltPitchEstimator>) -> Self {
        let len = estimator.history_len();
        Self {
            estimator,
            history: vec![0.0; len],
        }
    }

    /// Shift in one conditioned frame and run the estimator.
    pub(crate) fn update(&mut self, frame: &[f32]) -> AltPitch {
        let len = self.history.len();
        if frame.len() >= len {
            self.history.copy_from_slice(&frame[frame.len() - len..]);
        } else {
            self.history.copy_within(frame.len().., 0);
            self.history[len - frame.len()..].copy_from_slice(frame);
        }
        let estimate = self.estimator.estimate(&self.history);
        log::trace!(
            "alt pitch: index={} f0={:.1} voicing={:.2}",
            estimate.period_index,
            estimate.f0,
            estimate.voicing
        );
        estimate
    }
}
