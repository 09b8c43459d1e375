use rustfft::num_complex::Complex32;

use crate::freq::{self, Transform};
use crate::state::StreamState;
use crate::{FRAME_SIZE, NB_BANDS, OVERLAP_SIZE, WINDOW_SIZE};

/// Spectrum and band energies of one analysis window.
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// `FREQ_SIZE` complex bins; bins at or above the lowpass cutoff are zero.
    pub bins: Vec<Complex32>,
    /// Non-negative band energies.
    pub band_energy: [f32; NB_BANDS],
}

/// Overlapped windowed analysis of conditioned frames.
#[derive(Debug, Clone)]
pub struct SpectralAnalyzer {
    transform: Transform,
    half_window: [f32; OVERLAP_SIZE],
    lowpass: usize,
    window: Vec<f32>,
}

impl SpectralAnalyzer {
    /// # Arguments
    /// * `transform` - Shared DFT plans
    /// * `lowpass` - First bin to zero; `FREQ_SIZE` keeps the full band
    pub fn new(transform: Transform, lowpass: usize) -> Self {
        Self {
            transform,
            half_window: freq::half_window(),
            lowpass,
            window: vec![0.0; WINDOW_SIZE],
        }
    }

    /// Analyze one conditioned frame of `FRAME_SIZE` samples.
    ///
    /// The window is the previous overlap tail followed by `frame`; the tail is
    /// then replaced by the end of `frame` for the next call.
    pub fn analyze(&mut self, state: &mut StreamState, frame: &[f32]) -> Spectrum {
        debug_assert_eq!(frame.len(), FRAME_SIZE);
        self.window[..OVERLAP_SIZE].copy_from_slice(&state.analysis_mem);
        self.window[OVERLAP_SIZE..].copy_from_slice(frame);
        state
            .analysis_mem
            .copy_from_slice(&frame[FRAME_SIZE - OVERLAP_SIZE..]);

        freq::apply_window(&mut self.window, &self.half_window);
        let mut bins = self.transform.forward(&self.window);
        for bin in bins.iter_mut().skip(self.lowpass) {
            *bin = Complex32::new(0.0, 0.0);
        }
        let band_energy = freq::compute_band_energy(&bins);

        Spectrum { bins, band_energy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FREQ_SIZE;

    #[test]
    fn test_updates_analysis_memory() {
        let mut analyzer = SpectralAnalyzer::new(Transform::new(), FREQ_SIZE);
        let mut state = StreamState::new();
        let frame: Vec<f32> = (0..FRAME_SIZE).map(|i| i as f32).collect();

        analyzer.analyze(&mut state, &frame);
        assert_eq!(state.analysis_memory(), &frame[FRAME_SIZE - OVERLAP_SIZE..]);
    }

    #[test]
    fn test_uses_previous_tail() {
        let mut analyzer = SpectralAnalyzer::new(Transform::new(), FREQ_SIZE);
        let mut state = StreamState::new();
        let loud = vec![1000.0f32; FRAME_SIZE];
        let silent = vec![0.0f32; FRAME_SIZE];

        analyzer.analyze(&mut state, &loud);
        // The window still contains the loud tail, so energy is non-zero.
        let spectrum = analyzer.analyze(&mut state, &silent);
        assert!(spectrum.band_energy[0] > 0.0);

        let spectrum = analyzer.analyze(&mut state, &silent);
        assert!(spectrum.band_energy.iter().all(|&e| e == 0.0));
    }

    #[test]
    fn test_lowpass_zeroes_upper_bins() {
        let cutoff = 40;
        let mut analyzer = SpectralAnalyzer::new(Transform::new(), cutoff);
        let mut state = StreamState::new();
        let frame: Vec<f32> = (0..FRAME_SIZE)
            .map(|i| 1000.0 * (i as f32 * 2.5).sin())
            .collect();

        let spectrum = analyzer.analyze(&mut state, &frame);
        assert_eq!(spectrum.bins.len(), FREQ_SIZE);
        assert!(spectrum.bins[cutoff..].iter().all(|b| b.norm() == 0.0));
        assert_eq!(spectrum.band_energy[NB_BANDS - 1], 0.0);
    }

    #[test]
    fn test_band_energy_non_negative() {
        let mut analyzer = SpectralAnalyzer::new(Transform::new(), FREQ_SIZE);
        let mut state = StreamState::new();
        for k in 0..4 {
            let frame: Vec<f32> = (0..FRAME_SIZE)
                .map(|i| 500.0 * ((i + k * FRAME_SIZE) as f32 * 0.05).sin())
                .collect();
            let spectrum = analyzer.analyze(&mut state, &frame);
            assert!(spectrum.band_energy.iter().all(|&e| e >= 0.0 && e.is_finite()));
        }
    }
}
