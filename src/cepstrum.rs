use rustfft::num_complex::Complex32;

use crate::features::FeatureVector;
use crate::freq::{self, DctTable, Transform};
use crate::lpc;
use crate::state::StreamState;
use crate::{FREQ_SIZE, LPC_ORDER, NB_BANDS};

/// Added to band energies before the logarithm.
pub const ENERGY_FLOOR: f32 = 1e-2;
/// Log-energies may not fall further than this below the running maximum.
const LOG_SPREAD: f32 = 8.0;
/// Per-band decay of the follower.
const FOLLOW_STEP: f32 = 2.5;
/// Initial value of both trackers.
const TRACKER_START: f32 = -2.0;
/// Subtracted from c0 to recenter it.
pub const C0_OFFSET: f32 = 4.0;
/// Smallest prediction gain passed to the logarithm.
pub const LPC_GAIN_FLOOR: f32 = 1e-9;

/// Per-band correction applied to band energies before LPC fitting.
const COMPENSATION: [f32; NB_BANDS] = [
    0.8, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.666667, 0.5, 0.5, 0.5, 0.333333, 0.25, 0.25, 0.2,
    0.166667, 0.173913,
];

/// Builds the cepstral and LPC part of the feature vector from band energies.
#[derive(Debug, Clone)]
pub struct CepstralFeatureBuilder {
    transform: Transform,
    dct: DctTable,
}

impl CepstralFeatureBuilder {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            dct: DctTable::new(),
        }
    }

    /// DCT tables used by this builder.
    pub fn dct(&self) -> &DctTable {
        &self.dct
    }

    /// Write cepstrum, LPC gain and LPC coefficients into `features`, updating `state.lpc`.
    pub fn build(
        &self,
        state: &mut StreamState,
        band_energy: &[f32; NB_BANDS],
        features: &mut FeatureVector,
    ) {
        let ly = smoothed_log_energies(band_energy);
        let mut cepstrum = self.dct.dct(&ly);
        cepstrum[0] -= C0_OFFSET;

        let g = self.lpc_from_cepstrum(&mut state.lpc, &cepstrum);
        let g = if g.is_finite() && g > LPC_GAIN_FLOOR {
            g
        } else {
            log::warn!("prediction gain {g} clamped to {LPC_GAIN_FLOOR}");
            LPC_GAIN_FLOOR
        };

        features.cepstrum_mut().copy_from_slice(&cepstrum);
        features.set_lpc_gain(g.log10());
        features.lpc_mut().copy_from_slice(&state.lpc);
    }

    /// Fit `lpc` to the spectral envelope described by `cepstrum`; returns the prediction error.
    pub fn lpc_from_cepstrum(&self, lpc: &mut [f32; LPC_ORDER], cepstrum: &[f32; NB_BANDS]) -> f32 {
        let mut tmp = *cepstrum;
        tmp[0] += C0_OFFSET;
        let log_e = self.dct.idct(&tmp);
        let mut ex = [0.0f32; NB_BANDS];
        for i in 0..NB_BANDS {
            ex[i] = 10f32.powf(log_e[i]) * COMPENSATION[i];
        }
        self.lpc_from_bands(lpc, &ex)
    }

    /// Fit `lpc` to a band power envelope; returns the prediction error.
    pub fn lpc_from_bands(&self, lpc: &mut [f32; LPC_ORDER], band_energy: &[f32; NB_BANDS]) -> f32 {
        let mut xr = freq::interp_band_gain(band_energy);
        xr[FREQ_SIZE - 1] = 0.0;
        let spectrum: Vec<Complex32> = xr.iter().map(|&v| Complex32::new(v, 0.0)).collect();
        let x_auto = self.transform.inverse(&spectrum);

        let mut ac = [0.0f32; LPC_ORDER + 1];
        ac.copy_from_slice(&x_auto[..LPC_ORDER + 1]);
        // -40 dB noise floor
        ac[0] += ac[0] * 1e-4 + (320 / 12) as f32 / 38.0;
        for (i, v) in ac.iter_mut().enumerate().skip(1) {
            *v *= 1.0 - 6e-5 * (i * i) as f32;
        }
        lpc::levinson(lpc, &ac)
    }
}

/// `log10(floor + E)` per band, clamped against a running maximum and a decaying follower.
pub fn smoothed_log_energies(band_energy: &[f32; NB_BANDS]) -> [f32; NB_BANDS] {
    let mut ly = [0.0f32; NB_BANDS];
    let mut log_max = TRACKER_START;
    let mut follow = TRACKER_START;
    for (out, &e) in ly.iter_mut().zip(band_energy.iter()) {
        let v = (ENERGY_FLOOR + e)
            .log10()
            .max(follow - FOLLOW_STEP)
            .max(log_max - LOG_SPREAD);
        log_max = log_max.max(v);
        follow = (follow - FOLLOW_STEP).max(v);
        *out = v;
    }
    ly
}
