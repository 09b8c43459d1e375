use crate::{LPC_ORDER, NB_BANDS, NB_FEATURES};

/// Index of the normalized pitch period.
pub const PITCH_PERIOD_INDEX: usize = 2 * NB_BANDS;
/// Index of the pitch (voicing) gain.
pub const PITCH_GAIN_INDEX: usize = 2 * NB_BANDS + 1;
/// Index of `log10` of the LPC prediction gain.
pub const LPC_GAIN_INDEX: usize = 2 * NB_BANDS + 2;
/// First LPC coefficient.
pub const LPC_OFFSET: usize = 2 * NB_BANDS + 3;

/// One frame of features.
///
/// Layout: `NB_BANDS` cepstral coefficients, `NB_BANDS` reserved zeros,
/// normalized pitch period, pitch gain, log LPC gain, `LPC_ORDER` LPC coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f32; NB_FEATURES]);

impl FeatureVector {
    /// All-zero vector.
    pub fn new() -> Self {
        Self([0.0; NB_FEATURES])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn cepstrum(&self) -> &[f32] {
        &self.0[..NB_BANDS]
    }

    pub fn cepstrum_mut(&mut self) -> &mut [f32] {
        &mut self.0[..NB_BANDS]
    }

    pub fn pitch_period(&self) -> f32 {
        self.0[PITCH_PERIOD_INDEX]
    }

    pub fn set_pitch_period(&mut self, value: f32) {
        self.0[PITCH_PERIOD_INDEX] = value;
    }

    pub fn pitch_gain(&self) -> f32 {
        self.0[PITCH_GAIN_INDEX]
    }

    pub fn set_pitch_gain(&mut self, value: f32) {
        self.0[PITCH_GAIN_INDEX] = value;
    }

    pub fn lpc_gain(&self) -> f32 {
        self.0[LPC_GAIN_INDEX]
    }

    pub fn set_lpc_gain(&mut self, value: f32) {
        self.0[LPC_GAIN_INDEX] = value;
    }

    pub fn lpc(&self) -> &[f32] {
        &self.0[LPC_OFFSET..LPC_OFFSET + LPC_ORDER]
    }

    pub fn lpc_mut(&mut self) -> &mut [f32] {
        &mut self.0[LPC_OFFSET..LPC_OFFSET + LPC_ORDER]
    }

    /// Little-endian IEEE-754 encoding of every element.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<[f32]> for FeatureVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}
