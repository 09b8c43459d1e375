use crate::{CEPS_MEM, LPC_ORDER, NB_BANDS, OVERLAP_SIZE, PITCH_BUF_SIZE};

/// Filter memories of the conditioning chain. Two floats per biquad, one for preemphasis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterMemories {
    pub highpass: [f32; 2],
    pub tilt: [f32; 2],
    pub preemphasis: f32,
}

/// Per-stream analysis state carried from one frame to the next.
///
/// One instance belongs to exactly one audio stream. It starts zeroed and is
/// mutated by every stage of the pipeline in frame order.
#[derive(Debug, Clone)]
pub struct StreamState {
    pub(crate) analysis_mem: [f32; OVERLAP_SIZE],
    pub(crate) pitch_buf: [f32; PITCH_BUF_SIZE],
    pub(crate) last_period: i32,
    pub(crate) last_gain: f32,
    pub(crate) lpc: [f32; LPC_ORDER],
    pub(crate) filters: FilterMemories,
    // Reserved for delta-cepstrum and excitation tracking by sibling tools.
    #[allow(dead_code)]
    pub(crate) cepstral_mem: [[f32; NB_BANDS]; CEPS_MEM],
    #[allow(dead_code)]
    pub(crate) exc_mem: i32,
}

impl StreamState {
    /// Create a zeroed state for a new stream.
    pub fn new() -> Self {
        Self {
            analysis_mem: [0.0; OVERLAP_SIZE],
            pitch_buf: [0.0; PITCH_BUF_SIZE],
            last_period: 0,
            last_gain: 0.0,
            lpc: [0.0; LPC_ORDER],
            filters: FilterMemories::default(),
            cepstral_mem: [[0.0; NB_BANDS]; CEPS_MEM],
            exc_mem: 0,
        }
    }

    /// Tail of the previous analysis window.
    pub fn analysis_memory(&self) -> &[f32] {
        &self.analysis_mem
    }

    /// Rolling pitch history, oldest sample first.
    pub fn pitch_history(&self) -> &[f32] {
        &self.pitch_buf
    }

    /// Last accepted pitch period in half-sample units, 0 before the first frame.
    pub fn last_period(&self) -> i32 {
        self.last_period
    }

    /// Last accepted pitch gain.
    pub fn last_gain(&self) -> f32 {
        self.last_gain
    }

    /// Most recent linear-prediction coefficients.
    pub fn lpc(&self) -> &[f32; LPC_ORDER] {
        &self.lpc
    }

    /// Filter memories of the conditioning chain.
    pub fn filter_memories(&self) -> &FilterMemories {
        &self.filters
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}
