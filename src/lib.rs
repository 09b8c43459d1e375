pub mod alt_pitch;
pub mod buffer;
pub mod cepstrum;
pub mod conditioning;
pub mod config;
pub mod error;
pub mod features;
pub mod freq;
pub mod io;
pub mod lpc;
pub mod pitch;
pub mod spectral;
pub mod state;
pub mod utils;

use ndarray::{Array2, ArrayView1};

pub use alt_pitch::{AltPitch, AltPitchEstimator, NlpPitchEstimator};
pub use buffer::FrameBuffer;
pub use cepstrum::CepstralFeatureBuilder;
pub use conditioning::{Biquad, SignalConditioner};
pub use config::ExtractorConfig;
pub use error::{FeatureError, FeatureResult};
pub use features::FeatureVector;
pub use pitch::{PitchEstimate, PitchEstimator};
pub use spectral::{SpectralAnalyzer, Spectrum};
pub use state::{FilterMemories, StreamState};

use alt_pitch::AltPitchTracker;
use freq::Transform;

/// Input sample rate in Hz.
pub const SAMPLE_RATE: u32 = 16000;
/// Samples consumed per call (10 ms).
pub const FRAME_SIZE: usize = 160;
/// Samples carried from one analysis window into the next.
pub const OVERLAP_SIZE: usize = 160;
/// Analysis window length.
pub const WINDOW_SIZE: usize = FRAME_SIZE + OVERLAP_SIZE;
/// Non-redundant DFT bins of one window.
pub const FREQ_SIZE: usize = WINDOW_SIZE / 2 + 1;
/// Perceptual bands.
pub const NB_BANDS: usize = 18;
/// Linear-prediction order.
pub const LPC_ORDER: usize = 16;
/// Length of one feature vector.
pub const NB_FEATURES: usize = 2 * NB_BANDS + 3 + LPC_ORDER;
/// Preemphasis coefficient.
pub const PREEMPHASIS: f32 = 0.85;
/// Shortest pitch period in samples.
pub const PITCH_MIN_PERIOD: usize = 32;
/// Longest pitch period in samples.
pub const PITCH_MAX_PERIOD: usize = 256;
/// Pitch analysis window.
pub const PITCH_FRAME_SIZE: usize = 320;
/// Pitch history: the longest lag plus the analysis window.
pub const PITCH_BUF_SIZE: usize = PITCH_MAX_PERIOD + PITCH_FRAME_SIZE;
/// Frames of cepstral history kept in [`StreamState`].
pub const CEPS_MEM: usize = 8;
/// Cepstral coefficients that carry deltas in sibling feature sets.
pub const NB_DELTA_CEPS: usize = 6;

/// Streaming feature extractor for 16 kHz speech.
///
/// Each call to [`process_frame`](Self::process_frame) consumes exactly
/// [`FRAME_SIZE`] samples and returns one [`FeatureVector`]. Frames must be fed
/// in stream order; the extractor carries filter, window and pitch state from
/// one frame to the next.
pub struct FeatureExtractor {
    config: ExtractorConfig,
    conditioner: SignalConditioner,
    analyzer: SpectralAnalyzer,
    pitch: PitchEstimator,
    cepstrum: CepstralFeatureBuilder,
    alt_pitch: Option<AltPitchTracker>,
    state: StreamState,
    buffer: FrameBuffer,
    frame: [f32; FRAME_SIZE],
    frames_processed: u64,
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("config", &self.config)
            .field("tilt", self.conditioner.tilt())
            .field("alt_pitch", &self.alt_pitch.is_some())
            .field("frames_processed", &self.frames_processed)
            .finish_non_exhaustive()
    }
}

impl FeatureExtractor {
    /// Create a new extractor
    ///
    /// # Arguments
    /// * `config` - Conditioning and analysis settings
    ///
    /// # Returns
    /// Returns `Ok(FeatureExtractor)` on success, or `Err(FeatureError::InvalidConfig)`
    /// if a setting is out of range.
    pub fn new(config: ExtractorConfig) -> FeatureResult<Self> {
        config.validate()?;

        let transform = Transform::new();
        let conditioner = SignalConditioner::new(&config);
        let analyzer = SpectralAnalyzer::new(transform.clone(), config.lowpass);
        let cepstrum = CepstralFeatureBuilder::new(transform);
        log::debug!(
            "feature extractor ready: lowpass={} dither={} gain={}",
            config.lowpass,
            config.dither,
            config.speech_gain
        );

        Ok(Self {
            config,
            conditioner,
            analyzer,
            pitch: PitchEstimator::new(),
            cepstrum,
            alt_pitch: None,
            state: StreamState::new(),
            buffer: FrameBuffer::new(FRAME_SIZE),
            frame: [0.0; FRAME_SIZE],
            frames_processed: 0,
        })
    }

    /// Attach an alternate estimator whose period replaces the primary one in every vector.
    /// The primary estimator keeps running and still supplies the pitch gain.
    pub fn with_alt_pitch(mut self, estimator: Box<dyn AltPitchEstimator>) -> Self {
        log::debug!(
            "alternate pitch estimator attached, history {} samples",
            estimator.history_len()
        );
        self.alt_pitch = Some(AltPitchTracker::new(estimator));
        self
    }

    /// Process a single frame of audio data
    ///
    /// # Arguments
    /// * `pcm` - 16-bit samples. Length must equal [`FRAME_SIZE`].
    pub fn process_frame(&mut self, pcm: &[i16]) -> FeatureResult<FeatureVector> {
        if pcm.len() != FRAME_SIZE {
            return Err(FeatureError::FrameSizeMismatch {
                expected: FRAME_SIZE,
                actual: pcm.len(),
            });
        }

        for (dst, &src) in self.frame.iter_mut().zip(pcm) {
            *dst = src as f32;
        }
        self.conditioner
            .process(&mut self.state.filters, &mut self.frame);

        let spectrum = self.analyzer.analyze(&mut self.state, &self.frame);
        let pitch = self.pitch.estimate(&mut self.state, &self.frame);

        let mut features = FeatureVector::new();
        self.cepstrum
            .build(&mut self.state, &spectrum.band_energy, &mut features);
        features.set_pitch_period(pitch.normalized_period());
        features.set_pitch_gain(pitch.gain);

        if let Some(alt) = self.alt_pitch.as_mut() {
            let estimate = alt.update(&self.frame);
            features.set_pitch_period(pitch::normalize_period(estimate.period_index));
        }

        log::trace!(
            "frame {}: c0={:.3} period={} gain={:.3} lpc_gain={:.3}",
            self.frames_processed,
            features.cepstrum()[0],
            pitch.period,
            pitch.gain,
            features.lpc_gain()
        );
        self.frames_processed += 1;
        Ok(features)
    }

    /// Process multiple frames of audio data
    ///
    /// # Arguments
    /// * `pcm` - 16-bit samples. Length must be a multiple of [`FRAME_SIZE`].
    pub fn process_frames(&mut self, pcm: &[i16]) -> FeatureResult<Vec<FeatureVector>> {
        if pcm.len() % FRAME_SIZE != 0 {
            return Err(FeatureError::NotFrameAligned {
                expected: FRAME_SIZE,
                actual: pcm.len(),
            });
        }

        pcm.chunks_exact(FRAME_SIZE)
            .map(|frame| self.process_frame(frame))
            .collect()
    }

    /// Buffer an arbitrary-length chunk and process every frame it completes.
    /// Leftover samples wait for the next call.
    pub fn push_samples(&mut self, pcm: &[i16]) -> FeatureResult<Vec<FeatureVector>> {
        self.buffer.push(pcm.iter().copied());
        let mut out = Vec::with_capacity(self.buffer.pending() / FRAME_SIZE);
        while let Some(frame) = self.buffer.pop_frame() {
            out.push(self.process_frame(&frame)?);
        }
        Ok(out)
    }

    /// Process every full frame of `pcm` into a `[frames, NB_FEATURES]` matrix.
    /// A trailing partial frame is ignored.
    pub fn extract(&mut self, pcm: &[i16]) -> FeatureResult<Array2<f32>> {
        let frames = pcm.len() / FRAME_SIZE;
        if pcm.len() % FRAME_SIZE != 0 {
            log::debug!(
                "ignoring {} trailing samples",
                pcm.len() - frames * FRAME_SIZE
            );
        }

        let mut out = Array2::<f32>::zeros((frames, NB_FEATURES));
        for (mut row, frame) in out.rows_mut().into_iter().zip(pcm.chunks_exact(FRAME_SIZE)) {
            let features = self.process_frame(frame)?;
            row.assign(&ArrayView1::from(features.as_slice()));
        }
        Ok(out)
    }

    /// Change the conditioning gain; the next frame ramps linearly to it.
    pub fn set_speech_gain(&mut self, gain: f32) -> FeatureResult<()> {
        if !gain.is_finite() || gain <= 0.0 {
            return Err(FeatureError::InvalidConfig(format!(
                "speech gain must be finite and positive, got {gain}"
            )));
        }
        self.conditioner.set_gain(gain);
        self.config.speech_gain = gain;
        Ok(())
    }

    /// Per-stream state after the last processed frame.
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Tilt filter drawn for this stream.
    pub fn tilt(&self) -> &Biquad {
        self.conditioner.tilt()
    }

    /// Number of feature vectors produced so far.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Samples buffered by [`push_samples`](Self::push_samples) that do not yet form a frame.
    pub fn pending_samples(&self) -> usize {
        self.buffer.pending()
    }
}
