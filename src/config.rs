use crate::FREQ_SIZE;
use crate::error::{FeatureError, FeatureResult};

/// Construction-time settings for a [`FeatureExtractor`](crate::FeatureExtractor).
///
/// The defaults reproduce a plain feature dump: no band limiting, a randomized
/// tilt filter, dither enabled and unity speech gain.
///
/// # Example
/// ```
/// use lpcnet_features_rs::ExtractorConfig;
///
/// let config = ExtractorConfig::default()
///     .with_seed(7)
///     .with_lowpass(120);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    /// Bins at or above this index are zeroed before band aggregation.
    pub lowpass: usize,
    /// Seed for the tilt-filter draw and the dither generator. `None` seeds from OS entropy.
    pub seed: Option<u64>,
    /// Draw random tilt-filter coefficients once per run. When false the tilt stage is the identity.
    pub random_tilt: bool,
    /// Add uniform dither in [-0.5, 0.5) after preemphasis.
    pub dither: bool,
    /// Target gain for the linear gain ramp.
    pub speech_gain: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            lowpass: FREQ_SIZE,
            seed: None,
            random_tilt: true,
            dither: true,
            speech_gain: 1.0,
        }
    }
}

impl ExtractorConfig {
    /// Set the lowpass cutoff bin.
    pub fn with_lowpass(mut self, lowpass: usize) -> Self {
        self.lowpass = lowpass;
        self
    }

    /// Seed the random generator for reproducible output.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable or disable the randomized tilt filter.
    pub fn with_random_tilt(mut self, random_tilt: bool) -> Self {
        self.random_tilt = random_tilt;
        self
    }

    /// Enable or disable dither injection.
    pub fn with_dither(mut self, dither: bool) -> Self {
        self.dither = dither;
        self
    }

    /// Set the speech gain used by the gain ramp.
    pub fn with_speech_gain(mut self, speech_gain: f32) -> Self {
        self.speech_gain = speech_gain;
        self
    }

    /// Check that every field is within range.
    pub fn validate(&self) -> FeatureResult<()> {
        if self.lowpass > FREQ_SIZE {
            return Err(FeatureError::InvalidConfig(format!(
                "lowpass cutoff {} exceeds the {FREQ_SIZE} available bins",
                self.lowpass
            )));
        }
        if !self.speech_gain.is_finite() || self.speech_gain <= 0.0 {
            return Err(FeatureError::InvalidConfig(format!(
                "speech gain must be finite and positive, got {}",
                self.speech_gain
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ExtractorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lowpass, FREQ_SIZE);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_lowpass_out_of_range() {
        let config = ExtractorConfig::default().with_lowpass(FREQ_SIZE + 1);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lowpass cutoff"));
    }

    #[test]
    fn test_invalid_speech_gain() {
        for gain in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let config = ExtractorConfig::default().with_speech_gain(gain);
            assert!(matches!(
                config.validate(),
                Err(FeatureError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_builders() {
        let config = ExtractorConfig::default()
            .with_seed(42)
            .with_random_tilt(false)
            .with_dither(false)
            .with_lowpass(0);
        assert_eq!(config.seed, Some(42));
        assert!(!config.random_tilt);
        assert!(!config.dither);
        assert_eq!(config.lowpass, 0);
        assert!(config.validate().is_ok());
    }
}
