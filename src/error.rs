use thiserror::Error;

/// Custom error types for feature extraction
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Failed to open input {path}: {source}")]
    OpenInput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open output {path}: {source}")]
    OpenOutput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode WAV input: {0}")]
    Wav(#[from] hound::Error),

    #[error("Failed to build resampler: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),

    #[error("Failed to resample audio: {0}")]
    Resample(#[from] rubato::ResampleError),

    #[error("Audio data length {actual} does not match frame size {expected}")]
    FrameSizeMismatch { expected: usize, actual: usize },

    #[error("Audio data length {actual} is not a multiple of frame size {expected}")]
    NotFrameAligned { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Empty audio data provided")]
    EmptyAudioData,
}

/// Type alias for feature extraction results
pub type FeatureResult<T> = Result<T, FeatureError>;
