/// Errors raised by the in-process audio stages.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Invalid audio: {0}")]
    InvalidAudio(String),
    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),
    #[error("Spectral processing failed: {0}")]
    Spectral(String),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the band-split equalizer.
#[derive(Debug, thiserror::Error)]
pub enum EqError {
    #[error("Unknown preset '{0}'")]
    UnknownPreset(String),
    #[error(transparent)]
    Audio(#[from] AudioError),
}
