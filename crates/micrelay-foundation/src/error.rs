use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Audio subsystem error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: index {index:?}")]
    DeviceNotFound { index: Option<usize> },

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("CPAL error: {0}")]
    Cpal(#[from] cpal::StreamError),

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Device enumeration error: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("WAV container error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Sample rate must be positive")]
    ZeroSampleRate,

    #[error("Sample width must be 1, 2, 3 or 4 bytes, got {0}")]
    BadSampleWidth(u16),

    #[error("Channel count must be positive")]
    ZeroChannels,

    #[error("Frames per buffer must be positive")]
    ZeroFramesPerBuffer,
}
