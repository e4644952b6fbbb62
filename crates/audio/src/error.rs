use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("could not decode audio: {0}")]
    Decode(String),
    #[error("wav error: {0}")]
    Wav(String),
    #[error("resampling failed: {0}")]
    Resample(String),
    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },
}

impl AudioError {
    pub fn decode<T: Into<String>>(message: T) -> Self {
        Self::Decode(message.into())
    }
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(err) => Self::Io(err),
            other => Self::Wav(other.to_string()),
        }
    }
}
