use std::io;

use humscribe_audio::AudioError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to load model {path}: {message}")]
    ModelLoad { path: String, message: String },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("invalid midi: {0}")]
    Midi(String),
    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },
}

impl TranscribeError {
    pub fn inference<E: std::fmt::Display>(err: E) -> Self {
        Self::Inference(err.to_string())
    }
}
