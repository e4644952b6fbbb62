use thiserror::Error;

use crate::io::ExportFormat;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid note: {0}")]
    InvalidNote(String),
    #[error("{exporter} cannot write {format:?}")]
    UnsupportedFormat {
        exporter: &'static str,
        format: ExportFormat,
    },
    #[error("failed to encode notes: {0}")]
    Encode(String),
}

impl DomainError {
    pub fn invalid_note<T: Into<String>>(message: T) -> Self {
        Self::InvalidNote(message.into())
    }
}
