use serde::{Deserialize, Serialize};

use crate::{error::DomainError, events::NoteEvent};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExportFormat {
    Midi,
    Json,
}

/// Encodes a decoded note list into a file format.
pub trait NoteExporter {
    fn export(&self, notes: &[NoteEvent], format: ExportFormat) -> Result<Vec<u8>, DomainError>;
}

pub struct JsonExporter;

impl NoteExporter for JsonExporter {
    fn export(&self, notes: &[NoteEvent], format: ExportFormat) -> Result<Vec<u8>, DomainError> {
        if format != ExportFormat::Json {
            return Err(DomainError::UnsupportedFormat {
                exporter: "JsonExporter",
                format,
            });
        }
        serde_json::to_vec_pretty(notes).map_err(|err| DomainError::Encode(err.to_string()))
    }
}
