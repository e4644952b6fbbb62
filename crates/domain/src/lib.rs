pub mod artifacts;
pub mod error;
pub mod events;
pub mod io;

pub use crate::artifacts::{
    edited_midi_name, is_plain_filename, midi_output_name, raw_upload_name, sanitize_filename,
    waveform_name, MIDI_OUTPUT_SUFFIX,
};
pub use crate::error::DomainError;
pub use crate::events::NoteEvent;
pub use crate::io::{ExportFormat, JsonExporter, NoteExporter};
