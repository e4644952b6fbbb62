pub mod command;
pub mod constants;
pub mod error;
pub mod midi;
pub mod model;
pub mod notes;
pub mod pipeline;

pub use command::CommandTranscriber;
pub use error::TranscribeError;
pub use midi::{inspect_midi, MidiExporter, MidiSummary};
pub use model::{BasicPitchModel, NoteModel, Posteriors};
pub use notes::NoteDecoder;
pub use pipeline::{midi_output_path, ModelTranscriber, Transcriber};
