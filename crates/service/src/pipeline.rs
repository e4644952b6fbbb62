use std::fs;
use std::path::Path;
use std::sync::Arc;

use humscribe_audio::Normalizer;
use humscribe_domain::{edited_midi_name, midi_output_name};
use humscribe_transcriber::{inspect_midi, Transcriber};
use tracing::{info, instrument};

use crate::error::ServiceError;
use crate::storage::Storage;

/// Upload -> normalised waveform -> MIDI, all on the blocking thread that calls it.
pub struct TranscriptionPipeline {
    storage: Storage,
    normalizer: Arc<dyn Normalizer>,
    transcriber: Arc<dyn Transcriber>,
}

impl TranscriptionPipeline {
    pub fn new(
        storage: Storage,
        normalizer: Arc<dyn Normalizer>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        Self {
            storage,
            normalizer,
            transcriber,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn normalizer_name(&self) -> &'static str {
        self.normalizer.name()
    }

    /// Returns the bare name of the MIDI file written into the output directory.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len(), normalizer = self.normalizer.name(), transcriber = self.transcriber.name()))]
    pub fn run(
        &self,
        bytes: &[u8],
        original_name: &str,
        timestamp: i64,
    ) -> Result<String, ServiceError> {
        let raw = self.storage.save_raw(timestamp, original_name, bytes)?;
        let waveform = self.storage.waveform_path(&raw);
        let info = self.normalizer.normalize(&raw, &waveform)?;
        info!(
            waveform = %waveform.display(),
            seconds = info.duration_secs(),
            "normalised upload"
        );

        let output = self
            .transcriber
            .transcribe(&waveform, self.storage.output_dir())?;
        let midi_file = file_name(&output)
            .unwrap_or_else(|| midi_output_name(&file_name(&waveform).unwrap_or_default()));
        info!(%midi_file, "transcription finished");
        Ok(midi_file)
    }

    /// Stores a client-edited MIDI file after checking it parses.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub fn save_edited(
        &self,
        bytes: &[u8],
        original_name: &str,
        timestamp: i64,
    ) -> Result<String, ServiceError> {
        let summary = inspect_midi(bytes)
            .map_err(|err| ServiceError::Decode(format!("not a MIDI file: {err}")))?;
        let name = edited_midi_name(timestamp, original_name);
        fs::write(self.storage.output_dir().join(&name), bytes)?;
        info!(midi_file = %name, tracks = summary.tracks, notes = summary.notes, "saved edited midi");
        Ok(name)
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
}
