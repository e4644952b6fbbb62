use std::fs;
use std::path::{Path, PathBuf};

use humscribe_audio::{read_wav_mono, resample_mono};
use humscribe_domain::{midi_output_name, NoteEvent};
use tracing::{info, instrument};

use crate::constants::AUDIO_SAMPLE_RATE;
use crate::midi::MidiExporter;
use crate::model::NoteModel;
use crate::notes::NoteDecoder;
use crate::TranscribeError;

/// Produces a MIDI file from a normalised waveform. Only the MIDI artifact is written.
pub trait Transcriber: Send + Sync {
    /// Writes `<waveform stem>_basic_pitch.mid` into `output_dir` and returns its path,
    /// replacing any file already there.
    fn transcribe(&self, waveform: &Path, output_dir: &Path) -> Result<PathBuf, TranscribeError>;

    fn name(&self) -> &'static str;
}

pub fn midi_output_path(waveform: &Path, output_dir: &Path) -> PathBuf {
    let waveform_name = waveform
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(midi_output_name(&waveform_name))
}

/// Runs an in-process [`NoteModel`] and writes its notes with [`MidiExporter`].
pub struct ModelTranscriber<M> {
    model: M,
    decoder: NoteDecoder,
    exporter: MidiExporter,
}

impl<M: NoteModel> ModelTranscriber<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            decoder: NoteDecoder::default(),
            exporter: MidiExporter::default(),
        }
    }

    pub fn with_decoder(mut self, decoder: NoteDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    #[instrument(skip(self))]
    pub fn notes(&self, waveform: &Path) -> Result<Vec<NoteEvent>, TranscribeError> {
        let audio = read_wav_mono(waveform)?;
        let samples = resample_mono(&audio.samples, audio.sample_rate, AUDIO_SAMPLE_RATE)?;
        let posteriors = self.model.predict(&samples)?;
        Ok(self.decoder.decode(&posteriors.frames, &posteriors.onsets))
    }
}

impl<M: NoteModel> Transcriber for ModelTranscriber<M> {
    fn transcribe(&self, waveform: &Path, output_dir: &Path) -> Result<PathBuf, TranscribeError> {
        let notes = self.notes(waveform)?;
        let bytes = self.exporter.to_bytes(&notes)?;
        let output = midi_output_path(waveform, output_dir);
        fs::write(&output, bytes)?;
        info!(output = %output.display(), notes = notes.len(), "wrote midi");
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}
