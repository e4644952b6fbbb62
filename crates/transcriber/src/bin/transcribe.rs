use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use humscribe_audio::{Normalizer, SymphoniaNormalizer};
use humscribe_domain::{waveform_name, ExportFormat, JsonExporter, NoteExporter};
use humscribe_transcriber::constants::DEFAULT_MODEL_PATH;
use humscribe_transcriber::{
    midi_output_path, BasicPitchModel, MidiExporter, ModelTranscriber, NoteDecoder,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Transcribe an audio recording into MIDI", long_about = None)]
struct Cli {
    /// Path to the audio file to transcribe
    input: PathBuf,
    /// Directory receiving the normalised waveform and the MIDI file
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
    /// basic-pitch ONNX model
    #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
    model: PathBuf,
    /// Onset posterior needed to start a note
    #[arg(long, default_value_t = 0.5)]
    onset_threshold: f32,
    /// Frame posterior needed to sustain a note
    #[arg(long, default_value_t = 0.3)]
    frame_threshold: f32,
    /// Drop notes this many frames long or shorter
    #[arg(long, default_value_t = 11)]
    min_note_frames: usize,
    /// Print the decoded notes as JSON
    #[arg(long)]
    notes: bool,
}

impl Cli {
    fn decoder(&self) -> NoteDecoder {
        NoteDecoder {
            onset_threshold: self.onset_threshold,
            frame_threshold: self.frame_threshold,
            min_note_frames: self.min_note_frames,
            ..NoteDecoder::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("create {}", cli.output_dir.display()))?;
    let input_name = cli
        .input
        .file_name()
        .context("input path has no file name")?
        .to_string_lossy()
        .into_owned();
    let waveform = cli.output_dir.join(waveform_name(&input_name));
    SymphoniaNormalizer.normalize(&cli.input, &waveform)?;

    let model = BasicPitchModel::load(&cli.model)?;
    let transcriber = ModelTranscriber::new(model).with_decoder(cli.decoder());
    let notes = transcriber.notes(&waveform)?;
    let bytes = MidiExporter::default().export(&notes, ExportFormat::Midi)?;
    let output = midi_output_path(&waveform, &cli.output_dir);
    std::fs::write(&output, bytes).with_context(|| format!("write {}", output.display()))?;

    if cli.notes {
        let json = JsonExporter.export(&notes, ExportFormat::Json)?;
        println!("{}", String::from_utf8_lossy(&json));
    }
    eprintln!("{} notes -> {}", notes.len(), output.display());
    Ok(())
}
