use std::path::Path;
use std::sync::Arc;

use ndarray::{s, Array2, Array3, CowArray, Ix3, IxDyn};
use ort::tensor::OrtOwnedTensor;
use ort::{Environment, GraphOptimizationLevel, LoggingLevel, Session, SessionBuilder, Value};
use tracing::{debug, info, instrument};

use crate::constants::{
    ANNOTATIONS_FPS, AUDIO_N_SAMPLES, AUDIO_SAMPLE_RATE, HOP_SIZE, NOTE_OUTPUT,
    N_OVERLAPPING_FRAMES, N_PITCH_BINS, ONSET_OUTPUT, OVERLAP_LEN,
};
use crate::TranscribeError;

/// Per-frame note and onset activations, shaped `(frames, 88)`.
#[derive(Debug, Clone)]
pub struct Posteriors {
    pub frames: Array2<f32>,
    pub onsets: Array2<f32>,
}

pub trait NoteModel: Send + Sync {
    /// Runs the model over mono audio sampled at 22 050 Hz.
    fn predict(&self, audio: &[f32]) -> Result<Posteriors, TranscribeError>;
}

/// The ICASSP 2022 basic-pitch network, loaded once and shared read-only.
pub struct BasicPitchModel {
    _environment: Arc<Environment>,
    session: Session,
    note_output: usize,
    onset_output: usize,
}

impl BasicPitchModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TranscribeError> {
        let path = path.as_ref();
        let load_error = |err: &dyn std::fmt::Display| TranscribeError::ModelLoad {
            path: path.display().to_string(),
            message: err.to_string(),
        };
        if !path.is_file() {
            return Err(load_error(&"model file does not exist"));
        }
        let environment = Environment::builder()
            .with_name("humscribe")
            .with_log_level(LoggingLevel::Warning)
            .build()
            .map_err(|e| load_error(&e))?
            .into_arc();
        let session = SessionBuilder::new(&environment)
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.with_model_from_file(path))
            .map_err(|e| load_error(&e))?;

        let position = |name: &str| {
            session
                .outputs
                .iter()
                .position(|output| output.name == name)
                .ok_or_else(|| load_error(&format!("model has no output named {name}")))
        };
        let note_output = position(NOTE_OUTPUT)?;
        let onset_output = position(ONSET_OUTPUT)?;
        info!(path = %path.display(), "loaded basic-pitch model");

        Ok(Self {
            _environment: environment,
            session,
            note_output,
            onset_output,
        })
    }

    fn run_window(&self, window: Array3<f32>) -> Result<(Array3<f32>, Array3<f32>), TranscribeError> {
        let input = CowArray::from(window.into_dyn());
        let inputs = vec![
            Value::from_array(self.session.allocator(), &input).map_err(TranscribeError::inference)?,
        ];
        let outputs = self
            .session
            .run(inputs)
            .map_err(TranscribeError::inference)?;
        let notes = extract(&outputs, self.note_output)?;
        let onsets = extract(&outputs, self.onset_output)?;
        Ok((notes, onsets))
    }
}

fn extract(outputs: &[Value<'static>], index: usize) -> Result<Array3<f32>, TranscribeError> {
    let value = outputs
        .get(index)
        .ok_or_else(|| TranscribeError::Inference(format!("missing output {index}")))?;
    let tensor: OrtOwnedTensor<f32, IxDyn> =
        value.try_extract().map_err(TranscribeError::inference)?;
    let array = tensor
        .view()
        .to_owned()
        .into_dimensionality::<Ix3>()
        .map_err(TranscribeError::inference)?;
    if array.dim().2 != N_PITCH_BINS {
        return Err(TranscribeError::Inference(format!(
            "expected {N_PITCH_BINS} pitch bins, got {}",
            array.dim().2
        )));
    }
    Ok(array)
}

impl NoteModel for BasicPitchModel {
    #[instrument(skip_all, fields(samples = audio.len()))]
    fn predict(&self, audio: &[f32]) -> Result<Posteriors, TranscribeError> {
        let windows = window_audio(audio);
        let n_windows = windows.dim().0;
        let mut notes = Vec::with_capacity(n_windows);
        let mut onsets = Vec::with_capacity(n_windows);
        for index in 0..n_windows {
            let window = windows.slice(s![index..index + 1, .., ..]).to_owned();
            let (note, onset) = self.run_window(window)?;
            notes.push(note);
            onsets.push(onset);
        }
        debug!(n_windows, "model inference complete");
        Ok(Posteriors {
            frames: unwrap_windows(&concat(notes)?, audio.len()),
            onsets: unwrap_windows(&concat(onsets)?, audio.len()),
        })
    }
}

fn concat(parts: Vec<Array3<f32>>) -> Result<Array3<f32>, TranscribeError> {
    let views: Vec<_> = parts.iter().map(|part| part.view()).collect();
    ndarray::concatenate(ndarray::Axis(0), &views).map_err(TranscribeError::inference)
}

/// Splits audio into overlapping model windows, shaped `(windows, AUDIO_N_SAMPLES, 1)`.
/// The signal is front-padded by half the overlap and the last window is zero-filled.
pub fn window_audio(audio: &[f32]) -> Array3<f32> {
    let mut padded = vec![0.0f32; OVERLAP_LEN / 2];
    padded.extend_from_slice(audio);
    let n_windows = padded.len().div_ceil(HOP_SIZE);
    let mut windows = Array3::<f32>::zeros((n_windows, AUDIO_N_SAMPLES, 1));
    for (index, start) in (0..padded.len()).step_by(HOP_SIZE).enumerate() {
        let end = (start + AUDIO_N_SAMPLES).min(padded.len());
        for (offset, &sample) in padded[start..end].iter().enumerate() {
            windows[[index, offset, 0]] = sample;
        }
    }
    windows
}

/// Drops the overlapping edge frames of each window and stitches the rest into
/// a `(frames, bins)` matrix covering `original_len` samples of audio.
pub fn unwrap_windows(output: &Array3<f32>, original_len: usize) -> Array2<f32> {
    let (n_windows, n_frames, bins) = output.dim();
    let n_olap = N_OVERLAPPING_FRAMES / 2;
    let kept = n_frames.saturating_sub(2 * n_olap);
    let trimmed = output.slice(s![.., n_olap..n_olap + kept, ..]);
    let wanted = (original_len as f64 * ANNOTATIONS_FPS as f64 / AUDIO_SAMPLE_RATE as f64)
        .floor() as usize;
    let rows = wanted.min(n_windows * kept);
    let data: Vec<f32> = trimmed.iter().take(rows * bins).copied().collect();
    Array2::from_shape_vec((rows, bins), data).unwrap_or_else(|_| Array2::zeros((0, bins)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::constants::ANNOT_N_FRAMES;

    #[test]
    fn window_geometry_matches_model() {
        assert_eq!(AUDIO_N_SAMPLES, 43_844);
        assert_eq!(HOP_SIZE, 36_164);
        assert_eq!(ANNOT_N_FRAMES, 172);
    }

    #[test]
    fn windows_are_front_padded() {
        let audio = vec![1.0f32; 100];
        let windows = window_audio(&audio);
        assert_eq!(windows.dim(), (1, AUDIO_N_SAMPLES, 1));
        assert_eq!(windows[[0, OVERLAP_LEN / 2 - 1, 0]], 0.0);
        assert_eq!(windows[[0, OVERLAP_LEN / 2, 0]], 1.0);
        assert_eq!(windows[[0, OVERLAP_LEN / 2 + 100, 0]], 0.0);
    }

    #[test]
    fn long_audio_spans_multiple_windows() {
        let audio: Vec<f32> = (0..AUDIO_SAMPLE_RATE as usize * 3).map(|i| i as f32).collect();
        let windows = window_audio(&audio);
        assert_eq!(windows.dim().0, 2);
        // the second window starts HOP_SIZE samples into the padded signal
        let first_in_second = (HOP_SIZE - OVERLAP_LEN / 2) as f32;
        assert_eq!(windows[[1, 0, 0]], first_in_second);
    }

    #[test]
    fn unwrap_trims_overlap_and_truncates() {
        let mut output = Array3::<f32>::zeros((2, ANNOT_N_FRAMES, 3));
        for w in 0..2 {
            for f in 0..ANNOT_N_FRAMES {
                output[[w, f, 0]] = (w * 1000 + f) as f32;
            }
        }
        let original_len = AUDIO_SAMPLE_RATE as usize * 3;
        let unwrapped = unwrap_windows(&output, original_len);
        assert_eq!(unwrapped.dim(), (258, 3));
        assert_eq!(unwrapped[[0, 0]], 15.0);
        assert_eq!(unwrapped[[ANNOT_N_FRAMES - 30, 0]], 1015.0);
    }
}
