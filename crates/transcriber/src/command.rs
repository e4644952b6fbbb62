use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, instrument};

use crate::pipeline::{midi_output_path, Transcriber};
use crate::TranscribeError;

/// Delegates to an external `basic-pitch` executable.
#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    binary: PathBuf,
    model_path: Option<PathBuf>,
}

impl CommandTranscriber {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            model_path: None,
        }
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    fn tool_error(&self, message: impl Into<String>) -> TranscribeError {
        TranscribeError::Tool {
            tool: self.binary.display().to_string(),
            message: message.into(),
        }
    }
}

impl Transcriber for CommandTranscriber {
    #[instrument(skip(self), fields(tool = %self.binary.display()))]
    fn transcribe(&self, waveform: &Path, output_dir: &Path) -> Result<PathBuf, TranscribeError> {
        let expected = midi_output_path(waveform, output_dir);
        // basic-pitch refuses to overwrite its own outputs
        match fs::remove_file(&expected) {
            Ok(()) => debug!(path = %expected.display(), "removed stale output"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let mut command = Command::new(&self.binary);
        command.arg("--save-midi");
        if let Some(model) = &self.model_path {
            command.arg("--model-path").arg(model);
        }
        let out = match command.arg(output_dir).arg(waveform).output() {
            Ok(out) => out,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(self.tool_error("executable not found"));
            }
            Err(err) => return Err(self.tool_error(err.to_string())),
        };
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("exited without output")
                .trim()
                .to_string();
            return Err(self.tool_error(message));
        }
        if !expected.is_file() {
            return Err(self.tool_error(format!(
                "did not produce {}",
                expected.display()
            )));
        }
        info!(output = %expected.display(), "wrote midi");
        Ok(expected)
    }

    fn name(&self) -> &'static str {
        "command"
    }
}
