//! Conversion of arbitrary uploads into the waveform format the transcriber expects:
//! mono, 44.1 kHz, 16-bit PCM WAV.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::dsp::resample_mono;
use crate::io::AudioDecoder;
use crate::wav::write_wav_pcm16;
use crate::AudioError;

pub const TARGET_SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveformInfo {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub frames: u64,
}

impl WaveformInfo {
    fn read(path: &Path) -> Result<Self, AudioError> {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        Ok(Self {
            path: path.to_path_buf(),
            sample_rate: spec.sample_rate,
            frames: reader.duration() as u64,
        })
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.sample_rate.max(1) as f64
    }
}

pub trait Normalizer: Send + Sync {
    /// Writes `input` to `output` as mono 44.1 kHz 16-bit PCM, replacing any existing file.
    /// `input` and `output` may name the same file.
    fn normalize(&self, input: &Path, output: &Path) -> Result<WaveformInfo, AudioError>;

    fn name(&self) -> &'static str;
}

/// Decodes in-process with symphonia.
#[derive(Debug, Default, Clone)]
pub struct SymphoniaNormalizer;

impl Normalizer for SymphoniaNormalizer {
    #[instrument(skip(self), fields(backend = "symphonia"))]
    fn normalize(&self, input: &Path, output: &Path) -> Result<WaveformInfo, AudioError> {
        let decoded = AudioDecoder::open(input)?;
        debug!(
            channels = decoded.channels,
            seconds = decoded.duration_secs(),
            "decoded upload"
        );
        let source_rate = decoded.sample_rate;
        let mono = decoded.into_mono();
        let samples = resample_mono(&mono, source_rate, TARGET_SAMPLE_RATE)?;
        let staging = staging_path(output);
        if let Err(err) = write_wav_pcm16(&staging, &samples, TARGET_SAMPLE_RATE) {
            let _ = fs::remove_file(&staging);
            return Err(err);
        }
        fs::rename(&staging, output)?;
        info!(
            output = %output.display(),
            source_rate,
            frames = samples.len(),
            "normalised waveform"
        );
        Ok(WaveformInfo {
            path: output.to_path_buf(),
            sample_rate: TARGET_SAMPLE_RATE,
            frames: samples.len() as u64,
        })
    }

    fn name(&self) -> &'static str {
        "symphonia"
    }
}

/// Shells out to an ffmpeg binary, for codecs symphonia does not handle.
#[derive(Debug, Clone)]
pub struct FfmpegNormalizer {
    binary: PathBuf,
}

impl FfmpegNormalizer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn tool_error(&self, message: impl Into<String>) -> AudioError {
        AudioError::Tool {
            tool: self.binary.display().to_string(),
            message: message.into(),
        }
    }
}

impl Normalizer for FfmpegNormalizer {
    #[instrument(skip(self), fields(backend = "ffmpeg"))]
    fn normalize(&self, input: &Path, output: &Path) -> Result<WaveformInfo, AudioError> {
        let staging = staging_path(output);
        let rate = TARGET_SAMPLE_RATE.to_string();
        let result = Command::new(&self.binary)
            .arg("-nostdin")
            .arg("-hide_banner")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-ac", "1", "-ar", &rate, "-acodec", "pcm_s16le", "-f", "wav"])
            .arg(&staging)
            .output();
        let out = match result {
            Ok(out) => out,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(self.tool_error("executable not found"));
            }
            Err(err) => return Err(self.tool_error(err.to_string())),
        };
        if !out.status.success() {
            let _ = fs::remove_file(&staging);
            let stderr = String::from_utf8_lossy(&out.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("exited without output")
                .trim()
                .to_string();
            debug!(status = ?out.status, %stderr, "ffmpeg failed");
            return Err(self.tool_error(message));
        }
        fs::rename(&staging, output)?;
        let info = WaveformInfo::read(output)?;
        info!(output = %output.display(), frames = info.frames, "normalised waveform");
        Ok(info)
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Decodes in-process and hands anything symphonia cannot read (Opus recordings
/// from browsers, for one) to ffmpeg.
#[derive(Debug, Clone)]
pub struct FallbackNormalizer {
    primary: SymphoniaNormalizer,
    fallback: FfmpegNormalizer,
}

impl FallbackNormalizer {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            primary: SymphoniaNormalizer,
            fallback: FfmpegNormalizer::new(ffmpeg),
        }
    }
}

impl Normalizer for FallbackNormalizer {
    #[instrument(skip(self), fields(backend = "auto"))]
    fn normalize(&self, input: &Path, output: &Path) -> Result<WaveformInfo, AudioError> {
        let reason = match self.primary.normalize(input, output) {
            Err(AudioError::Decode(reason)) => reason,
            other => return other,
        };
        info!(%reason, tool = %self.fallback.binary().display(), "retrying with ffmpeg");
        match self.fallback.normalize(input, output) {
            Ok(info) => Ok(info),
            // the upload is still the problem, not the tool
            Err(err) => {
                warn!(%err, "ffmpeg fallback failed");
                Err(AudioError::Decode(reason))
            }
        }
    }

    fn name(&self) -> &'static str {
        "auto"
    }
}

fn staging_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    output.with_file_name(name)
}
