//! Deterministic names for the files a transcription request leaves on disk.
//!
//! A raw upload `raw_<unix-ts>_<original>` becomes `raw_<unix-ts>_<stem>.wav` once
//! normalised, and the transcriber writes `raw_<unix-ts>_<stem>_basic_pitch.mid`.
//! Two uploads of the same file name within the same second map to the same names.

use std::path::Path;

pub const RAW_UPLOAD_PREFIX: &str = "raw_";
pub const EDITED_MIDI_PREFIX: &str = "edited_";
pub const WAVEFORM_EXTENSION: &str = "wav";
/// Appended by the pitch-to-MIDI transcriber to the waveform stem.
pub const MIDI_OUTPUT_SUFFIX: &str = "_basic_pitch.mid";

const FALLBACK_NAME: &str = "upload";

/// Reduces a client supplied file name to its final path component.
pub fn sanitize_filename(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match last {
        "" | "." | ".." => FALLBACK_NAME.to_string(),
        other => other.to_string(),
    }
}

pub fn raw_upload_name(timestamp: i64, original: &str) -> String {
    format!(
        "{RAW_UPLOAD_PREFIX}{timestamp}_{}",
        sanitize_filename(original)
    )
}

/// Replaces the extension of `raw` with `.wav`, or appends it when there is none.
pub fn waveform_name(raw: &str) -> String {
    Path::new(raw)
        .with_extension(WAVEFORM_EXTENSION)
        .to_string_lossy()
        .into_owned()
}

pub fn midi_output_name(waveform: &str) -> String {
    let stem = Path::new(waveform)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{stem}{MIDI_OUTPUT_SUFFIX}")
}

pub fn edited_midi_name(timestamp: i64, original: &str) -> String {
    format!(
        "{EDITED_MIDI_PREFIX}{timestamp}_{}",
        sanitize_filename(original)
    )
}

/// True when `name` addresses a file directly inside a directory and nothing else.
pub fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
