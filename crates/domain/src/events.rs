use serde::{Deserialize, Serialize};

use crate::DomainError;

/// A single transcribed note.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct NoteEvent {
    /// Seconds from the start of the recording.
    pub start: f64,
    pub end: f64,
    /// MIDI key number.
    pub pitch: u8,
    /// Mean model confidence over the note, in `0.0..=1.0`.
    pub amplitude: f32,
}

impl NoteEvent {
    pub fn new(start: f64, end: f64, pitch: u8, amplitude: f32) -> Result<Self, DomainError> {
        if start < 0.0 {
            return Err(DomainError::invalid_note("notes cannot start before zero"));
        }
        if end <= start {
            return Err(DomainError::invalid_note("note end must follow its start"));
        }
        if pitch > 127 {
            return Err(DomainError::invalid_note("pitch must be a MIDI key (0-127)"));
        }
        if !(0.0..=1.0).contains(&amplitude) {
            return Err(DomainError::invalid_note(
                "amplitude must be between 0 and 1",
            ));
        }
        Ok(Self {
            start,
            end,
            pitch,
            amplitude,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn velocity(&self) -> u8 {
        (self.amplitude * 127.0).round().clamp(1.0, 127.0) as u8
    }
}
