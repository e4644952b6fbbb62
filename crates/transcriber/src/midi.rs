//! Standard MIDI File export of transcribed notes.

use humscribe_domain::{DomainError, ExportFormat, NoteEvent, NoteExporter};
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use serde::Serialize;

use crate::TranscribeError;

/// Writes a two-track file: tempo map, then a single note track voiced as
/// General MIDI program 4 (Electric Piano 1) by default.
#[derive(Debug, Clone)]
pub struct MidiExporter {
    pub ticks_per_quarter: u16,
    pub tempo_bpm: f64,
    pub program: u8,
}

impl Default for MidiExporter {
    fn default() -> Self {
        Self {
            ticks_per_quarter: 220,
            tempo_bpm: 120.0,
            program: 4,
        }
    }
}

impl MidiExporter {
    fn seconds_to_ticks(&self, seconds: f64) -> u32 {
        (seconds * self.ticks_per_quarter as f64 * self.tempo_bpm / 60.0).round() as u32
    }

    pub fn to_bytes(&self, notes: &[NoteEvent]) -> Result<Vec<u8>, TranscribeError> {
        let tempo_uspq = (60_000_000.0 / self.tempo_bpm) as u32;
        let tempo_track = vec![
            TrackEvent {
                delta: u28::from(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(tempo_uspq))),
            },
            TrackEvent {
                delta: u28::from(0),
                kind: TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8)),
            },
            TrackEvent {
                delta: u28::from(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            },
        ];

        // (tick, is_note_on, key, velocity); note-offs sort ahead of note-ons on the same tick
        let mut timeline: Vec<(u32, bool, u8, u8)> = Vec::with_capacity(notes.len() * 2);
        for note in notes {
            let start = self.seconds_to_ticks(note.start);
            let end = self.seconds_to_ticks(note.end).max(start + 1);
            timeline.push((start, true, note.pitch, note.velocity()));
            timeline.push((end, false, note.pitch, 0));
        }
        timeline.sort_by_key(|&(tick, is_on, key, _)| (tick, is_on, key));

        let mut note_track = Vec::with_capacity(timeline.len() + 2);
        note_track.push(TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Midi {
                channel: u4::from(0),
                message: MidiMessage::ProgramChange {
                    program: u7::from(self.program),
                },
            },
        });
        let mut cursor = 0u32;
        for (tick, is_on, key, velocity) in timeline {
            let message = if is_on {
                MidiMessage::NoteOn {
                    key: u7::from(key),
                    vel: u7::from(velocity),
                }
            } else {
                MidiMessage::NoteOff {
                    key: u7::from(key),
                    vel: u7::from(0),
                }
            };
            note_track.push(TrackEvent {
                delta: u28::from(tick - cursor),
                kind: TrackEventKind::Midi {
                    channel: u4::from(0),
                    message,
                },
            });
            cursor = tick;
        }
        note_track.push(TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let smf = Smf {
            header: Header::new(
                Format::Parallel,
                Timing::Metrical(u15::from(self.ticks_per_quarter)),
            ),
            tracks: vec![tempo_track, note_track],
        };
        let mut bytes = Vec::new();
        smf.write(&mut bytes)
            .map_err(|e| TranscribeError::Midi(format!("failed to encode midi: {e:?}")))?;
        Ok(bytes)
    }
}

impl NoteExporter for MidiExporter {
    fn export(&self, notes: &[NoteEvent], format: ExportFormat) -> Result<Vec<u8>, DomainError> {
        match format {
            ExportFormat::Midi => self
                .to_bytes(notes)
                .map_err(|err| DomainError::Encode(err.to_string())),
            format => Err(DomainError::UnsupportedFormat {
                exporter: "MidiExporter",
                format,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MidiSummary {
    pub tracks: usize,
    pub notes: usize,
}

/// Parses `bytes` as a Standard MIDI File and counts its notes.
pub fn inspect_midi(bytes: &[u8]) -> Result<MidiSummary, TranscribeError> {
    let smf = Smf::parse(bytes).map_err(|e| TranscribeError::Midi(e.to_string()))?;
    let notes = smf
        .tracks
        .iter()
        .flatten()
        .filter(|event| {
            matches!(
                event.kind,
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { vel, .. },
                    ..
                } if vel.as_int() > 0
            )
        })
        .count();
    Ok(MidiSummary {
        tracks: smf.tracks.len(),
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale() -> Vec<NoteEvent> {
        [60u8, 62, 64]
            .iter()
            .enumerate()
            .map(|(i, &pitch)| {
                NoteEvent::new(i as f64 * 0.5, i as f64 * 0.5 + 0.4, pitch, 0.7).unwrap()
            })
            .collect()
    }

    #[test]
    fn writes_parseable_midi() {
        let bytes = MidiExporter::default().to_bytes(&scale()).unwrap();
        assert_eq!(&bytes[..4], b"MThd");
        let summary = inspect_midi(&bytes).unwrap();
        assert_eq!(summary, MidiSummary { tracks: 2, notes: 3 });
    }

    #[test]
    fn note_track_starts_with_electric_piano() {
        let bytes = MidiExporter::default().to_bytes(&scale()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let program = smf.tracks[1].iter().find_map(|event| match event.kind {
            TrackEventKind::Midi {
                message: MidiMessage::ProgramChange { program },
                ..
            } => Some(program.as_int()),
            _ => None,
        });
        assert_eq!(program, Some(4));
    }

    #[test]
    fn empty_transcription_is_still_valid_midi() {
        let bytes = MidiExporter::default().to_bytes(&[]).unwrap();
        assert_eq!(inspect_midi(&bytes).unwrap().notes, 0);
    }

    #[test]
    fn ticks_follow_tempo() {
        let exporter = MidiExporter::default();
        assert_eq!(exporter.seconds_to_ticks(1.0), 440);
        assert_eq!(exporter.seconds_to_ticks(0.5), 220);
    }

    #[test]
    fn exporter_trait_rejects_json() {
        let exporter = MidiExporter::default();
        assert!(exporter.export(&scale(), ExportFormat::Json).is_err());
        assert!(exporter.export(&scale(), ExportFormat::Midi).is_ok());
    }

    #[test]
    fn rejects_non_midi_bytes() {
        assert!(matches!(
            inspect_midi(b"RIFF....WAVEfmt "),
            Err(TranscribeError::Midi(_))
        ));
    }
}
