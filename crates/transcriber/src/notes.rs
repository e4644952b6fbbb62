//! Turns frame-level activations into discrete notes.
//!
//! Onset peaks above `onset_threshold` start a note which is extended while frame
//! activation stays above `frame_threshold`, tolerating gaps of up to
//! `energy_tolerance` frames. Leftover sustained energy is then claimed greedily from
//! the strongest cell outwards.

use humscribe_domain::NoteEvent;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{ANNOT_N_FRAMES, AUDIO_N_SAMPLES, AUDIO_SAMPLE_RATE, FFT_HOP, MIDI_OFFSET};

const ONSET_DIFF_FRAMES: usize = 2;

/// A note expressed in model frames: `[start, end)`, pitch bin, mean activation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameNote {
    pub start: usize,
    pub end: usize,
    pub bin: usize,
    pub amplitude: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDecoder {
    pub onset_threshold: f32,
    pub frame_threshold: f32,
    /// Notes must be longer than this many frames.
    pub min_note_frames: usize,
    pub energy_tolerance: usize,
    pub infer_onsets: bool,
    pub melodia_trick: bool,
}

impl Default for NoteDecoder {
    fn default() -> Self {
        Self {
            onset_threshold: 0.5,
            frame_threshold: 0.3,
            min_note_frames: 11,
            energy_tolerance: 11,
            infer_onsets: true,
            melodia_trick: true,
        }
    }
}

impl NoteDecoder {
    pub fn decode(&self, frames: &Array2<f32>, onsets: &Array2<f32>) -> Vec<NoteEvent> {
        let notes: Vec<NoteEvent> = self
            .decode_frames(frames, onsets)
            .into_iter()
            .filter_map(|note| {
                NoteEvent::new(
                    frame_to_time(note.start),
                    frame_to_time(note.end),
                    note.bin as u8 + MIDI_OFFSET,
                    note.amplitude.clamp(0.0, 1.0),
                )
                .ok()
            })
            .collect();
        debug!(notes = notes.len(), "decoded notes");
        notes
    }

    pub fn decode_frames(&self, frames: &Array2<f32>, onsets: &Array2<f32>) -> Vec<FrameNote> {
        let (n_frames, n_bins) = frames.dim();
        if n_frames < 2 || n_bins == 0 || onsets.dim() != frames.dim() {
            return Vec::new();
        }
        let onsets = if self.infer_onsets {
            infer_onsets(onsets, frames)
        } else {
            onsets.clone()
        };

        // local maxima in time, strongest frame first when scanning backwards
        let mut starts = Vec::new();
        for t in 1..n_frames - 1 {
            for bin in 0..n_bins {
                let value = onsets[[t, bin]];
                if value > onsets[[t - 1, bin]]
                    && value > onsets[[t + 1, bin]]
                    && value >= self.onset_threshold
                {
                    starts.push((t, bin));
                }
            }
        }
        starts.reverse();

        let mut remaining = frames.clone();
        let mut notes = Vec::new();
        for (start, bin) in starts {
            if start >= n_frames - 1 {
                continue;
            }
            let mut i = start + 1;
            let mut gap = 0;
            while i < n_frames - 1 && gap < self.energy_tolerance {
                if remaining[[i, bin]] < self.frame_threshold {
                    gap += 1;
                } else {
                    gap = 0;
                }
                i += 1;
            }
            let end = i - gap;
            if end - start <= self.min_note_frames {
                continue;
            }
            clear_span(&mut remaining, start..end, bin);
            notes.push(FrameNote {
                start,
                end,
                bin,
                amplitude: mean(frames, start..end, bin),
            });
        }

        if self.melodia_trick {
            self.claim_sustained(frames, &mut remaining, &mut notes);
        }
        notes
    }

    fn claim_sustained(
        &self,
        frames: &Array2<f32>,
        remaining: &mut Array2<f32>,
        notes: &mut Vec<FrameNote>,
    ) {
        let (n_frames, n_bins) = frames.dim();
        // cells only ever drop to zero, so visiting them by descending energy
        // reproduces repeated argmax over the remaining matrix
        let mut peaks: Vec<(f32, usize)> = remaining
            .iter()
            .enumerate()
            .filter(|&(_, &value)| value > self.frame_threshold)
            .map(|(index, &value)| (value, index))
            .collect();
        peaks.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        for (_, index) in peaks {
            let (mid, bin) = (index / n_bins, index % n_bins);
            if remaining[[mid, bin]] <= self.frame_threshold {
                continue;
            }
            remaining[[mid, bin]] = 0.0;

            let mut i = mid + 1;
            let mut gap = 0;
            while i < n_frames - 1 && gap < self.energy_tolerance {
                gap = if remaining[[i, bin]] < self.frame_threshold { gap + 1 } else { 0 };
                clear_span(remaining, i..i + 1, bin);
                i += 1;
            }
            let end = i - 1 - gap;

            let mut i = mid as isize - 1;
            let mut gap = 0;
            while i > 0 && gap < self.energy_tolerance {
                let row = i as usize;
                gap = if remaining[[row, bin]] < self.frame_threshold { gap + 1 } else { 0 };
                clear_span(remaining, row..row + 1, bin);
                i -= 1;
            }
            let start = (i + 1 + gap as isize) as usize;

            if end <= start || end - start <= self.min_note_frames {
                continue;
            }
            notes.push(FrameNote {
                start,
                end,
                bin,
                amplitude: mean(frames, start..end, bin),
            });
        }
    }
}

/// Boosts onsets with positive jumps in frame activation over the previous two frames.
fn infer_onsets(onsets: &Array2<f32>, frames: &Array2<f32>) -> Array2<f32> {
    let (n_frames, n_bins) = frames.dim();
    let mut diff = Array2::<f32>::zeros((n_frames, n_bins));
    for t in ONSET_DIFF_FRAMES..n_frames {
        for bin in 0..n_bins {
            let current = frames[[t, bin]];
            let rise = (1..=ONSET_DIFF_FRAMES)
                .map(|k| current - frames[[t - k, bin]])
                .fold(f32::INFINITY, f32::min);
            diff[[t, bin]] = rise.max(0.0);
        }
    }
    let max_diff = diff.iter().copied().fold(0.0f32, f32::max);
    let max_onset = onsets.iter().copied().fold(0.0f32, f32::max);
    if max_diff > 0.0 {
        diff.mapv_inplace(|value| value * max_onset / max_diff);
    }
    let mut combined = onsets.clone();
    combined.zip_mut_with(&diff, |onset, &rise| *onset = onset.max(rise));
    combined
}

fn clear_span(energy: &mut Array2<f32>, rows: std::ops::Range<usize>, bin: usize) {
    let n_bins = energy.dim().1;
    for row in rows {
        energy[[row, bin]] = 0.0;
        if bin + 1 < n_bins {
            energy[[row, bin + 1]] = 0.0;
        }
        if bin > 0 {
            energy[[row, bin - 1]] = 0.0;
        }
    }
}

fn mean(frames: &Array2<f32>, rows: std::ops::Range<usize>, bin: usize) -> f32 {
    let len = rows.len().max(1) as f32;
    rows.map(|row| frames[[row, bin]]).sum::<f32>() / len
}

/// Seconds at which model frame `frame` starts, correcting for window overlap drift.
pub fn frame_to_time(frame: usize) -> f64 {
    let hop_secs = FFT_HOP as f64 / AUDIO_SAMPLE_RATE as f64;
    let window_offset =
        hop_secs * (ANNOT_N_FRAMES as f64 - AUDIO_N_SAMPLES as f64 / FFT_HOP as f64) + 0.0018;
    let window = (frame / ANNOT_N_FRAMES) as f64;
    frame as f64 * hop_secs - window_offset * window
}
