// Model input
pub const AUDIO_SAMPLE_RATE: u32 = 22_050;
pub const FFT_HOP: usize = 256;
pub const ANNOTATIONS_FPS: usize = AUDIO_SAMPLE_RATE as usize / FFT_HOP;
pub const AUDIO_WINDOW_LENGTH: usize = 2;
pub const AUDIO_N_SAMPLES: usize = AUDIO_SAMPLE_RATE as usize * AUDIO_WINDOW_LENGTH - FFT_HOP;
/// Output frames the model emits per window.
pub const ANNOT_N_FRAMES: usize = ANNOTATIONS_FPS * AUDIO_WINDOW_LENGTH;
pub const N_OVERLAPPING_FRAMES: usize = 30;
pub const OVERLAP_LEN: usize = N_OVERLAPPING_FRAMES * FFT_HOP;
pub const HOP_SIZE: usize = AUDIO_N_SAMPLES - OVERLAP_LEN;

// Model output
pub const N_PITCH_BINS: usize = 88;
pub const NOTE_OUTPUT: &str = "StatefulPartitionedCall:1";
pub const ONSET_OUTPUT: &str = "StatefulPartitionedCall:2";

// MIDI conversion
pub const MIDI_OFFSET: u8 = 21;
pub const DEFAULT_MODEL_PATH: &str = "models/icassp_2022_nmp.onnx";
