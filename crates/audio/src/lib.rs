pub mod dsp;
pub mod error;
pub mod io;
pub mod normalizer;
pub mod wav;

pub use dsp::{downmix, resample_mono};
pub use error::AudioError;
pub use io::{AudioDecoder, DecodedAudio};
pub use normalizer::{
    FallbackNormalizer, FfmpegNormalizer, Normalizer, SymphoniaNormalizer, WaveformInfo,
    TARGET_SAMPLE_RATE,
};
pub use wav::{read_wav_mono, write_wav_pcm16};
