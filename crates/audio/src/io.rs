use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::dsp::downmix;
use crate::AudioError;

/// Interleaved f32 samples as decoded from a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate.max(1) as f64
    }

    pub fn into_mono(self) -> Vec<f32> {
        if self.channels <= 1 {
            self.samples
        } else {
            downmix(&self.samples, self.channels)
        }
    }
}

pub struct AudioDecoder;

impl AudioDecoder {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<DecodedAudio, AudioError> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path_ref.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|err| AudioError::decode(format!("unrecognised audio container: {err}")))?;
        let mut format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::decode("no audio track found"))?;
        let track_id = track.id;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|err| AudioError::decode(format!("unsupported codec: {err}")))?;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(0);

        let mut samples = Vec::new();
        let mut scratch: Option<SampleBuffer<f32>> = None;
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphError::ResetRequired) => break,
                Err(err) => return Err(AudioError::decode(err.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }
            let buffer = match decoder.decode(&packet) {
                Ok(buffer) => buffer,
                Err(SymphError::DecodeError(reason)) => {
                    // skip undecodable packet
                    warn!(reason, "skipping corrupt packet");
                    continue;
                }
                Err(err) => return Err(AudioError::decode(err.to_string())),
            };
            let spec = *buffer.spec();
            sample_rate = spec.rate;
            channels = spec.channels.count() as u16;
            let frames = buffer.capacity();
            if scratch
                .as_ref()
                .map_or(true, |out| out.capacity() < frames * spec.channels.count())
            {
                scratch = Some(SampleBuffer::<f32>::new(frames as u64, spec));
            }
            if let Some(out) = scratch.as_mut() {
                out.copy_interleaved_ref(buffer);
                samples.extend_from_slice(out.samples());
            }
        }

        if samples.is_empty() || sample_rate == 0 || channels == 0 {
            return Err(AudioError::decode("stream contained no audio samples"));
        }
        debug!(
            path = %path_ref.display(),
            sample_rate,
            channels,
            sample_count = samples.len(),
            "decoded audio"
        );

        Ok(DecodedAudio {
            sample_rate,
            channels,
            samples,
        })
    }
}
