use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::dsp::{downmix, to_pcm16};
use crate::io::DecodedAudio;
use crate::AudioError;

/// Reads a WAV file of any PCM/float layout and returns it down-mixed to mono.
pub fn read_wav_mono<P: AsRef<Path>>(path: P) -> Result<DecodedAudio, AudioError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };
    Ok(DecodedAudio {
        sample_rate: spec.sample_rate,
        channels: 1,
        samples: downmix(&interleaved, spec.channels),
    })
}

/// Writes mono samples as 16-bit signed PCM.
pub fn write_wav_pcm16<P: AsRef<Path>>(
    path: P,
    samples: &[f32],
    sample_rate: u32,
) -> Result<(), AudioError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(to_pcm16(sample))?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn write_test_tone(path: &Path, sample_rate: u32, channels: u16, seconds: f32) {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    let frames = (sample_rate as f32 * seconds) as usize;
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let value = (t * 440.0 * std::f32::consts::TAU).sin() * 0.5;
        for _ in 0..channels {
            writer.write_sample(to_pcm16(value)).unwrap();
        }
    }
    writer.finalize().unwrap();
}
