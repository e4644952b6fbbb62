use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::AudioError;

/// Averages interleaved frames down to a single channel.
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Band-limited resampling of a mono signal. The output holds
/// `round(len * to_hz / from_hz)` samples aligned with the input.
pub fn resample_mono(samples: &[f32], from_hz: u32, to_hz: u32) -> Result<Vec<f32>, AudioError> {
    if from_hz == 0 || to_hz == 0 {
        return Err(AudioError::Resample(format!(
            "invalid sample rates: from_hz={from_hz} to_hz={to_hz}"
        )));
    }
    if from_hz == to_hz || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = to_hz as f64 / from_hz as f64;
    let expected = (samples.len() as f64 * ratio).round() as usize;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, samples.len(), 1)
        .map_err(|e| AudioError::Resample(e.to_string()))?;
    let delay = resampler.output_delay();

    let mut output = resampler
        .process(&[samples], None)
        .map_err(|e| AudioError::Resample(e.to_string()))?
        .pop()
        .unwrap_or_default();
    // flush the filter tail so the delayed samples are not lost
    let tail = resampler
        .process_partial(None::<&[Vec<f32>]>, None)
        .map_err(|e| AudioError::Resample(e.to_string()))?
        .pop()
        .unwrap_or_default();
    output.extend(tail);

    let mut aligned: Vec<f32> = output.into_iter().skip(delay).take(expected).collect();
    aligned.resize(expected, 0.0);
    debug!(from_hz, to_hz, input = samples.len(), output = aligned.len(), "resampled");
    Ok(aligned)
}

/// Converts a float sample to 16-bit PCM, clipping out-of-range input.
pub fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn downmix_averages_channels() {
        let stereo = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix(&stereo, 2), vec![0.5, 0.5, 0.0]);
        assert_eq!(downmix(&stereo, 1), stereo);
    }

    #[test]
    fn identity_resample_is_noop() {
        let x = vec![0.0f32, 0.5, -0.25, 1.0];
        assert_eq!(resample_mono(&x, 16_000, 16_000).unwrap(), x);
    }

    #[test]
    fn resample_rejects_zero_rate() {
        assert!(resample_mono(&[0.1], 0, 44_100).is_err());
    }

    #[test]
    fn resample_length_follows_ratio() {
        let input: Vec<f32> = (0..22_050)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / 22_050.0).sin() * 0.5)
            .collect();
        let up = resample_mono(&input, 22_050, 44_100).unwrap();
        assert_eq!(up.len(), 44_100);
        let peak = up[4_000..40_000]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert_abs_diff_eq!(peak, 0.5, epsilon = 0.05);
    }

    #[test]
    fn pcm16_clips() {
        assert_eq!(to_pcm16(2.0), i16::MAX);
        assert_eq!(to_pcm16(-2.0), -i16::MAX);
        assert_eq!(to_pcm16(0.0), 0);
    }
}
