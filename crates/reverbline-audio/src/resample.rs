//! Sample rate conversion using rubato

use rubato::{
    Resampler as _, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};

use crate::buffer::AudioBuffer;
use crate::error::AudioError;

/// Converts a whole buffer to another sample rate.
pub trait Resample: Sync {
    fn resample(&self, buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer, AudioError>;
}

/// Frames after converting `frames` from `from` Hz to `to` Hz, rounded.
pub fn expected_len(frames: usize, from: u32, to: u32) -> usize {
    if from == 0 {
        return 0;
    }
    let (from, to) = (u128::from(from), u128::from(to));
    ((frames as u128 * to + from / 2) / from) as usize
}

/// Band-limited sinc resampler (rubato `SincFixedIn`, one chunk per buffer).
///
/// Output length is exactly [`expected_len`]; the filter delay is removed
/// so the resampled signal stays aligned with the original.
#[derive(Debug, Clone, Copy)]
pub struct SincResampler {
    sinc_len: usize,
}

impl SincResampler {
    pub fn new(sinc_len: usize) -> Self {
        Self {
            sinc_len: sinc_len.max(8),
        }
    }

    fn params(&self) -> SincInterpolationParameters {
        SincInterpolationParameters {
            sinc_len: self.sinc_len,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        }
    }
}

impl Default for SincResampler {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Resample for SincResampler {
    fn resample(&self, buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer, AudioError> {
        if buffer.sample_rate == 0 || target_rate == 0 {
            return Err(AudioError::Resample(format!(
                "invalid rates {} Hz -> {target_rate} Hz",
                buffer.sample_rate
            )));
        }
        if buffer.sample_rate == target_rate || buffer.is_empty() {
            return Ok(AudioBuffer::new(target_rate, buffer.samples.clone()));
        }

        let ratio = f64::from(target_rate) / f64::from(buffer.sample_rate);
        let expected = expected_len(buffer.len(), buffer.sample_rate, target_rate);

        // Trailing silence pushes the filter tail through the single chunk
        let mut padded = Vec::with_capacity(buffer.len() + self.sinc_len);
        padded.extend_from_slice(&buffer.samples);
        padded.resize(buffer.len() + self.sinc_len, 0.0);
        let input = vec![padded];

        let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, self.params(), input[0].len(), 1)
            .map_err(|e| AudioError::Resample(format!("failed to create resampler: {e}")))?;
        let delay = resampler.output_delay();

        let output = resampler
            .process(&input, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;

        let mut samples: Vec<f32> = output
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .skip(delay)
            .take(expected)
            .collect();
        samples.resize(expected, 0.0);

        log::debug!(
            "Resampled {} frames @ {} Hz -> {} frames @ {target_rate} Hz",
            buffer.len(),
            buffer.sample_rate,
            samples.len()
        );
        Ok(AudioBuffer::new(target_rate, samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(rate: u32, freq: f32, frames: usize) -> AudioBuffer {
        let samples = (0..frames)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect();
        AudioBuffer::new(rate, samples)
    }

    #[test]
    fn expected_len_rounds() {
        assert_eq!(expected_len(100, 8000, 16000), 200);
        assert_eq!(expected_len(441, 44100, 48000), 480);
        assert_eq!(expected_len(3, 2, 3), 5); // 4.5 rounds up
        assert_eq!(expected_len(10, 0, 48000), 0);
    }

    #[test]
    fn same_rate_is_copy() {
        let buf = sine(16000, 440.0, 64);
        let out = SincResampler::default().resample(&buf, 16000).unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn empty_buffer_changes_rate_only() {
        let out = SincResampler::default()
            .resample(&AudioBuffer::new(8000, vec![]), 48000)
            .unwrap();
        assert_eq!(out.sample_rate, 48000);
        assert!(out.is_empty());
    }

    #[test]
    fn upsample_length_and_rate() {
        let buf = sine(16000, 440.0, 1600);
        let out = SincResampler::default().resample(&buf, 48000).unwrap();
        assert_eq!(out.sample_rate, 48000);
        assert_eq!(out.len(), 4800);
    }

    #[test]
    fn upsample_preserves_amplitude() {
        let buf = sine(16000, 440.0, 3200);
        let out = SincResampler::default().resample(&buf, 44100).unwrap();
        // Ignore edges where the filter ramps in and out
        let middle = &out.samples[out.len() / 4..out.len() * 3 / 4];
        let peak = middle.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.05, "peak {peak}");
    }

    #[test]
    fn zero_rate_rejected() {
        let err = SincResampler::default()
            .resample(&AudioBuffer::new(0, vec![0.0]), 48000)
            .unwrap_err();
        assert!(matches!(err, AudioError::Resample(_)));
    }
}
