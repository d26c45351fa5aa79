//! One (phrase, impulse response) pair → one reverberated WAV

use std::path::Path;
use std::time::{Duration, Instant};

use crate::buffer::AudioBuffer;
use crate::convolve::fft_convolve;
use crate::error::AudioError;
use crate::normalize::{Normalized, normalize};
use crate::resample::{Resample, SincResampler};
use crate::wav::{read_wav, write_wav};

/// What a single `convolve_pair` call produced.
#[derive(Debug, Clone, Copy)]
pub struct PairStats {
    pub sample_rate: u32,
    pub phrase_frames: usize,
    pub ir_frames: usize,
    pub output_frames: usize,
    pub normalized: Normalized,
    pub elapsed: Duration,
}

/// Decode → rate-normalize → convolve → encode.
pub struct ConvolutionEngine<R = SincResampler> {
    resampler: R,
}

impl ConvolutionEngine<SincResampler> {
    pub fn new() -> Self {
        Self::with_resampler(SincResampler::default())
    }
}

impl Default for ConvolutionEngine<SincResampler> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resample> ConvolutionEngine<R> {
    pub fn with_resampler(resampler: R) -> Self {
        Self { resampler }
    }

    /// Convolve in memory. The impulse response is the kernel applied to
    /// the phrase; the result is at the higher of the two input rates.
    pub fn render(
        &self,
        phrase: AudioBuffer,
        impulse_response: AudioBuffer,
    ) -> Result<(AudioBuffer, Normalized), AudioError> {
        let (phrase, ir, normalized) = normalize(phrase, impulse_response, &self.resampler)?;
        let samples = fft_convolve(&phrase.samples, &ir.samples);
        Ok((AudioBuffer::new(phrase.sample_rate, samples), normalized))
    }

    /// Convolve two WAV files into `output`.
    ///
    /// `output` is written atomically; on any error nothing is left at that path.
    pub fn convolve_pair(
        &self,
        phrase_path: &Path,
        ir_path: &Path,
        output: &Path,
    ) -> Result<PairStats, AudioError> {
        let start = Instant::now();
        let phrase = read_wav(phrase_path)?;
        let ir = read_wav(ir_path)?;
        let (phrase_frames, ir_frames) = (phrase.len(), ir.len());

        let (rendered, normalized) = self.render(phrase, ir)?;
        if rendered.is_empty() {
            log::warn!(
                "{}: empty input, writing empty output ({} + {} frames)",
                output.display(),
                phrase_frames,
                ir_frames
            );
        }
        write_wav(output, &rendered)?;

        Ok(PairStats {
            sample_rate: rendered.sample_rate,
            phrase_frames,
            ir_frames,
            output_frames: rendered.len(),
            normalized,
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    /// Nearest-neighbour upsampler, enough to check the plumbing.
    struct Repeat;

    impl Resample for Repeat {
        fn resample(&self, buffer: &AudioBuffer, target: u32) -> Result<AudioBuffer, AudioError> {
            let factor = (target / buffer.sample_rate) as usize;
            let samples = buffer
                .samples
                .iter()
                .flat_map(|&s| std::iter::repeat(s).take(factor))
                .collect();
            Ok(AudioBuffer::new(target, samples))
        }
    }

    fn write_mono(path: &Path, rate: u32, samples: &[i16]) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut w = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            w.write_sample(s).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn render_same_rate_length() {
        let engine = ConvolutionEngine::with_resampler(Repeat);
        let (out, step) = engine
            .render(
                AudioBuffer::new(16000, vec![0.1; 100]),
                AudioBuffer::new(16000, vec![0.1; 20]),
            )
            .unwrap();
        assert_eq!(step, Normalized::Unchanged);
        assert_eq!(out.len(), 119);
        assert_eq!(out.sample_rate, 16000);
    }

    #[test]
    fn render_upsamples_lower_rate_ir() {
        let engine = ConvolutionEngine::with_resampler(Repeat);
        let (out, step) = engine
            .render(
                AudioBuffer::new(32000, vec![0.1; 50]),
                AudioBuffer::new(16000, vec![0.1; 10]),
            )
            .unwrap();
        assert_eq!(
            step,
            Normalized::UpsampledSecond {
                from: 16000,
                to: 32000
            }
        );
        assert_eq!(out.sample_rate, 32000);
        // IR became 20 frames at 32 kHz
        assert_eq!(out.len(), 50 + 20 - 1);
    }

    #[test]
    fn convolve_pair_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let phrase = dir.path().join("hello.wav");
        let ir = dir.path().join("room1.wav");
        let out = dir.path().join("hello_room1.wav");
        write_mono(&phrase, 8000, &[1000, -2000, 3000, 0, 500]);
        write_mono(&ir, 8000, &[16384, 0, 8192]);

        let stats = ConvolutionEngine::new()
            .convolve_pair(&phrase, &ir, &out)
            .unwrap();

        assert_eq!(stats.output_frames, 7);
        assert_eq!(stats.sample_rate, 8000);
        let reader = hound::WavReader::open(&out).unwrap();
        assert_eq!(reader.len(), 7);
    }

    #[test]
    fn convolve_pair_decode_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let phrase = dir.path().join("broken.wav");
        std::fs::write(&phrase, b"garbage").unwrap();
        let ir = dir.path().join("room1.wav");
        write_mono(&ir, 8000, &[1]);
        let out = dir.path().join("broken_room1.wav");

        let err = ConvolutionEngine::new()
            .convolve_pair(&phrase, &ir, &out)
            .unwrap_err();

        assert!(matches!(err, AudioError::Decode { .. }));
        assert!(!out.exists());
    }
}
