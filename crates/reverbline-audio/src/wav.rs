//! WAV decode and atomic encode via hound

use std::fs;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::buffer::AudioBuffer;
use crate::error::AudioError;

/// Read a WAV file as mono.
///
/// Multichannel files keep their first channel. Integer samples are scaled
/// by `2^(bits-1)`; float samples are taken as-is.
pub fn read_wav(path: &Path) -> Result<AudioBuffer, AudioError> {
    let mut reader = WavReader::open(path).map_err(|e| AudioError::decode(path, e))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));
    let mut samples = Vec::with_capacity(reader.duration() as usize);

    match spec.sample_format {
        SampleFormat::Float => {
            for (idx, sample) in reader.samples::<f32>().enumerate() {
                let value = sample.map_err(|e| AudioError::decode(path, e))?;
                if idx % channels == 0 {
                    samples.push(value);
                }
            }
        }
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            for (idx, sample) in reader.samples::<i32>().enumerate() {
                let value = sample.map_err(|e| AudioError::decode(path, e))?;
                if idx % channels == 0 {
                    samples.push(value as f32 / scale);
                }
            }
        }
    }

    log::trace!(
        "{}: {} frames @ {} Hz ({} ch, {} bit)",
        path.display(),
        samples.len(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );
    Ok(AudioBuffer::new(spec.sample_rate, samples))
}

/// Gain that brings the peak down to 1.0, or 1.0 when nothing would clip.
pub fn peak_gain(samples: &[f32]) -> f32 {
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak > 1.0 { 1.0 / peak } else { 1.0 }
}

fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `buffer` as 16-bit PCM mono WAV.
///
/// Signals that would clip are peak-normalized first. The file is written to
/// `<path>.tmp` and renamed into place, so `path` only ever exists complete.
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<(), AudioError> {
    let tmp = tmp_path(path);
    let result = write_pcm16(&tmp, buffer)
        .and_then(|()| fs::rename(&tmp, path).map_err(|e| AudioError::io(path, e)));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_pcm16(path: &Path, buffer: &AudioBuffer) -> Result<(), AudioError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).map_err(|e| AudioError::encode(path, e))?;

    let gain = peak_gain(&buffer.samples);
    if gain < 1.0 {
        log::debug!("{}: normalizing peak (gain {gain:.4})", path.display());
    }
    for &sample in &buffer.samples {
        writer
            .write_sample(quantize(sample * gain))
            .map_err(|e| AudioError::encode(path, e))?;
    }
    writer.finalize().map_err(|e| AudioError::encode(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_stereo_int(path: &Path, rate: u32, frames: &[(i16, i16)]) {
        let spec = WavSpec {
            channels: 2,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &(l, r) in frames {
            writer.write_sample(l).unwrap();
            writer.write_sample(r).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn stereo_keeps_first_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_stereo_int(&path, 22050, &[(16384, -1), (-16384, -1), (0, -1)]);

        let buf = read_wav(&path).unwrap();
        assert_eq!(buf.sample_rate, 22050);
        assert_eq!(buf.samples, vec![0.5, -0.5, 0.0]);
    }

    #[test]
    fn float_wav_read_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [0.25f32, -0.75] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let buf = read_wav(&path).unwrap();
        assert_eq!(buf.samples, vec![0.25, -0.75]);
    }

    #[test]
    fn write_is_16bit_mono_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        write_wav(&path, &AudioBuffer::new(16000, vec![0.0, 0.5, -0.5])).unwrap();

        assert!(!tmp_path(&path).exists());
        let reader = WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(reader.len(), 3);
    }

    #[test]
    fn failed_rename_removes_tmp() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory where the output should go makes the rename fail
        let path = dir.path().join("out.wav");
        fs::create_dir_all(path.join("occupied")).unwrap();

        let err = write_wav(&path, &AudioBuffer::new(8000, vec![0.25; 4])).unwrap_err();
        assert!(matches!(err, AudioError::Io { .. }), "{err}");
        assert!(!tmp_path(&path).exists());
        assert!(path.is_dir());
    }

    #[test]
    fn clipping_signal_is_peak_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loud.wav");
        write_wav(&path, &AudioBuffer::new(8000, vec![2.0, -1.0, 0.5])).unwrap();

        let mut reader = WavReader::open(&path).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples[0], i16::MAX);
        assert_eq!(samples[1], -16384);
        assert_eq!(samples[2], 8192);
    }

    #[test]
    fn quiet_signal_untouched() {
        assert_eq!(peak_gain(&[0.2, -0.9]), 1.0);
        assert_eq!(peak_gain(&[]), 1.0);
        assert_eq!(peak_gain(&[4.0, -2.0]), 0.25);
    }

    #[test]
    fn missing_file_is_decode_error() {
        let err = read_wav(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, AudioError::Decode { .. }));
    }

    #[test]
    fn garbage_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.wav");
        fs::write(&path, b"not a riff file").unwrap();
        assert!(matches!(read_wav(&path), Err(AudioError::Decode { .. })));
    }
}
