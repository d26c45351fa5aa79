//! Bring two buffers to a common sample rate

use crate::buffer::AudioBuffer;
use crate::error::AudioError;
use crate::resample::Resample;

/// Which buffer (if any) was converted by [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalized {
    Unchanged,
    UpsampledFirst { from: u32, to: u32 },
    UpsampledSecond { from: u32, to: u32 },
}

/// Resample the lower-rate buffer up to the higher rate.
///
/// Equal rates return both buffers untouched. The higher-rate buffer is
/// never modified and nothing is ever downsampled.
pub fn normalize<R>(
    a: AudioBuffer,
    b: AudioBuffer,
    resampler: &R,
) -> Result<(AudioBuffer, AudioBuffer, Normalized), AudioError>
where
    R: Resample + ?Sized,
{
    use std::cmp::Ordering;

    match a.sample_rate.cmp(&b.sample_rate) {
        Ordering::Equal => Ok((a, b, Normalized::Unchanged)),
        Ordering::Less => {
            let step = Normalized::UpsampledFirst {
                from: a.sample_rate,
                to: b.sample_rate,
            };
            let a = resampler.resample(&a, b.sample_rate)?;
            Ok((a, b, step))
        }
        Ordering::Greater => {
            let step = Normalized::UpsampledSecond {
                from: b.sample_rate,
                to: a.sample_rate,
            };
            let b = resampler.resample(&b, a.sample_rate)?;
            Ok((a, b, step))
        }
    }
}
