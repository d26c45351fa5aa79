//! Decoded mono audio

/// Mono samples at a known rate. Nominal range is `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest absolute sample value (0.0 for an empty buffer)
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_and_peak() {
        let buf = AudioBuffer::new(4, vec![0.1, -0.8, 0.3, 0.0, 0.2, 0.1, 0.0, 0.0]);
        assert_eq!(buf.len(), 8);
        assert_eq!(buf.peak(), 0.8);
    }

    #[test]
    fn empty_peak_is_zero() {
        let buf = AudioBuffer::new(8_000, Vec::new());
        assert!(buf.is_empty());
        assert_eq!(buf.peak(), 0.0);
    }
}
