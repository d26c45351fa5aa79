//! Error type for audio decode / resample / encode

use std::path::{Path, PathBuf};

/// Failure while producing one convolved pair.
#[derive(Debug)]
pub enum AudioError {
    /// WAV could not be opened or decoded
    Decode { path: PathBuf, source: hound::Error },
    /// WAV could not be written
    Encode { path: PathBuf, source: hound::Error },
    /// Resampler construction or processing failed
    Resample(String),
    /// Filesystem error around an output file
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl AudioError {
    pub fn decode(path: &Path, source: hound::Error) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn encode(path: &Path, source: hound::Error) -> Self {
        Self::Encode {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode { path, source } => write!(f, "decode {}: {source}", path.display()),
            Self::Encode { path, source } => write!(f, "encode {}: {source}", path.display()),
            Self::Resample(msg) => write!(f, "resample: {msg}"),
            Self::Io { path, source } => write!(f, "IO {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for AudioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode { source, .. } | Self::Encode { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::Resample(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_path() {
        let err = AudioError::io(
            Path::new("/out/hello_room1.wav"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/out/hello_room1.wav"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn resample_has_no_source() {
        use std::error::Error;
        assert!(AudioError::Resample("bad ratio".into()).source().is_none());
    }
}
