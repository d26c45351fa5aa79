//! Global settings from `reverbline.toml`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Machine-level settings, independent of any dataset config
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub http: HttpSettings,
    pub workers: WorkersSettings,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Seconds without data before a download counts as stalled
    pub read_timeout: u64,
    pub max_retries: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            read_timeout: 30,
            max_retries: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersSettings {
    pub default: usize,
    pub max: usize,
}

impl Default for WorkersSettings {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            default: cpus.min(8),
            max: 32,
        }
    }
}

impl WorkersSettings {
    /// `requested` (or the default) capped at `max`, never zero.
    pub fn resolve(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default).min(self.max).max(1)
    }
}

impl Settings {
    /// Search order:
    /// 1. ./reverbline.toml
    /// 2. <user config dir>/reverbline/config.toml
    ///
    /// Defaults when neither exists.
    pub fn load() -> Result<Self> {
        let local = PathBuf::from("reverbline.toml");
        if local.exists() {
            return Self::from_file(&local);
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", "reverbline") {
            let user = dirs.config_dir().join("config.toml");
            if user.exists() {
                return Self::from_file(&user);
            }
        }

        log::debug!("No settings file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.http.read_timeout, 30);
        assert_eq!(s.http.max_retries, 0);
        assert!(s.workers.default >= 1);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let s: Settings = toml::from_str("[http]\nmax_retries = 3\n").unwrap();
        assert_eq!(s.http.max_retries, 3);
        assert_eq!(s.http.read_timeout, 30);
        assert_eq!(s.workers.max, 32);
    }

    #[test]
    fn workers_resolve_caps() {
        let w = WorkersSettings { default: 4, max: 6 };
        assert_eq!(w.resolve(None), 4);
        assert_eq!(w.resolve(Some(10)), 6);
        assert_eq!(w.resolve(Some(0)), 1);
    }

    #[test]
    fn from_file_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reverbline.toml");
        std::fs::write(&path, "[workers\n").unwrap();
        let err = Settings::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("reverbline.toml"));
    }
}
