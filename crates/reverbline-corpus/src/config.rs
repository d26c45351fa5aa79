//! Dataset configuration: a read-only dotted-key store and the typed,
//! eagerly validated view the pipeline runs from.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::archive::{ArchiveSpec, Corpus, CorpusKind};

/// Error types for configuration loading and validation
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read
    Io { path: PathBuf, source: io::Error },
    /// Config text is not valid JSON/TOML
    Parse {
        path: Option<PathBuf>,
        message: String,
    },
    /// A dotted key (or one of its segments) is absent
    MissingKey(String),
    /// Key present but holds the wrong kind of value
    Invalid { key: String, expected: String },
    /// The same archive file name listed twice in one corpus
    DuplicateFile { key: String, file: String },
    /// Two archives would extract into the same directory
    SharedExtractDir {
        dir: PathBuf,
        first: String,
        second: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            Self::Parse {
                path: Some(path),
                message,
            } => write!(f, "failed to parse config {}: {message}", path.display()),
            Self::Parse {
                path: None,
                message,
            } => write!(f, "failed to parse config: {message}"),
            Self::MissingKey(key) => write!(f, "missing config key '{key}'"),
            Self::Invalid { key, expected } => {
                write!(f, "invalid value for '{key}': expected {expected}")
            }
            Self::DuplicateFile { key, file } => {
                write!(f, "'{file}' listed more than once in '{key}'")
            }
            Self::SharedExtractDir { dir, first, second } => write!(
                f,
                "{first} and {second} both extract into {}",
                dir.display()
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Parsed configuration document, loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: Value,
}

impl ConfigStore {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let root = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            path: None,
            message: e.to_string(),
        })?;
        Ok(Self { root })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let root = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: None,
            message: e.to_string(),
        })?;
        Ok(Self { root })
    }

    /// Load from disk. `.toml` files parse as TOML, anything else as JSON.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let parsed = if is_toml {
            Self::from_toml_str(&text)
        } else {
            Self::from_json_str(&text)
        };
        let store = parsed.map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: Some(path.to_path_buf()),
                message,
            },
            other => other,
        })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(store)
    }

    /// Look up a dotted key such as `phrase.files`.
    ///
    /// Segments may themselves contain `-` (`impulse-response.base_url`).
    pub fn get(&self, key: &str) -> Result<&Value, ConfigError> {
        key.split('.')
            .try_fold(&self.root, |node, segment| node.as_object()?.get(segment))
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    pub fn get_str(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)?.as_str().ok_or_else(|| invalid(key, "a string"))
    }

    /// A list of non-empty strings.
    pub fn get_str_list(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        let items = self
            .get(key)?
            .as_array()
            .ok_or_else(|| invalid(key, "a list of strings"))?;
        items
            .iter()
            .map(|v| match v.as_str() {
                Some(s) if !s.is_empty() => Ok(s.to_string()),
                _ => Err(invalid(key, "a list of non-empty strings")),
            })
            .collect()
    }

    /// Deserialize an optional key, falling back to `default` when absent.
    pub fn get_or<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
        expected: &str,
    ) -> Result<T, ConfigError> {
        match self.get(key) {
            Ok(value) => T::deserialize(value).map_err(|_| invalid(key, expected)),
            Err(ConfigError::MissingKey(_)) => Ok(default),
            Err(e) => Err(e),
        }
    }
}

fn invalid(key: &str, expected: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        expected: expected.to_string(),
    }
}

/// What to do when two source pairs derive the same output name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Keep the first pair in iteration order, report the rest
    #[default]
    FirstWins,
    /// Refuse to plan
    Error,
}

/// Whether an archive is unpacked again when its directory already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractPolicy {
    #[default]
    Always,
    SkipIfPresent,
}

/// Fully validated dataset configuration. Every path is already joined
/// onto `project_root`.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub project_root: PathBuf,
    pub phrase: Corpus,
    pub impulse_response: Corpus,
    pub convolved_dir: PathBuf,
    pub on_collision: CollisionPolicy,
    pub extraction: ExtractPolicy,
    /// Audio file suffix, including the dot
    pub audio_suffix: String,
}

impl DatasetConfig {
    /// Validate every key up front; nothing is looked up lazily afterwards.
    pub fn from_store(store: &ConfigStore, project_root: &Path) -> Result<Self, ConfigError> {
        let impulse_response = corpus(store, CorpusKind::ImpulseResponse, project_root)?;
        let phrase = corpus(store, CorpusKind::Phrase, project_root)?;
        check_extract_dirs(&[&phrase, &impulse_response])?;
        let convolved_dir = project_root.join(store.get_str("convolved.convolved_directory")?);

        let on_collision = store.get_or(
            "convolved.on_collision",
            CollisionPolicy::default(),
            "'first-wins' or 'error'",
        )?;
        let extraction = store.get_or(
            "extraction.policy",
            ExtractPolicy::default(),
            "'always' or 'skip-if-present'",
        )?;
        let audio_suffix: String =
            store.get_or("audio.suffix", ".wav".to_string(), "a string")?;
        if !audio_suffix.starts_with('.') || audio_suffix.len() < 2 {
            return Err(invalid("audio.suffix", "a suffix such as '.wav'"));
        }

        Ok(Self {
            project_root: project_root.to_path_buf(),
            phrase,
            impulse_response,
            convolved_dir,
            on_collision,
            extraction,
            audio_suffix,
        })
    }

    /// Read and validate a config file. `project_root` defaults to the
    /// directory containing the file.
    pub fn load(path: &Path, project_root: Option<&Path>) -> Result<Self, ConfigError> {
        let store = ConfigStore::from_file(path)?;
        let root = match project_root {
            Some(root) => root.to_path_buf(),
            None => path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        };
        Self::from_store(&store, &root)
    }

    /// Both corpora, phrase first.
    pub fn corpora(&self) -> [&Corpus; 2] {
        [&self.phrase, &self.impulse_response]
    }

    pub fn corpus(&self, kind: CorpusKind) -> &Corpus {
        match kind {
            CorpusKind::Phrase => &self.phrase,
            CorpusKind::ImpulseResponse => &self.impulse_response,
        }
    }
}

fn corpus(store: &ConfigStore, kind: CorpusKind, project_root: &Path) -> Result<Corpus, ConfigError> {
    let section = kind.section();
    let dir_key = format!("{section}.{}", kind.directory_key());
    let files_key = format!("{section}.files");
    let url_key = format!("{section}.base_url");

    let dir = store.get_str(&dir_key)?;
    let files = store.get_str_list(&files_key)?;
    let base_url = Url::parse(store.get_str(&url_key)?)
        .map_err(|e| invalid(&url_key, &format!("an absolute URL ({e})")))?;

    let mut archives: Vec<ArchiveSpec> = Vec::with_capacity(files.len());
    for file in files {
        if archives.iter().any(|a| a.file_name() == file) {
            return Err(ConfigError::DuplicateFile {
                key: files_key,
                file,
            });
        }
        let spec = ArchiveSpec::new(&file, kind, &base_url)
            .map_err(|reason| invalid(&files_key, &format!("archive file names ({reason})")))?;
        archives.push(spec);
    }

    Ok(Corpus::new(kind, project_root.join(dir), archives))
}

/// Every archive must own its extracted directory (and with it the staging
/// directory next to it). Corpora sharing a root are checked against each other.
fn check_extract_dirs(corpora: &[&Corpus]) -> Result<(), ConfigError> {
    let mut owners: Vec<(PathBuf, String)> = Vec::new();
    for corpus in corpora {
        for spec in &corpus.archives {
            let dir = corpus.extracted_dir(spec);
            if let Some((_, first)) = owners.iter().find(|(d, _)| *d == dir) {
                return Err(ConfigError::SharedExtractDir {
                    dir,
                    first: first.clone(),
                    second: spec.label(),
                });
            }
            owners.push((dir, spec.label()));
        }
    }
    Ok(())
}
