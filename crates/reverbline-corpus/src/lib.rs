//! Reverbline Corpus - dataset configuration and source corpus acquisition
//!
//! Loads the dataset config, models the phrase and impulse-response
//! archives it declares, and downloads and unpacks them.

pub mod acquire;
pub mod archive;
pub mod config;

pub use acquire::{
    AcquireError, ArchiveStatus, DownloadOutcome, EXTRACT_TMP_SUFFIX, ExtractOutcome,
    corpus_status, ensure_downloaded, ensure_extracted,
};
pub use archive::{ArchiveSpec, Corpus, CorpusKind};
pub use config::{CollisionPolicy, ConfigError, ConfigStore, DatasetConfig, ExtractPolicy};

/// URL type used for archive locations
pub use reqwest::Url;
