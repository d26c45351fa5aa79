//! Archive and corpus model

use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::Url;

/// Which of the two source corpora an archive belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorpusKind {
    Phrase,
    ImpulseResponse,
}

impl CorpusKind {
    /// Config section holding this corpus
    pub const fn section(self) -> &'static str {
        match self {
            Self::Phrase => "phrase",
            Self::ImpulseResponse => "impulse-response",
        }
    }

    /// Key of the local directory inside [`Self::section`]
    pub const fn directory_key(self) -> &'static str {
        match self {
            Self::Phrase => "phrase_directory",
            Self::ImpulseResponse => "ir_directory",
        }
    }
}

impl fmt::Display for CorpusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

/// One remote archive. Identity is the file name within its corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSpec {
    file_name: String,
    corpus: CorpusKind,
    url: Url,
}

impl ArchiveSpec {
    /// Resolve `file_name` against `base_url`.
    ///
    /// A base ending in `/` gets the name appended; otherwise its last path
    /// segment is replaced (`https://h/a/list.txt` + `x.tar` → `https://h/a/x.tar`).
    pub fn new(file_name: &str, corpus: CorpusKind, base_url: &Url) -> Result<Self, String> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name == ".." {
            return Err(format!("'{file_name}' is not a plain file name"));
        }
        if base_name_of(file_name).is_empty() {
            return Err(format!("'{file_name}' has an empty base name"));
        }
        let url = base_url
            .join(file_name)
            .map_err(|e| format!("cannot join '{file_name}' onto {base_url}: {e}"))?;
        Ok(Self {
            file_name: file_name.to_string(),
            corpus,
            url,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn corpus(&self) -> CorpusKind {
        self.corpus
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// File name up to its first `.`: `a.tar.gz` → `a`.
    pub fn base_name(&self) -> &str {
        base_name_of(&self.file_name)
    }

    /// Where the downloaded archive lives.
    pub fn local_path(&self, root: &Path) -> PathBuf {
        root.join(&self.file_name)
    }

    /// Where its contents are expected after extraction.
    pub fn extracted_dir(&self, root: &Path) -> PathBuf {
        root.join(self.base_name())
    }

    /// `phrase/a.tar` style label for logs and progress bars.
    pub fn label(&self) -> String {
        format!("{}/{}", self.corpus, self.file_name)
    }
}

fn base_name_of(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// A local directory plus the archives it is populated from, in declared order.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub kind: CorpusKind,
    pub root: PathBuf,
    pub archives: Vec<ArchiveSpec>,
}

impl Corpus {
    pub fn new(kind: CorpusKind, root: PathBuf, archives: Vec<ArchiveSpec>) -> Self {
        Self {
            kind,
            root,
            archives,
        }
    }

    /// Create the corpus root. Must run before any archive operation.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    pub fn local_path(&self, spec: &ArchiveSpec) -> PathBuf {
        spec.local_path(&self.root)
    }

    pub fn extracted_dir(&self, spec: &ArchiveSpec) -> PathBuf {
        spec.extracted_dir(&self.root)
    }
}
