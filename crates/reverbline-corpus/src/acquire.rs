//! Corpus acquisition: download an archive once, unpack it into its
//! extracted directory.
//!
//! Both steps stage their output next to the final location (`.part` file,
//! `.extract.tmp` directory) and rename into place, so a present archive or
//! extracted directory is always complete.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use indicatif::ProgressBar;
use reverbline_core::progress::upgrade_to_bytes;
use reverbline_core::{StreamError, download_to_file, http_config, part_path, retry_with_backoff};

use crate::archive::{ArchiveSpec, Corpus, CorpusKind};
use crate::config::ExtractPolicy;

/// Suffix of the staging directory used while unpacking
pub const EXTRACT_TMP_SUFFIX: &str = ".extract.tmp";

/// Error types for acquisition
#[derive(Debug)]
pub enum AcquireError {
    /// Extraction requested but the archive was never downloaded
    MissingArchive(PathBuf),
    /// Network or HTTP failure while downloading
    Download { archive: String, source: StreamError },
    /// Archive unreadable or corrupt
    Extract { archive: PathBuf, source: io::Error },
    /// Local filesystem failure outside the archive itself
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArchive(path) => write!(f, "archive not found: {}", path.display()),
            Self::Download { archive, source } => write!(f, "download {archive}: {source}"),
            Self::Extract { archive, source } => {
                write!(f, "extract {}: {source}", archive.display())
            }
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for AcquireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MissingArchive(_) => None,
            Self::Download { source, .. } => Some(source),
            Self::Extract { source, .. } | Self::Io { source, .. } => Some(source),
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> AcquireError + '_ {
    move |source| AcquireError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    AlreadyPresent(PathBuf),
    Downloaded { path: PathBuf, bytes: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    AlreadyExtracted(PathBuf),
    Extracted { dir: PathBuf, entries: usize },
}

/// Download `spec` into `root` unless the archive file already exists.
pub fn ensure_downloaded(
    spec: &ArchiveSpec,
    root: &Path,
    pb: &ProgressBar,
) -> Result<DownloadOutcome, AcquireError> {
    let path = spec.local_path(root);
    if path.exists() {
        log::debug!("{}: already present", spec.label());
        return Ok(DownloadOutcome::AlreadyPresent(path));
    }

    let label = spec.label();
    pb.set_message("connecting...");
    let bytes = retry_with_backoff(&label, http_config().max_retries, pb, || {
        let mut sized = false;
        download_to_file(spec.url().as_str(), &path, |done, total| {
            if !sized {
                if let Some(total) = total {
                    upgrade_to_bytes(pb, total);
                    sized = true;
                }
            }
            pb.set_position(done);
        })
    })
    .map_err(|source| AcquireError::Download {
        archive: label.clone(),
        source,
    })?;

    pb.finish_with_message("done");
    log::info!("{label}: downloaded {bytes} bytes");
    Ok(DownloadOutcome::Downloaded { path, bytes })
}

/// Unpack the downloaded archive into `root/<base_name>`.
///
/// Gzip is detected from the stream, so `.tar`, `.tar.gz` and `.tgz` all work.
/// Archives that already hold a top-level `<base_name>/` directory have it
/// moved to `root/<base_name>`, and any other top-level entries are kept inside
/// it. Flat archives become `root/<base_name>`. Nothing else in `root` is touched.
pub fn ensure_extracted(
    spec: &ArchiveSpec,
    root: &Path,
    policy: ExtractPolicy,
) -> Result<ExtractOutcome, AcquireError> {
    let archive = spec.local_path(root);
    if !archive.is_file() {
        return Err(AcquireError::MissingArchive(archive));
    }
    let dest = spec.extracted_dir(root);
    if policy == ExtractPolicy::SkipIfPresent && dest.is_dir() {
        log::debug!("{}: already extracted", spec.label());
        return Ok(ExtractOutcome::AlreadyExtracted(dest));
    }

    let staging = root.join(format!(".{}{EXTRACT_TMP_SUFFIX}", spec.base_name()));
    remove_path(&staging).map_err(io_err(&staging))?;
    fs::create_dir_all(&staging).map_err(io_err(&staging))?;

    let entries = match unpack(&archive, &staging) {
        Ok(n) => n,
        Err(source) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(AcquireError::Extract { archive, source });
        }
    };

    promote(&staging, root, spec.base_name()).map_err(io_err(&dest))?;
    log::info!("{}: extracted {entries} entries", spec.label());
    Ok(ExtractOutcome::Extracted { dir: dest, entries })
}

fn unpack(archive: &Path, into: &Path) -> io::Result<usize> {
    let mut file = BufReader::new(File::open(archive)?);
    let mut magic = [0u8; 2];
    let gzipped = match file.read_exact(&mut magic) {
        Ok(()) => magic == [0x1f, 0x8b],
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(e),
    };
    file.seek(SeekFrom::Start(0))?;

    let reader: Box<dyn Read> = if gzipped {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut tar = tar::Archive::new(reader);
    let mut count = 0;
    for entry in tar.entries()? {
        // unpack_in refuses entries that would land outside `into`
        if entry?.unpack_in(into)? {
            count += 1;
        }
    }
    Ok(count)
}

fn promote(staging: &Path, root: &Path, base_name: &str) -> io::Result<()> {
    let target = root.join(base_name);
    let nested = staging.join(base_name);
    if nested.is_dir() {
        remove_path(&target)?;
        fs::rename(&nested, &target)?;
        // Anything beside `<base_name>/` stays under it so siblings in root are untouched
        for entry in fs::read_dir(staging)? {
            let entry = entry?;
            let name = entry.file_name();
            let inside = target.join(&name);
            log::warn!(
                "{}: top-level entry '{}' kept inside {}",
                base_name,
                name.to_string_lossy(),
                target.display()
            );
            remove_path(&inside)?;
            fs::rename(entry.path(), &inside)?;
        }
        fs::remove_dir(staging)
    } else {
        remove_path(&target)?;
        fs::rename(staging, &target)
    }
}

/// Remove a file or directory tree; absent is fine.
fn remove_path(path: &Path) -> io::Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// On-disk state of one archive, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveStatus {
    pub corpus: CorpusKind,
    pub file_name: String,
    pub downloaded: bool,
    /// A `.part` file from an interrupted download exists
    pub partial: bool,
    pub extracted: bool,
}

pub fn corpus_status(corpus: &Corpus) -> Vec<ArchiveStatus> {
    corpus
        .archives
        .iter()
        .map(|spec| {
            let path = corpus.local_path(spec);
            ArchiveStatus {
                corpus: corpus.kind,
                file_name: spec.file_name().to_string(),
                downloaded: path.is_file(),
                partial: part_path(&path).exists(),
                extracted: corpus.extracted_dir(spec).is_dir(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_path_handles_all_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        let sub = dir.path().join("d");
        fs::write(&file, b"x").unwrap();
        fs::create_dir_all(sub.join("nested")).unwrap();

        remove_path(&file).unwrap();
        remove_path(&sub).unwrap();
        remove_path(&dir.path().join("absent")).unwrap();
        assert!(!file.exists());
        assert!(!sub.exists());
    }

    #[test]
    fn promote_flat_staging_becomes_base_dir() {
        let root = tempfile::tempdir().unwrap();
        let staging = root.path().join(".a.extract.tmp");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("x.wav"), b"").unwrap();

        promote(&staging, root.path(), "a").unwrap();
        assert!(root.path().join("a/x.wav").is_file());
        assert!(!staging.exists());
    }

    #[test]
    fn promote_nested_replaces_existing() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("a")).unwrap();
        fs::write(root.path().join("a/stale.wav"), b"").unwrap();

        let staging = root.path().join(".a.extract.tmp");
        fs::create_dir_all(staging.join("a")).unwrap();
        fs::write(staging.join("a/fresh.wav"), b"").unwrap();

        promote(&staging, root.path(), "a").unwrap();
        assert!(root.path().join("a/fresh.wav").is_file());
        assert!(!root.path().join("a/stale.wav").exists());
        assert!(!staging.exists());
    }

    #[test]
    fn promote_nested_leaves_siblings_alone() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("b")).unwrap();
        fs::write(root.path().join("b/keep.wav"), b"").unwrap();
        fs::write(root.path().join("b.tar"), b"archive").unwrap();

        let staging = root.path().join(".a.extract.tmp");
        fs::create_dir_all(staging.join("a")).unwrap();
        fs::write(staging.join("a/x.wav"), b"").unwrap();
        fs::create_dir_all(staging.join("b")).unwrap();
        fs::write(staging.join("b/intruder.wav"), b"").unwrap();
        fs::write(staging.join("b.tar"), b"").unwrap();

        promote(&staging, root.path(), "a").unwrap();
        assert!(root.path().join("a/x.wav").is_file());
        assert!(root.path().join("a/b/intruder.wav").is_file());
        assert!(root.path().join("a/b.tar").is_file());
        assert!(root.path().join("b/keep.wav").is_file());
        assert!(!root.path().join("b/intruder.wav").exists());
        assert_eq!(fs::read(root.path().join("b.tar")).unwrap(), b"archive");
        assert!(!staging.exists());
    }

    #[test]
    fn error_display() {
        let err = AcquireError::MissingArchive(PathBuf::from("/x/a.tar"));
        assert_eq!(err.to_string(), "archive not found: /x/a.tar");
    }
}
