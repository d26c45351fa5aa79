//! Removal of artifacts left behind by interrupted runs

use std::fs;
use std::io;
use std::path::Path;

/// Remove entries in `dir` whose file name ends with one of `suffixes`.
///
/// Covers both files (`*.tmp` outputs, `*.part` downloads) and directories
/// (aborted extractions). A missing `dir` is not an error.
/// Returns how many entries were removed.
pub fn cleanup_stale_files(dir: &Path, suffixes: &[&str]) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !suffixes.iter().any(|s| name.ends_with(s)) {
            continue;
        }
        let path = entry.path();
        log::warn!("Removing stale {}", path.display());
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        removed += 1;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_matching_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a_b.wav.tmp"), b"x").unwrap();
        fs::write(dir.path().join("rooms.tar.part"), b"x").unwrap();
        fs::create_dir(dir.path().join(".rooms.extract.tmp")).unwrap();
        fs::write(dir.path().join("keep.wav"), b"x").unwrap();

        let removed = cleanup_stale_files(dir.path(), &[".tmp", ".part"]).unwrap();

        assert_eq!(removed, 3);
        assert!(dir.path().join("keep.wav").exists());
        assert!(!dir.path().join(".rooms.extract.tmp").exists());
    }

    #[test]
    fn missing_dir_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let removed = cleanup_stale_files(&dir.path().join("nope"), &[".tmp"]).unwrap();
        assert_eq!(removed, 0);
    }
}
