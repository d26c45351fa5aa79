//! Existence checks for output files

use std::path::Path;

/// Answers "does this output already exist?" for the scheduler.
pub trait TargetResolver: Sync {
    fn exists(&self, path: &Path) -> bool;
}

/// Checks the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResolver;

impl TargetResolver for FsResolver {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
