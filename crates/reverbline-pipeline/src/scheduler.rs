//! Combination planning: every phrase file × every impulse-response file,
//! minus outputs that already exist.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use reverbline_corpus::CollisionPolicy;
use rustc_hash::FxHashMap;

use crate::target::TargetResolver;

/// One convolution to perform. Identity is `output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinationUnit {
    pub phrase: PathBuf,
    pub impulse_response: PathBuf,
    pub output: PathBuf,
}

/// Audio files found in one extracted archive.
#[derive(Debug, Clone)]
pub struct SourceDir {
    /// Archive file name, for logs
    pub archive: String,
    pub files: Vec<PathBuf>,
}

/// Two source pairs that derive the same output name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub output: PathBuf,
    /// (phrase, impulse response) that owns the output
    pub kept: (PathBuf, PathBuf),
    pub dropped: (PathBuf, PathBuf),
}

impl fmt::Display for Collision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} from {} × {} collides with {} × {}",
            self.output.display(),
            self.dropped.0.display(),
            self.dropped.1.display(),
            self.kept.0.display(),
            self.kept.1.display(),
        )
    }
}

/// Planning refused because of a collision under [`CollisionPolicy::Error`].
#[derive(Debug, Clone)]
pub struct CollisionError(pub Collision);

impl fmt::Display for CollisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output name collision: {}", self.0)
    }
}

impl std::error::Error for CollisionError {}

#[derive(Debug, Clone, Default)]
pub struct CombinationPlan {
    /// Pairs still to convolve, in deterministic order
    pub units: Vec<CombinationUnit>,
    /// Pairs whose output already exists
    pub skipped_existing: usize,
    pub collisions: Vec<Collision>,
}

/// `{phrase stem}_{ir file name}`: `hello.wav` + `room1.wav` → `hello_room1.wav`.
///
/// `None` if either path has no file name.
pub fn derive_output_name(phrase: &Path, impulse_response: &Path) -> Option<OsString> {
    let mut name = phrase.file_stem()?.to_os_string();
    name.push("_");
    name.push(impulse_response.file_name()?);
    Some(name)
}

/// Listing an extracted directory failed.
#[derive(Debug)]
pub enum ListError {
    Io { dir: PathBuf, source: io::Error },
    Pattern(glob::PatternError),
}

impl fmt::Display for ListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { dir, source } => write!(f, "failed to list {}: {source}", dir.display()),
            Self::Pattern(e) => write!(f, "invalid audio suffix pattern: {e}"),
        }
    }
}

impl std::error::Error for ListError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Pattern(e) => Some(e),
        }
    }
}

/// Regular files directly inside `dir` whose name ends with `suffix`, sorted.
///
/// Only file names are matched against the pattern, so `dir` itself may be
/// any path the OS accepts. A missing `dir` lists as empty.
pub fn list_audio_files(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, ListError> {
    let pattern = glob::Pattern::new(&format!("*{}", glob::Pattern::escape(suffix)))
        .map_err(ListError::Pattern)?;
    let io_err = |source| ListError::Io {
        dir: dir.to_path_buf(),
        source,
    };
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            log::warn!(
                "Skipping non-UTF-8 name {:?} in {}",
                entry.file_name(),
                dir.display()
            );
            continue;
        };
        let path = entry.path();
        if pattern.matches(name) && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Builds a [`CombinationPlan`] for one output directory.
pub struct Scheduler<'a, T: TargetResolver + ?Sized> {
    output_dir: PathBuf,
    policy: CollisionPolicy,
    resolver: &'a T,
}

impl<'a, T: TargetResolver + ?Sized> Scheduler<'a, T> {
    pub fn new(output_dir: impl Into<PathBuf>, policy: CollisionPolicy, resolver: &'a T) -> Self {
        Self {
            output_dir: output_dir.into(),
            policy,
            resolver,
        }
    }

    /// Iterates phrase archive × IR archive × phrase file × IR file.
    ///
    /// Each output is checked for existence exactly once, here. Collisions
    /// are detected on names alone, so the result does not depend on which
    /// outputs happen to exist.
    pub fn plan(
        &self,
        phrases: &[SourceDir],
        impulse_responses: &[SourceDir],
    ) -> Result<CombinationPlan, CollisionError> {
        let mut plan = CombinationPlan::default();
        let mut owners: FxHashMap<OsString, (&Path, &Path)> = FxHashMap::default();

        for phrase_dir in phrases {
            for ir_dir in impulse_responses {
                for phrase in &phrase_dir.files {
                    for ir in &ir_dir.files {
                        let Some(name) = derive_output_name(phrase, ir) else {
                            continue;
                        };
                        let output = self.output_dir.join(&name);

                        if let Some(&(kept_phrase, kept_ir)) = owners.get(&name) {
                            let collision = Collision {
                                output,
                                kept: (kept_phrase.to_path_buf(), kept_ir.to_path_buf()),
                                dropped: (phrase.clone(), ir.clone()),
                            };
                            if self.policy == CollisionPolicy::Error {
                                return Err(CollisionError(collision));
                            }
                            log::warn!("Output collision, keeping first: {collision}");
                            plan.collisions.push(collision);
                            continue;
                        }
                        owners.insert(name, (phrase, ir));

                        if self.resolver.exists(&output) {
                            plan.skipped_existing += 1;
                            continue;
                        }
                        plan.units.push(CombinationUnit {
                            phrase: phrase.clone(),
                            impulse_response: ir.clone(),
                            output,
                        });
                    }
                }
            }
        }

        log::debug!(
            "Planned {} units ({} existing, {} collisions)",
            plan.units.len(),
            plan.skipped_existing,
            plan.collisions.len()
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Outputs that "exist", without touching disk.
    struct InMemory(HashSet<PathBuf>);

    impl TargetResolver for InMemory {
        fn exists(&self, path: &Path) -> bool {
            self.0.contains(path)
        }
    }

    fn nothing() -> InMemory {
        InMemory(HashSet::new())
    }

    fn source(archive: &str, files: &[&str]) -> SourceDir {
        SourceDir {
            archive: archive.to_string(),
            files: files.iter().map(PathBuf::from).collect(),
        }
    }

    #[test]
    fn output_name() {
        let name = derive_output_name(Path::new("/p/a/hello.wav"), Path::new("/i/b/room1.wav"));
        assert_eq!(name.unwrap(), "hello_room1.wav");
        // Only the last extension is stripped from the phrase
        let name = derive_output_name(Path::new("take.2.wav"), Path::new("hall.wav"));
        assert_eq!(name.unwrap(), "take.2_hall.wav");
        assert!(derive_output_name(Path::new("/"), Path::new("x.wav")).is_none());
    }

    #[test]
    fn hello_room1_scenario() {
        let resolver = nothing();
        let scheduler = Scheduler::new("/out", CollisionPolicy::FirstWins, &resolver);
        let plan = scheduler
            .plan(
                &[source("a.tar", &["/ph/a/hello.wav"])],
                &[source("b.tar", &["/ir/b/room1.wav"])],
            )
            .unwrap();

        assert_eq!(
            plan.units,
            vec![CombinationUnit {
                phrase: PathBuf::from("/ph/a/hello.wav"),
                impulse_response: PathBuf::from("/ir/b/room1.wav"),
                output: PathBuf::from("/out/hello_room1.wav"),
            }]
        );
    }

    #[test]
    fn full_cartesian_product_in_order() {
        let resolver = nothing();
        let scheduler = Scheduler::new("/out", CollisionPolicy::FirstWins, &resolver);
        let plan = scheduler
            .plan(
                &[source("a", &["/a/p1.wav", "/a/p2.wav"]), source("b", &["/b/p3.wav"])],
                &[source("r", &["/r/i1.wav", "/r/i2.wav"])],
            )
            .unwrap();

        let names: Vec<_> = plan
            .units
            .iter()
            .map(|u| u.output.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "p1_i1.wav", "p1_i2.wav", "p2_i1.wav", "p2_i2.wav", "p3_i1.wav", "p3_i2.wav"
            ]
        );
    }

    #[test]
    fn existing_outputs_skipped() {
        let resolver = InMemory(HashSet::from([PathBuf::from("/out/p1_i1.wav")]));
        let scheduler = Scheduler::new("/out", CollisionPolicy::FirstWins, &resolver);
        let plan = scheduler
            .plan(
                &[source("a", &["/a/p1.wav", "/a/p2.wav"])],
                &[source("r", &["/r/i1.wav"])],
            )
            .unwrap();

        assert_eq!(plan.skipped_existing, 1);
        assert_eq!(plan.units.len(), 1);
        assert_eq!(plan.units[0].output, PathBuf::from("/out/p2_i1.wav"));
    }

    #[test]
    fn collision_first_wins() {
        let resolver = nothing();
        let scheduler = Scheduler::new("/out", CollisionPolicy::FirstWins, &resolver);
        let plan = scheduler
            .plan(
                &[source("a", &["/a/clip.wav"]), source("b", &["/b/clip.wav"])],
                &[source("r", &["/r/room.wav"])],
            )
            .unwrap();

        assert_eq!(plan.units.len(), 1);
        assert_eq!(plan.units[0].phrase, PathBuf::from("/a/clip.wav"));
        assert_eq!(plan.collisions.len(), 1);
        assert_eq!(plan.collisions[0].dropped.0, PathBuf::from("/b/clip.wav"));
        assert_eq!(plan.collisions[0].output, PathBuf::from("/out/clip_room.wav"));
    }

    #[test]
    fn collision_error_policy() {
        let resolver = nothing();
        let scheduler = Scheduler::new("/out", CollisionPolicy::Error, &resolver);
        let err = scheduler
            .plan(
                &[source("a", &["/a/clip.wav"]), source("b", &["/b/clip.wav"])],
                &[source("r", &["/r/room.wav"])],
            )
            .unwrap_err();
        assert_eq!(err.0.kept.0, PathBuf::from("/a/clip.wav"));
        assert!(err.to_string().contains("clip_room.wav"));
    }

    #[test]
    fn collision_detected_even_when_output_exists() {
        let resolver = InMemory(HashSet::from([PathBuf::from("/out/clip_room.wav")]));
        let scheduler = Scheduler::new("/out", CollisionPolicy::Error, &resolver);
        assert!(scheduler
            .plan(
                &[source("a", &["/a/clip.wav"]), source("b", &["/b/clip.wav"])],
                &[source("r", &["/r/room.wav"])],
            )
            .is_err());
    }

    #[test]
    fn empty_sources_empty_plan() {
        let resolver = nothing();
        let scheduler = Scheduler::new("/out", CollisionPolicy::FirstWins, &resolver);
        let plan = scheduler.plan(&[], &[source("r", &["/r/x.wav"])]).unwrap();
        assert!(plan.units.is_empty());
        assert_eq!(plan.skipped_existing, 0);
    }

    #[test]
    fn listing_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.wav", "a.wav", "notes.txt", "c.WAV"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir_all(dir.path().join("nested.wav")).unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/deep.wav"), b"").unwrap();

        let files = list_audio_files(dir.path(), ".wav").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.wav", "b.wav"]);
    }

    // Linux filesystems accept arbitrary bytes in names; APFS does not
    #[cfg(target_os = "linux")]
    #[test]
    fn listing_works_under_non_utf8_dir() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(OsStr::from_bytes(b"ph\xffrases"));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("hello.wav"), b"").unwrap();
        std::fs::write(dir.join(OsStr::from_bytes(b"x\xfe.wav")), b"").unwrap();

        let files = list_audio_files(&dir, ".wav").unwrap();
        assert_eq!(files, [dir.join("hello.wav")]);
    }

    #[test]
    fn listing_suffix_is_literal() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a[1].wav", "b.wav", "c.w*v"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let files = list_audio_files(dir.path(), ".w*v").unwrap();
        assert_eq!(files, [dir.path().join("c.w*v")]);
        let files = list_audio_files(dir.path(), ".wav").unwrap();
        assert_eq!(files, [dir.path().join("a[1].wav"), dir.path().join("b.wav")]);
    }

    #[test]
    fn listing_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let files = list_audio_files(&dir.path().join("absent"), ".wav").unwrap();
        assert!(files.is_empty());
    }
}
