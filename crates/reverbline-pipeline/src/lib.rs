//! Reverbline Pipeline - task graph, scheduling and execution
//!
//! Builds the download → extract → combine graph for a dataset config,
//! runs it on a rayon pool, and convolves every (phrase, impulse response)
//! pair whose output does not exist yet.

pub mod combine;
pub mod executor;
pub mod graph;
pub mod runner;
pub mod scheduler;
pub mod target;

pub use combine::{UnitFailure, UnitReport, execute_units};
pub use executor::{ExecState, ExecutionReport, Outcome, TaskRunner, execute};
pub use graph::{DepKind, Dependency, GraphError, Task, TaskGraph, TaskId, Work};
pub use runner::{RunOptions, RunSummary, Stage, StatusReport, clean_stale, run, status};
pub use scheduler::{
    Collision, CollisionError, CombinationPlan, CombinationUnit, ListError, Scheduler, SourceDir,
    derive_output_name, list_audio_files,
};
pub use target::{FsResolver, TargetResolver};
