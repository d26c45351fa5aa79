//! Pipeline runner: acquisition, barrier, combination, summary.

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reverbline_audio::ConvolutionEngine;
use reverbline_core::{ProgressContext, cleanup_stale_files, is_shutdown_requested};
use reverbline_corpus::{
    ArchiveStatus, CollisionPolicy, Corpus, DatasetConfig, DownloadOutcome, EXTRACT_TMP_SUFFIX,
    ExtractOutcome, corpus_status, ensure_downloaded, ensure_extracted,
};

use crate::combine::{UnitReport, execute_units};
use crate::executor::{ExecState, ExecutionReport, Outcome, TaskRunner, execute};
use crate::graph::{Task, TaskGraph, Work};
use crate::scheduler::{CombinationPlan, Scheduler, SourceDir, list_audio_files};
use crate::target::FsResolver;

/// How far a run goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Download and extract only
    Acquire,
    /// Acquire, then convolve every pair
    Full,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub workers: usize,
    pub stage: Stage,
}

/// Outcome of one pipeline run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub archives_total: usize,
    pub archives_downloaded: usize,
    pub archives_present: usize,
    pub bytes_downloaded: u64,
    pub archives_extracted: usize,
    /// Archives whose extracted directory is not usable this run
    pub archives_failed: usize,
    pub units_planned: usize,
    pub skipped_existing: usize,
    pub units_completed: usize,
    pub units_failed: usize,
    pub units_cancelled: usize,
    pub collisions: usize,
    /// `task: error` for every failed task
    pub failures: Vec<String>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    pub fn log(&self) {
        log::info!("=== Reverbline Summary ===");
        log::info!(
            "Archives: {} total, {} downloaded ({} bytes), {} already present, {} extracted, {} failed",
            self.archives_total,
            self.archives_downloaded,
            self.bytes_downloaded,
            self.archives_present,
            self.archives_extracted,
            self.archives_failed
        );
        log::info!(
            "Units: {} planned, {} completed, {} failed, {} cancelled, {} already existed",
            self.units_planned,
            self.units_completed,
            self.units_failed,
            self.units_cancelled,
            self.skipped_existing
        );
        if self.collisions > 0 {
            log::warn!("{} output name collision(s), first pair kept", self.collisions);
        }
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
    }
}

#[derive(Debug, Default)]
struct AcquireTally {
    downloaded: usize,
    present: usize,
    bytes: u64,
    extracted: usize,
}

#[derive(Debug)]
struct CombineTally {
    planned: usize,
    skipped_existing: usize,
    collisions: usize,
    units: UnitReport,
}

/// [`TaskRunner`] that performs the real work for each node.
struct Pipeline<'a> {
    config: &'a DatasetConfig,
    progress: &'a ProgressContext,
    engine: ConvolutionEngine,
    workers: usize,
    acquired: Mutex<AcquireTally>,
    combined: Mutex<Option<CombineTally>>,
}

impl TaskRunner for Pipeline<'_> {
    fn run(&self, task: &Task, state: &ExecState<'_>) -> Result<()> {
        match &task.work {
            Work::Download(spec) => {
                let root = &self.config.corpus(spec.corpus()).root;
                let pb = self.progress.download_bar(&spec.label());
                let result = ensure_downloaded(spec, root, &pb);
                pb.finish_and_clear();
                let mut tally = self.acquired.lock().unwrap_or_else(|e| e.into_inner());
                match result? {
                    DownloadOutcome::AlreadyPresent(_) => tally.present += 1,
                    DownloadOutcome::Downloaded { bytes, .. } => {
                        tally.downloaded += 1;
                        tally.bytes += bytes;
                    }
                }
            }
            Work::Extract(spec) => {
                let root = &self.config.corpus(spec.corpus()).root;
                let pb = self.progress.stage_line("extract");
                pb.set_message(spec.label());
                let result = ensure_extracted(spec, root, self.config.extraction);
                pb.finish_and_clear();
                if let ExtractOutcome::Extracted { .. } = result? {
                    self.acquired
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .extracted += 1;
                }
            }
            Work::Combine => self.combine(state)?,
        }
        Ok(())
    }
}

impl Pipeline<'_> {
    /// Audio files of every archive whose Extract succeeded, in declared order.
    fn sources(&self, corpus: &Corpus, state: &ExecState<'_>) -> Result<Vec<SourceDir>> {
        let mut sources = Vec::with_capacity(corpus.archives.len());
        for spec in &corpus.archives {
            let extracted = state
                .graph()
                .extract_task(spec)
                .and_then(|id| state.outcome(id))
                .is_some_and(|o| o.is_success());
            if !extracted {
                log::warn!("{}: not extracted, left out of combinations", spec.label());
                continue;
            }
            let dir = corpus.extracted_dir(spec);
            let files = list_audio_files(&dir, &self.config.audio_suffix)
                .with_context(|| format!("failed to list {}", dir.display()))?;
            if files.is_empty() {
                log::warn!(
                    "{}: no *{} files in {}",
                    spec.label(),
                    self.config.audio_suffix,
                    dir.display()
                );
            }
            sources.push(SourceDir {
                archive: spec.file_name().to_string(),
                files,
            });
        }
        Ok(sources)
    }

    fn combine(&self, state: &ExecState<'_>) -> Result<()> {
        let phrases = self.sources(&self.config.phrase, state)?;
        let irs = self.sources(&self.config.impulse_response, state)?;

        let scheduler = Scheduler::new(
            &self.config.convolved_dir,
            self.config.on_collision,
            &FsResolver,
        );
        let CombinationPlan {
            units,
            skipped_existing,
            collisions,
        } = scheduler.plan(&phrases, &irs)?;
        let planned = units.len();
        log::info!("Combination plan: {planned} to convolve, {skipped_existing} already exist");

        let engine = &self.engine;
        let report = execute_units(
            units,
            |unit| {
                let stats =
                    engine.convolve_pair(&unit.phrase, &unit.impulse_response, &unit.output)?;
                log::debug!(
                    "{}: {} frames @ {} Hz ({:?}) in {:.2}s",
                    unit.output.display(),
                    stats.output_frames,
                    stats.sample_rate,
                    stats.normalized,
                    stats.elapsed.as_secs_f64()
                );
                Ok::<_, reverbline_audio::AudioError>(())
            },
            self.workers,
            self.progress,
            &is_shutdown_requested,
        );
        let failed = report.failed.len();

        *self.combined.lock().unwrap_or_else(|e| e.into_inner()) = Some(CombineTally {
            planned,
            skipped_existing,
            collisions: collisions.len(),
            units: report,
        });

        if failed > 0 {
            anyhow::bail!("{failed} of {planned} units failed");
        }
        Ok(())
    }
}

/// Create every directory the pipeline writes to.
fn prepare_dirs(config: &DatasetConfig) -> Result<()> {
    for corpus in config.corpora() {
        corpus
            .ensure_root()
            .with_context(|| format!("Failed to create {}", corpus.root.display()))?;
    }
    std::fs::create_dir_all(&config.convolved_dir).with_context(|| {
        format!("Failed to create {}", config.convolved_dir.display())
    })?;
    Ok(())
}

/// Remove partial downloads, aborted extractions and unfinished outputs.
pub fn clean_stale(config: &DatasetConfig) -> Result<usize> {
    let mut removed = 0;
    for corpus in config.corpora() {
        removed += cleanup_stale_files(&corpus.root, &[".part", EXTRACT_TMP_SUFFIX])
            .with_context(|| format!("Failed to clean {}", corpus.root.display()))?;
    }
    removed += cleanup_stale_files(&config.convolved_dir, &[".tmp"])
        .with_context(|| format!("Failed to clean {}", config.convolved_dir.display()))?;
    Ok(removed)
}

/// Run the pipeline up to `options.stage`.
pub fn run(
    config: &DatasetConfig,
    options: &RunOptions,
    progress: &ProgressContext,
) -> Result<RunSummary> {
    let start = Instant::now();

    prepare_dirs(config)?;
    let stale = clean_stale(config)?;
    if stale > 0 {
        log::info!("Removed {stale} stale artifact(s) from an earlier run");
    }

    let graph = match options.stage {
        Stage::Full => TaskGraph::build(&config.phrase, &config.impulse_response),
        Stage::Acquire => TaskGraph::acquisition(&config.corpora()),
    };
    let workers = options.workers.max(1);
    log::info!("Running {} tasks with {workers} workers", graph.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("Failed to create thread pool")?;

    let pipeline = Pipeline {
        config,
        progress,
        engine: ConvolutionEngine::new(),
        workers,
        acquired: Mutex::new(AcquireTally::default()),
        combined: Mutex::new(None),
    };
    let report = execute(&graph, &pipeline, &pool, is_shutdown_requested);

    let summary = summarize(&graph, &report, pipeline, start.elapsed());
    summary.log();
    Ok(summary)
}

fn summarize(
    graph: &TaskGraph,
    report: &ExecutionReport,
    pipeline: Pipeline<'_>,
    elapsed: Duration,
) -> RunSummary {
    let acquired = pipeline
        .acquired
        .into_inner()
        .unwrap_or_else(|e| e.into_inner());
    let combined = pipeline
        .combined
        .into_inner()
        .unwrap_or_else(|e| e.into_inner());

    let mut summary = RunSummary {
        archives_downloaded: acquired.downloaded,
        archives_present: acquired.present,
        bytes_downloaded: acquired.bytes,
        archives_extracted: acquired.extracted,
        elapsed,
        ..RunSummary::default()
    };

    for (task, outcome) in graph.tasks().iter().zip(&report.outcomes) {
        if let Work::Extract(_) = task.work {
            summary.archives_total += 1;
            if !outcome.is_success() {
                summary.archives_failed += 1;
            }
        }
        match outcome {
            Outcome::Failed(e) => summary.failures.push(format!("{}: {e}", task.label())),
            Outcome::Cancelled => summary.cancelled = true,
            Outcome::Succeeded | Outcome::Skipped(_) => {}
        }
    }

    if let Some(c) = combined {
        summary.units_planned = c.planned;
        summary.skipped_existing = c.skipped_existing;
        summary.collisions = c.collisions;
        summary.units_completed = c.units.completed;
        summary.units_failed = c.units.failed.len();
        summary.units_cancelled = c.units.cancelled;
        summary.cancelled |= c.units.cancelled > 0;
    }
    summary
}

/// Current on-disk state, without downloading or convolving anything.
#[derive(Debug)]
pub struct StatusReport {
    pub archives: Vec<ArchiveStatus>,
    /// Pairs that a run would convolve given the directories extracted now
    pub pending_units: usize,
    pub existing_outputs: usize,
    pub collisions: usize,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let downloaded = self.archives.iter().filter(|a| a.downloaded).count();
        let extracted = self.archives.iter().filter(|a| a.extracted).count();
        write!(
            f,
            "{downloaded}/{n} downloaded, {extracted}/{n} extracted, {} pending, {} done",
            self.pending_units,
            self.existing_outputs,
            n = self.archives.len()
        )
    }
}

pub fn status(config: &DatasetConfig) -> Result<StatusReport> {
    let archives: Vec<ArchiveStatus> = config.corpora().into_iter().flat_map(corpus_status).collect();

    let sources = |corpus: &Corpus| -> Result<Vec<SourceDir>> {
        let mut out = Vec::new();
        for spec in &corpus.archives {
            let dir = corpus.extracted_dir(spec);
            if !dir.is_dir() {
                continue;
            }
            let files = list_audio_files(&dir, &config.audio_suffix)
                .with_context(|| format!("failed to list {}", dir.display()))?;
            out.push(SourceDir {
                archive: spec.file_name().to_string(),
                files,
            });
        }
        Ok(out)
    };

    // Count collisions instead of failing on them
    let scheduler = Scheduler::new(&config.convolved_dir, CollisionPolicy::FirstWins, &FsResolver);
    let plan = scheduler.plan(&sources(&config.phrase)?, &sources(&config.impulse_response)?)?;

    Ok(StatusReport {
        archives,
        pending_units: plan.units.len(),
        existing_outputs: plan.skipped_existing,
        collisions: plan.collisions.len(),
    })
}
