//! Parallel execution of planned combination units

use std::fmt::Display;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use reverbline_core::{ProgressContext, WorkQueue};

use crate::scheduler::CombinationUnit;

/// A unit whose worker returned an error.
#[derive(Debug, Clone)]
pub struct UnitFailure {
    pub unit: CombinationUnit,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct UnitReport {
    pub completed: usize,
    pub failed: Vec<UnitFailure>,
    /// Never claimed because shutdown was requested
    pub cancelled: usize,
    pub elapsed: Duration,
}

/// Run `worker` over every unit with `workers` concurrent workers on the
/// current rayon pool.
///
/// A failing unit is logged and recorded; its siblings keep going. Once
/// `stop` returns true no further unit is claimed.
pub fn execute_units<F, E>(
    units: Vec<CombinationUnit>,
    worker: F,
    workers: usize,
    progress: &ProgressContext,
    stop: &(dyn Fn() -> bool + Sync),
) -> UnitReport
where
    F: Fn(&CombinationUnit) -> Result<(), E> + Sync,
    E: Display,
{
    let start = Instant::now();
    let queue = WorkQueue::new(units);
    let total = queue.total();
    if total == 0 {
        return UnitReport::default();
    }

    let bar = progress.unit_bar("convolve", total as u64);
    let completed = AtomicUsize::new(0);
    let claimed = AtomicUsize::new(0);
    let failed: Mutex<Vec<UnitFailure>> = Mutex::new(Vec::new());

    rayon::scope(|s| {
        for _ in 0..workers.clamp(1, total) {
            s.spawn(|_| {
                loop {
                    if stop() {
                        break;
                    }
                    let Some((_, unit)) = queue.next() else { break };
                    claimed.fetch_add(1, Ordering::Relaxed);

                    match worker(unit) {
                        Ok(()) => {
                            completed.fetch_add(1, Ordering::Relaxed);
                            log::debug!("{}: done", unit.output.display());
                        }
                        Err(e) => {
                            log::error!(
                                "{} × {} -> {}: {e}",
                                unit.phrase.display(),
                                unit.impulse_response.display(),
                                unit.output.display()
                            );
                            failed
                                .lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner())
                                .push(UnitFailure {
                                    unit: unit.clone(),
                                    error: e.to_string(),
                                });
                        }
                    }
                    bar.inc(1);
                }
            });
        }
    });

    bar.finish_and_clear();
    let claimed = claimed.into_inner();
    let report = UnitReport {
        completed: completed.into_inner(),
        failed: failed.into_inner().unwrap_or_else(|e| e.into_inner()),
        cancelled: total - claimed,
        elapsed: start.elapsed(),
    };
    log::info!(
        "Convolved {}/{} units ({} failed, {} cancelled) in {:.1}s",
        report.completed,
        total,
        report.failed.len(),
        report.cancelled,
        report.elapsed.as_secs_f64()
    );
    report
}
