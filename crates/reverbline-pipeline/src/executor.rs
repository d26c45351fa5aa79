//! Ready-queue executor for a [`TaskGraph`] on a rayon pool.
//!
//! The calling thread owns the scheduling state and receives finished tasks
//! over a channel; task bodies run on pool threads. A task is released once
//! every dependency is terminal.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::graph::{DepKind, Task, TaskGraph, TaskId};

/// Terminal state of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed(String),
    /// Not run because a `Succeeded` dependency did not succeed
    Skipped(String),
    /// Not run because shutdown was requested
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Runs a single task body. Called concurrently from pool threads.
pub trait TaskRunner: Sync {
    fn run(&self, task: &Task, state: &ExecState<'_>) -> anyhow::Result<()>;
}

/// Read access to the graph and the outcomes recorded so far.
pub struct ExecState<'g> {
    graph: &'g TaskGraph,
    outcomes: Mutex<Vec<Option<Outcome>>>,
}

impl<'g> ExecState<'g> {
    fn new(graph: &'g TaskGraph) -> Self {
        Self {
            graph,
            outcomes: Mutex::new(vec![None; graph.len()]),
        }
    }

    pub fn graph(&self) -> &'g TaskGraph {
        self.graph
    }

    /// Outcome of `id`, or `None` while it has not finished.
    pub fn outcome(&self, id: TaskId) -> Option<Outcome> {
        self.lock().get(id).cloned().flatten()
    }

    fn record(&self, id: TaskId, outcome: Outcome) {
        self.lock()[id] = Some(outcome);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Option<Outcome>>> {
        // A panicking task body cannot leave the vector half-written
        self.outcomes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Outcome of every task, indexed by [`TaskId`].
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub outcomes: Vec<Outcome>,
    pub elapsed: Duration,
}

impl ExecutionReport {
    pub fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(Outcome::is_success)
    }
}

/// Execute `graph` to completion on `pool`.
///
/// `stop` is polled before each task starts; once it returns true, tasks
/// not yet started finish as [`Outcome::Cancelled`] while running ones
/// complete normally.
pub fn execute<R>(
    graph: &TaskGraph,
    runner: &R,
    pool: &rayon::ThreadPool,
    stop: impl Fn() -> bool,
) -> ExecutionReport
where
    R: TaskRunner + ?Sized,
{
    let start = Instant::now();
    let state = ExecState::new(graph);
    let dependents = graph.dependents();
    let mut waiting: Vec<usize> = graph.tasks().iter().map(|t| t.deps.len()).collect();
    let mut ready: VecDeque<TaskId> = (0..graph.len()).filter(|&i| waiting[i] == 0).collect();

    let (tx, rx) = mpsc::channel::<(TaskId, Outcome)>();

    pool.in_place_scope(|scope| {
        let mut in_flight = 0usize;
        let mut settle = |id: TaskId, outcome: Outcome, ready: &mut VecDeque<TaskId>| {
            log_outcome(&graph.tasks()[id], &outcome);
            state.record(id, outcome);
            for &next in &dependents[id] {
                waiting[next] -= 1;
                if waiting[next] == 0 {
                    ready.push_back(next);
                }
            }
        };

        loop {
            while let Some(id) = ready.pop_front() {
                let task = &graph.tasks()[id];
                if stop() {
                    settle(id, Outcome::Cancelled, &mut ready);
                    continue;
                }
                if let Some(reason) = unmet_dependency(task, &state) {
                    settle(id, Outcome::Skipped(reason), &mut ready);
                    continue;
                }

                in_flight += 1;
                let tx = tx.clone();
                let state = &state;
                scope.spawn(move |_| {
                    log::debug!("{}: started", task.label());
                    let outcome = match catch_unwind(AssertUnwindSafe(|| runner.run(task, state))) {
                        Ok(Ok(())) => Outcome::Succeeded,
                        Ok(Err(e)) => Outcome::Failed(format!("{e:#}")),
                        Err(_) => Outcome::Failed("task panicked".to_string()),
                    };
                    let _ = tx.send((task.id, outcome));
                });
            }

            if in_flight == 0 {
                break;
            }
            // Every spawned task sends exactly once, and `tx` is still alive here
            let Ok((id, outcome)) = rx.recv() else { break };
            in_flight -= 1;
            settle(id, outcome, &mut ready);
        }
    });

    let outcomes = state
        .outcomes
        .into_inner()
        .unwrap_or_else(|e| e.into_inner())
        .into_iter()
        .map(|o| o.unwrap_or(Outcome::Cancelled))
        .collect();

    ExecutionReport {
        outcomes,
        elapsed: start.elapsed(),
    }
}

fn unmet_dependency(task: &Task, state: &ExecState<'_>) -> Option<String> {
    task.deps
        .iter()
        .filter(|d| d.kind == DepKind::Succeeded)
        .find(|d| !state.outcome(d.task).is_some_and(|o| o.is_success()))
        .map(|d| {
            let label = state
                .graph()
                .get(d.task)
                .map_or_else(|| format!("task {}", d.task), Task::label);
            format!("{label} did not succeed")
        })
}

fn log_outcome(task: &Task, outcome: &Outcome) {
    match outcome {
        Outcome::Succeeded => log::debug!("{}: done", task.label()),
        Outcome::Failed(e) => log::error!("{}: {e}", task.label()),
        Outcome::Skipped(reason) => log::warn!("{}: skipped ({reason})", task.label()),
        Outcome::Cancelled => log::info!("{}: cancelled", task.label()),
    }
}
