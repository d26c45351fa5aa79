//! Task graph: acquisition nodes per archive plus the combination barrier.

use std::fmt;

use reverbline_corpus::{ArchiveSpec, Corpus};

/// Index of a task within its [`TaskGraph`].
pub type TaskId = usize;

/// What a task does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Work {
    Download(ArchiveSpec),
    Extract(ArchiveSpec),
    /// Plan and run every (phrase, impulse response) pair
    Combine,
}

/// How strongly a task depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    /// Run only if the dependency succeeded; otherwise skip
    Succeeded,
    /// Run once the dependency reached any terminal state
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub task: TaskId,
    pub kind: DepKind,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub work: Work,
    pub deps: Vec<Dependency>,
}

impl Task {
    pub fn label(&self) -> String {
        match &self.work {
            Work::Download(spec) => format!("download {}", spec.label()),
            Work::Extract(spec) => format!("extract {}", spec.label()),
            Work::Combine => "combine".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A dependency names a task that does not exist (yet)
    UnknownDependency { dependency: TaskId, tasks: usize },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownDependency { dependency, tasks } => write!(
                f,
                "dependency on task {dependency}, but only {tasks} task(s) exist"
            ),
        }
    }
}

impl std::error::Error for GraphError {}

/// Directed acyclic graph of tasks.
///
/// Tasks may only depend on tasks added before them, so no cycle can be built.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: Vec<Task>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, work: Work, deps: Vec<Dependency>) -> Result<TaskId, GraphError> {
        let id = self.tasks.len();
        if let Some(bad) = deps.iter().find(|d| d.task >= id) {
            return Err(GraphError::UnknownDependency {
                dependency: bad.task,
                tasks: id,
            });
        }
        self.tasks.push(Task { id, work, deps });
        Ok(id)
    }

    /// Download → Extract chain for every archive, nothing else.
    pub fn acquisition(corpora: &[&Corpus]) -> Self {
        let mut graph = Self::new();
        graph.add_acquisition(corpora);
        graph
    }

    /// Full pipeline: acquisition chains, then one Combine node that waits
    /// for every Extract to finish, whatever its outcome.
    pub fn build(phrase: &Corpus, impulse_response: &Corpus) -> Self {
        let mut graph = Self::new();
        let extracts = graph.add_acquisition(&[phrase, impulse_response]);
        let barrier = extracts
            .into_iter()
            .map(|task| Dependency {
                task,
                kind: DepKind::Completed,
            })
            .collect();
        graph.push(Work::Combine, barrier);
        graph
    }

    /// Returns the Extract task ids in declaration order.
    fn add_acquisition(&mut self, corpora: &[&Corpus]) -> Vec<TaskId> {
        let mut extracts = Vec::new();
        for corpus in corpora {
            for spec in &corpus.archives {
                let download = self.push(Work::Download(spec.clone()), Vec::new());
                let extract = self.push(
                    Work::Extract(spec.clone()),
                    vec![Dependency {
                        task: download,
                        kind: DepKind::Succeeded,
                    }],
                );
                extracts.push(extract);
            }
        }
        extracts
    }

    // Dependencies built here always point backwards
    fn push(&mut self, work: Work, deps: Vec<Dependency>) -> TaskId {
        let id = self.tasks.len();
        self.tasks.push(Task { id, work, deps });
        id
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// For every task, the tasks that depend on it.
    pub fn dependents(&self) -> Vec<Vec<TaskId>> {
        let mut out = vec![Vec::new(); self.tasks.len()];
        for task in &self.tasks {
            for dep in &task.deps {
                out[dep.task].push(task.id);
            }
        }
        out
    }

    /// Id of the Extract task for `spec`.
    pub fn extract_task(&self, spec: &ArchiveSpec) -> Option<TaskId> {
        self.tasks.iter().find_map(|t| match &t.work {
            Work::Extract(s) if s == spec => Some(t.id),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverbline_corpus::{CorpusKind, Url};
    use std::path::PathBuf;

    fn corpus(kind: CorpusKind, files: &[&str]) -> Corpus {
        let base = Url::parse("https://host/").unwrap();
        let archives = files
            .iter()
            .map(|f| ArchiveSpec::new(f, kind, &base).unwrap())
            .collect();
        Corpus::new(kind, PathBuf::from("/data"), archives)
    }

    #[test]
    fn add_rejects_forward_dependency() {
        let mut g = TaskGraph::new();
        let a = g.add(Work::Combine, vec![]).unwrap();
        let err = g
            .add(
                Work::Combine,
                vec![Dependency {
                    task: a + 1,
                    kind: DepKind::Completed,
                }],
            )
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownDependency {
                dependency: 1,
                tasks: 1
            }
        );
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn build_shape() {
        let phrase = corpus(CorpusKind::Phrase, &["a.tar", "b.tar"]);
        let ir = corpus(CorpusKind::ImpulseResponse, &["r.tar"]);
        let g = TaskGraph::build(&phrase, &ir);

        // 3 archives × (download + extract) + combine
        assert_eq!(g.len(), 7);

        let combine = g.tasks().last().unwrap();
        assert_eq!(combine.work, Work::Combine);
        assert_eq!(combine.deps.len(), 3);
        assert!(combine.deps.iter().all(|d| d.kind == DepKind::Completed));
        for dep in &combine.deps {
            assert!(matches!(g.get(dep.task).unwrap().work, Work::Extract(_)));
        }

        for task in g.tasks() {
            if let Work::Extract(spec) = &task.work {
                assert_eq!(task.deps.len(), 1);
                assert_eq!(task.deps[0].kind, DepKind::Succeeded);
                assert_eq!(
                    g.get(task.deps[0].task).unwrap().work,
                    Work::Download(spec.clone())
                );
                assert_eq!(g.extract_task(spec), Some(task.id));
            }
        }
    }

    #[test]
    fn acquisition_has_no_combine() {
        let phrase = corpus(CorpusKind::Phrase, &["a.tar"]);
        let g = TaskGraph::acquisition(&[&phrase]);
        assert_eq!(g.len(), 2);
        assert!(g.tasks().iter().all(|t| t.work != Work::Combine));
    }

    #[test]
    fn dependents_inverts_edges() {
        let phrase = corpus(CorpusKind::Phrase, &["a.tar"]);
        let ir = corpus(CorpusKind::ImpulseResponse, &["r.tar"]);
        let g = TaskGraph::build(&phrase, &ir);
        let deps = g.dependents();
        assert_eq!(deps[0], vec![1]); // download a → extract a
        assert_eq!(deps[1], vec![4]); // extract a → combine
        assert!(deps[4].is_empty());
    }
}
