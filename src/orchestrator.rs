use crate::error::{BackendError, StoreError};
use crate::git::{Backend, Revision};
use crate::store::StagingArea;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// what happened to one file during a commit or uncommit
#[derive(Debug)]
pub enum Outcome {
    Committed { index: usize, path: String },
    Uncommitted { index: usize, path: String },
    Replayed { index: usize, path: String },
    AlreadyCommitted { index: usize, path: String },
    NotCommitted { index: usize, path: String },
    NotReady { index: usize, path: String },
    NoSuchFile { index: usize },
    Failed { index: usize, path: String, error: BackendError },
    ReplayFailed { index: usize, path: String, error: BackendError },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::ReplayFailed { .. })
    }

    /// anything that is neither a success nor a backend failure
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Self::AlreadyCommitted { .. }
                | Self::NotCommitted { .. }
                | Self::NotReady { .. }
                | Self::NoSuchFile { .. }
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Committed { index, path } => write!(f, "f{index} {path}: committed"),
            Self::Uncommitted { index, path } => write!(f, "f{index} {path}: uncommitted"),
            Self::Replayed { index, path } => write!(f, "f{index} {path}: re-committed"),
            Self::AlreadyCommitted { index, path } => {
                write!(f, "f{index} {path}: already committed")
            }
            Self::NotCommitted { index, path } => write!(f, "f{index} {path}: not committed"),
            Self::NotReady { index, path } => write!(f, "f{index} {path}: not ready"),
            Self::NoSuchFile { index } => write!(f, "f{index}: does not exist"),
            Self::Failed { index, path, error } => {
                write!(f, "f{index} {path}: commit failed: {error}")
            }
            Self::ReplayFailed { index, path, error } => write!(
                f,
                "f{index} {path}: re-commit failed, file is no longer committed: {error}"
            ),
        }
    }
}

/// per-file outcomes of one command, in processing order
#[derive(Debug, Default)]
pub struct Report {
    outcomes: Vec<Outcome>,
}

impl Report {
    fn push(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// drives commits and uncommits against the backend, keeping the staging
/// area in line with history
///
/// uncommitting rewinds history to the head captured at session start and
/// replays the commits that should survive; a record is only marked
/// committed once its commit is actually in history.
pub struct Orchestrator<B> {
    backend: B,
    head_revision: Option<Revision>,
}

impl<B: Backend> Orchestrator<B> {
    /// capture the session anchor; call before anything touches history
    pub fn new(backend: B) -> Result<Self, BackendError> {
        let head_revision = backend.head_revision()?;
        debug!(head = ?head_revision, "captured session head");
        Ok(Self {
            backend,
            head_revision,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn head_revision(&self) -> Option<&Revision> {
        self.head_revision.as_ref()
    }

    /// commit the given 1-based indices, each independently
    pub fn commit(&self, store: &mut StagingArea, indices: &[usize]) -> Report {
        let mut report = Report::default();
        for index in dedup(indices) {
            let outcome = self
                .commit_one(store, index)
                .unwrap_or(Outcome::NoSuchFile { index });
            report.push(outcome);
        }
        report
    }

    /// commit every record in addressing order
    pub fn commit_all(&self, store: &mut StagingArea) -> Report {
        let indices: Vec<usize> = (1..=store.len()).collect();
        self.commit(store, &indices)
    }

    /// remove the given indices from history, keeping every other commit
    ///
    /// fails only when history cannot be rewound, in which case nothing has
    /// changed.
    pub fn uncommit(
        &self,
        store: &mut StagingArea,
        indices: &[usize],
    ) -> Result<Report, BackendError> {
        let mut report = Report::default();
        let mut targets = BTreeSet::new();
        for index in dedup(indices) {
            match store.get(index) {
                Err(_) => report.push(Outcome::NoSuchFile { index }),
                Ok(record) if !record.is_committed() => report.push(Outcome::NotCommitted {
                    index,
                    path: record.path().to_string(),
                }),
                Ok(_) => {
                    targets.insert(index);
                }
            }
        }

        if targets.is_empty() {
            return Ok(report);
        }
        self.rewind(store, &targets, report)
    }

    /// remove every session commit from history
    pub fn uncommit_all(&self, store: &mut StagingArea) -> Result<Report, BackendError> {
        let targets: BTreeSet<usize> = store
            .indexed()
            .filter(|(_, r)| r.is_committed())
            .map(|(i, _)| i)
            .collect();
        if targets.is_empty() {
            return Ok(Report::default());
        }
        self.rewind(store, &targets, Report::default())
    }

    fn commit_one(&self, store: &mut StagingArea, index: usize) -> Result<Outcome, StoreError> {
        let record = store.get(index)?;
        let path = record.path().to_string();
        if record.is_committed() {
            return Ok(Outcome::AlreadyCommitted { index, path });
        }
        if !record.is_ready() {
            return Ok(Outcome::NotReady { index, path });
        }

        match self.backend.commit(&path, record.message()) {
            Ok(()) => {
                store.mark_committed(index)?;
                Ok(Outcome::Committed { index, path })
            }
            Err(error) => {
                debug!(path, %error, "commit failed");
                Ok(Outcome::Failed { index, path, error })
            }
        }
    }

    /// reset to the session head, then replay the intended commits
    fn rewind(
        &self,
        store: &mut StagingArea,
        targets: &BTreeSet<usize>,
        mut report: Report,
    ) -> Result<Report, BackendError> {
        // every committed record not being removed, in addressing order
        let intended: Vec<usize> = store
            .indexed()
            .filter(|(i, r)| r.is_committed() && !targets.contains(i))
            .map(|(i, _)| i)
            .collect();

        self.backend.reset_soft(self.head_revision.as_ref())?;
        let cleared = store.clear_committed();
        debug!(cleared = cleared.len(), replay = intended.len(), "rewound history");

        for &index in targets {
            if let Ok(record) = store.get(index) {
                report.push(Outcome::Uncommitted {
                    index,
                    path: record.path().to_string(),
                });
            }
        }

        for index in intended {
            let outcome = self
                .replay_one(store, index)
                .unwrap_or(Outcome::NoSuchFile { index });
            report.push(outcome);
        }
        debug_assert_eq!(store.committed_count(), store.recount());

        Ok(report)
    }

    fn replay_one(&self, store: &mut StagingArea, index: usize) -> Result<Outcome, StoreError> {
        let record = store.get(index)?;
        let path = record.path().to_string();
        match self.backend.commit(&path, record.message()) {
            Ok(()) => {
                store.mark_committed(index)?;
                Ok(Outcome::Replayed { index, path })
            }
            Err(error) => {
                debug!(path, %error, "replay failed");
                Ok(Outcome::ReplayFailed { index, path, error })
            }
        }
    }
}

/// drop repeated indices, keeping the first occurrence
fn dedup(indices: &[usize]) -> Vec<usize> {
    let mut seen = BTreeSet::new();
    indices
        .iter()
        .copied()
        .filter(|i| seen.insert(*i))
        .collect()
}
