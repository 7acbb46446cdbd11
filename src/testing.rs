//! in-memory stand-ins for the backend and the text generation service

use crate::changeset::{Change, StatusCode};
use crate::error::{BackendError, GenerationError};
use crate::generate::TextGenerator;
use crate::git::{Backend, Revision};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct FakeState {
    pub changes: Vec<Change>,
    pub diffs: HashMap<String, String>,
    /// paths staged and not yet committed
    pub index: BTreeSet<String>,
    /// (path, message) per commit, oldest first
    pub history: Vec<(String, String)>,
    /// commits refuse these paths
    pub rejected: HashSet<String>,
    pub staged_all: bool,
    pub status_unavailable: bool,
    pub reset_fails: bool,
    pub diff_context: Option<u32>,
    pub resets: usize,
    pub unstaged: bool,
}

impl FakeState {
    pub fn committed_paths(&self) -> Vec<&str> {
        self.history.iter().map(|(p, _)| p.as_str()).collect()
    }
}

/// a backend whose history is a plain list of per-path commits
///
/// revisions are history lengths, so `None` is the unborn branch.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Rc<RefCell<FakeState>>,
}

impl FakeBackend {
    pub fn with_changes(changes: &[(StatusCode, &str)]) -> Self {
        let backend = Self::default();
        backend.state_mut().changes = changes
            .iter()
            .map(|(status, path)| Change::new(*status, *path))
            .collect();
        backend
    }

    /// a backend with `paths` modified and each diff set to `+<path>`
    pub fn with_files(paths: &[&str]) -> Self {
        let backend = Self::with_changes(
            &paths
                .iter()
                .map(|p| (StatusCode::Modified, *p))
                .collect::<Vec<_>>(),
        );
        for path in paths {
            backend
                .state_mut()
                .diffs
                .insert((*path).to_string(), format!("+{path}"));
        }
        backend
    }

    pub fn state(&self) -> Ref<'_, FakeState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, FakeState> {
        self.state.borrow_mut()
    }

    pub fn reject(&self, path: &str) {
        self.state_mut().rejected.insert(path.to_string());
    }

    pub fn accept(&self, path: &str) {
        self.state_mut().rejected.remove(path);
    }
}

fn rejected(path: &str, stderr: &str) -> BackendError {
    BackendError::CommandFailed {
        command: format!("git commit -- {path}"),
        stderr: stderr.to_string(),
    }
}

impl Backend for FakeBackend {
    fn status(&self) -> Result<Vec<Change>, BackendError> {
        let state = self.state();
        if state.status_unavailable {
            return Err(BackendError::UnusableState("no repository".to_string()));
        }
        Ok(state.changes.clone())
    }

    fn stage_all(&self) -> Result<(), BackendError> {
        let mut state = self.state_mut();
        state.staged_all = true;
        let paths: Vec<String> = state.changes.iter().map(|c| c.path.clone()).collect();
        state.index.extend(paths);
        Ok(())
    }

    fn diff_staged(&self, path: &str, context_lines: u32) -> Result<String, BackendError> {
        let mut state = self.state_mut();
        state.diff_context = Some(context_lines);
        Ok(state.diffs.get(path).cloned().unwrap_or_default())
    }

    fn commit(&self, path: &str, message: &str) -> Result<(), BackendError> {
        let mut state = self.state_mut();
        if state.rejected.contains(path) {
            return Err(rejected(path, "pre-commit hook failed"));
        }
        if !state.index.remove(path) {
            return Err(rejected(path, "nothing to commit"));
        }
        state
            .history
            .push((path.to_string(), message.to_string()));
        Ok(())
    }

    fn reset_soft(&self, to: Option<&Revision>) -> Result<(), BackendError> {
        let mut state = self.state_mut();
        if state.reset_fails {
            return Err(BackendError::UnusableState("index.lock exists".to_string()));
        }
        let keep = match to {
            Some(revision) => revision
                .as_str()
                .parse::<usize>()
                .map_err(|_| BackendError::InvalidRevision(revision.to_string()))?,
            None => 0,
        };
        let start = keep.min(state.history.len());
        let dropped: Vec<String> = state
            .history
            .drain(start..)
            .map(|(path, _)| path)
            .collect();
        state.index.extend(dropped);
        state.resets += 1;
        Ok(())
    }

    fn unstage_all(&self) -> Result<(), BackendError> {
        let mut state = self.state_mut();
        state.index.clear();
        state.unstaged = true;
        Ok(())
    }

    fn head_revision(&self) -> Result<Option<Revision>, BackendError> {
        let len = self.state().history.len();
        Ok((len > 0).then(|| Revision::new(len.to_string())))
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub system: String,
    pub input: String,
    pub temperature: f32,
}

#[derive(Debug, Default)]
struct GeneratorState {
    script: VecDeque<Result<String, GenerationError>>,
    fallback: Option<String>,
    calls: Vec<Call>,
}

/// a text generator replaying scripted replies, then a fixed one
#[derive(Debug, Clone, Default)]
pub struct FakeGenerator {
    state: Arc<Mutex<GeneratorState>>,
}

impl FakeGenerator {
    pub fn replying(reply: &str) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().fallback = Some(reply.to_string());
        fake
    }

    pub fn scripted(script: Vec<Result<String, GenerationError>>) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().script = script.into();
        fake
    }

    /// replies with `message for <input>`
    pub fn echoing() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: Result<String, GenerationError>) {
        self.state.lock().unwrap().script.push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl TextGenerator for FakeGenerator {
    fn complete(
        &self,
        system: &str,
        input: &str,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            system: system.to_string(),
            input: input.to_string(),
            temperature,
        });
        if let Some(reply) = state.script.pop_front() {
            return reply;
        }
        Ok(state
            .fallback
            .clone()
            .unwrap_or_else(|| format!("message for {input}")))
    }
}
