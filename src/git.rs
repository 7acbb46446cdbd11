use crate::changeset::{Change, StatusCode};
use crate::constants::{DIFF_SIZE_MAXIMUM_BYTES, GIT_TIMEOUT_SECS};
use crate::error::BackendError;
use git2::{
    DiffFormat, DiffOptions, ErrorCode, IndexAddOption, ObjectType, Oid, Repository,
    RepositoryState, ResetType, Status, StatusOptions, Tree,
};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

/// a commit identifier in the backend's own notation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision(String);

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// the version control operations the session relies on
///
/// every call is synchronous; implementations bound anything that can hang.
pub trait Backend {
    /// changed paths in the backend's native order
    fn status(&self) -> Result<Vec<Change>, BackendError>;

    /// stage every change in the working tree, including deletions
    fn stage_all(&self) -> Result<(), BackendError>;

    /// staged diff for a single path; empty when nothing is staged for it
    fn diff_staged(&self, path: &str, context_lines: u32) -> Result<String, BackendError>;

    /// commit exactly one path, leaving other staged entries alone
    fn commit(&self, path: &str, message: &str) -> Result<(), BackendError>;

    /// move the branch back to `to` keeping the index; `None` means unborn
    fn reset_soft(&self, to: Option<&Revision>) -> Result<(), BackendError>;

    /// drop everything from the index that is not in HEAD
    fn unstage_all(&self) -> Result<(), BackendError>;

    /// current HEAD commit, `None` on an unborn branch
    fn head_revision(&self) -> Result<Option<Revision>, BackendError>;
}

/// `Backend` over a git repository on disk
pub struct GitBackend {
    root: PathBuf,
}

impl GitBackend {
    /// locate the repository containing `path` and check it is usable
    pub fn discover(path: &Path) -> Result<Self, BackendError> {
        let repo = Repository::discover(path).map_err(BackendError::Unavailable)?;

        // check we're not in the middle of a git operation
        if repo.state() != RepositoryState::Clean {
            return Err(BackendError::UnusableState(
                "repository is in the middle of an operation (merge, rebase, etc)".to_string(),
            ));
        }

        // check we're not on a detached HEAD
        if repo.head_detached().unwrap_or(false) {
            return Err(BackendError::UnusableState(
                "repository is in detached HEAD state".to_string(),
            ));
        }

        let root = repo
            .workdir()
            .ok_or_else(|| BackendError::UnusableState("repository is bare".to_string()))?
            .to_path_buf();

        debug!(root = %root.display(), "opened repository");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn open(&self) -> Result<Repository, BackendError> {
        Repository::open(&self.root).map_err(BackendError::Unavailable)
    }
}

impl Backend for GitBackend {
    fn status(&self) -> Result<Vec<Change>, BackendError> {
        let repo = self.open()?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .renames_head_to_index(false);

        let statuses = repo.statuses(Some(&mut opts))?;
        let mut changes = Vec::new();
        for entry in statuses.iter() {
            let Some(status) = status_code(entry.status()) else {
                continue;
            };
            match entry.path() {
                Some(path) => changes.push(Change::new(status, path)),
                None => crate::warning!("skipping path that is not valid utf-8"),
            }
        }

        debug!(count = changes.len(), "queried status");
        Ok(changes)
    }

    fn stage_all(&self) -> Result<(), BackendError> {
        let repo = self.open()?;
        let mut index = repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        // add_all leaves removed files in the index
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        debug!("staged all changes");
        Ok(())
    }

    fn diff_staged(&self, path: &str, context_lines: u32) -> Result<String, BackendError> {
        let repo = self.open()?;
        let tree = head_tree(&repo)?;

        let mut opts = DiffOptions::new();
        opts.pathspec(path)
            .disable_pathspec_match(true)
            .context_lines(context_lines);
        let diff = repo.diff_tree_to_index(tree.as_ref(), None, Some(&mut opts))?;

        if diff.deltas().next().is_none() {
            return Ok(String::new());
        }
        let is_binary = diff
            .deltas()
            .any(|d| d.new_file().is_binary() || d.old_file().is_binary());
        if is_binary || should_ignore_diff(path) {
            return Ok(format!("--- {path} (diff ignored)"));
        }

        format_diff(&diff)
    }

    /// uses the git binary rather than git2 so commit signing (gpg/ssh) and
    /// hooks (pre-commit, commit-msg, etc.) work as expected
    ///
    /// the path is taken literally, never as a glob, and both pipes are
    /// drained while waiting so chatty hooks cannot stall git.
    fn commit(&self, path: &str, message: &str) -> Result<(), BackendError> {
        let command = format!("git commit -- {path}");
        let mut child = Command::new("git")
            .args([
                "--literal-pathspecs",
                "commit",
                "--quiet",
                "--no-edit",
                "--message",
                message,
                "--",
                path,
            ])
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BackendError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        match child.wait_timeout(Duration::from_secs(GIT_TIMEOUT_SECS)) {
            Ok(Some(status)) if status.success() => {
                debug!(path, "committed");
                Ok(())
            }
            Ok(Some(status)) => {
                let mut output = stderr.join().unwrap_or_default();
                if output.trim().is_empty() {
                    output = stdout.join().unwrap_or_default();
                }
                let stderr = if output.trim().is_empty() {
                    format!("exited with {status}")
                } else {
                    output.trim().to_string()
                };
                Err(BackendError::CommandFailed { command, stderr })
            }
            Ok(None) => {
                if let Err(e) = child.kill() {
                    crate::warning!("failed to kill git process: {}", e);
                }
                let _ = child.wait();
                Err(BackendError::Timeout {
                    command,
                    secs: GIT_TIMEOUT_SECS,
                })
            }
            Err(source) => Err(BackendError::Spawn { command, source }),
        }
    }

    fn reset_soft(&self, to: Option<&Revision>) -> Result<(), BackendError> {
        let repo = self.open()?;
        match to {
            Some(revision) => {
                let oid = Oid::from_str(revision.as_str())
                    .map_err(|_| BackendError::InvalidRevision(revision.to_string()))?;
                let target = repo.find_object(oid, Some(ObjectType::Commit))?;
                repo.reset(&target, ResetType::Soft, None)?;
                debug!(%revision, "reset history");
            }
            None => {
                // the session started on an unborn branch: delete the branch
                // ref so HEAD is unborn again, the index stays as is
                let head = repo.find_reference("HEAD")?;
                if let Some(branch) = head.symbolic_target()
                    && let Ok(mut reference) = repo.find_reference(branch)
                {
                    reference.delete()?;
                    debug!(branch, "reset history to unborn branch");
                }
            }
        }
        Ok(())
    }

    fn unstage_all(&self) -> Result<(), BackendError> {
        let repo = self.open()?;
        match repo.head() {
            Ok(head) => {
                let commit = head.peel(ObjectType::Commit)?;
                repo.reset(&commit, ResetType::Mixed, None)?;
            }
            Err(e) if is_unborn(&e) => {
                let mut index = repo.index()?;
                index.clear()?;
                index.write()?;
            }
            Err(e) => return Err(e.into()),
        }
        debug!("unstaged all changes");
        Ok(())
    }

    fn head_revision(&self) -> Result<Option<Revision>, BackendError> {
        let repo = self.open()?;
        match repo.head() {
            Ok(head) => {
                let commit = head.peel_to_commit()?;
                Ok(Some(Revision::new(commit.id().to_string())))
            }
            Err(e) if is_unborn(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_unborn(e: &git2::Error) -> bool {
    e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound
}

/// HEAD tree, or `None` when there are no commits yet
fn head_tree(repo: &Repository) -> Result<Option<Tree<'_>>, BackendError> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_tree()?)),
        Err(e) if is_unborn(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// read a child pipe to the end on its own thread
///
/// a hook that outlives git may hold the pipe open, so callers only join
/// when they need the text.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Some(mut pipe) = pipe
            && let Err(e) = pipe.read_to_end(&mut bytes)
        {
            debug!(error = %e, "failed to read git output");
        }
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

/// map git2 status flags to a single code, staged state first
fn status_code(status: Status) -> Option<StatusCode> {
    if status.is_index_new() {
        Some(StatusCode::Added)
    } else if status.is_index_modified() {
        Some(StatusCode::Modified)
    } else if status.is_index_deleted() {
        Some(StatusCode::Deleted)
    } else if status.is_index_renamed() {
        Some(StatusCode::Renamed)
    } else if status.is_index_typechange() {
        Some(StatusCode::TypeChange)
    } else if status.is_wt_new() {
        Some(StatusCode::Untracked)
    } else if status.is_wt_modified() {
        Some(StatusCode::Modified)
    } else if status.is_wt_deleted() {
        Some(StatusCode::Deleted)
    } else if status.is_wt_renamed() {
        Some(StatusCode::Renamed)
    } else if status.is_wt_typechange() {
        Some(StatusCode::TypeChange)
    } else {
        None // current, ignored, conflicted
    }
}

/// check if file diff should be ignored (lock files, minified files, etc.)
fn should_ignore_diff(path: &str) -> bool {
    let path_lower = path.to_lowercase();

    // lock files - check full filename patterns
    if path_lower.ends_with("-lock.json") || path_lower.ends_with("-lock.yaml") {
        return true;
    }

    // check file extension for .lock files
    if let Some(ext) = Path::new(path).extension()
        && ext.to_string_lossy().eq_ignore_ascii_case("lock")
    {
        return true;
    }

    // minified files
    path_lower.ends_with(".min.js")
        || path_lower.ends_with(".min.css")
        || path_lower.ends_with("-min.js")
        || path_lower.ends_with("-min.css")
}

/// format a diff object into a unified diff string, capped in size
fn format_diff(diff: &git2::Diff) -> Result<String, BackendError> {
    let mut output = String::new();

    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        let origin = line.origin();
        let content = String::from_utf8_lossy(line.content());
        match origin {
            // diff line types that need the origin character
            '+' | '-' | ' ' => output.push(origin),
            // other origin types (headers, etc.) don't need the character
            _ => {}
        }
        output.push_str(&content);
        true
    })?;

    let output = output.trim_end_matches('\n');
    Ok(truncate(output, DIFF_SIZE_MAXIMUM_BYTES))
}

/// cut `text` to at most `max` bytes on a char boundary, noting the cut
fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... (diff truncated, {} bytes total)", &text[..end], text.len())
}
