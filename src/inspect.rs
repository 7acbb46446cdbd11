use crate::changeset::Change;
use crate::constants::DIFF_CONTEXT_LINES;
use crate::error::BackendError;
use crate::git::Backend;
use tracing::{debug, warn};

/// stage everything, then list changed paths in the backend's order
pub fn discover<B: Backend>(backend: &B) -> Result<Vec<Change>, BackendError> {
    backend.stage_all()?;
    let changes = backend.status()?;
    debug!(count = changes.len(), "discovered changes");
    Ok(changes)
}

/// staged diff for `path` with a small fixed context
///
/// a path without a staged diff yields empty text, as does a backend failure
/// (logged).
pub fn diff_for<B: Backend>(backend: &B, path: &str) -> String {
    match backend.diff_staged(path, DIFF_CONTEXT_LINES) {
        Ok(diff) => diff,
        Err(e) => {
            warn!(path, error = %e, "failed to read staged diff");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::StatusCode;
    use crate::testing::FakeBackend;

    #[test]
    fn test_discover_stages_before_querying() {
        let backend = FakeBackend::with_changes(&[
            (StatusCode::Modified, "b.txt"),
            (StatusCode::Untracked, "a.txt"),
        ]);

        let changes = discover(&backend).unwrap();

        assert!(backend.state().staged_all);
        // backend order is kept as is
        assert_eq!(changes[0].path, "b.txt");
        assert_eq!(changes[1].path, "a.txt");
    }

    #[test]
    fn test_discover_propagates_unavailable_backend() {
        let backend = FakeBackend::with_changes(&[]);
        backend.state_mut().status_unavailable = true;
        assert!(discover(&backend).is_err());
    }

    #[test]
    fn test_diff_for_missing_diff_is_empty() {
        let backend = FakeBackend::with_changes(&[(StatusCode::Added, "a.txt")]);
        backend.state_mut().diffs.insert("a.txt".into(), "+a".into());

        assert_eq!(diff_for(&backend, "a.txt"), "+a");
        assert_eq!(diff_for(&backend, "other.txt"), "");
        assert_eq!(backend.state().diff_context, Some(DIFF_CONTEXT_LINES));
    }
}
