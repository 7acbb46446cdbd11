use thiserror::Error;

/// errors raised by the staging area store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("staging area is already populated")]
    AlreadyPopulated,

    #[error("file f{index} does not exist (staging area has {len} file(s))")]
    NoSuchFile { index: usize, len: usize },
}

/// errors raised by the version control backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("not in a git repository: {0}")]
    Unavailable(#[source] git2::Error),

    #[error("repository is not in a usable state: {0}")]
    UnusableState(String),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("`{command}` timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    #[error("invalid revision `{0}`")]
    InvalidRevision(String),
}

/// errors raised while generating a commit message
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("request to the text generation service failed: {0}")]
    Transport(String),

    #[error("text generation service did not answer within {0} seconds")]
    Timeout(u64),

    #[error("text generation service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("text generation service returned an unreadable response: {0}")]
    InvalidResponse(String),

    #[error("text generation service returned an empty message")]
    EmptyResponse,

    #[error("giving up after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<GenerationError>,
    },
}

impl GenerationError {
    /// whether another attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) | Self::EmptyResponse => true,
            Self::Service { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse(_) | Self::RetriesExhausted { .. } => false,
        }
    }
}
