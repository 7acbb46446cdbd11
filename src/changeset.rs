use std::fmt;

/// status of a changed path as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Added,
    Modified,
    Deleted,
    Renamed,
    TypeChange,
    Untracked,
}

impl StatusCode {
    /// short porcelain-style code
    pub fn code(self) -> &'static str {
        match self {
            Self::Added => "A",
            Self::Modified => "M",
            Self::Deleted => "D",
            Self::Renamed => "R",
            Self::TypeChange => "T",
            Self::Untracked => "??",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Added => "Added",
            Self::Modified => "Modified",
            Self::Deleted => "Deleted",
            Self::Renamed => "Renamed",
            Self::TypeChange => "TypeChange",
            Self::Untracked => "Untracked",
        };
        f.pad(label)
    }
}

/// a single changed path discovered in the working tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub status: StatusCode,
    pub path: String,
}

impl Change {
    pub fn new(status: StatusCode, path: impl Into<String>) -> Self {
        Self {
            status,
            path: path.into(),
        }
    }
}
