use crate::changeset::{Change, StatusCode};
use crate::error::StoreError;
use std::path::Path;

/// lifecycle record for one changed path
///
/// only the staging area mutates records; everything else reads them through
/// the accessors below.
#[derive(Debug, Clone)]
pub struct FileRecord {
    path: String,
    name: String,
    status: StatusCode,
    diff: String,
    message: String,
    is_ready: bool,
    is_committed: bool,
    is_pushed: bool,
}

impl FileRecord {
    pub fn new(change: Change, diff: String, message: String) -> Self {
        let name = Path::new(&change.path)
            .file_name()
            .map_or_else(|| change.path.clone(), |n| n.to_string_lossy().to_string());
        Self {
            path: change.path,
            name,
            status: change.status,
            diff,
            message,
            is_ready: true,
            is_committed: false,
            is_pushed: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn diff(&self) -> &str {
        &self.diff
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    pub fn is_committed(&self) -> bool {
        self.is_committed
    }

    pub fn is_pushed(&self) -> bool {
        self.is_pushed
    }
}

/// ordered, 1-indexed collection of file records for one session
#[derive(Debug, Default)]
pub struct StagingArea {
    records: Vec<FileRecord>,
    populated: bool,
    committed_count: usize,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// one-time initialiser; the order given here is the addressing order
    pub fn populate(&mut self, records: Vec<FileRecord>) -> Result<(), StoreError> {
        if self.populated {
            return Err(StoreError::AlreadyPopulated);
        }
        self.committed_count = records.iter().filter(|r| r.is_committed).count();
        self.records = records;
        self.populated = true;
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<&FileRecord, StoreError> {
        let slot = self.slot(index)?;
        Ok(&self.records[slot])
    }

    pub fn all(&self) -> &[FileRecord] {
        &self.records
    }

    /// 1-based indices paired with their records, in addressing order
    pub fn indexed(&self) -> impl Iterator<Item = (usize, &FileRecord)> {
        self.records.iter().enumerate().map(|(i, r)| (i + 1, r))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn committed_count(&self) -> usize {
        self.committed_count
    }

    /// count committed records from scratch
    pub fn recount(&self) -> usize {
        self.records.iter().filter(|r| r.is_committed).count()
    }

    pub fn mark_committed(&mut self, index: usize) -> Result<(), StoreError> {
        let slot = self.slot(index)?;
        if !self.records[slot].is_committed {
            self.records[slot].is_committed = true;
            self.committed_count += 1;
        }
        Ok(())
    }

    /// uncommit every record, returning the indices that were committed
    pub fn clear_committed(&mut self) -> Vec<usize> {
        let mut cleared = Vec::new();
        for (i, record) in self.records.iter_mut().enumerate() {
            if record.is_committed {
                record.is_committed = false;
                cleared.push(i + 1);
            }
        }
        self.committed_count = 0;
        cleared
    }

    pub fn set_message(&mut self, index: usize, message: impl Into<String>) -> Result<(), StoreError> {
        let slot = self.slot(index)?;
        self.records[slot].message = message.into();
        Ok(())
    }

    pub fn set_ready(&mut self, index: usize, ready: bool) -> Result<(), StoreError> {
        let slot = self.slot(index)?;
        self.records[slot].is_ready = ready;
        Ok(())
    }

    fn slot(&self, index: usize) -> Result<usize, StoreError> {
        if index == 0 || index > self.records.len() {
            return Err(StoreError::NoSuchFile {
                index,
                len: self.records.len(),
            });
        }
        Ok(index - 1)
    }
}
