//! Registry of named, exclusively lockable files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, FileId, JobId, Result};

/// A shared source file tracked by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub name: String,
    /// Commits seen since the last static analysis.
    pub change_count: u32,
    pub owner: Option<JobId>,
    pub last_changed: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            change_count: 0,
            owner: None,
            last_changed: Utc::now(),
        }
    }

    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }
}

/// Arena of [`FileRecord`]s addressed by [`FileId`].
#[derive(Debug, Clone, Default)]
pub struct FileRegistry {
    files: Vec<FileRecord>,
}

impl FileRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: names.into_iter().map(FileRecord::new).collect(),
        }
    }

    pub fn get(&self, id: FileId) -> Option<&FileRecord> {
        self.files.get(id.index())
    }

    pub fn find(&self, name: &str) -> Option<FileId> {
        self.files
            .iter()
            .position(|f| f.name == name)
            .map(FileId::new)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = FileId> + use<> {
        (0..self.files.len()).map(FileId::new)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileId, &FileRecord)> {
        self.files
            .iter()
            .enumerate()
            .map(|(i, f)| (FileId::new(i), f))
    }

    /// True when every listed file exists and is unowned.
    pub fn all_are_free(&self, ids: &[FileId]) -> bool {
        ids.iter()
            .all(|id| self.get(*id).is_some_and(FileRecord::is_free))
    }

    /// Lock every listed file for `job`.
    ///
    /// Nothing is locked unless all files are free, so a job never ends up
    /// holding a subset of its files.
    pub fn lock_all(&mut self, job: JobId, ids: &[FileId]) -> Result<()> {
        for id in ids {
            let file = self.get(*id).ok_or(Error::UnknownFile(*id))?;
            if !file.is_free() {
                return Err(Error::FileBusy { job, file: *id });
            }
        }
        for id in ids {
            self.files[id.index()].owner = Some(job);
        }
        Ok(())
    }

    /// Unlock every listed file. All of them must be owned by `job`.
    pub fn unlock_all(&mut self, job: JobId, ids: &[FileId]) -> Result<()> {
        for id in ids {
            let file = self.get(*id).ok_or(Error::UnknownFile(*id))?;
            if file.owner != Some(job) {
                return Err(Error::NotOwner { job, file: *id });
            }
        }
        for id in ids {
            self.files[id.index()].owner = None;
        }
        Ok(())
    }

    /// Free whatever `job` still holds. Returns how many files were freed.
    pub fn release_owned_by(&mut self, job: JobId) -> usize {
        let mut released = 0;
        for file in self.files.iter_mut().filter(|f| f.owner == Some(job)) {
            file.owner = None;
            released += 1;
        }
        released
    }

    /// Register a commit touching `id`. Returns the new change count.
    pub fn record_change(&mut self, id: FileId) -> Result<u32> {
        self.record_change_at(id, Utc::now())
    }

    pub fn record_change_at(&mut self, id: FileId, at: DateTime<Utc>) -> Result<u32> {
        let file = self
            .files
            .get_mut(id.index())
            .ok_or(Error::UnknownFile(id))?;
        file.change_count += 1;
        file.last_changed = at;
        Ok(file.change_count)
    }

    pub fn reset_change_counts(&mut self, ids: &[FileId]) {
        for id in ids {
            if let Some(file) = self.files.get_mut(id.index()) {
                file.change_count = 0;
            }
        }
    }

    /// True when any listed file was modified strictly after `since`.
    pub fn any_changed_since(&self, ids: &[FileId], since: DateTime<Utc>) -> bool {
        ids.iter()
            .filter_map(|id| self.get(*id))
            .any(|f| f.last_changed > since)
    }
}
