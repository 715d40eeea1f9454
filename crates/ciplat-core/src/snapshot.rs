//! Read-only views of scheduler state for display and tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::file::FileRegistry;
use crate::queue::DispatchQueue;
use crate::resource::ResourcePool;
use crate::{CoreId, FileId, JobId, RunId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreSnapshot {
    pub id: CoreId,
    pub owner: Option<JobId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub id: FileId,
    pub name: String,
    pub change_count: u32,
    pub owner: Option<JobId>,
    pub last_changed: DateTime<Utc>,
}

/// Consistent copy of the monitor-protected state, taken under the lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSnapshot {
    pub run_id: RunId,
    pub queue: Vec<JobId>,
    pub cores: Vec<CoreSnapshot>,
    pub files: Vec<FileSnapshot>,
    pub static_analysis_dispatched: bool,
    /// Ordinary jobs that have finished.
    pub exited_jobs: usize,
}

impl PlatformSnapshot {
    pub fn capture(
        run_id: RunId,
        queue: &DispatchQueue,
        pool: &ResourcePool,
        files: &FileRegistry,
        static_analysis_dispatched: bool,
        exited_jobs: usize,
    ) -> Self {
        Self {
            run_id,
            queue: queue.iter().collect(),
            cores: pool
                .cores()
                .map(|(id, core)| CoreSnapshot {
                    id,
                    owner: core.owner,
                })
                .collect(),
            files: files
                .iter()
                .map(|(id, f)| FileSnapshot {
                    id,
                    name: f.name.clone(),
                    change_count: f.change_count,
                    owner: f.owner,
                    last_changed: f.last_changed,
                })
                .collect(),
            static_analysis_dispatched,
            exited_jobs,
        }
    }

    pub fn free_cores(&self) -> usize {
        self.cores.iter().filter(|c| c.owner.is_none()).count()
    }

    pub fn cores_owned_by(&self, job: JobId) -> usize {
        self.cores.iter().filter(|c| c.owner == Some(job)).count()
    }

    pub fn files_owned_by(&self, job: JobId) -> Vec<FileId> {
        self.files
            .iter()
            .filter(|f| f.owner == Some(job))
            .map(|f| f.id)
            .collect()
    }
}
