//! Job definitions and lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{FileId, JobId};

/// The closed set of job variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// Rebuilds whenever its inputs changed since its last run.
    Build,
    /// Pulls commits and bumps change counters on its files.
    CommitPoller,
    /// Sweeps every core and file once enough changes accumulated.
    StaticAnalysis,
}

impl JobKind {
    /// Ordinary jobs self-enqueue and count towards the shutdown barrier.
    pub fn is_ordinary(self) -> bool {
        !matches!(self, JobKind::StaticAnalysis)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Build => "build",
            JobKind::CommitPoller => "commit-poller",
            JobKind::StaticAnalysis => "static-analysis",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(JobKind::Build),
            "commit-poller" | "commit" => Ok(JobKind::CommitPoller),
            "static-analysis" => Ok(JobKind::StaticAnalysis),
            other => Err(format!("unknown job kind: {}", other)),
        }
    }
}

/// Immutable description of a job's identity and resource needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: JobId,
    pub name: String,
    pub kind: JobKind,
    pub required_cores: usize,
    /// Sorted and de-duplicated.
    pub required_files: Vec<FileId>,
}

impl JobSpec {
    pub fn new(
        id: JobId,
        name: impl Into<String>,
        kind: JobKind,
        required_cores: usize,
        required_files: impl IntoIterator<Item = FileId>,
    ) -> Self {
        let mut required_files: Vec<FileId> = required_files.into_iter().collect();
        required_files.sort_unstable();
        required_files.dedup();
        Self {
            id,
            name: name.into(),
            kind,
            required_cores,
            required_files,
        }
    }
}

/// Where a job is in its scheduling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Idle,
    Queued,
    AwaitingAdmission,
    Acquiring,
    Executing,
    Releasing,
    /// A build found its inputs newer than its last run and will queue again.
    Requeued,
    Stopped,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Stopped)
    }

    /// Human-readable label used by progress sinks.
    pub fn label(&self) -> &'static str {
        match self {
            JobState::Idle => "is idle",
            JobState::Queued => "is waiting to be queued",
            JobState::AwaitingAdmission => "is waiting for files and resources",
            JobState::Acquiring => "is acquiring files and resources",
            JobState::Executing => "has acquired files and resources and is executing",
            JobState::Releasing => "has finished executing; releasing resources",
            JobState::Requeued => "is older than files and will be started again",
            JobState::Stopped => "END OF WORK",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_dedups_files() {
        let spec = JobSpec::new(
            JobId::new(0),
            "Full Build",
            JobKind::Build,
            9,
            [FileId::new(3), FileId::new(0), FileId::new(3)],
        );
        assert_eq!(spec.required_files, vec![FileId::new(0), FileId::new(3)]);
    }

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in [JobKind::Build, JobKind::CommitPoller, JobKind::StaticAnalysis] {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        assert!("deploy".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_only_static_analysis_is_not_ordinary() {
        assert!(JobKind::Build.is_ordinary());
        assert!(JobKind::CommitPoller.is_ordinary());
        assert!(!JobKind::StaticAnalysis.is_ordinary());
    }

    #[test]
    fn test_state_variants() {
        assert!(JobState::Stopped.is_terminal());
        assert!(!JobState::Executing.is_terminal());
        assert_eq!(JobState::Idle.to_string(), "is idle");
    }
}
