//! Platform configuration: core count, file table, job roster and timing.

use crate::{ConfigError, ConfigResult};
use ciplat_core::{FileId, JobId, JobKind, JobSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Number of commits to one file that triggers a static analysis run.
pub const DEFAULT_STATIC_ANALYSIS_THRESHOLD: u32 = 5;

/// Delays used to simulate work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Lower bound of one randomized work delay.
    pub min_delay: Duration,
    /// Upper bound of one randomized work delay.
    pub max_delay: Duration,
    /// Interval between progress reports.
    pub tick: Duration,
    /// Commit pollers idle this many delays between polls.
    pub poller_idle_multiplier: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
            tick: Duration::from_millis(100),
            poller_idle_multiplier: 20,
        }
    }
}

/// One roster entry as written in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub kind: JobKind,
    /// Ignored for static analysis, which always takes every core.
    pub cores: usize,
    /// File names; ignored for static analysis.
    pub files: Vec<String>,
}

impl JobConfig {
    pub fn new<I, S>(name: impl Into<String>, kind: JobKind, cores: usize, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind,
            cores,
            files: files.into_iter().map(Into::into).collect(),
        }
    }
}

/// Complete platform definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub cores: usize,
    pub threshold: u32,
    /// Seed for delay jitter; random when absent.
    pub seed: Option<u64>,
    pub timing: TimingConfig,
    pub files: Vec<String>,
    pub jobs: Vec<JobConfig>,
}

impl PlatformConfig {
    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cores == 0 {
            return Err(ConfigError::invalid("platform cores", "must be at least 1"));
        }
        if self.threshold == 0 {
            return Err(ConfigError::invalid(
                "platform threshold",
                "must be at least 1",
            ));
        }

        let timing = &self.timing;
        if timing.min_delay > timing.max_delay {
            return Err(ConfigError::invalid(
                "timing",
                format!(
                    "min delay {:?} exceeds max delay {:?}",
                    timing.min_delay, timing.max_delay
                ),
            ));
        }
        if timing.tick.is_zero() {
            return Err(ConfigError::invalid("timing tick-ms", "must be positive"));
        }
        if timing.poller_idle_multiplier == 0 {
            return Err(ConfigError::invalid(
                "timing poller-idle-multiplier",
                "must be at least 1",
            ));
        }

        let mut seen = HashMap::new();
        for (i, name) in self.files.iter().enumerate() {
            if seen.insert(name.as_str(), i).is_some() {
                return Err(ConfigError::Duplicate(format!("file '{}'", name)));
            }
        }

        let mut static_analysis = None;
        for job in &self.jobs {
            if job.kind == JobKind::StaticAnalysis {
                if let Some(first) = static_analysis.replace(&job.name) {
                    return Err(ConfigError::Duplicate(format!(
                        "static analysis job: '{}' and '{}'",
                        first, job.name
                    )));
                }
                continue;
            }

            if job.cores == 0 || job.cores > self.cores {
                return Err(ConfigError::invalid(
                    format!("cores for job '{}'", job.name),
                    format!("must be between 1 and {}, got {}", self.cores, job.cores),
                ));
            }
            for file in &job.files {
                if !seen.contains_key(file.as_str()) {
                    return Err(ConfigError::InvalidReference(format!(
                        "job '{}' requires unknown file '{}'",
                        job.name, file
                    )));
                }
            }
        }

        Ok(())
    }

    /// Validate and turn the roster into job specs.
    ///
    /// Ids follow roster order. The static analysis job requires every
    /// core and every file.
    pub fn resolve(&self) -> ConfigResult<Vec<JobSpec>> {
        self.validate()?;

        let index: HashMap<&str, FileId> = self
            .files
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), FileId::new(i)))
            .collect();

        let specs = self
            .jobs
            .iter()
            .enumerate()
            .map(|(i, job)| {
                let id = JobId::new(i);
                match job.kind {
                    JobKind::StaticAnalysis => JobSpec::new(
                        id,
                        job.name.clone(),
                        job.kind,
                        self.cores,
                        (0..self.files.len()).map(FileId::new),
                    ),
                    _ => JobSpec::new(
                        id,
                        job.name.clone(),
                        job.kind,
                        job.cores,
                        job.files.iter().map(|f| index[f.as_str()]),
                    ),
                }
            })
            .collect();

        Ok(specs)
    }
}

impl Default for PlatformConfig {
    /// The stock roster: three build-system components and their tests,
    /// three commit pollers and one static analysis pass.
    fn default() -> Self {
        let files = [
            "Main.cpp",
            "Config.cpp",
            "Config.hpp",
            "ThreadSync.cpp",
            "ThreadSync.hpp",
            "EventDispatcher.cpp",
            "EventDispatcher.hpp",
            "MsgSender.cpp",
            "MsgSender.hpp",
            "UnitTests.cpp",
            "UnitTests.hpp",
            "EnumTypes.hpp",
            "ExtDef.hpp",
            "ExtInstrincts.cc",
            "ExtMakefile",
        ];
        let pick = |idx: &[usize]| idx.iter().map(|i| files[*i]).collect::<Vec<_>>();

        let jobs = vec![
            JobConfig::new(
                "Event System Build",
                JobKind::Build,
                5,
                pick(&[3, 4, 5, 6, 7, 8]),
            ),
            JobConfig::new("Externals Build", JobKind::Build, 3, pick(&[12, 13, 14])),
            JobConfig::new("Full Build", JobKind::Build, 9, pick(&[0, 1, 3, 5, 7, 11])),
            JobConfig::new("Unit Tests", JobKind::Build, 6, pick(&[0, 1, 2, 9, 10])),
            JobConfig::new(
                "Externals Adaptation Tests",
                JobKind::Build,
                4,
                pick(&[1, 9, 14]),
            ),
            JobConfig::new(
                "Git Commit Puller",
                JobKind::CommitPoller,
                3,
                pick(&[0, 1, 2, 3, 4, 5]),
            ),
            JobConfig::new(
                "Git Commit Puller",
                JobKind::CommitPoller,
                3,
                pick(&[6, 7, 8, 9, 10, 11]),
            ),
            JobConfig::new(
                "Svn Commit Puller",
                JobKind::CommitPoller,
                3,
                pick(&[12, 13, 14]),
            ),
            JobConfig::new(
                "Static Analysis",
                JobKind::StaticAnalysis,
                0,
                Vec::<String>::new(),
            ),
        ];

        Self {
            cores: 12,
            threshold: DEFAULT_STATIC_ANALYSIS_THRESHOLD,
            seed: None,
            timing: TimingConfig::default(),
            files: files.iter().map(|f| f.to_string()).collect(),
            jobs,
        }
    }
}
