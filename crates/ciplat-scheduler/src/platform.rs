//! The platform: one worker task per job over a shared monitor.

use crate::error::{Result, SchedulerError};
use crate::jitter::Jitter;
use crate::job::Job;
use crate::monitor::{SchedulingMonitor, SchedulingState};
use ciplat_config::PlatformConfig;
use ciplat_core::{FileRegistry, JobId, JobSpec, PlatformSnapshot, ProgressSink, ResourcePool};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span};

/// How a job's worker ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Stopped,
    Failed { message: String },
    Panicked { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub id: JobId,
    pub name: String,
    #[serde(flatten)]
    pub outcome: JobOutcome,
}

/// Result of a completed shutdown.
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    pub jobs: Vec<JobReport>,
    /// State after every worker was joined.
    pub snapshot: PlatformSnapshot,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.jobs.iter().all(|j| j.outcome == JobOutcome::Stopped)
    }

    /// The first job that did not stop cleanly, as an error.
    pub fn into_result(self) -> Result<Self> {
        let failure = self.jobs.iter().find_map(|j| match &j.outcome {
            JobOutcome::Stopped => None,
            JobOutcome::Failed { message } | JobOutcome::Panicked { message } => {
                Some(SchedulerError::JobFailed {
                    job: j.id,
                    name: j.name.clone(),
                    message: message.clone(),
                })
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}

/// Signals the monitor when a worker finishes, including by panic.
struct ExitGuard {
    monitor: Arc<SchedulingMonitor>,
    spec: JobSpec,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.monitor.job_exited(&self.spec);
    }
}

/// A running CI platform.
pub struct Platform {
    monitor: Arc<SchedulingMonitor>,
    jobs: Vec<JobSpec>,
    workers: Vec<JoinHandle<ciplat_core::Result<()>>>,
}

impl Platform {
    /// Build the core pool, file table and roster from `config` and spawn
    /// one worker per job. Must be called inside a tokio runtime.
    pub fn construct(config: &PlatformConfig, sink: Arc<dyn ProgressSink>) -> Result<Self> {
        let jobs = config.resolve()?;
        let state = SchedulingState::new(
            ResourcePool::new(config.cores),
            FileRegistry::new(config.files.iter().cloned()),
            &jobs,
            config.threshold,
        );
        let monitor = Arc::new(SchedulingMonitor::new(state));
        let run_id = monitor.run_id();

        info!(
            run_id = %run_id,
            cores = config.cores,
            files = config.files.len(),
            jobs = jobs.len(),
            "Starting platform"
        );

        let workers = jobs
            .iter()
            .map(|spec| {
                let job = Job::new(
                    spec.clone(),
                    monitor.clone(),
                    sink.clone(),
                    config.timing.clone(),
                    Jitter::for_job(config.seed, spec.id.index()),
                );
                let guard = ExitGuard {
                    monitor: monitor.clone(),
                    spec: spec.clone(),
                };
                let span = info_span!("job", run_id = %run_id, job_id = %spec.id);
                tokio::spawn(
                    async move {
                        let _guard = guard;
                        job.run().await
                    }
                    .instrument(span),
                )
            })
            .collect();

        Ok(Self {
            monitor,
            jobs,
            workers,
        })
    }

    pub fn jobs(&self) -> &[JobSpec] {
        &self.jobs
    }

    pub fn monitor(&self) -> &Arc<SchedulingMonitor> {
        &self.monitor
    }

    /// Consistent view of the queue, cores and files.
    pub fn snapshot(&self) -> PlatformSnapshot {
        self.monitor.snapshot()
    }

    /// Stop every job and wait for all workers to finish.
    ///
    /// Jobs already executing finish their current piece of work first.
    /// Fails with the first job that did not stop cleanly.
    pub async fn shutdown(self) -> Result<ShutdownReport> {
        self.monitor.shutdown();

        let results = join_all(self.workers).await;
        let jobs: Vec<JobReport> = self
            .jobs
            .iter()
            .zip(results)
            .map(|(spec, result)| {
                let outcome = match result {
                    Ok(Ok(())) => JobOutcome::Stopped,
                    Ok(Err(e)) => {
                        error!(job_id = %spec.id, error = %e, "Job failed");
                        JobOutcome::Failed {
                            message: e.to_string(),
                        }
                    }
                    Err(e) => {
                        error!(job_id = %spec.id, error = %e, "Job worker panicked");
                        JobOutcome::Panicked {
                            message: e.to_string(),
                        }
                    }
                };
                JobReport {
                    id: spec.id,
                    name: spec.name.clone(),
                    outcome,
                }
            })
            .collect();

        let snapshot = self.monitor.snapshot();
        info!(run_id = %snapshot.run_id, exited = snapshot.exited_jobs, "Platform stopped");

        ShutdownReport { jobs, snapshot }.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciplat_config::{JobConfig, TimingConfig};
    use ciplat_core::{JobKind, JobState, NoopSink};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::{Instant, sleep, timeout};

    /// Tracks how many jobs are executing at once and how often each ran.
    #[derive(Default)]
    struct ExecutionSink {
        active: AtomicUsize,
        max_active: AtomicUsize,
        runs: Mutex<HashMap<JobId, usize>>,
        states: Mutex<Vec<(JobId, JobState)>>,
    }

    impl ExecutionSink {
        fn runs_of(&self, job: JobId) -> usize {
            self.runs.lock().unwrap().get(&job).copied().unwrap_or(0)
        }

        fn saw(&self, job: JobId, state: JobState) -> bool {
            self.states
                .lock()
                .unwrap()
                .iter()
                .any(|(j, s)| *j == job && *s == state)
        }
    }

    impl ProgressSink for ExecutionSink {
        fn report_state(&self, job: JobId, state: JobState) {
            self.states.lock().unwrap().push((job, state));
            match state {
                JobState::Executing => {
                    let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                    self.max_active.fetch_max(now, Ordering::SeqCst);
                    *self.runs.lock().unwrap().entry(job).or_default() += 1;
                }
                JobState::Releasing => {
                    self.active.fetch_sub(1, Ordering::SeqCst);
                }
                _ => {}
            }
        }

        fn report_progress(&self, _job: JobId, _percent: u8) {}
    }

    fn fast_timing() -> TimingConfig {
        TimingConfig {
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(3),
            tick: Duration::from_millis(1),
            poller_idle_multiplier: 2,
        }
    }

    fn fast_default() -> PlatformConfig {
        PlatformConfig {
            timing: fast_timing(),
            seed: Some(11),
            ..PlatformConfig::default()
        }
    }

    /// Ownership in a snapshot matches some job's all-or-nothing request.
    fn assert_consistent(snap: &PlatformSnapshot, jobs: &[JobSpec]) {
        for job in jobs {
            let cores = snap.cores_owned_by(job.id);
            let files = snap.files_owned_by(job.id);
            assert!(
                cores == 0 || cores == job.required_cores,
                "job {} holds {} of {} cores",
                job.id,
                cores,
                job.required_cores
            );
            assert!(
                files.is_empty() || files == job.required_files,
                "job {} holds a partial file set {:?}",
                job.id,
                files
            );
            if !job.required_files.is_empty() {
                assert_eq!(cores > 0, !files.is_empty(), "job {} half-acquired", job.id);
            }
        }
    }

    async fn sample_until(
        platform: &Platform,
        deadline: Duration,
        mut done: impl FnMut() -> bool,
    ) {
        let end = Instant::now() + deadline;
        while !done() {
            assert!(Instant::now() < end, "condition not reached in {:?}", deadline);
            assert_consistent(&platform.snapshot(), platform.jobs());
            sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_core_builds_take_turns() {
        let config = PlatformConfig {
            cores: 1,
            threshold: 5,
            seed: Some(1),
            timing: fast_timing(),
            files: vec!["Main.cpp".to_string()],
            jobs: vec![
                JobConfig::new("Build A", JobKind::Build, 1, ["Main.cpp"]),
                JobConfig::new("Build B", JobKind::Build, 1, ["Main.cpp"]),
            ],
        };
        let sink = Arc::new(ExecutionSink::default());
        let platform = Platform::construct(&config, sink.clone()).unwrap();
        let (a, b) = (JobId::new(0), JobId::new(1));

        sample_until(&platform, Duration::from_secs(10), || {
            sink.runs_of(a) >= 3 && sink.runs_of(b) >= 3
        })
        .await;

        let report = timeout(Duration::from_secs(10), platform.shutdown())
            .await
            .unwrap()
            .unwrap();
        assert!(report.is_clean());
        assert_eq!(sink.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(report.snapshot.free_cores(), 1);
        assert!(report.snapshot.queue.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_default_roster_runs_static_analysis() {
        let sink = Arc::new(ExecutionSink::default());
        let platform = Platform::construct(&fast_default(), sink.clone()).unwrap();
        let sa = JobId::new(8);

        sample_until(&platform, Duration::from_secs(20), || sink.runs_of(sa) >= 1).await;

        let report = timeout(Duration::from_secs(10), platform.shutdown())
            .await
            .unwrap()
            .unwrap();
        assert!(report.is_clean());
        assert_eq!(report.snapshot.free_cores(), 12);
        assert!(report.snapshot.files.iter().all(|f| f.owner.is_none()));
        assert_eq!(report.snapshot.exited_jobs, 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutdown_releases_waiting_static_analysis() {
        // The threshold is never reached, so static analysis only ever
        // waits for admission until the barrier releases it.
        let config = PlatformConfig {
            threshold: u32::MAX,
            ..fast_default()
        };
        let sink = Arc::new(ExecutionSink::default());
        let platform = Platform::construct(&config, sink.clone()).unwrap();
        let sa = JobId::new(8);

        sample_until(&platform, Duration::from_secs(10), || {
            sink.runs_of(JobId::new(5)) >= 2 && sink.saw(sa, JobState::AwaitingAdmission)
        })
        .await;

        let report = timeout(Duration::from_secs(10), platform.shutdown())
            .await
            .expect("shutdown deadlocked")
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(sink.runs_of(sa), 0);
        assert!(sink.saw(sa, JobState::Stopped));
        assert_eq!(report.snapshot.exited_jobs, 8);
        assert!(report.snapshot.queue.is_empty());
    }

    #[tokio::test]
    async fn test_construct_rejects_invalid_config() {
        let mut config = fast_default();
        config.jobs[0].cores = 100;

        let result = Platform::construct(&config, Arc::new(NoopSink));
        assert!(matches!(result, Err(SchedulerError::Config(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_static_analysis_alone_exits() {
        let config = PlatformConfig {
            cores: 2,
            threshold: 5,
            seed: Some(5),
            timing: fast_timing(),
            files: vec!["Main.cpp".to_string()],
            jobs: vec![JobConfig::new(
                "Static Analysis",
                JobKind::StaticAnalysis,
                0,
                Vec::<String>::new(),
            )],
        };
        let platform = Platform::construct(&config, Arc::new(NoopSink)).unwrap();

        let report = timeout(Duration::from_secs(5), platform.shutdown())
            .await
            .unwrap()
            .unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_report_surfaces_first_failure() {
        let monitor = SchedulingMonitor::new(SchedulingState::new(
            ResourcePool::new(1),
            FileRegistry::default(),
            &[],
            5,
        ));
        let report = ShutdownReport {
            jobs: vec![
                JobReport {
                    id: JobId::new(0),
                    name: "ok".to_string(),
                    outcome: JobOutcome::Stopped,
                },
                JobReport {
                    id: JobId::new(1),
                    name: "broken".to_string(),
                    outcome: JobOutcome::Failed {
                        message: "dispatch queue is empty".to_string(),
                    },
                },
            ],
            snapshot: monitor.snapshot(),
        };

        assert!(!report.is_clean());
        let err = report.into_result().unwrap_err();
        assert!(matches!(err, SchedulerError::JobFailed { job, .. } if job == JobId::new(1)));
    }
}
