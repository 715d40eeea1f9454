//! Job workers: one shared scheduling cycle, specialised per job kind only
//! where the variants differ.

use crate::jitter::Jitter;
use crate::monitor::{Admission, SchedulingMonitor, SchedulingState};
use chrono::{DateTime, Utc};
use ciplat_config::TimingConfig;
use ciplat_core::{JobKind, JobSpec, JobState, ProgressSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

/// What the admission hook decided while the monitor was held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admitted {
    /// Cores and files are now held.
    Acquired,
    /// A build's inputs changed after it queued; nothing was acquired.
    Stale,
    /// Static analysis woken by the shutdown barrier.
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Completed,
    Requeued,
    Stopped,
}

/// A running job bound to the platform's monitor.
pub struct Job {
    spec: JobSpec,
    monitor: Arc<SchedulingMonitor>,
    sink: Arc<dyn ProgressSink>,
    timing: TimingConfig,
    jitter: Jitter,
    /// When this build last queued itself with up-to-date inputs.
    last_executed: DateTime<Utc>,
}

impl Job {
    pub fn new(
        spec: JobSpec,
        monitor: Arc<SchedulingMonitor>,
        sink: Arc<dyn ProgressSink>,
        timing: TimingConfig,
        jitter: Jitter,
    ) -> Self {
        Self {
            spec,
            monitor,
            sink,
            timing,
            jitter,
            last_executed: Utc::now(),
        }
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    /// Run scheduling cycles until shutdown.
    ///
    /// Ordinary jobs stop at the top of a cycle, inside the admission wait
    /// or during their idle delay. Static analysis only stops when the
    /// shutdown barrier hands it the queue head.
    pub async fn run(mut self) -> ciplat_core::Result<()> {
        info!(job_id = %self.spec.id, name = %self.spec.name, kind = %self.spec.kind, "Starting job");
        self.report(JobState::Idle);

        loop {
            if self.spec.kind.is_ordinary() && !self.monitor.is_running() {
                break;
            }
            if self.cycle().await? == Cycle::Stopped {
                break;
            }
        }

        self.report(JobState::Stopped);
        info!(job_id = %self.spec.id, "Job stopped");
        Ok(())
    }

    async fn cycle(&mut self) -> ciplat_core::Result<Cycle> {
        let id = self.spec.id;

        if self.spec.kind.is_ordinary() {
            self.report(JobState::Queued);
            if self.spec.kind == JobKind::Build {
                self.last_executed = Utc::now();
            }
            self.monitor.with_state(|state| state.queue.enqueue_back(id));
            self.monitor.notify_all();
        }

        self.report(JobState::AwaitingAdmission);
        let spec = &self.spec;
        let last_executed = self.last_executed;
        let admission = self
            .monitor
            .admit(spec, |state| admission_hook(spec, last_executed, state))
            .await?;

        let admitted = match admission {
            Admission::Shutdown => return Ok(Cycle::Stopped),
            Admission::Granted(admitted) => admitted,
        };
        // The head moved; the next job may now be admissible.
        self.monitor.notify_all();

        match admitted {
            Admitted::Terminate => {
                info!(job_id = %id, "Released by shutdown barrier");
                return Ok(Cycle::Stopped);
            }
            Admitted::Stale => {
                debug!(job_id = %id, last_executed = %last_executed, "Inputs changed since queuing");
                self.report(JobState::Requeued);
                self.pause(1).await;
                return Ok(Cycle::Requeued);
            }
            Admitted::Acquired => {}
        }

        self.report(JobState::Acquiring);
        self.report(JobState::Executing);
        self.work().await;

        self.report(JobState::Releasing);
        let spec = &self.spec;
        let dispatched = self.monitor.with_state(|state| -> ciplat_core::Result<bool> {
            let dispatched = match spec.kind {
                JobKind::CommitPoller => state.record_commit(&spec.required_files)?,
                JobKind::StaticAnalysis => {
                    state.complete_static_analysis();
                    false
                }
                JobKind::Build => false,
            };
            state.release(spec)?;
            Ok(dispatched)
        })?;
        self.monitor.notify_all();

        if dispatched {
            info!(job_id = %id, "Change threshold reached; static analysis dispatched");
        }

        self.report(JobState::Idle);
        match self.spec.kind {
            JobKind::CommitPoller => self.pause(self.timing.poller_idle_multiplier).await,
            JobKind::Build => self.pause(1).await,
            JobKind::StaticAnalysis => {}
        }
        Ok(Cycle::Completed)
    }

    /// Simulated work. Holds no lock and ignores shutdown.
    async fn work(&mut self) {
        let total = self.next_delay(1);
        let start = Instant::now();
        let mut last_percent = None;

        loop {
            let elapsed = start.elapsed();
            if elapsed >= total {
                break;
            }
            let percent = (elapsed.as_micros() * 100 / total.as_micros().max(1)).min(100) as u8;
            if last_percent != Some(percent) {
                self.sink.report_progress(self.spec.id, percent);
                last_percent = Some(percent);
            }
            sleep(self.timing.tick.min(total - elapsed)).await;
        }
        self.sink.report_progress(self.spec.id, 100);
    }

    /// Idle delay between cycles, cut short by shutdown.
    async fn pause(&mut self, multiplier: u32) {
        let delay = self.next_delay(multiplier);
        tokio::select! {
            _ = self.monitor.running().cancelled() => {}
            _ = sleep(delay) => {}
        }
    }

    fn next_delay(&mut self, multiplier: u32) -> Duration {
        self.jitter
            .between(self.timing.min_delay, self.timing.max_delay)
            .saturating_mul(multiplier)
    }

    fn report(&self, state: JobState) {
        self.sink.report_state(self.spec.id, state);
    }
}

/// Runs under the monitor right after `spec` was dequeued from the head.
fn admission_hook(
    spec: &JobSpec,
    last_executed: DateTime<Utc>,
    state: &mut SchedulingState,
) -> ciplat_core::Result<Admitted> {
    match spec.kind {
        JobKind::StaticAnalysis if state.barrier.is_released() => return Ok(Admitted::Terminate),
        JobKind::Build if state.files.any_changed_since(&spec.required_files, last_executed) => {
            return Ok(Admitted::Stale);
        }
        _ => {}
    }
    state.acquire(spec)?;
    Ok(Admitted::Acquired)
}
