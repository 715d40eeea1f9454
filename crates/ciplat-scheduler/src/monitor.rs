//! The scheduling monitor: one mutex and one broadcast condition guarding
//! the dispatch queue, the core pool and the file registry together.

use crate::barrier::ShutdownBarrier;
use ciplat_core::{
    DispatchQueue, Error, FileId, FileRegistry, JobId, JobKind, JobSpec, PlatformSnapshot,
    ResourcePool, RunId,
};
use std::pin::pin;
use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Everything the monitor protects. Only reachable through
/// [`SchedulingMonitor::with_state`] or an admission hook.
#[derive(Debug)]
pub struct SchedulingState {
    pub queue: DispatchQueue,
    pub cores: ResourcePool,
    pub files: FileRegistry,
    /// Set while a static analysis run is queued but not finished.
    pub static_analysis_dispatched: bool,
    pub barrier: ShutdownBarrier,
    static_analysis: Option<JobId>,
    threshold: u32,
}

impl SchedulingState {
    pub fn new(
        cores: ResourcePool,
        files: FileRegistry,
        jobs: &[JobSpec],
        threshold: u32,
    ) -> Self {
        let static_analysis = jobs
            .iter()
            .find(|j| j.kind == JobKind::StaticAnalysis)
            .map(|j| j.id);
        let ordinary = jobs.iter().filter(|j| j.kind.is_ordinary()).count();

        let mut queue = DispatchQueue::new();
        let barrier = ShutdownBarrier::new(ordinary);
        if let Some(sa) = static_analysis {
            // With no ordinary jobs nothing would ever wake it.
            if barrier.is_released() {
                queue.enqueue_front(sa);
            }
        }

        Self {
            queue,
            cores,
            files,
            static_analysis_dispatched: false,
            barrier,
            static_analysis,
            threshold,
        }
    }

    pub fn static_analysis_job(&self) -> Option<JobId> {
        self.static_analysis
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// The admission predicate: head of the queue, enough free cores, and
    /// every required file free.
    pub fn is_admissible(&self, job: &JobSpec) -> bool {
        self.queue.peek_front() == Some(job.id)
            && self.cores.free_count() >= job.required_cores
            && self.files.all_are_free(&job.required_files)
    }

    /// Take exactly `required_cores` cores and every required file.
    ///
    /// A short core count rolls back what was claimed and reports a
    /// contract error; it means the predicate was not checked under this lock.
    pub fn acquire(&mut self, job: &JobSpec) -> ciplat_core::Result<()> {
        let acquired = self.cores.try_acquire(job.id, job.required_cores);
        if acquired != job.required_cores {
            self.cores.release(job.id);
            return Err(Error::PartialAcquire {
                job: job.id,
                required: job.required_cores,
                acquired,
            });
        }
        if let Err(e) = self.files.lock_all(job.id, &job.required_files) {
            self.cores.release(job.id);
            return Err(e);
        }
        Ok(())
    }

    /// Give back everything `acquire` took.
    pub fn release(&mut self, job: &JobSpec) -> ciplat_core::Result<()> {
        self.files.unlock_all(job.id, &job.required_files)?;
        let released = self.cores.release(job.id);
        if released != job.required_cores {
            return Err(Error::Internal(format!(
                "job {} released {} cores, expected {}",
                job.id, released, job.required_cores
            )));
        }
        Ok(())
    }

    /// Apply one commit to `files`.
    ///
    /// Returns true when this commit dispatched the static analysis job.
    pub fn record_commit(&mut self, files: &[FileId]) -> ciplat_core::Result<bool> {
        let mut crossed = false;
        for file in files {
            if self.files.record_change(*file)? >= self.threshold {
                crossed = true;
            }
        }

        if !crossed || self.static_analysis_dispatched {
            return Ok(false);
        }
        let Some(sa) = self.static_analysis else {
            return Ok(false);
        };
        self.static_analysis_dispatched = true;
        self.queue.enqueue_front(sa);
        Ok(true)
    }

    /// Completion effect of a static analysis run.
    pub fn complete_static_analysis(&mut self) {
        let all: Vec<FileId> = self.files.ids().collect();
        self.files.reset_change_counts(&all);
        self.static_analysis_dispatched = false;
    }

    /// Drop every trace of `job` from the shared state.
    fn reclaim(&mut self, job: JobId) -> (usize, usize) {
        self.queue.withdraw(job);
        (self.cores.release(job), self.files.release_owned_by(job))
    }
}

/// Result of waiting for admission.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission<T> {
    /// The job was at the head with its resources free; carries the hook's result.
    Granted(T),
    /// Shutdown was requested while an ordinary job was waiting.
    Shutdown,
}

/// Mutex + broadcast condition over [`SchedulingState`], plus the
/// process-wide running flag.
#[derive(Debug)]
pub struct SchedulingMonitor {
    run_id: RunId,
    state: Mutex<SchedulingState>,
    changed: Notify,
    running: CancellationToken,
}

impl SchedulingMonitor {
    pub fn new(state: SchedulingState) -> Self {
        Self {
            run_id: RunId::new(),
            state: Mutex::new(state),
            changed: Notify::new(),
            running: CancellationToken::new(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Run `f` while holding the monitor lock.
    ///
    /// `f` must not block or call a progress sink. A poisoned lock is
    /// recovered: the state is only mutated through methods that leave it
    /// consistent before returning.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut SchedulingState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn is_running(&self) -> bool {
        !self.running.is_cancelled()
    }

    /// Token cancelled when shutdown is requested.
    pub fn running(&self) -> &CancellationToken {
        &self.running
    }

    /// Wake every waiter so it re-checks its predicate.
    pub fn notify_all(&self) {
        self.changed.notify_waiters();
    }

    /// Block until `job` satisfies the admission predicate, then dequeue it
    /// and run `on_admit` under the same lock.
    ///
    /// Ordinary jobs return [`Admission::Shutdown`] instead once shutdown is
    /// requested; their queue entries are withdrawn. The static analysis job
    /// is only ever released through the queue.
    pub async fn admit<T, F>(
        &self,
        job: &JobSpec,
        mut on_admit: F,
    ) -> ciplat_core::Result<Admission<T>>
    where
        F: FnMut(&mut SchedulingState) -> ciplat_core::Result<T>,
    {
        loop {
            // Register for the next broadcast before looking at the state,
            // so a notify between the check and the await is not lost.
            let mut notified = pin!(self.changed.notified());
            notified.as_mut().enable();

            if let Some(admission) = self.try_admit(job, &mut on_admit)? {
                return Ok(admission);
            }
            notified.await;
        }
    }

    fn try_admit<T, F>(
        &self,
        job: &JobSpec,
        on_admit: &mut F,
    ) -> ciplat_core::Result<Option<Admission<T>>>
    where
        F: FnMut(&mut SchedulingState) -> ciplat_core::Result<T>,
    {
        self.with_state(|state| {
            if job.kind.is_ordinary() && self.running.is_cancelled() {
                state.queue.withdraw(job.id);
                return Ok(Some(Admission::Shutdown));
            }
            if !state.is_admissible(job) {
                return Ok(None);
            }
            state.queue.dequeue_front()?;
            on_admit(state).map(|t| Some(Admission::Granted(t)))
        })
    }

    /// Request shutdown and wake everyone blocked in [`admit`](Self::admit).
    pub fn shutdown(&self) {
        info!(run_id = %self.run_id, "Shutdown requested");
        self.running.cancel();
        self.notify_all();
    }

    /// Called once per job when its worker finishes, however it finished.
    ///
    /// Frees anything the job still holds. For ordinary jobs this is also
    /// the shutdown barrier arrival; the last one pushes the static
    /// analysis job to the queue head.
    pub fn job_exited(&self, job: &JobSpec) {
        let (released, reclaimed) = self.with_state(|state| {
            let reclaimed = state.reclaim(job.id);
            if !job.kind.is_ordinary() || !state.barrier.arrive() {
                return (false, reclaimed);
            }
            if let Some(sa) = state.static_analysis {
                state.queue.enqueue_front(sa);
            }
            (true, reclaimed)
        });

        if reclaimed != (0, 0) {
            debug!(
                job_id = %job.id,
                cores = reclaimed.0,
                files = reclaimed.1,
                "Reclaimed resources from exited job"
            );
        }
        if released {
            info!(run_id = %self.run_id, "All ordinary jobs exited; releasing static analysis");
        }
        self.notify_all();
    }

    pub fn snapshot(&self) -> PlatformSnapshot {
        self.with_state(|state| {
            PlatformSnapshot::capture(
                self.run_id,
                &state.queue,
                &state.cores,
                &state.files,
                state.static_analysis_dispatched,
                state.barrier.exited(),
            )
        })
    }
}
