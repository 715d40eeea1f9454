//! Observability hooks called by running jobs.

use tracing::{info, trace};

use crate::{JobId, JobState};

/// Receives job state changes and execution progress.
///
/// Sinks are never invoked while the scheduling monitor is held, so an
/// implementation may take its own output lock freely. The scheduler
/// behaves the same (modulo timing) with [`NoopSink`].
pub trait ProgressSink: Send + Sync {
    fn report_state(&self, job: JobId, state: JobState);

    /// `percent` is in `0..=100`.
    fn report_progress(&self, job: JobId, percent: u8);
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn report_state(&self, _job: JobId, _state: JobState) {}

    fn report_progress(&self, _job: JobId, _percent: u8) {}
}

/// Forwards reports to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn report_state(&self, job: JobId, state: JobState) {
        info!(job_id = %job, state = ?state, "{}", state.label());
    }

    fn report_progress(&self, job: JobId, percent: u8) {
        trace!(job_id = %job, percent, "Progress");
    }
}
