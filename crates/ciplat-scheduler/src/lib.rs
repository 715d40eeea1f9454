//! Job scheduling for the ciplat CI simulator.
//!
//! Every job runs as its own tokio task. All admission decisions go through
//! one [`SchedulingMonitor`]: a mutex over the dispatch queue, core pool and
//! file registry paired with a broadcast notification.

pub mod barrier;
pub mod error;
pub mod jitter;
pub mod job;
pub mod monitor;
pub mod platform;

pub use barrier::ShutdownBarrier;
pub use error::{Result, SchedulerError};
pub use job::Job;
pub use monitor::{Admission, SchedulingMonitor, SchedulingState};
pub use platform::{JobOutcome, JobReport, Platform, ShutdownReport};
