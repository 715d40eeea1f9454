//! Core resource types for the ciplat CI scheduling simulator.
//!
//! This crate contains:
//! - Job, file, core and run identifiers
//! - The CPU core pool and the file registry
//! - The dispatch queue
//! - Job specs and lifecycle states
//! - The progress sink interface and state snapshots

pub mod error;
pub mod file;
pub mod id;
pub mod job;
pub mod progress;
pub mod queue;
pub mod resource;
pub mod snapshot;

pub use error::{Error, Result};
pub use file::{FileRecord, FileRegistry};
pub use id::{CoreId, FileId, JobId, RunId};
pub use job::{JobKind, JobSpec, JobState};
pub use progress::{NoopSink, ProgressSink, TracingSink};
pub use queue::DispatchQueue;
pub use resource::{Core, ResourcePool};
pub use snapshot::{CoreSnapshot, FileSnapshot, PlatformSnapshot};
