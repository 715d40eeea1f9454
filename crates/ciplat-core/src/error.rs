//! Error types for ciplat.
//!
//! Every variant except `InvalidInput` is a scheduling contract violation:
//! the admission predicate should make them unreachable.

use thiserror::Error;

use crate::{FileId, JobId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("dispatch queue is empty")]
    EmptyQueue,

    #[error("job {job} does not own file {file}")]
    NotOwner { job: JobId, file: FileId },

    #[error("file {file} is busy, cannot lock for job {job}")]
    FileBusy { job: JobId, file: FileId },

    #[error("unknown file: {0}")]
    UnknownFile(FileId),

    #[error("job {job} acquired {acquired} of {required} cores")]
    PartialAcquire {
        job: JobId,
        required: usize,
        acquired: usize,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
