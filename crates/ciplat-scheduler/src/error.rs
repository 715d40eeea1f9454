//! Scheduler errors.

use ciplat_config::ConfigError;
use ciplat_core::JobId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("scheduling contract violated: {0}")]
    Contract(#[from] ciplat_core::Error),

    #[error("job {job} ({name}) failed: {message}")]
    JobFailed {
        job: JobId,
        name: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
