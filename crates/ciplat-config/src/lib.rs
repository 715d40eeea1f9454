//! KDL configuration for the ciplat CI scheduling simulator.
//!
//! This crate handles:
//! - Parsing platform definitions (ciplat.kdl)
//! - Validating the roster against the core pool and file table
//! - The stock roster used when no file is given

pub mod error;
pub mod parse;
pub mod platform;

pub use error::{ConfigError, ConfigResult};
pub use parse::{load_platform, parse_platform};
pub use platform::{DEFAULT_STATIC_ANALYSIS_THRESHOLD, JobConfig, PlatformConfig, TimingConfig};
