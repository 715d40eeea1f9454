//! KDL parsing for platform configuration.

use crate::platform::{DEFAULT_STATIC_ANALYSIS_THRESHOLD, JobConfig, PlatformConfig, TimingConfig};
use crate::{ConfigError, ConfigResult};
use ciplat_core::JobKind;
use kdl::{KdlDocument, KdlNode};
use std::path::Path;
use std::time::Duration;

/// Read and parse a platform configuration file.
pub fn load_platform(path: impl AsRef<Path>) -> ConfigResult<PlatformConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_platform(&content)
}

/// Parse a platform configuration from KDL text.
///
/// The result is validated before it is returned.
pub fn parse_platform(kdl: &str) -> ConfigResult<PlatformConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut cores = None;
    let mut threshold = DEFAULT_STATIC_ANALYSIS_THRESHOLD;
    let mut seed = None;
    let mut timing = TimingConfig::default();
    let mut files = Vec::new();
    let mut jobs = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "platform" => {
                cores = get_u64_prop(node, "cores")?.map(|c| c as usize);
                if let Some(t) = get_u64_prop(node, "threshold")? {
                    threshold = u32::try_from(t)
                        .map_err(|_| ConfigError::invalid("platform threshold", "too large"))?;
                }
                seed = get_u64_prop(node, "seed")?;
            }
            "timing" => {
                timing = parse_timing(node)?;
            }
            "file" | "files" => {
                files.extend(get_all_string_args(node));
            }
            "job" => {
                jobs.push(parse_job(node)?);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    let cores = cores.ok_or_else(|| ConfigError::MissingField("platform cores".to_string()))?;

    let config = PlatformConfig {
        cores,
        threshold,
        seed,
        timing,
        files,
        jobs,
    };
    config.validate()?;
    Ok(config)
}

fn parse_timing(node: &KdlNode) -> ConfigResult<TimingConfig> {
    let defaults = TimingConfig::default();
    let millis = |name: &str, fallback: Duration| -> ConfigResult<Duration> {
        Ok(get_u64_prop(node, name)?
            .map(Duration::from_millis)
            .unwrap_or(fallback))
    };

    let poller_idle_multiplier = match get_u64_prop(node, "poller-idle-multiplier")? {
        Some(m) => u32::try_from(m)
            .map_err(|_| ConfigError::invalid("timing poller-idle-multiplier", "too large"))?,
        None => defaults.poller_idle_multiplier,
    };

    Ok(TimingConfig {
        min_delay: millis("min-delay-ms", defaults.min_delay)?,
        max_delay: millis("max-delay-ms", defaults.max_delay)?,
        tick: millis("tick-ms", defaults.tick)?,
        poller_idle_multiplier,
    })
}

fn parse_job(node: &KdlNode) -> ConfigResult<JobConfig> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("job name".to_string()))?;

    let kind = get_string_prop(node, "kind")
        .ok_or_else(|| ConfigError::MissingField(format!("kind for job '{}'", name)))?
        .parse::<JobKind>()
        .map_err(|message| ConfigError::invalid(format!("kind for job '{}'", name), message))?;

    let cores = match get_u64_prop(node, "cores")? {
        Some(c) => c as usize,
        None if kind == JobKind::StaticAnalysis => 0,
        None => {
            return Err(ConfigError::MissingField(format!(
                "cores for job '{}'",
                name
            )));
        }
    };

    let mut files = Vec::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if matches!(child.name().value(), "files" | "file") {
                files.extend(get_all_string_args(child));
            }
        }
    }

    Ok(JobConfig {
        name,
        kind,
        cores,
        files,
    })
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_u64_prop(node: &KdlNode, name: &str) -> ConfigResult<Option<u64>> {
    let Some(value) = node.get(name) else {
        return Ok(None);
    };
    let field = format!("{} {}", node.name().value(), name);
    let int = value
        .as_integer()
        .ok_or_else(|| ConfigError::invalid(&field, "expected an integer"))?;
    u64::try_from(int)
        .map(Some)
        .map_err(|_| ConfigError::invalid(&field, "must not be negative"))
}
