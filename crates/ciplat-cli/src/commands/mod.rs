//! CLI command implementations.

use crate::Output;
use crate::console::ConsoleSink;
use anyhow::{Context, Result};
use ciplat_config::{PlatformConfig, load_platform};
use ciplat_core::{JobKind, NoopSink, ProgressSink, TracingSink};
use ciplat_scheduler::Platform;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct RunOptions {
    pub config: Option<String>,
    pub duration: Option<Duration>,
    pub interval: Option<Duration>,
    pub output: Output,
    pub json: bool,
}

fn load(path: Option<&str>) -> Result<PlatformConfig> {
    match path {
        Some(path) => load_platform(path)
            .with_context(|| format!("Failed to load platform config: {}", path)),
        None => Ok(PlatformConfig::default()),
    }
}

/// Run the platform until Ctrl-C or the optional duration elapses.
pub async fn run(options: RunOptions) -> Result<()> {
    let config = load(options.config.as_deref())?;
    let jobs = config.resolve().context("Invalid platform config")?;

    let console = Arc::new(ConsoleSink::new(&jobs));
    let sink: Arc<dyn ProgressSink> = match options.output {
        Output::Console => console.clone(),
        Output::Log => Arc::new(TracingSink),
        Output::None => Arc::new(NoopSink),
    };

    let platform = Platform::construct(&config, sink).context("Failed to start platform")?;
    println!(
        "CI platform running: {} cores, {} files, {} jobs. Press Ctrl-C to stop.",
        config.cores,
        config.files.len(),
        jobs.len()
    );

    let stop = async {
        match options.duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(stop);

    let mut ticker = options.interval.map(tokio::time::interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = &mut stop => break,
            _ = async {
                match ticker.as_mut() {
                    Some(t) => { t.tick().await; }
                    None => std::future::pending::<()>().await,
                }
            } => {
                console.print_snapshot(&platform.snapshot());
            }
        }
    }

    println!("Stopping; waiting for running jobs to finish...");
    let report = platform.shutdown().await.context("Platform did not stop cleanly")?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        console.print_snapshot(&report.snapshot);
        println!("CI platform has finished working!");
    }
    Ok(())
}

pub fn validate(path: &str) -> Result<()> {
    match load_platform(path) {
        Ok(config) => {
            println!(
                "Configuration is valid: {} cores, {} files, {} jobs",
                config.cores,
                config.files.len(),
                config.jobs.len()
            );
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

pub fn show_config() {
    let config = PlatformConfig::default();
    println!(
        "cores: {}  static analysis threshold: {}",
        config.cores, config.threshold
    );
    println!("files: {}", config.files.join(", "));
    for (i, job) in config.jobs.iter().enumerate() {
        let cores = match job.kind {
            JobKind::StaticAnalysis => "all".to_string(),
            _ => job.cores.to_string(),
        };
        let files = match job.kind {
            JobKind::StaticAnalysis => "all".to_string(),
            _ => job.files.join(", "),
        };
        println!(
            "{}. {:<28} {:<16} cores={:<4} files: {}",
            i,
            job.name,
            job.kind.as_str(),
            cores,
            files
        );
    }
}
