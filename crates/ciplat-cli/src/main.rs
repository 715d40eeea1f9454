//! ciplat CLI tool.

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod console;

#[derive(Parser)]
#[command(name = "ciplat")]
#[command(about = "Simulated CI platform with shared cores and files", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the platform until Ctrl-C or the duration elapses
    Run {
        /// Path to a platform configuration (defaults to the stock roster)
        #[arg(long, env = "CIPLAT_CONFIG")]
        config: Option<String>,
        /// Stop automatically after this many seconds
        #[arg(long)]
        duration: Option<u64>,
        /// Print a queue/core/file summary every N seconds
        #[arg(long)]
        interval: Option<u64>,
        /// How job progress is shown
        #[arg(long, value_enum, default_value_t = Output::Console)]
        output: Output,
        /// Print the final snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a platform configuration
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "ciplat.kdl")]
        path: String,
    },
    /// Show the stock roster
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Output {
    /// One line per job state change on stdout
    Console,
    /// State changes as tracing events
    Log,
    /// No job output
    None,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Run {
            config,
            duration,
            interval,
            output,
            json,
        } => {
            let options = commands::RunOptions {
                config,
                duration: duration.map(std::time::Duration::from_secs),
                interval: interval.map(std::time::Duration::from_secs),
                output,
                json,
            };
            commands::run(options).await?;
        }
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
        Commands::Config => {
            commands::show_config();
        }
    }

    Ok(())
}
