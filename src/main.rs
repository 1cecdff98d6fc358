//! linefan
//!
//! Three-role line-splitting TCP relay. The role is selected by the
//! configuration directory's `app.json`; the same binary runs as source,
//! splitter, or sink.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use linefan::config::Config;
use linefan::sink::Sink;
use linefan::source;
use linefan::splitter::{Splitter, DEFAULT_HIGH_WATER_MARK};

#[derive(Debug, Parser)]
#[command(name = "linefan", about = "Line-splitting TCP relay with round-robin fan-out")]
struct Args {
    /// Directory holding app.json, inputs.json, and outputs.json
    config_dir: PathBuf,

    /// Host the listening roles bind to
    #[arg(default_value = "0.0.0.0")]
    host: String,

    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, env = "LINEFAN_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing (prefer RUST_LOG, fall back to --log-level)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| args.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::load(&args.config_dir).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            args.config_dir.display()
        )
    })?;

    info!(role = %config.role(), host = %args.host, "Starting linefan");

    match config {
        Config::Source(source_config) => {
            source::run(&source_config)
                .await
                .context("Source role failed")?;
        }
        Config::Splitter(splitter_config) => {
            let splitter = Splitter::bind(
                (args.host.as_str(), splitter_config.listen_port),
                &splitter_config.targets,
                DEFAULT_HIGH_WATER_MARK,
            )
            .await
            .context("Failed to start splitter")?;
            splitter.run().await.context("Splitter failed")?;
        }
        Config::Sink(sink_config) => {
            let sink = Sink::bind(
                (args.host.as_str(), sink_config.listen_port),
                sink_config.file,
            )
            .await
            .context("Failed to start sink")?;
            sink.run().await.context("Sink failed")?;
        }
    }

    Ok(())
}
