use anyhow::Context;
use chirp_config::{Mode, ServerConfig};
use chirp_engine::Server;
use chirp_wire::ResponseSink;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Applies feed commands read from stdin and writes one response per line
/// to stdout.
#[derive(Parser, Debug)]
#[command(name = "chirp", version)]
struct Cli {
    /// Number of consumer threads. When given, requests run in parallel.
    consumers: Option<usize>,

    /// TOML file with mode, workers, reader_cap and log_level.
    #[arg(long, short)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path.display().to_string())
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::sequential(),
    };
    if let Some(consumers) = cli.consumers {
        config.mode = Mode::Parallel;
        config.workers = consumers;
    }
    let server = Server::new(config).context("invalid run configuration")?;

    // stdout carries responses; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.config().log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let sink = ResponseSink::new(io::stdout());
    server.run(io::stdin().lock(), &sink)?;
    Ok(())
}
