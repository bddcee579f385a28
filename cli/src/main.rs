mod downsample;
mod encode;
mod ingest;
mod io;
mod report;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "waymark",
    version,
    about = "Thin dense GPS traces down to the samples worth drawing"
)]
struct Cli {
    /// Log level filter, overridden by RUST_LOG
    #[clap(long, global = true, env = "WAYMARK_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[clap(long, global = true, env = "WAYMARK_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate raw position fixes and assign them ids
    Ingest(ingest::Opts),
    /// Collapse a trace into representative samples
    Downsample(downsample::Opts),
    /// Summarize a trace and what downsampling does to it
    Report(report::Opts),
    /// Transcode samples between encodings
    Encode(encode::Opts),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

// Logs go to stderr; stdout carries data.
fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let layer = fmt::layer().with_writer(std::io::stderr);

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(layer.pretty())
            .init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(layer.compact())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Command::Ingest(opts) => ingest::ingest(&opts).await,
        Command::Downsample(opts) => downsample::downsample(&opts).await,
        Command::Report(opts) => report::report(&opts).await,
        Command::Encode(opts) => encode::encode(&opts).await,
    }
}
