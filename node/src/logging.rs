//! # Structured Logging
//!
//! One `tracing` subscriber for the whole process, filtered by `RUST_LOG`
//! when it is set. Output goes to stderr so `check-config` and `reference`
//! keep stdout to themselves.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default filter for `serve`.
pub const DEFAULT_FILTER: &str = "banklink_node=info,banklink=info,tower_http=info";

/// `--log-format` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable, colored output.
    Pretty,
    /// One JSON object per line, for log shipping.
    Json,
}

/// Installs the global subscriber. Call once, early in `main()`.
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let output = match format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    tracing_subscriber::registry().with(output).with(filter).init();
    tracing::debug!(?format, "logging initialized");
}
