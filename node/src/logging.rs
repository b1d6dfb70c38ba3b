//! # Structured Logging
//!
//! Initializes the `tracing` subscriber from the node's `--log-format` and
//! `--log-filter` flags. `RUST_LOG`, when set, wins over the flag.
//!
//! All log output goes to stderr; stdout is kept for the `init` and
//! `version` reports. JSON lines carry the current span, so every event
//! logged while serving a request includes its `request_id`.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colored output. Suitable for local development.
    Pretty,
    /// Machine-parseable JSON lines. Suitable for production log aggregation.
    Json,
}

/// Filter from `RUST_LOG`, or `fallback` when it is unset or unparsable.
fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Initialize the global tracing subscriber.
///
/// Call this exactly once, early in `main()`. Subsequent calls will panic.
///
/// ```text
/// tally-node run --log-format json --log-filter tally_protocol=debug
/// RUST_LOG=tally_node=debug,tower_http=debug tally-node run
/// ```
pub fn init_logging(filter: &str, format: LogFormat) {
    let env_filter = env_filter(filter);

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_current_span(true)
                        .with_span_list(false),
                )
                .init();
        }
    }

    tracing::info!(?format, filter, "logging initialized");
}
