//! # CLI Interface
//!
//! Defines the command-line argument structure for `tally-node` using
//! `clap` derive. Supports three subcommands: `run`, `init`, and `version`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Log filter used when neither `--log-filter` nor `RUST_LOG` is given.
pub const DEFAULT_LOG_FILTER: &str = "tally_node=info,tally_protocol=info,tower_http=info";

/// Tally ledger node.
///
/// Serves the ledger over HTTP: account creation, currency issuance,
/// transfer clearing and reads. Exposes Prometheus metrics on a separate
/// port.
#[derive(Parser, Debug)]
#[command(
    name = "tally-node",
    about = "Tally ledger node",
    version,
    propagate_version = true
)]
pub struct TallyNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Tally node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Initialize a data directory: create it, open the store, and write
    /// the global counters.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Which [`LedgerStore`](tally_protocol::storage::LedgerStore) backs the node.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Persistent sled database under `<data-dir>/db`.
    Sled,
    /// Process-local map. Everything is lost on exit.
    Memory,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node data directory.
    ///
    /// Created on first run if it does not exist. Ignored with `--store memory`.
    #[arg(long, short = 'd', env = "TALLY_DATA_DIR", default_value = "./tally-data")]
    pub data_dir: PathBuf,

    /// Port for the REST API.
    #[arg(long, short = 'p', env = "TALLY_PORT", default_value_t = 7311)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "TALLY_METRICS_PORT", default_value_t = 7312)]
    pub metrics_port: u16,

    /// Storage backend.
    #[arg(long, value_enum, env = "TALLY_STORE", default_value_t = StoreKind::Sled)]
    pub store: StoreKind,

    /// Log output format.
    #[arg(long, value_enum, env = "TALLY_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// `tracing` filter directives. `RUST_LOG` takes precedence when set.
    #[arg(long, env = "TALLY_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,

    /// Digest algorithms accepted on envelopes, comma separated
    /// (`sha256`, `sha512`).
    ///
    /// The default digest (sha256) is always accepted.
    #[arg(
        long,
        env = "TALLY_HASH_ALGORITHMS",
        value_delimiter = ',',
        default_value = "sha256"
    )]
    pub hash_algorithms: Vec<String>,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "TALLY_DATA_DIR", default_value = "./tally-data")]
    pub data_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        TallyNodeCli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = TallyNodeCli::parse_from(["tally-node", "run"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.store, StoreKind::Sled);
        assert_eq!(args.hash_algorithms, vec!["sha256"]);
        assert_eq!(args.log_format, LogFormat::Pretty);
        assert_eq!(args.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn default_log_filter_parses() {
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn log_flags() {
        let cli = TallyNodeCli::parse_from([
            "tally-node",
            "run",
            "--log-format",
            "json",
            "--log-filter",
            "tally_protocol=debug",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.log_format, LogFormat::Json);
        assert_eq!(args.log_filter, "tally_protocol=debug");

        assert!(TallyNodeCli::try_parse_from(["tally-node", "run", "--log-format", "yaml"]).is_err());
    }

    #[test]
    fn run_with_flags() {
        let cli = TallyNodeCli::parse_from([
            "tally-node",
            "run",
            "--store",
            "memory",
            "--port",
            "9000",
            "--hash-algorithms",
            "sha256",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.store, StoreKind::Memory);
        assert_eq!(args.port, 9000);
        assert_eq!(args.hash_algorithms, vec!["sha256"]);
    }
}
