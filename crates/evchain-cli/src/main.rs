//! # evchain CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.
//! Logs go to stderr so that JSON written to stdout stays machine-readable.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use evchain_cli::ledger::{run_ledger, LedgerArgs};
use evchain_cli::replay::{run_replay, ReplayArgs};
use evchain_cli::run::{run_chain, RunArgs};
use evchain_cli::seal::{run_seal, SealArgs};
use evchain_cli::verify::{run_verify, VerifyArgs};

/// Evidence chain CLI
///
/// Runs inputs through the evidence, meaning, law and policy stages,
/// verifies stored chains against the system invariants, and records
/// forensic seals in an append-only ledger.
#[derive(Parser, Debug)]
#[command(name = "evchain", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML pipeline configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the four stages on a canonical_input record.
    Run(RunArgs),

    /// Verify a stored chain document against every system invariant.
    Verify(VerifyArgs),

    /// Run an input twice and require identical stage hashes.
    Replay(ReplayArgs),

    /// Append run or release seals to a seal ledger.
    Seal(SealArgs),

    /// Seal ledger operations.
    Ledger(LedgerArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level.
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::debug!("evchain CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match evchain_cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(1);
        }
    };
    tracing::debug!(?config, "pipeline configuration loaded");

    let result = match cli.command {
        Commands::Run(args) => run_chain(&args, &config),
        Commands::Verify(args) => run_verify(&args),
        Commands::Replay(args) => run_replay(&args, &config),
        Commands::Seal(args) => run_seal(&args, &config),
        Commands::Ledger(args) => run_ledger(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evchain_cli::ledger::LedgerCommand;
    use evchain_cli::seal::SealCommand;

    #[test]
    fn cli_parse_run_basic() {
        let cli = Cli::try_parse_from(["evchain", "run", "input.json"]).unwrap();
        if let Commands::Run(args) = cli.command {
            assert_eq!(args.input, PathBuf::from("input.json"));
            assert!(args.previous.is_none());
            assert!(args.out.is_none());
        } else {
            panic!("expected run");
        }
    }

    #[test]
    fn cli_parse_run_with_previous_and_out() {
        let cli = Cli::try_parse_from([
            "evchain",
            "run",
            "input.json",
            "--previous",
            "chain.json",
            "--out",
            "next.json",
        ])
        .unwrap();
        if let Commands::Run(args) = cli.command {
            assert_eq!(args.previous, Some(PathBuf::from("chain.json")));
            assert_eq!(args.out, Some(PathBuf::from("next.json")));
        } else {
            panic!("expected run");
        }
    }

    #[test]
    fn cli_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "evchain",
            "verify",
            "chain.json",
            "-vv",
            "--json-logs",
            "--config",
            "evchain.yaml",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json_logs);
        assert_eq!(cli.config, Some(PathBuf::from("evchain.yaml")));
        assert!(matches!(cli.command, Commands::Verify(_)));
    }

    #[test]
    fn cli_parse_replay() {
        let cli = Cli::try_parse_from(["evchain", "replay", "input.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Replay(_)));
    }

    #[test]
    fn cli_parse_seal_run_default_label() {
        let cli = Cli::try_parse_from([
            "evchain",
            "seal",
            "run",
            "input.json",
            "--ledger",
            "ledger.jsonl",
        ])
        .unwrap();
        let Commands::Seal(args) = cli.command else {
            panic!("expected seal");
        };
        let SealCommand::Run { label, timestamp, .. } = args.command else {
            panic!("expected seal run");
        };
        assert_eq!(label, "replay-determinism-lock");
        assert!(timestamp.is_none());
    }

    #[test]
    fn cli_parse_seal_release_with_commit() {
        let cli = Cli::try_parse_from([
            "evchain",
            "seal",
            "release",
            "--ledger",
            "ledger.jsonl",
            "--log",
            "full_test_log.txt",
            "--commit",
            "abc123",
            "--tag",
            "v1.0.0",
        ])
        .unwrap();
        let Commands::Seal(args) = cli.command else {
            panic!("expected seal");
        };
        let SealCommand::Release { commit, tag, .. } = args.command else {
            panic!("expected seal release");
        };
        assert_eq!(commit.as_deref(), Some("abc123"));
        assert_eq!(tag.as_deref(), Some("v1.0.0"));
    }

    #[test]
    fn cli_parse_seal_release_tag_requires_commit() {
        let result = Cli::try_parse_from([
            "evchain",
            "seal",
            "release",
            "--ledger",
            "ledger.jsonl",
            "--log",
            "log.txt",
            "--tag",
            "v1.0.0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parse_seal_release_repo_conflicts_with_commit() {
        let result = Cli::try_parse_from([
            "evchain",
            "seal",
            "release",
            "--ledger",
            "ledger.jsonl",
            "--log",
            "log.txt",
            "--repo",
            "/src",
            "--commit",
            "abc",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parse_ledger_verify() {
        let cli =
            Cli::try_parse_from(["evchain", "ledger", "verify", "ledger.jsonl"]).unwrap();
        let Commands::Ledger(args) = cli.command else {
            panic!("expected ledger");
        };
        let LedgerCommand::Verify { path } = args.command;
        assert_eq!(path, PathBuf::from("ledger.jsonl"));
    }

    #[test]
    fn cli_rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["evchain", "frobnicate"]).is_err());
    }

    #[test]
    fn cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["evchain"]).is_err());
    }
}
