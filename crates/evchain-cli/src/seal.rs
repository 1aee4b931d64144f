//! # `evchain seal` Subcommand
//!
//! Appends forensic seals to a JSONL seal ledger.
//!
//! - `seal run` passes the replay lock on an input, runs and verifies it,
//!   and seals the resulting chain.
//! - `seal release` seals a test log against the current commit and tag.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use evchain_pipeline::{Pipeline, PipelineConfig};
use evchain_seal::{GitCli, JsonlLedger, Sealer, StaticVcs};

use crate::{read_input, timestamp_arg, write_json};

/// Arguments for the `evchain seal` subcommand.
#[derive(Args, Debug)]
pub struct SealArgs {
    #[command(subcommand)]
    pub command: SealCommand,
}

/// Seal subcommands.
#[derive(Subcommand, Debug)]
pub enum SealCommand {
    /// Seal a verified run of a canonical_input record.
    Run {
        /// Path to a canonical_input JSON record.
        input: PathBuf,

        /// Seal ledger to append to (created if absent).
        #[arg(long)]
        ledger: PathBuf,

        /// Name recorded in the seal.
        #[arg(long, default_value = "replay-determinism-lock")]
        label: String,

        /// Seal timestamp (UTC, `Z` suffix). Defaults to now.
        #[arg(long)]
        timestamp: Option<String>,
    },

    /// Seal a test log against the current commit.
    Release {
        /// Seal ledger to append to (created if absent).
        #[arg(long)]
        ledger: PathBuf,

        /// Test log to seal.
        #[arg(long)]
        log: PathBuf,

        /// Git working tree to read the commit and tag from.
        #[arg(long, default_value = ".", conflicts_with = "commit")]
        repo: PathBuf,

        /// Record this commit instead of asking git.
        #[arg(long)]
        commit: Option<String>,

        /// Tag recorded with `--commit`.
        #[arg(long, requires = "commit")]
        tag: Option<String>,

        /// Seal timestamp (UTC, `Z` suffix). Defaults to now.
        #[arg(long)]
        timestamp: Option<String>,
    },
}

/// Execute the seal subcommand.
pub fn run_seal(args: &SealArgs, config: &PipelineConfig) -> Result<u8> {
    match &args.command {
        SealCommand::Run {
            input,
            ledger,
            label,
            timestamp,
        } => {
            let input = read_input(input)?;
            let timestamp = timestamp_arg(timestamp.as_deref())?;
            let mut sealer = Sealer::new(JsonlLedger::open(ledger)?);
            let (position, seal) =
                sealer.seal_input(&Pipeline::new(config), &input, label, timestamp)?;
            tracing::info!(position, ledger = %ledger.display(), "sealed run");
            write_json(None, &seal)?;
            Ok(0)
        }
        SealCommand::Release {
            ledger,
            log,
            repo,
            commit,
            tag,
            timestamp,
        } => {
            let log_text = std::fs::read_to_string(log)
                .with_context(|| format!("failed to read {}", log.display()))?;
            let timestamp = timestamp_arg(timestamp.as_deref())?;
            let mut sealer = Sealer::new(JsonlLedger::open(ledger)?);
            let (position, seal) = match commit {
                Some(commit) => {
                    let vcs = StaticVcs::new(commit.as_str(), tag.as_deref());
                    sealer.seal_release(&vcs, &log_text, timestamp)?
                }
                None => sealer.seal_release(&GitCli::new(repo), &log_text, timestamp)?,
            };
            tracing::info!(position, ledger = %ledger.display(), "sealed release");
            write_json(None, &seal)?;
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evchain_seal::AppendOnlyLog;

    fn input_file(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("input.json");
        std::fs::write(
            &path,
            r#"{"type":"canonical_input","version":"v1.0","timestamp":"2026-02-08T00:00:00Z","payload":{"data":"hello"}}"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn seal_run_then_release_share_a_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("evidence_ledger.jsonl");
        let log = dir.path().join("full_test_log.txt");
        std::fs::write(&log, "test result: ok. 42 passed; 0 failed\n").unwrap();

        let run = SealArgs {
            command: SealCommand::Run {
                input: input_file(dir.path()),
                ledger: ledger.clone(),
                label: "hello".into(),
                timestamp: Some("2026-02-08T00:00:00Z".into()),
            },
        };
        assert_eq!(run_seal(&run, &PipelineConfig::default()).unwrap(), 0);

        let release = SealArgs {
            command: SealCommand::Release {
                ledger: ledger.clone(),
                log,
                repo: PathBuf::from("."),
                commit: Some("0123456789abcdef".into()),
                tag: Some("v1.0.0".into()),
                timestamp: None,
            },
        };
        assert_eq!(run_seal(&release, &PipelineConfig::default()).unwrap(), 0);

        let reopened = JsonlLedger::open(&ledger).unwrap();
        assert_eq!(reopened.len(), 2);
        reopened.verify().unwrap();
    }

    #[test]
    fn missing_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = SealArgs {
            command: SealCommand::Release {
                ledger: dir.path().join("ledger.jsonl"),
                log: dir.path().join("absent.txt"),
                repo: PathBuf::from("."),
                commit: Some("abc".into()),
                tag: None,
                timestamp: None,
            },
        };
        assert!(run_seal(&args, &PipelineConfig::default()).is_err());
        assert!(!dir.path().join("ledger.jsonl").exists());
    }
}
