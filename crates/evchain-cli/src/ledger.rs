//! # `evchain ledger` Subcommand
//!
//! Inspects seal ledgers. `ledger verify` walks the whole hash chain and
//! re-checks every seal it holds.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use evchain_seal::{AppendOnlyLog, JsonlLedger, SealError};

/// Arguments for the `evchain ledger` subcommand.
#[derive(Args, Debug)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub command: LedgerCommand,
}

/// Ledger subcommands.
#[derive(Subcommand, Debug)]
pub enum LedgerCommand {
    /// Verify every link and seal in a ledger.
    Verify {
        /// Path to a JSONL seal ledger.
        path: PathBuf,
    },
}

/// Execute the ledger subcommand.
pub fn run_ledger(args: &LedgerArgs) -> Result<u8> {
    match &args.command {
        LedgerCommand::Verify { path } => verify_ledger(path),
    }
}

fn verify_ledger(path: &std::path::Path) -> Result<u8> {
    if !path.exists() {
        anyhow::bail!("ledger not found: {}", path.display());
    }

    // Opening walks and verifies every entry.
    match JsonlLedger::open(path) {
        Ok(ledger) => {
            println!("  Ledger:  {}", path.display());
            println!("  Entries: {}", ledger.len());
            println!("  Head:    {}", ledger.head_hash());
            println!("  Status:  VALID");
            Ok(0)
        }
        Err(SealError::LedgerCorrupted { position, reason }) => {
            eprintln!("  Ledger:   {}", path.display());
            eprintln!("  Position: {position}");
            eprintln!("  Reason:   {reason}");
            eprintln!("  Status:   INVALID");
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}
