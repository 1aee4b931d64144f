//! # `evchain replay` Subcommand
//!
//! Runs the replay determinism lock on an input record and prints the
//! agreed stage hashes as JSON. A disagreement between the two runs exits
//! with status 1.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use evchain_core::InvariantCode;
use evchain_pipeline::{Pipeline, PipelineConfig};

use crate::{read_input, write_json};

/// Arguments for the `evchain replay` subcommand.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Path to a canonical_input JSON record.
    pub input: PathBuf,
}

/// Execute the replay subcommand.
pub fn run_replay(args: &ReplayArgs, config: &PipelineConfig) -> Result<u8> {
    let input = read_input(&args.input)?;

    match Pipeline::new(config).replay(&input) {
        Ok(report) => {
            write_json(None, &report)?;
            Ok(0)
        }
        Err(e) if e.invariant() == Some(InvariantCode::ReplayDeterminism) => {
            eprintln!("  Code:   {}", InvariantCode::ReplayDeterminism);
            eprintln!("  Reason: {e}");
            eprintln!("  Status: NOT DETERMINISTIC");
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}
