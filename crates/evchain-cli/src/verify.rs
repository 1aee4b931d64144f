//! # `evchain verify` Subcommand
//!
//! Loads a stored chain document and runs every system invariant over it.
//! Prints `VALID` and exits 0, or prints `INVALID` with the violated
//! invariant code and exits 1.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use evchain_pipeline::InvariantEnforcer;

use crate::read_json;

/// Arguments for the `evchain verify` subcommand.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Path to a chain document produced by `evchain run`.
    pub chain: PathBuf,
}

/// Execute the verify subcommand.
pub fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let doc = read_json(&args.chain)?;

    match InvariantEnforcer::new().verify_value(&doc) {
        Ok(chain) => {
            println!("  Chain:         {}", args.chain.display());
            println!("  Evidence hash: {}", chain.evidence_unit.evidence_hash());
            println!("  Verdict:       {}", chain.law_verdict.verdict());
            println!("  Action:        {}", chain.action_policy.action());
            println!("  Status:        VALID");
            Ok(0)
        }
        Err(e) => {
            eprintln!("  Chain:  {}", args.chain.display());
            eprintln!("  Code:   {}", e.code());
            eprintln!("  Reason: {e}");
            eprintln!("  Status: INVALID");
            Ok(1)
        }
    }
}
