//! # `evchain run` Subcommand
//!
//! Runs the four stages on a `canonical_input` record and writes the
//! resulting chain document. A chain the enforcer rejects is reported as
//! `INVALID` with its invariant code and exits 1, like `evchain verify`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;

use evchain_pipeline::{Artifact, MeaningState, Pipeline, PipelineConfig};

use crate::{read_input, read_json, report_rejection, write_json};

/// Arguments for the `evchain run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to a canonical_input JSON record.
    pub input: PathBuf,

    /// Drift baseline: a meaning_state record or a chain document from a
    /// previous run.
    #[arg(long)]
    pub previous: Option<PathBuf>,

    /// Write the chain document here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Execute the run subcommand.
pub fn run_chain(args: &RunArgs, config: &PipelineConfig) -> Result<u8> {
    let input = read_input(&args.input)?;
    let previous = args.previous.as_deref().map(read_previous).transpose()?;

    let chain = match Pipeline::new(config).run(&input, previous.as_ref()) {
        Ok(chain) => chain,
        Err(e) => return report_rejection(&args.input, e),
    };
    tracing::info!(
        verdict = %chain.law_verdict.verdict(),
        action = %chain.action_policy.action(),
        policy_trace = %chain.action_policy.trace_hash(),
        "chain produced"
    );

    write_json(args.out.as_deref(), &chain)?;
    Ok(0)
}

/// Load a baseline meaning state from either a bare record or the
/// `meaning_state` member of a chain document.
fn read_previous(path: &Path) -> Result<MeaningState> {
    let mut value = read_json(path)?;
    if let Some(inner) = value.get_mut("meaning_state") {
        value = inner.take();
    }
    match Artifact::from_value(value)? {
        Artifact::Meaning(state) => Ok(state),
        other => bail!(
            "{} holds a {}, expected a meaning_state",
            path.display(),
            other.kind()
        ),
    }
}
