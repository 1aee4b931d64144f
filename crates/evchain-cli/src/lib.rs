//! # evchain-cli: Command-Line Driver
//!
//! Provides the `evchain` binary.
//!
//! ## Subcommands
//!
//! - `evchain run`: run the four stages on an input record.
//! - `evchain verify`: verify a stored chain document.
//! - `evchain replay`: replay determinism lock on an input record.
//! - `evchain seal run | release`: append forensic seals to a ledger.
//! - `evchain ledger verify`: verify a seal ledger end to end.
//!
//! ```bash
//! evchain run input.json --out chain.json
//! evchain verify chain.json
//! evchain seal run input.json --ledger evidence_ledger.jsonl
//! evchain seal release --ledger evidence_ledger.jsonl --log full_test_log.txt
//! ```
//!
//! Handlers return `Ok(0)` on success and `Ok(1)` when the thing being
//! checked is rejected; operational failures (unreadable files, stage
//! errors) are `Err` and also exit with status 1.

pub mod ledger;
pub mod replay;
pub mod run;
pub mod seal;
pub mod verify;

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use evchain_core::{ChainError, Timestamp};
use evchain_pipeline::{CanonicalInput, PipelineConfig};

/// Load the pipeline config from `path` (or defaults), then apply the
/// `EVCHAIN_*` environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(p) => PipelineConfig::load(p)?,
        None => PipelineConfig::default(),
    };
    Ok(config.apply_env()?)
}

/// Read and parse a JSON file.
pub fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Read a `canonical_input` record.
pub fn read_input(path: &Path) -> Result<CanonicalInput> {
    let value = read_json(path)?;
    CanonicalInput::from_value(value).with_context(|| format!("in {}", path.display()))
}

/// Pretty-print `value` to `out`, or to stdout when `out` is `None`.
pub fn write_json(out: Option<&Path>, value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => std::fs::write(path, format!("{text}\n"))
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{text}"),
    }
    Ok(())
}

/// Parse `--timestamp`, defaulting to the current UTC second.
pub fn timestamp_arg(raw: Option<&str>) -> Result<Timestamp> {
    match raw {
        Some(s) => Ok(Timestamp::parse(s)?),
        None => Ok(Timestamp::now()),
    }
}

/// Turn an invariant violation on `subject` into a printed `INVALID`
/// report and exit code 1. Any other error is returned unchanged.
pub fn report_rejection(subject: &Path, err: ChainError) -> Result<u8> {
    if err.invariant().is_none() {
        return Err(err.into());
    }
    eprintln!("  Subject: {}", subject.display());
    eprintln!("  Code:    {}", err.code());
    eprintln!("  Reason:  {err}");
    eprintln!("  Status:  INVALID");
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use evchain_core::InvariantCode;

    #[test]
    fn read_input_accepts_a_canonical_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        std::fs::write(
            &path,
            r#"{"type":"canonical_input","version":"v1.0","timestamp":"2026-02-08T00:00:00Z","payload":{"data":"hello"}}"#,
        )
        .unwrap();
        let input = read_input(&path).unwrap();
        assert_eq!(input.payload["data"], "hello");
    }

    #[test]
    fn read_input_names_the_file_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"type":"canonical_input"}"#).unwrap();
        let err = read_input(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad.json"));

        std::fs::write(&path, "not json").unwrap();
        assert!(read_json(&path).is_err());
        assert!(read_json(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evchain.yaml");
        std::fs::write(&path, "policy:\n  annotate: true\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert!(config.policy.annotate);
    }

    #[test]
    fn write_json_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(Some(&path), &serde_json::json!({"a": 1})).unwrap();
        assert_eq!(read_json(&path).unwrap()["a"], 1);
    }

    #[test]
    fn invariant_violations_are_reported_as_invalid() {
        let err = ChainError::violation(InvariantCode::ForensicTrace, "trace mismatch");
        assert_eq!(report_rejection(Path::new("input.json"), err).unwrap(), 1);
    }

    #[test]
    fn other_errors_are_not_rejections() {
        let err = ChainError::InvalidInput("bad record".into());
        let err = report_rejection(Path::new("input.json"), err).unwrap_err();
        assert!(format!("{err:#}").contains("bad record"));
    }

    #[test]
    fn timestamp_arg_requires_utc() {
        assert_eq!(
            timestamp_arg(Some("2026-02-08T00:00:00Z")).unwrap().to_string(),
            "2026-02-08T00:00:00Z"
        );
        assert!(timestamp_arg(Some("2026-02-08T00:00:00+02:00")).is_err());
        assert!(timestamp_arg(None).is_ok());
    }
}
