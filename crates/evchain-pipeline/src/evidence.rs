//! # Evidence Binding
//!
//! Turns a [`CanonicalInput`] into an immutable, hash-identified
//! [`EvidenceUnit`].
//!
//! ## Two-pass hash
//!
//! 1. `input_hash` = SHA-256 of the canonicalized input record.
//! 2. `evidence_hash` = SHA-256 of the canonicalized evidence shell
//!    `{type, version, input_hash, canonical_json, evidence_hash: null, notes}`.
//!
//! The shell already contains `input_hash`, so an `evidence_hash` cannot be
//! produced without first deriving `input_hash` from the same body. The
//! verifier recomputes both with [`input_hash_of`] and [`evidence_hash_of`].

use serde::Serialize;
use serde_json::Value;

use evchain_core::{canonicalize, sha256_hex, CanonicalBytes, ChainError};

use crate::artifact::{ArtifactKind, CanonicalInput, EvidenceUnit, SCHEMA_VERSION};

/// The evidence record as hashed: identical to the wire record except that
/// `evidence_hash` is always `null`.
#[derive(Serialize)]
struct EvidenceShell<'a> {
    #[serde(rename = "type")]
    kind: ArtifactKind,
    version: &'a str,
    input_hash: &'a str,
    canonical_json: &'a Value,
    evidence_hash: Option<&'a str>,
    notes: Option<&'a str>,
}

/// Bind a canonical input into an evidence unit.
///
/// # Errors
///
/// - `ChainError::InvalidInput` if the record is not a `canonical_input`.
/// - `ChainError::Structural` if the payload cannot be canonicalized.
pub fn bind_evidence(input: &CanonicalInput) -> Result<EvidenceUnit, ChainError> {
    if input.kind != ArtifactKind::CanonicalInput {
        return Err(ChainError::InvalidInput(format!(
            "expected type `canonical_input`, got `{}`",
            input.kind
        )));
    }

    let canonical_json = canonicalize(input)?;
    let input_hash = input_hash_of(&canonical_json)?;

    let mut unit = EvidenceUnit {
        kind: ArtifactKind::EvidenceUnit,
        version: SCHEMA_VERSION.to_string(),
        input_hash,
        canonical_json,
        evidence_hash: String::new(),
        notes: None,
    };
    unit.evidence_hash = evidence_hash_of(&unit)?;

    tracing::debug!(
        input_hash = %unit.input_hash,
        evidence_hash = %unit.evidence_hash,
        "evidence bound"
    );
    Ok(unit)
}

/// Hash of a canonical input body.
pub fn input_hash_of(canonical_json: &Value) -> Result<String, ChainError> {
    Ok(sha256_hex(&CanonicalBytes::new(canonical_json)?))
}

/// Recompute the `evidence_hash` of `unit` from its other fields.
///
/// The stored `evidence_hash` is ignored.
pub fn evidence_hash_of(unit: &EvidenceUnit) -> Result<String, ChainError> {
    let shell = EvidenceShell {
        kind: unit.kind,
        version: &unit.version,
        input_hash: &unit.input_hash,
        canonical_json: &unit.canonical_json,
        evidence_hash: None,
        notes: unit.notes.as_deref(),
    };
    Ok(sha256_hex(&CanonicalBytes::new(&shell)?))
}
