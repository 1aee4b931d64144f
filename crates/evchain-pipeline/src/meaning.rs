//! # Meaning Stabilization
//!
//! Derives a [`MeaningState`] from an [`EvidenceUnit`]:
//!
//! - `semantic_fingerprint` = SHA-256 of the canonicalized evidence body;
//! - `drift_score` compares that fingerprint with an optional previous
//!   state supplied by the caller.
//!
//! Drift is scored by a [`DriftMetric`]. The shipped metric,
//! [`FingerprintDrift`], is binary structural equality: `1` when a baseline
//! exists and its fingerprint differs, `0` otherwise. It does not measure
//! semantic similarity.

use serde_json::Value;

use evchain_core::{sha256_hex, CanonicalBytes, ChainError};

use crate::artifact::{ArtifactKind, EvidenceUnit, MeaningState, SCHEMA_VERSION};

/// Scores how far the current fingerprint has moved from a baseline state.
///
/// Implementations must be deterministic. `0` means no drift; any positive
/// score is treated as drift by the law stage.
pub trait DriftMetric: Send + Sync {
    fn score(&self, previous: &MeaningState, current_fingerprint: &str) -> i64;
}

/// Binary drift: `0` if the fingerprints are equal, `1` otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FingerprintDrift;

impl DriftMetric for FingerprintDrift {
    fn score(&self, previous: &MeaningState, current_fingerprint: &str) -> i64 {
        if previous.semantic_fingerprint == current_fingerprint {
            0
        } else {
            1
        }
    }
}

/// Meaning stage, generic over the drift metric.
#[derive(Debug, Clone, Default)]
pub struct MeaningStabilizer<M = FingerprintDrift> {
    metric: M,
}

impl MeaningStabilizer<FingerprintDrift> {
    /// A stabilizer with the binary fingerprint metric.
    pub fn new() -> Self {
        Self {
            metric: FingerprintDrift,
        }
    }
}

impl<M: DriftMetric> MeaningStabilizer<M> {
    pub fn with_metric(metric: M) -> Self {
        Self { metric }
    }

    /// Fingerprint `evidence` and score drift against `previous`.
    ///
    /// With no previous state the drift score is `0`.
    pub fn stabilize(
        &self,
        evidence: &EvidenceUnit,
        previous: Option<&MeaningState>,
    ) -> Result<MeaningState, ChainError> {
        let semantic_fingerprint = semantic_fingerprint_of(&evidence.canonical_json)?;
        let drift_score = previous
            .map(|prev| self.metric.score(prev, &semantic_fingerprint))
            .unwrap_or(0);

        tracing::debug!(
            evidence_hash = %evidence.evidence_hash,
            semantic_fingerprint = %semantic_fingerprint,
            drift_score,
            "meaning stabilized"
        );

        Ok(MeaningState {
            kind: ArtifactKind::MeaningState,
            version: SCHEMA_VERSION.to_string(),
            evidence_hash: evidence.evidence_hash.clone(),
            semantic_fingerprint,
            drift_score,
        })
    }
}

/// Fingerprint of a canonical evidence body.
pub fn semantic_fingerprint_of(canonical_json: &Value) -> Result<String, ChainError> {
    Ok(sha256_hex(&CanonicalBytes::new(canonical_json)?))
}

/// Meaning stage with the default metric.
pub fn stabilize_meaning(
    evidence: &EvidenceUnit,
    previous: Option<&MeaningState>,
) -> Result<MeaningState, ChainError> {
    MeaningStabilizer::new().stabilize(evidence, previous)
}
