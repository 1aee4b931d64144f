//! # Forensic Trace
//!
//! The `trace_hash` of an [`ActionPolicy`] binds the decision to everything
//! upstream of it. It is the SHA-256 of the canonical record
//!
//! ```text
//! { evidence_hash, semantic_fingerprint, drift_score,
//!   law_verdict, law_trace, law_fingerprint?,
//!   decision: { verdict, action, safety_level, policy_id?, priority?, requires_human? } }
//! ```
//!
//! Optional members are absent when unset. The policy's own `trace_hash`
//! is never part of the decision projection.
//!
//! `drift_score` is covered by no other hash in the chain, so it is bound
//! here. Without it a drift score could be rewritten to any value that
//! classifies to the same verdict.

use serde::Serialize;

use evchain_core::{sha256_hex, CanonicalBytes, ChainError};

use crate::artifact::{Action, ActionPolicy, LawVerdict, MeaningState, SafetyLevel};

#[derive(Serialize)]
struct DecisionProjection<'a> {
    verdict: &'a str,
    action: Action,
    safety_level: SafetyLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    requires_human: Option<bool>,
}

#[derive(Serialize)]
struct ForensicBinding<'a> {
    evidence_hash: &'a str,
    semantic_fingerprint: &'a str,
    drift_score: i64,
    law_verdict: &'a str,
    law_trace: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    law_fingerprint: Option<&'a str>,
    decision: DecisionProjection<'a>,
}

/// Compute the forensic trace hash of `policy`, anchored at `meaning`.
pub fn forensic_trace_hash(
    meaning: &MeaningState,
    law: &LawVerdict,
    policy: &ActionPolicy,
) -> Result<String, ChainError> {
    let binding = ForensicBinding {
        evidence_hash: &meaning.evidence_hash,
        semantic_fingerprint: &meaning.semantic_fingerprint,
        drift_score: meaning.drift_score,
        law_verdict: law.verdict.as_str(),
        law_trace: &law.trace_hash,
        law_fingerprint: law.law_fingerprint.as_deref(),
        decision: DecisionProjection {
            verdict: policy.verdict.as_str(),
            action: policy.action,
            safety_level: policy.safety_level,
            policy_id: policy.policy_id.as_deref(),
            priority: policy.priority,
            requires_human: policy.requires_human,
        },
    };
    Ok(sha256_hex(&CanonicalBytes::new(&binding)?))
}
