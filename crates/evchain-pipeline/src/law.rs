//! # Law Evaluation
//!
//! A fixed rule table over the drift score:
//!
//! | drift_score | verdict           |
//! |-------------|-------------------|
//! | `0`         | `STABLE`          |
//! | `> 0`       | `CHANGE_DETECTED` |
//! | otherwise   | `CHANGE_DETECTED` |
//!
//! The table is total and fails closed: no score outside `0` can yield
//! `STABLE`.
//!
//! `trace_hash` = SHA-256 of canonical `{meaning_fingerprint, verdict}`.
//! When enabled, the verdict also carries `law_fingerprint`, a hash of the
//! rule table descriptor, so the policy trace pins the law version that
//! produced it.

use serde::Serialize;

use evchain_core::{sha256_hex, CanonicalBytes, ChainError};

use crate::artifact::{ArtifactKind, LawVerdict, MeaningState, Verdict, SCHEMA_VERSION};

/// Identifier of the drift rule table.
pub const LAW_ID: &str = "drift_threshold";

/// `(condition, verdict)` rows of the rule table, in evaluation order.
const RULE_TABLE: [(&str, &str); 3] = [
    ("drift_score == 0", "STABLE"),
    ("drift_score > 0", "CHANGE_DETECTED"),
    ("otherwise", "CHANGE_DETECTED"),
];

/// Apply the rule table to a drift score.
pub fn classify(drift_score: i64) -> Verdict {
    match drift_score {
        0 => Verdict::Stable,
        s if s > 0 => Verdict::ChangeDetected,
        s => {
            tracing::warn!(
                drift_score = s,
                "unrecognized drift score, failing closed to CHANGE_DETECTED"
            );
            Verdict::ChangeDetected
        }
    }
}

#[derive(Serialize)]
struct LawTraceBinding<'a> {
    meaning_fingerprint: &'a str,
    verdict: &'a str,
}

/// Hash of `{meaning_fingerprint, verdict}`.
pub fn law_trace_hash(meaning_fingerprint: &str, verdict: &Verdict) -> Result<String, ChainError> {
    let binding = LawTraceBinding {
        meaning_fingerprint,
        verdict: verdict.as_str(),
    };
    Ok(sha256_hex(&CanonicalBytes::new(&binding)?))
}

#[derive(Serialize)]
struct RuleRow<'a> {
    when: &'a str,
    verdict: &'a str,
}

#[derive(Serialize)]
struct LawDescriptor<'a> {
    law: &'a str,
    version: &'a str,
    rules: Vec<RuleRow<'a>>,
}

/// Hash of the canonical rule table descriptor.
pub fn law_fingerprint() -> Result<String, ChainError> {
    let descriptor = LawDescriptor {
        law: LAW_ID,
        version: SCHEMA_VERSION,
        rules: RULE_TABLE
            .iter()
            .map(|&(when, verdict)| RuleRow { when, verdict })
            .collect(),
    };
    Ok(sha256_hex(&CanonicalBytes::new(&descriptor)?))
}

/// Law stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LawEvaluator {
    emit_law_fingerprint: bool,
}

impl LawEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `law_fingerprint` to every verdict.
    pub fn with_law_fingerprint(mut self, emit: bool) -> Self {
        self.emit_law_fingerprint = emit;
        self
    }

    pub fn evaluate(&self, meaning: &MeaningState) -> Result<LawVerdict, ChainError> {
        let verdict = classify(meaning.drift_score);
        let trace_hash = law_trace_hash(&meaning.semantic_fingerprint, &verdict)?;
        let law_fingerprint = if self.emit_law_fingerprint {
            Some(law_fingerprint()?)
        } else {
            None
        };

        tracing::debug!(
            meaning_fingerprint = %meaning.semantic_fingerprint,
            verdict = %verdict,
            trace_hash = %trace_hash,
            "law evaluated"
        );

        Ok(LawVerdict {
            kind: ArtifactKind::LawVerdict,
            version: SCHEMA_VERSION.to_string(),
            meaning_fingerprint: meaning.semantic_fingerprint.clone(),
            verdict,
            trace_hash,
            law_fingerprint,
        })
    }
}

/// Law stage with the default settings.
pub fn evaluate_law(meaning: &MeaningState) -> Result<LawVerdict, ChainError> {
    LawEvaluator::new().evaluate(meaning)
}
