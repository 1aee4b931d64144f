//! # Action Policy Generation
//!
//! Maps a [`LawVerdict`] to an action through a fixed table:
//!
//! | verdict           | action     | safety_level | policy_id      | priority | requires_human |
//! |-------------------|------------|--------------|----------------|----------|----------------|
//! | `STABLE`          | `CONTINUE` | `NORMAL`     | `apl.continue` | 0        | false          |
//! | `CHANGE_DETECTED` | `REVIEW`   | `ELEVATED`   | `apl.review`   | 1        | true           |
//! | anything else     | `HALT`     | `CRITICAL`   | `apl.halt`     | 2        | true           |
//!
//! The last three columns are annotations and are only written when the
//! generator is configured to annotate.
//!
//! ## Security Invariant
//!
//! The generator takes the [`MeaningState`] the verdict was derived from as
//! its upstream anchor and refuses to emit a policy when the verdict is not
//! bound to that state's fingerprint. The emitted `trace_hash` is the
//! forensic binding of [`crate::trace`].

use evchain_core::{ChainError, InvariantCode};

use crate::artifact::{
    Action, ActionPolicy, ArtifactKind, LawVerdict, MeaningState, SafetyLevel, Verdict,
    SCHEMA_VERSION,
};
use crate::trace::forensic_trace_hash;

/// One row of the action table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyDecision {
    pub action: Action,
    pub safety_level: SafetyLevel,
    pub policy_id: &'static str,
    pub priority: u8,
    pub requires_human: bool,
}

/// Look up the action table row for `verdict`.
pub fn decide(verdict: &Verdict) -> PolicyDecision {
    match verdict {
        Verdict::Stable => PolicyDecision {
            action: Action::Continue,
            safety_level: SafetyLevel::Normal,
            policy_id: "apl.continue",
            priority: 0,
            requires_human: false,
        },
        Verdict::ChangeDetected => PolicyDecision {
            action: Action::Review,
            safety_level: SafetyLevel::Elevated,
            policy_id: "apl.review",
            priority: 1,
            requires_human: true,
        },
        Verdict::Unrecognized(v) => {
            tracing::warn!(verdict = %v, "unrecognized verdict, failing closed to HALT");
            PolicyDecision {
                action: Action::Halt,
                safety_level: SafetyLevel::Critical,
                policy_id: "apl.halt",
                priority: 2,
                requires_human: true,
            }
        }
    }
}

/// Policy stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyGenerator {
    annotate: bool,
}

impl PolicyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `policy_id`, `priority` and `requires_human` into every policy.
    pub fn with_annotations(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    /// Derive the action policy for `law`, anchored at `meaning`.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` (`SIL-03`) when `law` was not derived from
    /// `meaning`.
    pub fn generate(
        &self,
        law: &LawVerdict,
        meaning: &MeaningState,
    ) -> Result<ActionPolicy, ChainError> {
        if law.meaning_fingerprint != meaning.semantic_fingerprint {
            return Err(ChainError::violation(
                InvariantCode::MeaningBinding,
                format!(
                    "law verdict is bound to fingerprint {}, not to the supplied meaning state {}",
                    law.meaning_fingerprint, meaning.semantic_fingerprint
                ),
            ));
        }

        let decision = decide(&law.verdict);
        let mut policy = ActionPolicy {
            kind: ArtifactKind::ActionPolicy,
            version: SCHEMA_VERSION.to_string(),
            verdict: law.verdict.clone(),
            action: decision.action,
            safety_level: decision.safety_level,
            trace_hash: String::new(),
            policy_id: self.annotate.then(|| decision.policy_id.to_string()),
            priority: self.annotate.then_some(decision.priority),
            requires_human: self.annotate.then_some(decision.requires_human),
        };
        policy.trace_hash = forensic_trace_hash(meaning, law, &policy)?;

        tracing::debug!(
            verdict = %policy.verdict,
            action = %policy.action,
            safety_level = %policy.safety_level,
            trace_hash = %policy.trace_hash,
            "action policy generated"
        );
        Ok(policy)
    }
}

/// Policy stage with the default settings.
pub fn generate_action_policy(
    law: &LawVerdict,
    meaning: &MeaningState,
) -> Result<ActionPolicy, ChainError> {
    PolicyGenerator::new().generate(law, meaning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::law::evaluate_law;
    use evchain_core::is_sha256_hex;

    fn meaning(drift_score: i64) -> MeaningState {
        MeaningState {
            kind: ArtifactKind::MeaningState,
            version: SCHEMA_VERSION.into(),
            evidence_hash: "e".repeat(64),
            semantic_fingerprint: "f".repeat(64),
            drift_score,
        }
    }

    #[test]
    fn stable_continues() {
        let m = meaning(0);
        let policy = generate_action_policy(&evaluate_law(&m).unwrap(), &m).unwrap();
        assert_eq!(policy.kind(), ArtifactKind::ActionPolicy);
        assert_eq!(policy.verdict(), &Verdict::Stable);
        assert_eq!(policy.action(), Action::Continue);
        assert_eq!(policy.safety_level(), SafetyLevel::Normal);
        assert!(is_sha256_hex(policy.trace_hash()));
        assert_eq!(policy.policy_id(), None);
    }

    #[test]
    fn change_detected_reviews() {
        let m = meaning(1);
        let policy = generate_action_policy(&evaluate_law(&m).unwrap(), &m).unwrap();
        assert_eq!(policy.action(), Action::Review);
        assert_eq!(policy.safety_level(), SafetyLevel::Elevated);
    }

    #[test]
    fn unknown_verdict_halts() {
        let m = meaning(0);
        let mut law = evaluate_law(&m).unwrap();
        law.verdict = Verdict::from("QUARANTINE");
        let policy = generate_action_policy(&law, &m).unwrap();
        assert_eq!(policy.action(), Action::Halt);
        assert_eq!(policy.safety_level(), SafetyLevel::Critical);
        assert_eq!(policy.verdict().as_str(), "QUARANTINE");
    }

    #[test]
    fn refuses_unbound_verdict() {
        let m = meaning(0);
        let law = evaluate_law(&m).unwrap();
        let mut other = meaning(0);
        other.semantic_fingerprint = "0".repeat(64);
        let err = generate_action_policy(&law, &other).unwrap_err();
        assert_eq!(err.invariant(), Some(InvariantCode::MeaningBinding));
    }

    #[test]
    fn annotations_follow_the_table() {
        let m = meaning(1);
        let law = evaluate_law(&m).unwrap();
        let plain = generate_action_policy(&law, &m).unwrap();
        let annotated = PolicyGenerator::new()
            .with_annotations(true)
            .generate(&law, &m)
            .unwrap();
        assert_eq!(annotated.policy_id(), Some("apl.review"));
        assert_eq!(annotated.priority(), Some(1));
        assert_eq!(annotated.requires_human(), Some(true));
        assert_ne!(annotated.trace_hash(), plain.trace_hash());
    }

    #[test]
    fn trace_is_anchored_at_evidence_hash() {
        let m = meaning(0);
        let law = evaluate_law(&m).unwrap();
        let a = generate_action_policy(&law, &m).unwrap();
        let mut moved = m.clone();
        moved.evidence_hash = "d".repeat(64);
        let b = generate_action_policy(&law, &moved).unwrap();
        assert_ne!(a.trace_hash(), b.trace_hash());
    }
}
