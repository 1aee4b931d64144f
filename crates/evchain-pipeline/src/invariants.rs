//! # Invariant Enforcement: The Chain Verifier
//!
//! The enforcer does not trust any hash stored in a chain. It re-derives
//! every expected value from the artifacts' own inputs and rejects the chain
//! on the first mismatch. There is no partial-pass mode.
//!
//! ## Check order
//!
//! Binding checks, adjacent stages first:
//!
//! 1. `SIL-01` all four artifacts present, correctly typed, at `v1.0`.
//! 2. `SIL-02` `meaning.evidence_hash` is a stage hash equal to `evidence.evidence_hash`.
//! 3. `SIL-03` `meaning.semantic_fingerprint` is non-empty and equals `law.meaning_fingerprint`.
//! 4. `SIL-04` `law.verdict` is non-empty and equals `policy.verdict`.
//! 5. `SIL-05` `policy.trace_hash` is a stage hash equal to the recomputed forensic
//!    trace, which also covers `drift_score` and `law.trace_hash`.
//!
//! Derivation checks, each recomputing one stage output:
//!
//! 6. `I-EBM-01` canonicalization of the evidence body is idempotent.
//! 7. `I-EBM-02` `input_hash` and `evidence_hash` recompute.
//! 8. `I-MEAN-01` `semantic_fingerprint` recomputes.
//! 9. `I-LAW-01` `law.trace_hash` recomputes.
//! 10. `I-LAW-02` the verdict follows from the drift score; a present
//!     `law_fingerprint` names the current rule table.
//! 11. `I-APL-01` action, safety level and annotations follow from the verdict.

use serde_json::{Map, Value};

use evchain_core::{canonicalize, is_sha256_hex, CanonicalBytes, ChainError, InvariantCode};

use crate::artifact::{
    ActionPolicy, Artifact, ArtifactChain, ArtifactKind, EvidenceUnit, LawVerdict,
    SCHEMA_VERSION,
};
use crate::evidence::{evidence_hash_of, input_hash_of};
use crate::law::{classify, law_fingerprint, law_trace_hash};
use crate::meaning::semantic_fingerprint_of;
use crate::policy::decide;
use crate::trace::forensic_trace_hash;

/// Stateless chain verifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvariantEnforcer;

impl InvariantEnforcer {
    pub fn new() -> Self {
        Self
    }

    /// Run every check in order, stopping at the first violation.
    pub fn enforce(&self, chain: &ArtifactChain) -> Result<(), ChainError> {
        check_chain_shape(chain)?;
        check_evidence_binding(chain)?;
        check_meaning_binding(chain)?;
        check_verdict_binding(chain)?;
        check_forensic_trace(chain)?;

        check_canonical_idempotence(&chain.evidence_unit.canonical_json)?;
        check_evidence_derivation(&chain.evidence_unit)?;
        check_fingerprint_derivation(chain)?;
        check_law_trace_derivation(&chain.law_verdict)?;
        check_verdict_derivation(chain)?;
        check_policy_derivation(&chain.action_policy)?;

        tracing::debug!(
            evidence_hash = %chain.evidence_unit.evidence_hash,
            policy_trace = %chain.action_policy.trace_hash,
            "chain invariants hold"
        );
        Ok(())
    }

    /// Load a loosely typed chain document and enforce it.
    ///
    /// A document that is not an object, lacks a member, or has a member
    /// that does not parse as the expected artifact fails with `SIL-01`.
    pub fn verify_value(&self, doc: &Value) -> Result<ArtifactChain, ChainError> {
        let chain = load_chain(doc)?;
        self.enforce(&chain)?;
        Ok(chain)
    }
}

/// Enforce every invariant on `chain`.
pub fn enforce_system_invariants(chain: &ArtifactChain) -> Result<(), ChainError> {
    InvariantEnforcer::new().enforce(chain)
}

fn violation(code: InvariantCode, message: impl Into<String>) -> ChainError {
    ChainError::violation(code, message)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse `{evidence_unit, meaning_state, law_verdict, action_policy}`.
pub fn load_chain(doc: &Value) -> Result<ArtifactChain, ChainError> {
    let obj = doc
        .as_object()
        .ok_or_else(|| violation(InvariantCode::ChainShape, "chain document is not an object"))?;

    let evidence_unit = match load_slot(obj, "evidence_unit")? {
        Artifact::Evidence(a) => a,
        other => return Err(mistyped("evidence_unit", ArtifactKind::EvidenceUnit, &other)),
    };
    let meaning_state = match load_slot(obj, "meaning_state")? {
        Artifact::Meaning(a) => a,
        other => return Err(mistyped("meaning_state", ArtifactKind::MeaningState, &other)),
    };
    let law_verdict = match load_slot(obj, "law_verdict")? {
        Artifact::Law(a) => a,
        other => return Err(mistyped("law_verdict", ArtifactKind::LawVerdict, &other)),
    };
    let action_policy = match load_slot(obj, "action_policy")? {
        Artifact::Policy(a) => a,
        other => return Err(mistyped("action_policy", ArtifactKind::ActionPolicy, &other)),
    };

    Ok(ArtifactChain {
        evidence_unit,
        meaning_state,
        law_verdict,
        action_policy,
    })
}

fn load_slot(obj: &Map<String, Value>, slot: &str) -> Result<Artifact, ChainError> {
    let value = obj
        .get(slot)
        .ok_or_else(|| violation(InvariantCode::ChainShape, format!("missing {slot}")))?;
    Artifact::from_value(value.clone())
        .map_err(|e| violation(InvariantCode::ChainShape, format!("{slot}: {e}")))
}

fn mistyped(slot: &str, expected: ArtifactKind, found: &Artifact) -> ChainError {
    violation(
        InvariantCode::ChainShape,
        format!("{slot} has type {}, expected {expected}", found.kind()),
    )
}

// ---------------------------------------------------------------------------
// Binding checks
// ---------------------------------------------------------------------------

fn check_chain_shape(chain: &ArtifactChain) -> Result<(), ChainError> {
    let members = [
        ("evidence_unit", chain.evidence_unit.kind, ArtifactKind::EvidenceUnit, chain.evidence_unit.version.as_str()),
        ("meaning_state", chain.meaning_state.kind, ArtifactKind::MeaningState, chain.meaning_state.version.as_str()),
        ("law_verdict", chain.law_verdict.kind, ArtifactKind::LawVerdict, chain.law_verdict.version.as_str()),
        ("action_policy", chain.action_policy.kind, ArtifactKind::ActionPolicy, chain.action_policy.version.as_str()),
    ];
    for (slot, found, expected, version) in members {
        if found != expected {
            return Err(violation(
                InvariantCode::ChainShape,
                format!("{slot} has type {found}, expected {expected}"),
            ));
        }
        if version != SCHEMA_VERSION {
            return Err(violation(
                InvariantCode::ChainShape,
                format!("{slot} has version {version:?}, expected {SCHEMA_VERSION:?}"),
            ));
        }
    }
    Ok(())
}

fn check_evidence_binding(chain: &ArtifactChain) -> Result<(), ChainError> {
    let bound = &chain.meaning_state.evidence_hash;
    if !is_sha256_hex(bound) {
        return Err(violation(
            InvariantCode::EvidenceBinding,
            format!("meaning_state.evidence_hash {bound:?} is not a SHA-256 hex digest"),
        ));
    }
    if *bound != chain.evidence_unit.evidence_hash {
        return Err(violation(
            InvariantCode::EvidenceBinding,
            "meaning_state is not bound to the evidence unit",
        ));
    }
    Ok(())
}

fn check_meaning_binding(chain: &ArtifactChain) -> Result<(), ChainError> {
    let fingerprint = &chain.meaning_state.semantic_fingerprint;
    if fingerprint.is_empty() {
        return Err(violation(
            InvariantCode::MeaningBinding,
            "meaning_state.semantic_fingerprint is empty",
        ));
    }
    if *fingerprint != chain.law_verdict.meaning_fingerprint {
        return Err(violation(
            InvariantCode::MeaningBinding,
            "law_verdict is not bound to the meaning state",
        ));
    }
    Ok(())
}

fn check_verdict_binding(chain: &ArtifactChain) -> Result<(), ChainError> {
    let verdict = chain.law_verdict.verdict.as_str();
    if verdict.is_empty() {
        return Err(violation(InvariantCode::VerdictBinding, "law_verdict.verdict is empty"));
    }
    if verdict != chain.action_policy.verdict.as_str() {
        return Err(violation(
            InvariantCode::VerdictBinding,
            format!(
                "action_policy.verdict {} does not match law_verdict.verdict {verdict}",
                chain.action_policy.verdict
            ),
        ));
    }
    Ok(())
}

fn check_forensic_trace(chain: &ArtifactChain) -> Result<(), ChainError> {
    let stored = &chain.action_policy.trace_hash;
    if !is_sha256_hex(stored) {
        return Err(violation(
            InvariantCode::ForensicTrace,
            format!("action_policy.trace_hash {stored:?} is not a SHA-256 hex digest"),
        ));
    }
    // SIL-02 has already tied meaning.evidence_hash to the evidence unit.
    let expected = forensic_trace_hash(
        &chain.meaning_state,
        &chain.law_verdict,
        &chain.action_policy,
    )?;
    if *stored != expected {
        return Err(violation(
            InvariantCode::ForensicTrace,
            format!("action_policy.trace_hash mismatch: stored {stored}, recomputed {expected}"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Derivation checks
// ---------------------------------------------------------------------------

/// Canonicalizing an already canonical value must not change its bytes.
pub fn check_canonical_idempotence(value: &Value) -> Result<(), ChainError> {
    let once = CanonicalBytes::new(value)?;
    let twice = CanonicalBytes::new(&canonicalize(value)?)?;
    if once != twice {
        return Err(violation(
            InvariantCode::CanonicalIdempotence,
            "canonical form of the evidence body is not a fixed point",
        ));
    }
    Ok(())
}

fn check_evidence_derivation(evidence: &EvidenceUnit) -> Result<(), ChainError> {
    let input_hash = input_hash_of(&evidence.canonical_json)?;
    if input_hash != evidence.input_hash {
        return Err(violation(
            InvariantCode::EvidenceDerivation,
            format!(
                "input_hash mismatch: stored {}, recomputed {input_hash}",
                evidence.input_hash
            ),
        ));
    }
    let evidence_hash = evidence_hash_of(evidence)?;
    if evidence_hash != evidence.evidence_hash {
        return Err(violation(
            InvariantCode::EvidenceDerivation,
            format!(
                "evidence_hash mismatch: stored {}, recomputed {evidence_hash}",
                evidence.evidence_hash
            ),
        ));
    }
    Ok(())
}

fn check_fingerprint_derivation(chain: &ArtifactChain) -> Result<(), ChainError> {
    let expected = semantic_fingerprint_of(&chain.evidence_unit.canonical_json)?;
    if expected != chain.meaning_state.semantic_fingerprint {
        return Err(violation(
            InvariantCode::FingerprintDerivation,
            format!(
                "semantic_fingerprint mismatch: stored {}, recomputed {expected}",
                chain.meaning_state.semantic_fingerprint
            ),
        ));
    }
    Ok(())
}

fn check_law_trace_derivation(law: &LawVerdict) -> Result<(), ChainError> {
    let expected = law_trace_hash(&law.meaning_fingerprint, &law.verdict)?;
    if expected != law.trace_hash {
        return Err(violation(
            InvariantCode::LawTraceDerivation,
            format!(
                "law_verdict.trace_hash mismatch: stored {}, recomputed {expected}",
                law.trace_hash
            ),
        ));
    }
    Ok(())
}

fn check_verdict_derivation(chain: &ArtifactChain) -> Result<(), ChainError> {
    let drift_score = chain.meaning_state.drift_score;
    let expected = classify(drift_score);
    if expected.as_str() != chain.law_verdict.verdict.as_str() {
        return Err(violation(
            InvariantCode::VerdictDerivation,
            format!(
                "drift_score {drift_score} yields {expected}, chain records {}",
                chain.law_verdict.verdict
            ),
        ));
    }
    if let Some(recorded) = chain.law_verdict.law_fingerprint.as_deref() {
        let current = law_fingerprint()?;
        if recorded != current {
            return Err(violation(
                InvariantCode::VerdictDerivation,
                format!("law_fingerprint {recorded} does not name the current rule table"),
            ));
        }
    }
    Ok(())
}

fn check_policy_derivation(policy: &ActionPolicy) -> Result<(), ChainError> {
    let expected = decide(&policy.verdict);
    if policy.action != expected.action || policy.safety_level != expected.safety_level {
        return Err(violation(
            InvariantCode::PolicyDerivation,
            format!(
                "verdict {} maps to ({}, {}), policy records ({}, {})",
                policy.verdict,
                expected.action,
                expected.safety_level,
                policy.action,
                policy.safety_level
            ),
        ));
    }

    let annotations = (
        policy.policy_id.as_deref(),
        policy.priority,
        policy.requires_human,
    );
    match annotations {
        (None, None, None) => Ok(()),
        (Some(id), Some(priority), Some(requires_human))
            if id == expected.policy_id
                && priority == expected.priority
                && requires_human == expected.requires_human =>
        {
            Ok(())
        }
        _ => Err(violation(
            InvariantCode::PolicyDerivation,
            format!(
                "policy annotations do not match the action table row for {}",
                policy.verdict
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{Action, CanonicalInput, Verdict};
    use crate::evidence::bind_evidence;
    use crate::law::LawEvaluator;
    use crate::meaning::stabilize_meaning;
    use crate::policy::PolicyGenerator;
    use serde_json::json;

    fn build(annotate: bool, pin_law: bool) -> ArtifactChain {
        let input = CanonicalInput::from_value(json!({
            "type": "canonical_input",
            "version": "v1.0",
            "timestamp": "2026-02-08T00:00:00Z",
            "payload": {"data": "hello"}
        }))
        .unwrap();
        let evidence_unit = bind_evidence(&input).unwrap();
        let meaning_state = stabilize_meaning(&evidence_unit, None).unwrap();
        let law_verdict = LawEvaluator::new()
            .with_law_fingerprint(pin_law)
            .evaluate(&meaning_state)
            .unwrap();
        let action_policy = PolicyGenerator::new()
            .with_annotations(annotate)
            .generate(&law_verdict, &meaning_state)
            .unwrap();
        ArtifactChain {
            evidence_unit,
            meaning_state,
            law_verdict,
            action_policy,
        }
    }

    fn chain() -> ArtifactChain {
        build(false, false)
    }

    fn code_of(chain: &ArtifactChain) -> &'static str {
        enforce_system_invariants(chain).unwrap_err().code()
    }

    #[test]
    fn accepts_chain_built_in_order() {
        enforce_system_invariants(&chain()).unwrap();
        enforce_system_invariants(&build(true, true)).unwrap();
    }

    #[test]
    fn wrong_type_is_shape_violation() {
        let mut c = chain();
        c.meaning_state.kind = ArtifactKind::LawVerdict;
        assert_eq!(code_of(&c), "SIL-01");
    }

    #[test]
    fn unsupported_version_is_shape_violation() {
        let mut c = chain();
        c.law_verdict.version = "v2.0".into();
        assert_eq!(code_of(&c), "SIL-01");
    }

    #[test]
    fn malformed_evidence_link_is_sil02() {
        let mut c = chain();
        c.meaning_state.evidence_hash = "not-a-hash".into();
        assert_eq!(code_of(&c), "SIL-02");
        let mut c = chain();
        c.meaning_state.evidence_hash = "0".repeat(64);
        assert_eq!(code_of(&c), "SIL-02");
    }

    #[test]
    fn broken_meaning_link_is_sil03() {
        let mut c = chain();
        c.law_verdict.meaning_fingerprint = "0".repeat(64);
        assert_eq!(code_of(&c), "SIL-03");
        let mut c = chain();
        c.meaning_state.semantic_fingerprint.clear();
        assert_eq!(code_of(&c), "SIL-03");
    }

    #[test]
    fn broken_verdict_link_is_sil04() {
        let mut c = chain();
        c.action_policy.verdict = Verdict::ChangeDetected;
        assert_eq!(code_of(&c), "SIL-04");
        let mut c = chain();
        c.law_verdict.verdict = Verdict::from("");
        c.action_policy.verdict = Verdict::from("");
        assert_eq!(code_of(&c), "SIL-04");
    }

    #[test]
    fn replaced_policy_trace_is_sil05() {
        let mut c = chain();
        c.action_policy.trace_hash = "ab".repeat(32);
        assert_eq!(code_of(&c), "SIL-05");
        let mut c = chain();
        c.action_policy.trace_hash = "short".into();
        assert_eq!(code_of(&c), "SIL-05");
    }

    #[test]
    fn altered_decision_is_sil05() {
        let mut c = chain();
        c.action_policy.action = Action::Halt;
        assert_eq!(code_of(&c), "SIL-05");
    }

    #[test]
    fn altered_input_hash_is_ebm02() {
        let mut c = chain();
        c.evidence_unit.input_hash = "0".repeat(64);
        assert_eq!(code_of(&c), "I-EBM-02");
    }

    #[test]
    fn altered_notes_is_ebm02() {
        let mut c = chain();
        c.evidence_unit.notes = Some("edited".into());
        assert_eq!(code_of(&c), "I-EBM-02");
    }

    /// Recompute the policy trace so that only derivation checks can fail.
    fn reseal(c: &mut ArtifactChain) {
        c.action_policy.trace_hash =
            forensic_trace_hash(&c.meaning_state, &c.law_verdict, &c.action_policy).unwrap();
    }

    /// A CHANGE_DETECTED chain with drift score 1.
    fn changed_chain() -> ArtifactChain {
        let bind = |data: &str| {
            bind_evidence(
                &CanonicalInput::from_value(json!({
                    "type": "canonical_input",
                    "version": "v1.0",
                    "timestamp": "2026-02-08T00:00:00Z",
                    "payload": {"data": data}
                }))
                .unwrap(),
            )
            .unwrap()
        };
        let baseline = stabilize_meaning(&bind("hello"), None).unwrap();
        let evidence_unit = bind("goodbye");
        let meaning_state = stabilize_meaning(&evidence_unit, Some(&baseline)).unwrap();
        let law_verdict = LawEvaluator::new().evaluate(&meaning_state).unwrap();
        let action_policy = PolicyGenerator::new()
            .generate(&law_verdict, &meaning_state)
            .unwrap();
        ArtifactChain {
            evidence_unit,
            meaning_state,
            law_verdict,
            action_policy,
        }
    }

    #[test]
    fn altered_law_trace_is_rejected() {
        let mut c = chain();
        c.law_verdict.trace_hash = "0".repeat(64);
        assert_eq!(code_of(&c), "SIL-05");
        reseal(&mut c);
        assert_eq!(code_of(&c), "I-LAW-01");
    }

    #[test]
    fn altered_drift_score_is_rejected() {
        let mut c = chain();
        c.meaning_state.drift_score = 1;
        assert_eq!(code_of(&c), "SIL-05");
        reseal(&mut c);
        assert_eq!(code_of(&c), "I-LAW-02");
    }

    #[test]
    fn drift_score_keeping_the_verdict_is_still_rejected() {
        let original = changed_chain();
        enforce_system_invariants(&original).unwrap();
        assert_eq!(original.meaning_state.drift_score, 1);
        for drift in [2, -1, 999, i64::MAX] {
            let mut c = original.clone();
            c.meaning_state.drift_score = drift;
            assert_eq!(code_of(&c), "SIL-05", "drift_score {drift}");
        }
    }

    #[test]
    fn idempotence_holds_on_nested_values() {
        check_canonical_idempotence(&json!({"b": [{"z": 1, "a": 2}], "a": null})).unwrap();
    }

    #[test]
    fn load_chain_reports_missing_and_mistyped_members() {
        let doc = serde_json::to_value(chain()).unwrap();

        let mut missing = doc.clone();
        missing.as_object_mut().unwrap().remove("law_verdict");
        let err = load_chain(&missing).unwrap_err();
        assert_eq!(err.code(), "SIL-01");
        assert!(err.to_string().contains("law_verdict"));

        let mut swapped = doc.clone();
        swapped["meaning_state"] = doc["law_verdict"].clone();
        assert_eq!(load_chain(&swapped).unwrap_err().code(), "SIL-01");

        let mut untyped = doc.clone();
        untyped["action_policy"]["type"] = json!("widget");
        assert_eq!(load_chain(&untyped).unwrap_err().code(), "SIL-01");

        assert_eq!(load_chain(&json!([1, 2])).unwrap_err().code(), "SIL-01");
    }

    #[test]
    fn verify_value_round_trips_a_valid_chain() {
        let original = build(true, true);
        let doc = serde_json::to_value(&original).unwrap();
        let loaded = InvariantEnforcer::new().verify_value(&doc).unwrap();
        assert_eq!(loaded, original);
    }
}
