//! End-to-end binding chain tests.
//!
//! Runs the canonical "hello" input through every stage and pins the stage
//! hashes to known values, so any change to canonicalization, field naming
//! or hash derivation shows up as a test failure.

use evchain_core::is_sha256_hex;
use evchain_pipeline::{
    bind_evidence, enforce_system_invariants, evaluate_law, generate_action_policy,
    stabilize_meaning, Action, ArtifactChain, CanonicalInput, InvariantEnforcer, Pipeline,
    PipelineConfig, SafetyLevel, Verdict,
};
use serde_json::json;

const HELLO_INPUT_HASH: &str = "54860817c1e6de8d6feab2c608455da58c7d9b9edc6aae505136d99d7c1a69b0";
const HELLO_EVIDENCE_HASH: &str =
    "ceb0a086ca357cb6efc9720e08feecaa1e8bb551a09ee5f275f8619d2ba6e148";
const HELLO_LAW_TRACE: &str = "14f3daba359a5176df37158a7c533216fa0b1cb50df66727ab95b6445e068c3d";
const HELLO_POLICY_TRACE: &str =
    "9fe831288603f8466cd179bf2f8c9057be176ad1a228a587aec07a3b4b99694c";

fn hello() -> CanonicalInput {
    CanonicalInput::from_value(json!({
        "type": "canonical_input",
        "version": "v1.0",
        "timestamp": "2026-02-08T00:00:00Z",
        "payload": {"data": "hello"}
    }))
    .unwrap()
}

fn run_stages(input: &CanonicalInput) -> ArtifactChain {
    let evidence_unit = bind_evidence(input).unwrap();
    let meaning_state = stabilize_meaning(&evidence_unit, None).unwrap();
    let law_verdict = evaluate_law(&meaning_state).unwrap();
    let action_policy = generate_action_policy(&law_verdict, &meaning_state).unwrap();
    ArtifactChain {
        evidence_unit,
        meaning_state,
        law_verdict,
        action_policy,
    }
}

#[test]
fn hello_chain_matches_known_hashes() {
    let chain = run_stages(&hello());
    assert_eq!(chain.evidence_unit.input_hash(), HELLO_INPUT_HASH);
    assert_eq!(chain.evidence_unit.evidence_hash(), HELLO_EVIDENCE_HASH);
    assert_eq!(chain.meaning_state.semantic_fingerprint(), HELLO_INPUT_HASH);
    assert_eq!(chain.meaning_state.drift_score(), 0);
    assert_eq!(chain.law_verdict.verdict(), &Verdict::Stable);
    assert_eq!(chain.law_verdict.trace_hash(), HELLO_LAW_TRACE);
    assert_eq!(chain.action_policy.action(), Action::Continue);
    assert_eq!(chain.action_policy.safety_level(), SafetyLevel::Normal);
    assert_eq!(chain.action_policy.trace_hash(), HELLO_POLICY_TRACE);
}

#[test]
fn two_runs_are_pairwise_equal_and_both_verify() {
    let first = run_stages(&hello());
    let second = run_stages(&hello());

    assert_eq!(first.evidence_unit.input_hash(), second.evidence_unit.input_hash());
    assert_eq!(
        first.evidence_unit.evidence_hash(),
        second.evidence_unit.evidence_hash()
    );
    assert_eq!(
        first.meaning_state.semantic_fingerprint(),
        second.meaning_state.semantic_fingerprint()
    );
    assert_eq!(first.law_verdict.trace_hash(), second.law_verdict.trace_hash());
    assert_eq!(
        first.action_policy.trace_hash(),
        second.action_policy.trace_hash()
    );

    enforce_system_invariants(&first).unwrap();
    enforce_system_invariants(&second).unwrap();
}

#[test]
fn pipeline_run_equals_manual_stages() {
    let chain = Pipeline::default().run(&hello(), None).unwrap();
    assert_eq!(chain, run_stages(&hello()));
}

#[test]
fn wire_document_has_the_published_shape() {
    let doc = serde_json::to_value(run_stages(&hello())).unwrap();

    let keys = |v: &serde_json::Value| {
        let mut k: Vec<String> = v.as_object().unwrap().keys().cloned().collect();
        k.sort();
        k
    };
    assert_eq!(
        keys(&doc),
        ["action_policy", "evidence_unit", "law_verdict", "meaning_state"]
    );
    assert_eq!(
        keys(&doc["evidence_unit"]),
        ["canonical_json", "evidence_hash", "input_hash", "notes", "type", "version"]
    );
    assert_eq!(
        keys(&doc["meaning_state"]),
        ["drift_score", "evidence_hash", "semantic_fingerprint", "type", "version"]
    );
    assert_eq!(
        keys(&doc["law_verdict"]),
        ["meaning_fingerprint", "trace_hash", "type", "verdict", "version"]
    );
    assert_eq!(
        keys(&doc["action_policy"]),
        ["action", "safety_level", "trace_hash", "type", "verdict", "version"]
    );
    assert_eq!(doc["action_policy"]["action"], "CONTINUE");
    assert_eq!(doc["law_verdict"]["verdict"], "STABLE");
}

#[test]
fn stored_chain_verifies_after_json_round_trip() {
    let text = serde_json::to_string_pretty(&run_stages(&hello())).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    InvariantEnforcer::new().verify_value(&doc).unwrap();
}

#[test]
fn deeply_nested_acyclic_payload_round_trips() {
    let mut payload = json!({"data": "hello"});
    for level in 0..100 {
        payload = json!({"level": level, "inner": payload});
    }
    let mut deep = hello();
    deep.payload = payload;

    let chain = Pipeline::default().run(&deep, None).unwrap();
    let text = serde_json::to_string(&chain).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    InvariantEnforcer::new().verify_value(&doc).unwrap();
}

#[test]
fn extra_input_fields_are_bound() {
    let mut tagged = hello();
    tagged.extensions.insert("source".into(), json!("sensor-7"));
    let chain = run_stages(&tagged);
    assert_ne!(chain.evidence_unit.input_hash(), HELLO_INPUT_HASH);
    assert_eq!(chain.evidence_unit.canonical_json()["source"], "sensor-7");
    enforce_system_invariants(&chain).unwrap();
}

#[test]
fn drift_against_previous_run() {
    let pipeline = Pipeline::default();
    let baseline = pipeline.run(&hello(), None).unwrap();

    let same = pipeline.run(&hello(), Some(&baseline.meaning_state)).unwrap();
    assert_eq!(same.law_verdict.verdict(), &Verdict::Stable);

    let mut changed_input = hello();
    changed_input.payload = json!({"data": "hello, world"});
    let changed = pipeline
        .run(&changed_input, Some(&baseline.meaning_state))
        .unwrap();
    assert_eq!(changed.meaning_state.drift_score(), 1);
    assert_eq!(changed.law_verdict.verdict(), &Verdict::ChangeDetected);
    assert_eq!(changed.action_policy.action(), Action::Review);
    enforce_system_invariants(&changed).unwrap();
}

#[test]
fn annotated_and_pinned_chain_verifies() {
    let mut config = PipelineConfig::default();
    config.law.emit_law_fingerprint = true;
    config.policy.annotate = true;
    let chain = Pipeline::new(&config).run(&hello(), None).unwrap();

    assert!(is_sha256_hex(chain.law_verdict.law_fingerprint().unwrap()));
    assert_eq!(chain.action_policy.requires_human(), Some(false));
    assert_ne!(chain.action_policy.trace_hash(), HELLO_POLICY_TRACE);
    let doc = serde_json::to_value(&chain).unwrap();
    InvariantEnforcer::new().verify_value(&doc).unwrap();
}

#[test]
fn independent_runs_on_threads_agree() {
    let pipeline = &Pipeline::default();
    let input = &hello();
    let traces: Vec<String> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(move || {
                    pipeline
                        .run(input, None)
                        .unwrap()
                        .action_policy
                        .trace_hash()
                        .to_string()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(traces.iter().all(|t| t == HELLO_POLICY_TRACE));
}

#[test]
fn wrong_input_type_is_rejected_before_any_stage() {
    let err = CanonicalInput::from_value(json!({
        "type": "evidence_unit",
        "version": "v1.0",
        "timestamp": "2026-02-08T00:00:00Z",
        "payload": {}
    }))
    .and_then(|input| Pipeline::default().run(&input, None))
    .unwrap_err();
    assert_eq!(err.code(), "INVALID_INPUT");
}
