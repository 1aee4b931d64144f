//! # Pipeline: Stage Orchestration and Replay Lock
//!
//! [`Pipeline::run`] executes the four stages in order and, unless disabled
//! in [`PipelineConfig`], runs the enforcer on the finished chain before
//! returning it.
//!
//! [`Pipeline::replay`] is the replay determinism lock (`RDL-02`): the same
//! input is run twice, independently and without a baseline state, and
//! every stage hash must agree.

use serde::Serialize;

use evchain_core::{ChainError, InvariantCode};

use crate::artifact::{Action, ArtifactChain, CanonicalInput, MeaningState, SafetyLevel, Verdict};
use crate::config::PipelineConfig;
use crate::evidence::bind_evidence;
use crate::invariants::InvariantEnforcer;
use crate::law::LawEvaluator;
use crate::meaning::{DriftMetric, FingerprintDrift, MeaningStabilizer};
use crate::policy::PolicyGenerator;

/// The configured four-stage pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline<M = FingerprintDrift> {
    stabilizer: MeaningStabilizer<M>,
    evaluator: LawEvaluator,
    generator: PolicyGenerator,
    enforcer: InvariantEnforcer,
    enforce_on_run: bool,
}

impl Pipeline<FingerprintDrift> {
    pub fn new(config: &PipelineConfig) -> Self {
        Self::with_metric(config, FingerprintDrift)
    }
}

impl Default for Pipeline<FingerprintDrift> {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl<M: DriftMetric> Pipeline<M> {
    /// A pipeline that scores drift with `metric`.
    pub fn with_metric(config: &PipelineConfig, metric: M) -> Self {
        Self {
            stabilizer: MeaningStabilizer::with_metric(metric),
            evaluator: LawEvaluator::new().with_law_fingerprint(config.law.emit_law_fingerprint),
            generator: PolicyGenerator::new().with_annotations(config.policy.annotate),
            enforcer: InvariantEnforcer::new(),
            enforce_on_run: config.enforce_on_run,
        }
    }

    /// Run every stage on `input`, scoring drift against `previous`.
    pub fn run(
        &self,
        input: &CanonicalInput,
        previous: Option<&MeaningState>,
    ) -> Result<ArtifactChain, ChainError> {
        let evidence_unit = bind_evidence(input)?;
        let meaning_state = self.stabilizer.stabilize(&evidence_unit, previous)?;
        let law_verdict = self.evaluator.evaluate(&meaning_state)?;
        let action_policy = self.generator.generate(&law_verdict, &meaning_state)?;

        let chain = ArtifactChain {
            evidence_unit,
            meaning_state,
            law_verdict,
            action_policy,
        };
        if self.enforce_on_run {
            self.enforcer.enforce(&chain)?;
        }
        Ok(chain)
    }

    /// Run `input` twice and require identical stage hashes.
    ///
    /// # Errors
    ///
    /// Any stage error, or `InvariantViolation` (`RDL-02`) naming the first
    /// field that differs between the two runs.
    pub fn replay(&self, input: &CanonicalInput) -> Result<ReplayReport, ChainError> {
        let first = ReplayReport::from_chain(&self.run(input, None)?);
        let second = ReplayReport::from_chain(&self.run(input, None)?);

        let pairs = [
            ("input_hash", &first.input_hash, &second.input_hash),
            ("evidence_hash", &first.evidence_hash, &second.evidence_hash),
            (
                "semantic_fingerprint",
                &first.semantic_fingerprint,
                &second.semantic_fingerprint,
            ),
            ("law_trace", &first.law_trace, &second.law_trace),
            ("policy_trace", &first.policy_trace, &second.policy_trace),
        ];
        for (field, a, b) in pairs {
            if a != b {
                return Err(ChainError::violation(
                    InvariantCode::ReplayDeterminism,
                    format!("{field} differs between replays: {a} vs {b}"),
                ));
            }
        }

        tracing::debug!(policy_trace = %first.policy_trace, "replay is deterministic");
        Ok(first)
    }
}

/// The stage hashes and decision of one run, as compared by the replay lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub input_hash: String,
    pub evidence_hash: String,
    pub semantic_fingerprint: String,
    pub law_trace: String,
    pub policy_trace: String,
    pub verdict: Verdict,
    pub action: Action,
    pub safety_level: SafetyLevel,
}

impl ReplayReport {
    pub fn from_chain(chain: &ArtifactChain) -> Self {
        Self {
            input_hash: chain.evidence_unit.input_hash.clone(),
            evidence_hash: chain.evidence_unit.evidence_hash.clone(),
            semantic_fingerprint: chain.meaning_state.semantic_fingerprint.clone(),
            law_trace: chain.law_verdict.trace_hash.clone(),
            policy_trace: chain.action_policy.trace_hash.clone(),
            verdict: chain.law_verdict.verdict.clone(),
            action: chain.action_policy.action,
            safety_level: chain.action_policy.safety_level,
        }
    }
}
