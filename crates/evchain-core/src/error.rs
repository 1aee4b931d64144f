//! # Error Types: Chain Error Taxonomy
//!
//! Every failure in the evidence chain is fatal to the run that produced it.
//! There is no retry and no partial acceptance; errors carry a
//! machine-checkable code so drivers can decide how to halt.
//!
//! ## Design
//!
//! - `InvalidInput`: a malformed or mistyped `canonical_input` record.
//! - `InvariantViolation`: a cross-layer binding or derivation check failed.
//! - `Structural`: the value could not be canonicalized at all.

use thiserror::Error;

/// Top-level error type for every evchain stage and the verifier.
#[derive(Error, Debug)]
pub enum ChainError {
    /// The input record is malformed or carries the wrong discriminator.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A binding or derivation invariant does not hold.
    #[error(transparent)]
    InvariantViolation(#[from] InvariantViolation),

    /// The value cannot be canonicalized.
    #[error("structural error: {0}")]
    Structural(#[from] StructuralError),
}

impl ChainError {
    /// Machine-checkable identifier for this error.
    ///
    /// Invariant violations report their invariant code (e.g. `SIL-05`);
    /// the other classes report a fixed class code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvariantViolation(v) => v.code.as_str(),
            Self::Structural(_) => "STRUCTURAL",
        }
    }

    /// Shorthand for building an invariant violation.
    pub fn violation(code: InvariantCode, message: impl Into<String>) -> Self {
        Self::InvariantViolation(InvariantViolation::new(code, message))
    }

    /// Returns the violated invariant, if this is an invariant violation.
    pub fn invariant(&self) -> Option<InvariantCode> {
        match self {
            Self::InvariantViolation(v) => Some(v.code),
            _ => None,
        }
    }
}

/// A failed invariant check with its identifying code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invariant violation {code}: {message}")]
pub struct InvariantViolation {
    /// Which invariant failed.
    pub code: InvariantCode,
    /// Human-readable description of the mismatch.
    pub message: String,
}

impl InvariantViolation {
    /// Create a violation for `code`.
    pub fn new(code: InvariantCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Identifiers of the invariants enforced across the chain.
///
/// The `SIL-*` codes are the cross-layer binding checks, run in numeric
/// order. The remaining codes are derivation checks that recompute a stage
/// output from its own inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvariantCode {
    /// All four artifacts are present and carry the expected `type`.
    ChainShape,
    /// The meaning state is bound to the evidence hash.
    EvidenceBinding,
    /// The law verdict is bound to the semantic fingerprint.
    MeaningBinding,
    /// The action policy is bound to the law verdict.
    VerdictBinding,
    /// The policy trace hash matches the recomputed forensic binding.
    ForensicTrace,
    /// Canonicalization is idempotent on the evidence body.
    CanonicalIdempotence,
    /// `input_hash` and `evidence_hash` recompute from `canonical_json`.
    EvidenceDerivation,
    /// `semantic_fingerprint` recomputes from `canonical_json`.
    FingerprintDerivation,
    /// `trace_hash` of the law verdict recomputes from its fields.
    LawTraceDerivation,
    /// The verdict is what the rule table yields for the drift score.
    VerdictDerivation,
    /// Action and safety level are what the action table yields for the verdict.
    PolicyDerivation,
    /// Two replays of the same input agree on every stage hash.
    ReplayDeterminism,
}

impl InvariantCode {
    /// The stable string identifier of this invariant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChainShape => "SIL-01",
            Self::EvidenceBinding => "SIL-02",
            Self::MeaningBinding => "SIL-03",
            Self::VerdictBinding => "SIL-04",
            Self::ForensicTrace => "SIL-05",
            Self::CanonicalIdempotence => "I-EBM-01",
            Self::EvidenceDerivation => "I-EBM-02",
            Self::FingerprintDerivation => "I-MEAN-01",
            Self::LawTraceDerivation => "I-LAW-01",
            Self::VerdictDerivation => "I-LAW-02",
            Self::PolicyDerivation => "I-APL-01",
            Self::ReplayDeterminism => "RDL-02",
        }
    }
}

impl std::fmt::Display for InvariantCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum StructuralError {
    /// The value nests deeper than the canonicalizer allows. Cyclic
    /// structures always end up here.
    #[error("value nests deeper than {limit} levels (cyclic or unbounded structure)")]
    DepthExceeded {
        /// The nesting limit that was exceeded.
        limit: usize,
    },

    /// The value has no JSON representation (e.g. non-string map keys).
    #[error("value is not serializable as structured data: {0}")]
    NotSerializable(#[from] serde_json::Error),
}
