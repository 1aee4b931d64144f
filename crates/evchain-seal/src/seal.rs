//! # Forensic Seal Records
//!
//! Two kinds of seal, both self-hashing:
//!
//! - **Run seal** (`forensic_run_seal`): the stage hashes of one chain that
//!   passed the enforcer, plus a `forensic_hash` over the whole record.
//! - **Release seal** (`forensic_evidence_seal`): ties a test log to the
//!   commit and tag it was produced from.
//!
//! ## Hash derivation
//!
//! ```text
//! forensic_hash  = SHA256(JCS(run seal with `type`, without `forensic_hash`))
//! log_hash       = SHA256(JCS(log text))
//! composite_hash = SHA256(JCS({commit_hash, tag, log_hash}))
//! ```
//!
//! ## Security Invariant
//!
//! [`seal_run`] re-runs the enforcer on the chain it is given. A run seal
//! therefore never exists for a chain that does not verify.

use serde::{Deserialize, Serialize};

use evchain_core::{sha256_hex, CanonicalBytes, Timestamp};
use evchain_pipeline::{enforce_system_invariants, ArtifactChain, SCHEMA_VERSION};

use crate::error::SealError;
use crate::vcs::VcsMetadata;

pub const RUN_SEAL_TYPE: &str = "forensic_run_seal";
pub const RELEASE_SEAL_TYPE: &str = "forensic_evidence_seal";

/// Tag recorded when the sealed commit carries no exact tag.
pub const UNRELEASED_TAG: &str = "UNRELEASED";

/// The only result a run seal can record.
pub const RESULT_PASS: &str = "PASS";

fn digest_of(value: &impl Serialize) -> Result<String, SealError> {
    Ok(sha256_hex(&CanonicalBytes::new(value)?))
}

// ---------------------------------------------------------------------------
// Run seal
// ---------------------------------------------------------------------------

/// Seal over one verified chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSeal {
    pub version: String,
    /// Free-form name of what was run (test name, job id).
    pub label: String,
    pub timestamp: Timestamp,
    pub input_hash: String,
    pub evidence_hash: String,
    pub meaning_fingerprint: String,
    pub law_trace: String,
    pub policy_trace: String,
    pub result: String,
    pub forensic_hash: String,
}

#[derive(Serialize)]
struct RunSealBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    version: &'a str,
    label: &'a str,
    timestamp: &'a Timestamp,
    input_hash: &'a str,
    evidence_hash: &'a str,
    meaning_fingerprint: &'a str,
    law_trace: &'a str,
    policy_trace: &'a str,
    result: &'a str,
}

impl RunSeal {
    /// Recompute `forensic_hash` from the other fields.
    pub fn compute_forensic_hash(&self) -> Result<String, SealError> {
        digest_of(&RunSealBody {
            kind: RUN_SEAL_TYPE,
            version: &self.version,
            label: &self.label,
            timestamp: &self.timestamp,
            input_hash: &self.input_hash,
            evidence_hash: &self.evidence_hash,
            meaning_fingerprint: &self.meaning_fingerprint,
            law_trace: &self.law_trace,
            policy_trace: &self.policy_trace,
            result: &self.result,
        })
    }

    pub fn verify(&self) -> Result<(), SealError> {
        if self.result != RESULT_PASS {
            return Err(SealError::Verification(format!(
                "run seal records result {:?}",
                self.result
            )));
        }
        let expected = self.compute_forensic_hash()?;
        if expected != self.forensic_hash {
            return Err(SealError::Verification(format!(
                "forensic_hash mismatch: stored {}, recomputed {expected}",
                self.forensic_hash
            )));
        }
        Ok(())
    }

    /// Whether this seal was taken over `chain`.
    pub fn matches_chain(&self, chain: &ArtifactChain) -> bool {
        self.input_hash == chain.evidence_unit.input_hash()
            && self.evidence_hash == chain.evidence_unit.evidence_hash()
            && self.meaning_fingerprint == chain.meaning_state.semantic_fingerprint()
            && self.law_trace == chain.law_verdict.trace_hash()
            && self.policy_trace == chain.action_policy.trace_hash()
    }
}

/// Seal a chain after re-verifying it.
///
/// # Errors
///
/// `SealError::Chain` carrying the invariant violation if the chain does
/// not verify.
pub fn seal_run(
    chain: &ArtifactChain,
    label: &str,
    timestamp: Timestamp,
) -> Result<RunSeal, SealError> {
    enforce_system_invariants(chain)?;

    let mut seal = RunSeal {
        version: SCHEMA_VERSION.to_string(),
        label: label.to_string(),
        timestamp,
        input_hash: chain.evidence_unit.input_hash().to_string(),
        evidence_hash: chain.evidence_unit.evidence_hash().to_string(),
        meaning_fingerprint: chain.meaning_state.semantic_fingerprint().to_string(),
        law_trace: chain.law_verdict.trace_hash().to_string(),
        policy_trace: chain.action_policy.trace_hash().to_string(),
        result: RESULT_PASS.to_string(),
        forensic_hash: String::new(),
    };
    seal.forensic_hash = seal.compute_forensic_hash()?;

    tracing::debug!(label, forensic_hash = %seal.forensic_hash, "run sealed");
    Ok(seal)
}

// ---------------------------------------------------------------------------
// Release seal
// ---------------------------------------------------------------------------

/// Seal tying a test log to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSeal {
    pub version: String,
    pub timestamp: Timestamp,
    pub commit_hash: String,
    pub tag: String,
    pub log_hash: String,
    pub composite_hash: String,
}

#[derive(Serialize)]
struct Composite<'a> {
    commit_hash: &'a str,
    tag: &'a str,
    log_hash: &'a str,
}

impl ReleaseSeal {
    pub fn compute_composite_hash(&self) -> Result<String, SealError> {
        digest_of(&Composite {
            commit_hash: &self.commit_hash,
            tag: &self.tag,
            log_hash: &self.log_hash,
        })
    }

    pub fn verify(&self) -> Result<(), SealError> {
        let expected = self.compute_composite_hash()?;
        if expected != self.composite_hash {
            return Err(SealError::Verification(format!(
                "composite_hash mismatch: stored {}, recomputed {expected}",
                self.composite_hash
            )));
        }
        Ok(())
    }

    /// Verify the seal and check that it was taken over `log`.
    pub fn verify_log(&self, log: &str) -> Result<(), SealError> {
        self.verify()?;
        let expected = digest_of(&log)?;
        if expected != self.log_hash {
            return Err(SealError::Verification(
                "log does not match the sealed log_hash".into(),
            ));
        }
        Ok(())
    }
}

/// Seal `log` against the current commit of `vcs`.
pub fn seal_release(
    vcs: &impl VcsMetadata,
    log: &str,
    timestamp: Timestamp,
) -> Result<ReleaseSeal, SealError> {
    let commit_hash = vcs.commit_id()?;
    let tag = vcs.tag()?.unwrap_or_else(|| UNRELEASED_TAG.to_string());

    let mut seal = ReleaseSeal {
        version: SCHEMA_VERSION.to_string(),
        timestamp,
        commit_hash,
        tag,
        log_hash: digest_of(&log)?,
        composite_hash: String::new(),
    };
    seal.composite_hash = seal.compute_composite_hash()?;

    tracing::debug!(
        commit = %seal.commit_hash,
        tag = %seal.tag,
        composite_hash = %seal.composite_hash,
        "release sealed"
    );
    Ok(seal)
}

// ---------------------------------------------------------------------------
// SealRecord
// ---------------------------------------------------------------------------

/// Any seal, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SealRecord {
    #[serde(rename = "forensic_run_seal")]
    Run(RunSeal),
    #[serde(rename = "forensic_evidence_seal")]
    Release(ReleaseSeal),
}

impl SealRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Run(_) => RUN_SEAL_TYPE,
            Self::Release(_) => RELEASE_SEAL_TYPE,
        }
    }

    pub fn verify(&self) -> Result<(), SealError> {
        match self {
            Self::Run(seal) => seal.verify(),
            Self::Release(seal) => seal.verify(),
        }
    }
}

impl From<RunSeal> for SealRecord {
    fn from(seal: RunSeal) -> Self {
        Self::Run(seal)
    }
}

impl From<ReleaseSeal> for SealRecord {
    fn from(seal: ReleaseSeal) -> Self {
        Self::Release(seal)
    }
}
