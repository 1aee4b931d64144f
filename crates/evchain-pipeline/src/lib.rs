//! # evchain-pipeline: Evidence → Meaning → Law → Policy
//!
//! The binding chain proper. An input record is canonicalized and hashed
//! into an [`EvidenceUnit`]; each following stage derives its artifact from
//! the previous one and carries that artifact's hash forward:
//!
//! ```text
//! CanonicalInput ─bind_evidence─▶ EvidenceUnit
//!                ─stabilize_meaning─▶ MeaningState
//!                ─evaluate_law─▶ LawVerdict
//!                ─generate_action_policy─▶ ActionPolicy
//! ```
//!
//! The [`InvariantEnforcer`] is not a stage. It re-derives every expected
//! value from the finished [`ArtifactChain`] and rejects the chain on the
//! first mismatch.
//!
//! ## Crate Policy
//!
//! - Every stage is a pure function of its inputs. No clocks, no I/O, no
//!   global state; the previous `MeaningState` is always caller-owned.
//! - Artifacts are built only by their producing stage. Deserialized
//!   artifacts are untrusted until they pass the enforcer.
//! - Every error is fatal to the run.

pub mod artifact;
pub mod config;
pub mod evidence;
pub mod invariants;
pub mod law;
pub mod meaning;
pub mod pipeline;
pub mod policy;
pub mod trace;

pub use artifact::{
    Action, ActionPolicy, Artifact, ArtifactChain, ArtifactKind, CanonicalInput, EvidenceUnit,
    LawVerdict, MeaningState, SafetyLevel, Verdict, SCHEMA_VERSION,
};
pub use config::{LawConfig, PipelineConfig, PolicyConfig};
pub use evidence::bind_evidence;
pub use invariants::{enforce_system_invariants, InvariantEnforcer};
pub use law::{evaluate_law, LawEvaluator};
pub use meaning::{stabilize_meaning, DriftMetric, FingerprintDrift, MeaningStabilizer};
pub use pipeline::{Pipeline, ReplayReport};
pub use policy::{generate_action_policy, PolicyGenerator};
