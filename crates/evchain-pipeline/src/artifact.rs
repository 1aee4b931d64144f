//! # Artifacts: Wire Records of the Binding Chain
//!
//! Every record in the chain carries a `type` discriminator and a `version`
//! string. Field names, their order and the hash formats are compatibility
//! surface: external verifiers recompute hashes over exactly these shapes.
//!
//! ## Construction
//!
//! [`CanonicalInput`] is caller data and has public fields. The four stage
//! artifacts have private fields and read accessors; new instances come only
//! from their producing stage ([`crate::evidence`], [`crate::meaning`],
//! [`crate::law`], [`crate::policy`]). Deserialization is allowed so stored
//! chains can be re-verified, but a deserialized artifact proves nothing
//! until [`crate::InvariantEnforcer`] accepts it.
//!
//! Optional fields are skipped when unset, so they are absent on the wire
//! and absent from every hash.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use evchain_core::{ChainError, Timestamp};

/// Schema version written into every artifact.
pub const SCHEMA_VERSION: &str = "v1.0";

/// The `type` discriminator of a chain record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    CanonicalInput,
    EvidenceUnit,
    MeaningState,
    LawVerdict,
    ActionPolicy,
}

impl ArtifactKind {
    /// The wire spelling of this discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CanonicalInput => "canonical_input",
            Self::EvidenceUnit => "evidence_unit",
            Self::MeaningState => "meaning_state",
            Self::LawVerdict => "law_verdict",
            Self::ActionPolicy => "action_policy",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CanonicalInput
// ---------------------------------------------------------------------------

/// The raw record handed to the evidence binder.
///
/// Top-level fields beyond the four named ones are kept in `extensions` and
/// are hashed along with the rest of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalInput {
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub version: String,
    pub timestamp: String,
    pub payload: Value,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl CanonicalInput {
    /// A `canonical_input` record at the current schema version.
    pub fn new(timestamp: Timestamp, payload: Value) -> Self {
        Self {
            kind: ArtifactKind::CanonicalInput,
            version: SCHEMA_VERSION.to_string(),
            timestamp: timestamp.to_iso8601(),
            payload,
            extensions: Map::new(),
        }
    }

    /// Validate a loosely typed record.
    ///
    /// # Errors
    ///
    /// `ChainError::InvalidInput` when a required field is missing or has
    /// the wrong JSON type, or when `type` is not a known discriminator.
    pub fn from_value(value: Value) -> Result<Self, ChainError> {
        serde_json::from_value(value)
            .map_err(|e| ChainError::InvalidInput(format!("malformed canonical_input: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Stage artifacts
// ---------------------------------------------------------------------------

/// Immutable, hash-identified wrapper around a canonicalized input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceUnit {
    #[serde(rename = "type")]
    pub(crate) kind: ArtifactKind,
    pub(crate) version: String,
    pub(crate) input_hash: String,
    pub(crate) canonical_json: Value,
    pub(crate) evidence_hash: String,
    pub(crate) notes: Option<String>,
}

impl EvidenceUnit {
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Hash of the canonicalized input record.
    pub fn input_hash(&self) -> &str {
        &self.input_hash
    }

    /// The canonical value tree of the input record.
    pub fn canonical_json(&self) -> &Value {
        &self.canonical_json
    }

    /// Hash of the canonical evidence shell. The identity of this unit.
    pub fn evidence_hash(&self) -> &str {
        &self.evidence_hash
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

/// Semantic fingerprint of a piece of evidence, with the drift flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeaningState {
    #[serde(rename = "type")]
    pub(crate) kind: ArtifactKind,
    pub(crate) version: String,
    pub(crate) evidence_hash: String,
    pub(crate) semantic_fingerprint: String,
    pub(crate) drift_score: i64,
}

impl MeaningState {
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The `evidence_hash` of the evidence unit this state was derived from.
    pub fn evidence_hash(&self) -> &str {
        &self.evidence_hash
    }

    pub fn semantic_fingerprint(&self) -> &str {
        &self.semantic_fingerprint
    }

    /// `0` when meaning is unchanged (or there is no baseline), `1` when the
    /// fingerprint moved.
    pub fn drift_score(&self) -> i64 {
        self.drift_score
    }
}

/// The rule-table outcome for a meaning state.
///
/// Unknown verdict strings are preserved as [`Verdict::Unrecognized`] so a
/// stored chain can still be loaded; the action table maps them to `HALT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Verdict {
    Stable,
    ChangeDetected,
    Unrecognized(String),
}

impl Verdict {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stable => "STABLE",
            Self::ChangeDetected => "CHANGE_DETECTED",
            Self::Unrecognized(s) => s,
        }
    }
}

impl From<String> for Verdict {
    fn from(s: String) -> Self {
        match s.as_str() {
            "STABLE" => Self::Stable,
            "CHANGE_DETECTED" => Self::ChangeDetected,
            _ => Self::Unrecognized(s),
        }
    }
}

impl From<&str> for Verdict {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<Verdict> for String {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Unrecognized(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic verdict over a meaning state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawVerdict {
    #[serde(rename = "type")]
    pub(crate) kind: ArtifactKind,
    pub(crate) version: String,
    pub(crate) meaning_fingerprint: String,
    pub(crate) verdict: Verdict,
    pub(crate) trace_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) law_fingerprint: Option<String>,
}

impl LawVerdict {
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The `semantic_fingerprint` of the meaning state that was judged.
    pub fn meaning_fingerprint(&self) -> &str {
        &self.meaning_fingerprint
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    /// Hash of `{meaning_fingerprint, verdict}`.
    pub fn trace_hash(&self) -> &str {
        &self.trace_hash
    }

    /// Fingerprint of the rule table that produced the verdict, when emitted.
    pub fn law_fingerprint(&self) -> Option<&str> {
        self.law_fingerprint.as_deref()
    }
}

/// What the driver should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Continue,
    Review,
    Halt,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "CONTINUE",
            Self::Review => "REVIEW",
            Self::Halt => "HALT",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyLevel {
    Normal,
    Elevated,
    Critical,
}

impl SafetyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Elevated => "ELEVATED",
            Self::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The action decision, forensically bound to the whole upstream chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPolicy {
    #[serde(rename = "type")]
    pub(crate) kind: ArtifactKind,
    pub(crate) version: String,
    pub(crate) verdict: Verdict,
    pub(crate) action: Action,
    pub(crate) safety_level: SafetyLevel,
    pub(crate) trace_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) policy_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) priority: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) requires_human: Option<bool>,
}

impl ActionPolicy {
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn safety_level(&self) -> SafetyLevel {
        self.safety_level
    }

    /// The forensic trace hash (see [`crate::trace`]).
    pub fn trace_hash(&self) -> &str {
        &self.trace_hash
    }

    pub fn policy_id(&self) -> Option<&str> {
        self.policy_id.as_deref()
    }

    pub fn priority(&self) -> Option<u8> {
        self.priority
    }

    pub fn requires_human(&self) -> Option<bool> {
        self.requires_human
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Any stage artifact, as loaded from a loosely typed record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Artifact {
    Evidence(EvidenceUnit),
    Meaning(MeaningState),
    Law(LawVerdict),
    Policy(ActionPolicy),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Evidence(a) => a.kind,
            Self::Meaning(a) => a.kind,
            Self::Law(a) => a.kind,
            Self::Policy(a) => a.kind,
        }
    }

    /// Dispatch on the `type` discriminator and parse the matching record.
    ///
    /// # Errors
    ///
    /// `ChainError::InvalidInput` when `type` is missing, names something
    /// other than a stage artifact, or the record does not parse as that
    /// artifact.
    pub fn from_value(value: Value) -> Result<Self, ChainError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainError::InvalidInput("record has no string `type` field".into()))?
            .to_string();

        let parsed = match kind.as_str() {
            "evidence_unit" => serde_json::from_value(value).map(Self::Evidence),
            "meaning_state" => serde_json::from_value(value).map(Self::Meaning),
            "law_verdict" => serde_json::from_value(value).map(Self::Law),
            "action_policy" => serde_json::from_value(value).map(Self::Policy),
            other => {
                return Err(ChainError::InvalidInput(format!(
                    "`{other}` is not a stage artifact type"
                )))
            }
        };
        parsed.map_err(|e| ChainError::InvalidInput(format!("malformed {kind}: {e}")))
    }
}

/// One artifact of each stage, as produced by a single run.
///
/// Serializes as `{evidence_unit, meaning_state, law_verdict, action_policy}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactChain {
    pub evidence_unit: EvidenceUnit,
    pub meaning_state: MeaningState,
    pub law_verdict: LawVerdict,
    pub action_policy: ActionPolicy,
}
