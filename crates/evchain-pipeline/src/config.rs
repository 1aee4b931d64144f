//! # Pipeline Configuration
//!
//! Loaded from a YAML file; every field has a default, so an empty file (or
//! no file) yields [`PipelineConfig::default()`]. Environment variables
//! override the file:
//!
//! | Variable                         | Field                      |
//! |----------------------------------|----------------------------|
//! | `EVCHAIN_EMIT_LAW_FINGERPRINT`   | `law.emit_law_fingerprint` |
//! | `EVCHAIN_ANNOTATE_POLICY`        | `policy.annotate`          |
//! | `EVCHAIN_ENFORCE_ON_RUN`         | `enforce_on_run`           |
//!
//! Accepted boolean spellings: `true/false`, `1/0`, `yes/no`, `on/off`.
//!
//! ```yaml
//! law:
//!   emit_law_fingerprint: true
//! policy:
//!   annotate: true
//! enforce_on_run: true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use evchain_core::ChainError;

pub const ENV_EMIT_LAW_FINGERPRINT: &str = "EVCHAIN_EMIT_LAW_FINGERPRINT";
pub const ENV_ANNOTATE_POLICY: &str = "EVCHAIN_ANNOTATE_POLICY";
pub const ENV_ENFORCE_ON_RUN: &str = "EVCHAIN_ENFORCE_ON_RUN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub law: LawConfig,
    pub policy: PolicyConfig,
    /// Run the invariant enforcer on every chain the pipeline produces.
    pub enforce_on_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LawConfig {
    /// Attach the rule-table fingerprint to every verdict.
    pub emit_law_fingerprint: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Write `policy_id`, `priority` and `requires_human` into policies.
    pub annotate: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            law: LawConfig::default(),
            policy: PolicyConfig::default(),
            enforce_on_run: true,
        }
    }
}

impl PipelineConfig {
    /// Parse a YAML document. An empty document is the default config.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ChainError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
            .map_err(|e| ChainError::InvalidInput(format!("invalid pipeline config: {e}")))
    }

    /// Read and parse a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ChainError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChainError::InvalidInput(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Apply `EVCHAIN_*` environment overrides.
    pub fn apply_env(self) -> Result<Self, ChainError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ChainError> {
        if let Some(v) = lookup(ENV_EMIT_LAW_FINGERPRINT) {
            self.law.emit_law_fingerprint = parse_flag(ENV_EMIT_LAW_FINGERPRINT, &v)?;
        }
        if let Some(v) = lookup(ENV_ANNOTATE_POLICY) {
            self.policy.annotate = parse_flag(ENV_ANNOTATE_POLICY, &v)?;
        }
        if let Some(v) = lookup(ENV_ENFORCE_ON_RUN) {
            self.enforce_on_run = parse_flag(ENV_ENFORCE_ON_RUN, &v)?;
        }
        Ok(self)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ChainError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ChainError::InvalidInput(format!(
            "{key} must be a boolean, got {other:?}"
        ))),
    }
}
