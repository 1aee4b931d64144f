//! # Version-Control Metadata
//!
//! Release seals record the commit and, when there is one, the exact tag
//! the sealed log was produced from. [`GitCli`] asks the `git` binary;
//! [`StaticVcs`] returns fixed values for pinned builds and tests.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::SealError;

/// Source of commit and tag information.
pub trait VcsMetadata {
    /// Identifier of the current commit.
    fn commit_id(&self) -> Result<String, SealError>;

    /// Tag pointing exactly at the current commit, if any.
    fn tag(&self) -> Result<Option<String>, SealError>;
}

/// Reads metadata from a git working tree via the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
}

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    fn git(&self, args: &[&str]) -> Result<Output, SealError> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .map_err(|e| SealError::Vcs(format!("cannot run git: {e}")))
    }
}

impl VcsMetadata for GitCli {
    fn commit_id(&self) -> Result<String, SealError> {
        let out = self.git(&["rev-parse", "HEAD"])?;
        if !out.status.success() {
            return Err(SealError::Vcs(format!(
                "git rev-parse HEAD failed in {}: {}",
                self.repo_dir.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        let commit = String::from_utf8_lossy(&out.stdout).trim().to_string();
        if commit.is_empty() {
            return Err(SealError::Vcs("git rev-parse HEAD returned nothing".into()));
        }
        Ok(commit)
    }

    fn tag(&self) -> Result<Option<String>, SealError> {
        let out = self.git(&["describe", "--tags", "--exact-match"])?;
        if !out.status.success() {
            // No tag on HEAD.
            return Ok(None);
        }
        let tag = String::from_utf8_lossy(&out.stdout).trim().to_string();
        Ok((!tag.is_empty()).then_some(tag))
    }
}

/// Fixed commit and tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticVcs {
    commit: String,
    tag: Option<String>,
}

impl StaticVcs {
    pub fn new(commit: impl Into<String>, tag: Option<&str>) -> Self {
        Self {
            commit: commit.into(),
            tag: tag.map(str::to_string),
        }
    }
}

impl VcsMetadata for StaticVcs {
    fn commit_id(&self) -> Result<String, SealError> {
        if self.commit.trim().is_empty() {
            return Err(SealError::Vcs("commit id is empty".into()));
        }
        Ok(self.commit.clone())
    }

    fn tag(&self) -> Result<Option<String>, SealError> {
        Ok(self.tag.clone())
    }
}
