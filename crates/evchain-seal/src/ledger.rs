//! # Seal Ledger
//!
//! An append-only, hash-linked log of [`SealRecord`]s.
//!
//! ## Entry derivation
//!
//! ```text
//! entry_hash = SHA256(JCS({position, previous_hash, record}))
//! ```
//!
//! `previous_hash` of the first entry is [`GENESIS_HASH`]; every later entry
//! links to the `entry_hash` of the one before it.
//!
//! ## Integrity Invariants
//!
//! - Positions are dense from `0`.
//! - `entry.previous_hash == previous_entry.entry_hash`.
//! - `entry.entry_hash` recomputes from the entry.
//! - Every record verifies on its own.
//!
//! [`verify_entries`] checks all four and reports the first bad position.
//! Appends take `&mut self`; [`JsonlLedger`] additionally serializes
//! appends from independent handles with a file lock.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use evchain_core::{sha256_hex, CanonicalBytes, Timestamp};
use evchain_pipeline::{ArtifactChain, CanonicalInput, DriftMetric, Pipeline};

use crate::error::SealError;
use crate::seal::{seal_release, seal_run, ReleaseSeal, RunSeal, SealRecord};
use crate::vcs::VcsMetadata;

/// `previous_hash` of the entry at position 0.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One record in the ledger, with its position and hash link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub position: u64,
    pub previous_hash: String,
    pub entry_hash: String,
    pub record: SealRecord,
}

#[derive(Serialize)]
struct EntryBody<'a> {
    position: u64,
    previous_hash: &'a str,
    record: &'a SealRecord,
}

impl LedgerEntry {
    /// Build the entry at `position`, linked to `previous_hash`.
    pub fn new(
        position: u64,
        previous_hash: impl Into<String>,
        record: SealRecord,
    ) -> Result<Self, SealError> {
        let mut entry = Self {
            position,
            previous_hash: previous_hash.into(),
            entry_hash: String::new(),
            record,
        };
        entry.entry_hash = entry.compute_hash()?;
        Ok(entry)
    }

    /// Recompute `entry_hash`, ignoring the stored value.
    pub fn compute_hash(&self) -> Result<String, SealError> {
        let body = EntryBody {
            position: self.position,
            previous_hash: &self.previous_hash,
            record: &self.record,
        };
        Ok(sha256_hex(&CanonicalBytes::new(&body)?))
    }
}

/// Check density, hash links, entry hashes and record hashes.
pub fn verify_entries(entries: &[LedgerEntry]) -> Result<(), SealError> {
    let mut previous = GENESIS_HASH.to_string();
    for (index, entry) in entries.iter().enumerate() {
        let position = index as u64;
        let corrupted = |reason: String| SealError::LedgerCorrupted { position, reason };

        if entry.position != position {
            return Err(corrupted(format!(
                "entry records position {}",
                entry.position
            )));
        }
        if entry.previous_hash != previous {
            return Err(corrupted(format!(
                "previous_hash {} does not link to {previous}",
                entry.previous_hash
            )));
        }
        let expected = entry.compute_hash()?;
        if entry.entry_hash != expected {
            return Err(corrupted(format!(
                "entry_hash mismatch: stored {}, recomputed {expected}",
                entry.entry_hash
            )));
        }
        entry
            .record
            .verify()
            .map_err(|e| corrupted(format!("{} record: {e}", entry.record.kind())))?;
        previous = entry.entry_hash.clone();
    }
    Ok(())
}

/// Append-only storage for seal records.
pub trait AppendOnlyLog {
    /// Append `record` and return its position.
    fn append(&mut self, record: &SealRecord) -> Result<u64, SealError>;

    /// All entries in position order.
    fn entries(&self) -> Result<Vec<LedgerEntry>, SealError>;

    /// Number of entries.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load and verify every entry.
    fn verify(&self) -> Result<(), SealError> {
        verify_entries(&self.entries()?)
    }
}

// ---------------------------------------------------------------------------
// MemoryLedger
// ---------------------------------------------------------------------------

/// Ledger held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    entries: Vec<LedgerEntry>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AppendOnlyLog for MemoryLedger {
    fn append(&mut self, record: &SealRecord) -> Result<u64, SealError> {
        let position = self.entries.len() as u64;
        let previous = self
            .entries
            .last()
            .map(|e| e.entry_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        self.entries
            .push(LedgerEntry::new(position, previous, record.clone())?);
        Ok(position)
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>, SealError> {
        Ok(self.entries.clone())
    }

    fn len(&self) -> u64 {
        self.entries.len() as u64
    }
}

// ---------------------------------------------------------------------------
// JsonlLedger
// ---------------------------------------------------------------------------

/// Ledger stored as one JSON entry per line.
///
/// Opening an existing file verifies it and resumes after its last entry.
/// A corrupted file refuses to open, so nothing is ever appended after a
/// broken link.
///
/// Several handles (in one process or many) may share a file. Every append
/// takes an exclusive `flock` on the ledger, re-reads and re-verifies it
/// under the lock, and links to the tail it finds there rather than to the
/// tail cached at `open`. Reads take a shared lock so they never see a
/// half-written line.
#[derive(Debug)]
pub struct JsonlLedger {
    path: PathBuf,
    len: u64,
    head_hash: String,
}

impl JsonlLedger {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SealError> {
        let mut ledger = Self {
            path: path.into(),
            len: 0,
            head_hash: GENESIS_HASH.to_string(),
        };
        if ledger.path.exists() {
            let entries = read_entries_shared(&ledger.path)?;
            verify_entries(&entries)?;
            ledger.resume_from(&entries);
        }
        tracing::debug!(path = %ledger.path.display(), entries = ledger.len, "ledger opened");
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `entry_hash` of the last entry seen by this handle, or
    /// [`GENESIS_HASH`] when empty.
    pub fn head_hash(&self) -> &str {
        &self.head_hash
    }

    fn resume_from(&mut self, entries: &[LedgerEntry]) {
        self.len = entries.len() as u64;
        self.head_hash = entries
            .last()
            .map(|e| e.entry_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
    }
}

impl AppendOnlyLog for JsonlLedger {
    fn append(&mut self, record: &SealRecord) -> Result<u64, SealError> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        // Held until `file` drops at the end of this call.
        file.lock_exclusive()?;

        let entries = read_entries(&file)?;
        verify_entries(&entries)?;
        if entries.len() as u64 != self.len {
            tracing::debug!(
                path = %self.path.display(),
                cached = self.len,
                on_disk = entries.len(),
                "ledger advanced by another writer"
            );
        }
        self.resume_from(&entries);

        let position = self.len;
        let entry = LedgerEntry::new(position, self.head_hash.clone(), record.clone())?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.sync_data()?;

        self.len += 1;
        self.head_hash = entry.entry_hash;
        Ok(position)
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>, SealError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        read_entries_shared(&self.path)
    }

    fn len(&self) -> u64 {
        self.len
    }
}

fn read_entries_shared(path: &Path) -> Result<Vec<LedgerEntry>, SealError> {
    let file = File::open(path)?;
    file.lock_shared()?;
    read_entries(&file)
}

/// Parse every entry of `file` from the start.
fn read_entries(mut file: &File) -> Result<Vec<LedgerEntry>, SealError> {
    file.seek(SeekFrom::Start(0))?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line).map_err(|e| SealError::LedgerCorrupted {
            position: entries.len() as u64,
            reason: format!("unreadable entry: {e}"),
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Sealer
// ---------------------------------------------------------------------------

/// Builds seals and appends them to a ledger.
#[derive(Debug)]
pub struct Sealer<L> {
    ledger: L,
}

impl<L: AppendOnlyLog> Sealer<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn into_inner(self) -> L {
        self.ledger
    }

    /// Verify and seal an existing chain.
    pub fn seal_chain(
        &mut self,
        chain: &ArtifactChain,
        label: &str,
        timestamp: Timestamp,
    ) -> Result<(u64, RunSeal), SealError> {
        let seal = seal_run(chain, label, timestamp)?;
        let position = self.ledger.append(&SealRecord::Run(seal.clone()))?;
        tracing::info!(position, label, forensic_hash = %seal.forensic_hash, "run seal appended");
        Ok((position, seal))
    }

    /// Pass the replay lock on `input`, then run, verify and seal it.
    pub fn seal_input<M: DriftMetric>(
        &mut self,
        pipeline: &Pipeline<M>,
        input: &CanonicalInput,
        label: &str,
        timestamp: Timestamp,
    ) -> Result<(u64, RunSeal), SealError> {
        pipeline.replay(input)?;
        let chain = pipeline.run(input, None)?;
        self.seal_chain(&chain, label, timestamp)
    }

    /// Seal `log` against the current commit.
    pub fn seal_release(
        &mut self,
        vcs: &impl VcsMetadata,
        log: &str,
        timestamp: Timestamp,
    ) -> Result<(u64, ReleaseSeal), SealError> {
        let seal = seal_release(vcs, log, timestamp)?;
        let position = self.ledger.append(&SealRecord::Release(seal.clone()))?;
        tracing::info!(
            position,
            commit = %seal.commit_hash,
            tag = %seal.tag,
            "release seal appended"
        );
        Ok((position, seal))
    }
}
