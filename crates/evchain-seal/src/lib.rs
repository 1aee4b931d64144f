//! # evchain-seal: Forensic Seals and the Seal Ledger
//!
//! A verified run is worth keeping only if it can be shown later that it
//! was verified. This crate turns verified chains (and release builds) into
//! self-hashing seal records and appends them to a hash-linked ledger.
//!
//! - [`seal`]: `RunSeal`, `ReleaseSeal` and their closed sum `SealRecord`.
//! - [`ledger`]: the `AppendOnlyLog` abstraction, in-memory and JSON-lines
//!   implementations, and whole-ledger verification.
//! - [`vcs`]: commit and tag lookup for release seals.
//!
//! The ledger is always passed in explicitly; nothing in this crate writes
//! to a fixed path.

pub mod error;
pub mod ledger;
pub mod seal;
pub mod vcs;

pub use error::SealError;
pub use ledger::{verify_entries, AppendOnlyLog, JsonlLedger, LedgerEntry, MemoryLedger, Sealer};
pub use seal::{seal_release, seal_run, ReleaseSeal, RunSeal, SealRecord};
pub use vcs::{GitCli, StaticVcs, VcsMetadata};
