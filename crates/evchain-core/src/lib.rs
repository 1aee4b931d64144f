//! # evchain-core: Foundational Types for the Evidence Chain
//!
//! This crate is the leaf of the evchain dependency graph. It owns the
//! primitives every binding stage relies on: the canonical serialization,
//! the content digest, UTC timestamps, and the error taxonomy.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** ALL hash computation flows through
//!    `CanonicalBytes::new()`. No raw `serde_json::to_vec()` for digests.
//!    Two executions over the same logical value hash the same bytes.
//!
//! 2. **`sha256_hex()` accepts only `&CanonicalBytes`.** Compile-time
//!    enforcement that every stage hash is a hash of canonical bytes.
//!
//! 3. **Fail closed.** Cyclic or unbounded input is a `StructuralError`,
//!    never an infinite loop or a silently truncated value.
//!
//! 4. **UTC-only timestamps.** `Timestamp` renders `YYYY-MM-DDTHH:MM:SSZ`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `evchain-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::{canonicalize, CanonicalBytes, MAX_NESTING_DEPTH, PAYLOAD_ENVELOPE_DEPTH};
pub use digest::{is_sha256_hex, sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm};
pub use error::{ChainError, InvariantCode, InvariantViolation, StructuralError};
pub use temporal::Timestamp;
