//! # Canonical Serialization: JCS-Compatible Byte Production
//!
//! This module defines `CanonicalBytes`, the sole construction path for bytes
//! that are hashed anywhere in the evidence chain.
//!
//! ## Security Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only way to
//! construct it is through `CanonicalBytes::new()`, which runs the full
//! pipeline (bounded serialization, key ordering, RFC 8785 output). Any
//! function that needs hash input must accept `&CanonicalBytes`, so a stage
//! cannot accidentally hash a non-canonical rendering of its record.
//!
//! ## Rules
//!
//! 1. **Sequences** keep element order; every element is canonicalized.
//! 2. **Mappings** drop absent entries (fields skipped at serialization time,
//!    e.g. `Option::None` with `skip_serializing_if`), sort keys, and
//!    canonicalize every value. `null` is a value, not an absence.
//! 3. **Scalars** use the JSON literal form. Numbers use RFC 8785 (ECMAScript)
//!    formatting, so output never depends on locale or float printing quirks.
//! 4. **Depth** is bounded by [`MAX_NESTING_DEPTH`] while the value is being
//!    serialized. A cyclic `Serialize` impl fails fast with
//!    [`StructuralError::DepthExceeded`] instead of recursing forever.
//!
//! Key order is the RFC 8785 order (UTF-16 code units). It coincides with
//! code-point order for every key without supplementary-plane characters.
//!
//! ## Idempotence
//!
//! `canonicalize(&canonicalize(x)?)` always serializes to the same bytes as
//! `canonicalize(x)`. The verifier re-checks this on every evidence body.

use std::io;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::StructuralError;

/// Maximum container nesting accepted by the canonicalizer.
///
/// This is a payload limit as well as the cycle guard: acyclic values nested
/// deeper than this are rejected with `DepthExceeded`. It sits below
/// `serde_json`'s parse recursion limit (128) so the bounded re-parse step
/// can never be the one that fails. A `canonical_input` payload gets this
/// budget minus its envelope ([`PAYLOAD_ENVELOPE_DEPTH`]).
pub const MAX_NESTING_DEPTH: usize = 120;

/// Containers wrapped around a payload by the time it is hashed inside an
/// evidence unit: the unit itself and the input record in `canonical_json`.
pub const PAYLOAD_ENVELOPE_DEPTH: usize = 2;

/// Bytes produced exclusively by canonical serialization.
///
/// # Invariants
///
/// - The only constructor is `CanonicalBytes::new()`.
/// - Object keys are sorted, separators are compact (RFC 8785).
/// - The bytes are valid UTF-8 JSON.
///
/// These invariants are enforced by the constructor and cannot be violated
/// by downstream code because the inner `Vec<u8>` is private.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `StructuralError::DepthExceeded` for cyclic or overly deep
    /// values and `StructuralError::NotSerializable` for values without a
    /// JSON representation.
    pub fn new(obj: &impl Serialize) -> Result<Self, StructuralError> {
        let value = canonicalize(obj)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The canonical serialization as text.
    pub fn as_str(&self) -> &str {
        // The bytes come from a `String`; the fallback is unreachable.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Produce the canonical value tree of `obj`.
///
/// The result has every mapping rebuilt in sorted key order. Serializing it
/// (or passing it back through `canonicalize`) yields identical bytes.
///
/// # Errors
///
/// See [`CanonicalBytes::new`].
pub fn canonicalize(obj: &impl Serialize) -> Result<Value, StructuralError> {
    let value = to_bounded_value(obj)?;
    Ok(sort_value(value))
}

/// Serialize `obj` under the nesting guard, then re-read it as a `Value`.
fn to_bounded_value(obj: &impl Serialize) -> Result<Value, StructuralError> {
    let mut guard = DepthGuard::new(MAX_NESTING_DEPTH);
    if let Err(e) = serde_json::to_writer(&mut guard, obj) {
        if e.is_io() && guard.tripped {
            return Err(StructuralError::DepthExceeded {
                limit: MAX_NESTING_DEPTH,
            });
        }
        return Err(StructuralError::NotSerializable(e));
    }
    Ok(serde_json::from_slice(&guard.buf)?)
}

fn sort_value(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, sort_value(v));
            }
            Value::Object(sorted)
        }
        scalar => scalar,
    }
}

/// Writer that tracks JSON container depth in the compact byte stream
/// `serde_json` produces, and aborts the serialization once the limit is
/// crossed.
struct DepthGuard {
    buf: Vec<u8>,
    depth: usize,
    limit: usize,
    in_string: bool,
    escaped: bool,
    tripped: bool,
}

impl DepthGuard {
    fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            depth: 0,
            limit,
            in_string: false,
            escaped: false,
            tripped: false,
        }
    }
}

impl io::Write for DepthGuard {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        for &b in bytes {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                continue;
            }
            match b {
                b'"' => self.in_string = true,
                b'[' | b'{' => {
                    self.depth += 1;
                    if self.depth > self.limit {
                        self.tripped = true;
                        return Err(io::Error::other("nesting limit exceeded"));
                    }
                }
                b']' | b'}' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
        }
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
