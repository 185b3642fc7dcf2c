// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tamper-evident hash chain for approval audit entries.
//!
//! Each `request_decided` entry's hash folds in the previous entry's hash
//! for the same request, so mutating any field of any entry after write
//! breaks verification for every later entry — an append-only log without
//! a signing authority.

use crate::token::hex_lower;
use sha2::{Digest, Sha256};

/// A single link in the chain, as read back from storage.
#[derive(Debug, Clone)]
pub struct ChainEntry {
    pub request_id: String,
    pub decision: String,
    pub actor: String,
    pub decided_at: String,
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

/// Canonical, fixed-field-order serialization fed to SHA-256.
///
/// Field order and separators are fixed so the digest never depends on
/// incidental whitespace or key ordering.
fn canonical(request_id: &str, decision: &str, actor: &str, decided_at: &str, previous_hash: Option<&str>) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(request_id.as_bytes());
    buf.push(0);
    buf.extend_from_slice(decision.as_bytes());
    buf.push(0);
    buf.extend_from_slice(actor.as_bytes());
    buf.push(0);
    buf.extend_from_slice(decided_at.as_bytes());
    buf.push(0);
    buf.extend_from_slice(previous_hash.unwrap_or("").as_bytes());
    buf
}

/// Compute the chained entry hash for a `request_decided` event.
///
/// `previous_hash` is the last audit entry's `entry_hash` for the same
/// request, or `None` for the first entry.
pub fn compute_entry_hash(
    request_id: &str,
    decision: &str,
    actor: &str,
    decided_at: &str,
    previous_hash: Option<&str>,
) -> String {
    let bytes = canonical(request_id, decision, actor, decided_at, previous_hash);
    hex_lower(&Sha256::digest(&bytes))
}

/// Verify a chain of audit entries, ordered oldest-first.
///
/// Returns `true` iff every entry's hash recomputes to its stored value
/// and every entry's `previous_hash` equals the prior entry's `entry_hash`
/// (`None` only for the first entry).
pub fn verify_audit_chain(entries: &[ChainEntry]) -> bool {
    let mut expected_previous: Option<&str> = None;
    for entry in entries {
        if entry.previous_hash.as_deref() != expected_previous {
            return false;
        }
        let recomputed = compute_entry_hash(
            &entry.request_id,
            &entry.decision,
            &entry.actor,
            &entry.decided_at,
            entry.previous_hash.as_deref(),
        );
        if recomputed != entry.entry_hash {
            return false;
        }
        expected_previous = Some(entry.entry_hash.as_str());
    }
    true
}

#[cfg(test)]
#[path = "chain_tests.rs"]
mod tests;
