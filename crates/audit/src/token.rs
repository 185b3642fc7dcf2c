// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Approval token generation and format validation.
//!
//! Plaintext shape: `cortex_apr_1_<43-char base64url, no padding>` — 32
//! CSPRNG bytes, base64url-encoded without padding, version `1`. The
//! stored value is never the plaintext: it is the lowercase 64-hex
//! SHA-256 digest of it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const TOKEN_PREFIX: &str = "cortex_apr_1_";
const TOKEN_BYTES: usize = 32;
/// 32 raw bytes base64url-encoded without padding always yields 43 chars.
const TOKEN_BASE64_LEN: usize = 43;

/// Sample a fresh CSPRNG token and return its plaintext form.
///
/// The plaintext is shown to the caller exactly once; only its hash is
/// ever persisted.
pub fn generate_approval_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let encoded = URL_SAFE_NO_PAD.encode(bytes);
    format!("{TOKEN_PREFIX}{encoded}")
}

/// Lowercase 64-hex SHA-256 digest of a plaintext token.
pub fn hash_token(plaintext: &str) -> String {
    let digest = Sha256::digest(plaintext.as_bytes());
    hex_lower(&digest)
}

/// Validate that a string has the exact prefix/version/base64-alphabet shape
/// of a token this module generates, without consulting storage.
pub fn is_valid_token_format(candidate: &str) -> bool {
    let Some(rest) = candidate.strip_prefix(TOKEN_PREFIX) else {
        return false;
    };
    rest.len() == TOKEN_BASE64_LEN
        && rest.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
        })
}

pub(crate) fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
