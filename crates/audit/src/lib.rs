// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cortex-audit: token generation and the hash-chained approval audit log.

pub mod chain;
pub mod token;

pub use chain::{compute_entry_hash, verify_audit_chain, ChainEntry};
pub use token::{generate_approval_token, hash_token, is_valid_token_format, TOKEN_PREFIX};
