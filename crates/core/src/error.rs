// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error kinds used at crate boundaries across the control plane.
//! Each downstream crate wraps these in its own `thiserror`-derived enum
//! rather than matching on them directly.

/// Abstract error kinds shared so callers across crates can pattern-match
/// on the same vocabulary.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("expired: {0}")]
    Expired(String),
}
