// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cortex-approval: the approval-gate service sitting on top of
//! `cortex-storage` and `cortex-audit`.

pub mod service;

pub use service::{ApprovalError, ApprovalService, CreatedRequest, NewRequest};
