// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Approval gate domain types.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an approval request.
    pub struct ApprovalRequestId("apr_");
}

crate::define_id! {
    /// Unique identifier for an approval audit entry.
    pub struct ApprovalAuditEntryId("aae_");
}

/// Risk tier used to pick TTL, notification, and auto-approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    P0,
    P1,
    P2,
    P3,
}

crate::simple_display! {
    RiskLevel {
        P0 => "P0",
        P1 => "P1",
        P2 => "P2",
        P3 => "P3",
    }
}

impl RiskLevel {
    /// Default TTL by risk tier: P0/P1 = 24h, P2/P3 = 72h.
    pub fn default_ttl(self) -> chrono::Duration {
        match self {
            RiskLevel::P0 | RiskLevel::P1 => chrono::Duration::hours(24),
            RiskLevel::P2 | RiskLevel::P3 => chrono::Duration::hours(72),
        }
    }

    /// P3 requests are auto-approved at creation time.
    pub fn is_auto_approvable(self) -> bool {
        matches!(self, RiskLevel::P3)
    }
}

/// Upper bound on any approval TTL, regardless of risk tier.
pub const MAX_APPROVAL_TTL: chrono::Duration = chrono::Duration::days(7);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

crate::simple_display! {
    ApprovalStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Expired => "expired",
    }
}

/// A gate on a specific job action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalRequestId,
    pub job_id: crate::job::JobId,
    pub action_type: String,
    pub action_summary: String,
    pub action_detail: serde_json::Value,
    /// Lowercase 64-hex SHA-256 digest of the plaintext token.
    pub token_hash: String,
    pub status: ApprovalStatus,
    pub requested_at: chrono::DateTime<chrono::Utc>,
    pub decided_at: Option<chrono::DateTime<chrono::Utc>>,
    pub decided_by: Option<String>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub risk_level: RiskLevel,
    pub resume_payload: Option<serde_json::Value>,
    pub blast_radius: Option<String>,
    pub notification_channels: serde_json::Value,
    pub decision_note: Option<String>,
    /// Set when the request was pinned to a specific approver at creation time.
    pub approver_user_account_id: Option<String>,
}

/// Kind of event recorded in the append-only audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    RequestCreated,
    RequestDecided,
    RequestExpired,
    NotificationSent,
    UnauthorizedAttempt,
}

crate::simple_display! {
    AuditEventType {
        RequestCreated => "request_created",
        RequestDecided => "request_decided",
        RequestExpired => "request_expired",
        NotificationSent => "notification_sent",
        UnauthorizedAttempt => "unauthorized_attempt",
    }
}

/// An append-only audit log entry, hash-chained for `request_decided` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalAuditEntry {
    pub id: ApprovalAuditEntryId,
    pub approval_request_id: ApprovalRequestId,
    pub job_id: crate::job::JobId,
    pub event_type: AuditEventType,
    pub actor: Option<String>,
    pub channel: Option<String>,
    pub details: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
