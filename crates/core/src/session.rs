// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversational session and message records.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a conversational session.
    pub struct SessionId("ses_");
}

crate::define_id! {
    /// Unique identifier for a single session message.
    pub struct SessionMessageId("msg_");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Closed,
}

crate::simple_display! {
    SessionStatus {
        Active => "active",
        Closed => "closed",
    }
}

/// A conversational thread between a user account and an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub agent_id: crate::agent::AgentId,
    pub status: SessionStatus,
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Session {
    pub fn new(agent_id: crate::agent::AgentId, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            id: SessionId::new(),
            agent_id,
            status: SessionStatus::Active,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

crate::simple_display! {
    MessageRole {
        User => "user",
        Assistant => "assistant",
    }
}

/// A single user/assistant turn, used to reconstruct conversation history.
/// Created when a message is dispatched or a text output event is observed;
/// never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub id: SessionMessageId,
    pub session_id: SessionId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
