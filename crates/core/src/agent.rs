// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Long-lived agent configuration records.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an agent configuration.
    pub struct AgentId("agt_");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    Active,
    Inactive,
}

crate::simple_display! {
    AgentStatus {
        Active => "active",
        Inactive => "inactive",
    }
}

/// A long-lived agent configuration record, owning zero or more jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub slug: String,
    pub role: String,
    pub model_config: serde_json::Value,
    pub skill_config: serde_json::Value,
    pub resource_limits: serde_json::Value,
    pub channel_permissions: serde_json::Value,
    pub requires_approval: bool,
    pub status: AgentStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Agent {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            slug: slug.into(),
            role: String::new(),
            model_config: serde_json::json!({}),
            skill_config: serde_json::json!({}),
            resource_limits: serde_json::json!({}),
            channel_permissions: serde_json::json!({}),
            requires_approval: false,
            status: AgentStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    crate::setters! {
        into { role: String }
        set {
            model_config: serde_json::Value,
            skill_config: serde_json::Value,
            resource_limits: serde_json::Value,
            channel_permissions: serde_json::Value,
            requires_approval: bool,
        }
    }
}
