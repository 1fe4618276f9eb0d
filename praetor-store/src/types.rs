//! Shared types for the audit/log collaborator.

use praetor_core::types::{now_ms, EscalationAction, Finding, FindingKind};
use serde::{Deserialize, Serialize};

/// Pipeline stage a record was emitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStage {
    AuthFailed,
    Pre,
    Block,
    Anomaly,
    Post,
    Error,
}

impl AuditStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStage::AuthFailed => "auth_failed",
            AuditStage::Pre => "pre",
            AuditStage::Block => "block",
            AuditStage::Anomaly => "anomaly",
            AuditStage::Post => "post",
            AuditStage::Error => "error",
        }
    }
}

/// One stage-tagged audit record, structured enough to reconstruct the
/// decision later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp_ms: i64,
    pub principal_id: Option<String>,
    pub stage: AuditStage,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl AuditRecord {
    pub fn new(
        stage: AuditStage,
        principal_id: Option<&str>,
        method: &str,
        path: &str,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            timestamp_ms: now_ms(),
            principal_id: principal_id.map(|s| s.to_string()),
            stage,
            method: method.to_string(),
            path: path.to_string(),
            detail,
        }
    }
}

/// A gateway event persisted to `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub timestamp_ms: i64,
    pub user_id: Option<String>,
    pub stage: AuditStage,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StoredEvent {
    pub fn new(stage: AuditStage, user_id: Option<&str>, method: &str, path: &str) -> Self {
        Self {
            timestamp_ms: now_ms(),
            user_id: user_id.map(|s| s.to_string()),
            stage,
            method: method.to_string(),
            path: path.to_string(),
            status: None,
            payload_size: None,
            response_size: None,
            reason: None,
        }
    }
}

/// A detected anomaly persisted to `anomalies.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAnomaly {
    pub timestamp_ms: i64,
    pub user_id: String,
    pub action: EscalationAction,
    pub findings: Vec<Finding>,
    pub event_count: usize,
}

/// A denied access attempt persisted to `blocked_attempts.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBlockedAttempt {
    pub timestamp_ms: i64,
    pub user_id: String,
    pub reason: String,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finding_kinds: Vec<FindingKind>,
}
