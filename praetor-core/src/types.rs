//! Shared types for the risk-evaluation pipeline.

use serde::{Deserialize, Serialize};

/// Finding severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Resolved response to a set of findings, ordered by strictness.
/// `Alert` is log-only, `Throttle` is a soft signal (the request still
/// proceeds), `Block` terminates the request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EscalationAction {
    Alert,
    Throttle,
    Block,
}

/// The anomaly heuristic that produced a finding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    ExcessiveRequests,
    DataExfiltration,
    RapidRequests,
    ScatteredAccess,
    BehaviorChange,
}

/// One detected anomaly with its supporting evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    /// Observed value (count, byte total, mean interval ms, or ratio).
    pub value: f64,
    /// The configured threshold the value was compared against.
    pub threshold: f64,
    /// Preformatted message for audit consumption.
    pub message: String,
}

/// Aggregate of findings for one evaluation of a principal's window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    pub action: EscalationAction,
    pub findings: Vec<Finding>,
    pub principal_id: String,
    pub evaluated_at_ms: i64,
    /// Number of events in the window at evaluation time.
    pub event_count: usize,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: String,
}

/// Normalized view of an incoming request, read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub method: String,
    /// Bare path; drives resource derivation and policy checks.
    pub path: String,
    /// Path plus query string as received; what forwarding mirrors upstream.
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RequestDescriptor {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        let path = path.into();
        Self { method: method.into(), uri: path.clone(), path, payload }
    }

    /// Attach the original path-and-query for upstream forwarding.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Target mirrored onto the backend: the received path and query,
    /// falling back to the bare path when no query was captured.
    pub fn forward_uri(&self) -> &str {
        if self.uri.is_empty() {
            &self.path
        } else {
            &self.uri
        }
    }

    /// First non-empty path segment, e.g. `/clientes/123` yields `clientes`.
    pub fn resource(&self) -> Option<&str> {
        self.path.split('/').find(|s| !s.is_empty())
    }

    /// Serialized payload length in bytes. An absent payload counts as zero,
    /// and an unserializable one degrades to zero rather than failing.
    pub fn payload_size(&self) -> u64 {
        if self.payload.is_null() {
            return 0;
        }
        serde_json::to_vec(&self.payload)
            .map(|b| b.len() as u64)
            .unwrap_or(0)
    }
}

/// Logical action an HTTP method maps onto for policy checks.
/// Methods outside the read/write classes map to `Unknown`, which no
/// policy can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalAction {
    Read,
    Write,
    Unknown,
}

impl LogicalAction {
    pub fn from_method(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" | "HEAD" => LogicalAction::Read,
            "POST" | "PUT" | "PATCH" | "DELETE" => LogicalAction::Write,
            _ => LogicalAction::Unknown,
        }
    }

    pub fn permits(&self, allowed: PolicyAction) -> bool {
        matches!(
            (*self, allowed),
            (LogicalAction::Read, PolicyAction::Read)
                | (LogicalAction::Write, PolicyAction::Write)
        )
    }
}

/// An action a role policy can grant on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    Read,
    Write,
}

/// Why a request was denied by the policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    RoleNotFound,
    NoResourcePermission,
    ActionNotAllowed,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::RoleNotFound => "role_not_found",
            DenyReason::NoResourcePermission => "no_resource_permission",
            DenyReason::ActionNotAllowed => "action_not_allowed",
        }
    }
}

/// Outcome of the policy check for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
    /// Payload to forward upstream. Baseline behavior is identity
    /// pass-through; policy-driven filtering is an extension point.
    pub filtered_payload: Option<serde_json::Value>,
}

impl DecisionResult {
    pub fn allow(payload: serde_json::Value) -> Self {
        Self { allowed: true, reason: None, filtered_payload: Some(payload) }
    }

    pub fn deny(reason: DenyReason) -> Self {
        Self { allowed: false, reason: Some(reason), filtered_payload: None }
    }
}

/// One recorded request inside a principal's window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp_ms: i64,
    pub method: String,
    pub resource: String,
    pub payload_size: u64,
    pub status: u16,
}

/// One denied access attempt. Blocked attempts accumulate without pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedAttempt {
    pub timestamp_ms: i64,
    pub reason: String,
    pub method: String,
    pub path: String,
}

/// Activity summary for one tracked principal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_events: usize,
    pub events_last_5_min: usize,
    pub last_activity_ms: Option<i64>,
    pub blocked_attempts: usize,
}

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
