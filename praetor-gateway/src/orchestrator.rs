//! Per-request pipeline: authenticate, decide, assess behavior, forward,
//! audit. Terminal at the first applicable exit; every transition emits a
//! stage-tagged audit record.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, warn};

use praetor_core::decision::DecisionEngine;
use praetor_core::detector::AnomalyDetector;
use praetor_core::escalation::EscalationPolicy;
use praetor_core::policy::PolicyStore;
use praetor_core::tracker::BehaviorTracker;
use praetor_core::types::{now_ms, EscalationAction, RequestDescriptor};
use praetor_core::CoreResult;
use praetor_store::audit::AuditSink;
use praetor_store::log_store::LogStore;
use praetor_store::types::{
    AuditRecord, AuditStage, StoredAnomaly, StoredBlockedAttempt, StoredEvent,
};

use crate::auth::Authenticator;
use crate::forwarder::Forwarder;

/// Boundary response the HTTP layer maps 1:1 onto the wire.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: Value,
}

pub struct Gateway {
    policy: Arc<PolicyStore>,
    tracker: Arc<BehaviorTracker>,
    detector: AnomalyDetector,
    authenticator: Arc<dyn Authenticator>,
    forwarder: Arc<dyn Forwarder>,
    audit: Arc<dyn AuditSink>,
    store: Arc<LogStore>,
}

impl Gateway {
    pub fn new(
        policy: Arc<PolicyStore>,
        tracker: Arc<BehaviorTracker>,
        authenticator: Arc<dyn Authenticator>,
        forwarder: Arc<dyn Forwarder>,
        audit: Arc<dyn AuditSink>,
        store: Arc<LogStore>,
    ) -> Self {
        Self {
            policy,
            tracker,
            detector: AnomalyDetector::new(),
            authenticator,
            forwarder,
            audit,
            store,
        }
    }

    pub fn policy(&self) -> &PolicyStore {
        &self.policy
    }

    pub fn tracker(&self) -> &BehaviorTracker {
        &self.tracker
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    /// Run one request through the pipeline. Any unexpected internal fault
    /// is caught here and surfaced as a generic 503.
    pub async fn handle(&self, token: Option<&str>, request: RequestDescriptor) -> GatewayResponse {
        match self.process(token, &request).await {
            Ok(response) => response,
            Err(err) => {
                error!(%err, method = %request.method, path = %request.path, "pipeline failure");
                self.audit.record(&AuditRecord::new(
                    AuditStage::Error,
                    None,
                    &request.method,
                    &request.path,
                    json!({ "error": err.to_string() }),
                ));
                let mut event =
                    StoredEvent::new(AuditStage::Error, None, &request.method, &request.path);
                event.reason = Some(err.to_string());
                self.store.log_event(&event);
                GatewayResponse {
                    status: 503,
                    body: json!({ "error": "Gateway Failure" }),
                }
            }
        }
    }

    async fn process(
        &self,
        token: Option<&str>,
        request: &RequestDescriptor,
    ) -> CoreResult<GatewayResponse> {
        // 1. Authentication (external seam)
        let Some(principal) = token.and_then(|t| self.authenticator.validate(t)) else {
            self.audit.record(&AuditRecord::new(
                AuditStage::AuthFailed,
                None,
                &request.method,
                &request.path,
                Value::Null,
            ));
            let mut event =
                StoredEvent::new(AuditStage::AuthFailed, None, &request.method, &request.path);
            event.reason = Some("invalid or missing bearer token".into());
            self.store.log_event(&event);
            return Ok(GatewayResponse {
                status: 401,
                body: json!({ "error": "Unauthorized" }),
            });
        };

        // 2–3. Policy check
        let role_policy = self.policy.role(&principal.role);
        let decision = DecisionEngine::evaluate(&principal, request, role_policy);
        self.audit.record(&AuditRecord::new(
            AuditStage::Pre,
            Some(&principal.id),
            &request.method,
            &request.path,
            json!({ "allowed": decision.allowed, "reason": decision.reason }),
        ));

        if !decision.allowed {
            let reason = decision
                .reason
                .map(|r| r.as_str())
                .unwrap_or("policy_denied");
            self.audit.record(&AuditRecord::new(
                AuditStage::Block,
                Some(&principal.id),
                &request.method,
                &request.path,
                json!({ "reason": reason }),
            ));
            self.tracker.record_blocked_attempt(&principal.id, reason, request);
            self.store.log_blocked_attempt(&StoredBlockedAttempt {
                timestamp_ms: now_ms(),
                user_id: principal.id.clone(),
                reason: reason.to_string(),
                method: request.method.clone(),
                path: request.path.clone(),
                resource: request.resource().map(|r| r.to_string()),
                finding_kinds: Vec::new(),
            });
            return Ok(GatewayResponse {
                status: 403,
                body: json!({ "error": "Forbidden", "reason": reason }),
            });
        }

        // 4. Behavioral assessment. Window snapshot and append happen under
        // the principal's record lock; nothing is held across the forward.
        let profile = self.policy.profile_for(&principal.role);
        let window =
            self.tracker
                .record_and_window(&principal.id, request, 200, profile.time_window_ms);
        let findings = self.detector.detect(&principal.id, &window, &profile);

        if let Some(verdict) = EscalationPolicy::verdict(&principal.id, findings, window.len()) {
            self.audit.record(&AuditRecord::new(
                AuditStage::Anomaly,
                Some(&principal.id),
                &request.method,
                &request.path,
                serde_json::to_value(&verdict)?,
            ));
            self.store.log_anomaly(&StoredAnomaly {
                timestamp_ms: verdict.evaluated_at_ms,
                user_id: principal.id.clone(),
                action: verdict.action,
                findings: verdict.findings.clone(),
                event_count: verdict.event_count,
            });

            match verdict.action {
                EscalationAction::Block => {
                    self.tracker
                        .record_blocked_attempt(&principal.id, "anomaly_detected", request);
                    self.store.log_blocked_attempt(&StoredBlockedAttempt {
                        timestamp_ms: verdict.evaluated_at_ms,
                        user_id: principal.id.clone(),
                        reason: "anomaly_detected".into(),
                        method: request.method.clone(),
                        path: request.path.clone(),
                        resource: request.resource().map(|r| r.to_string()),
                        finding_kinds: verdict.findings.iter().map(|f| f.kind).collect(),
                    });
                    let anomalies: Vec<Value> = verdict
                        .findings
                        .iter()
                        .map(|f| {
                            json!({
                                "type": f.kind,
                                "severity": f.severity,
                                "message": f.message,
                            })
                        })
                        .collect();
                    return Ok(GatewayResponse {
                        status: 429,
                        body: json!({
                            "error": "Too Many Requests",
                            "message": "anomalous behavior detected",
                            "anomalies": anomalies,
                        }),
                    });
                }
                EscalationAction::Throttle => {
                    // Soft signal: flagged, not enforced. The request proceeds.
                    warn!(principal = %principal.id, "throttle signal raised");
                }
                EscalationAction::Alert => {}
            }
        }

        // 5. Forward to the protected backend (the only suspending I/O)
        let payload = decision.filtered_payload.unwrap_or(Value::Null);
        let upstream = self.forwarder.forward(request, &payload, &principal).await;

        // 6. Record the response
        self.audit.record(&AuditRecord::new(
            AuditStage::Post,
            Some(&principal.id),
            &request.method,
            &request.path,
            json!({ "status": upstream.status }),
        ));
        let mut event = StoredEvent::new(
            AuditStage::Post,
            Some(&principal.id),
            &request.method,
            &request.path,
        );
        event.status = Some(upstream.status);
        event.payload_size = Some(request.payload_size());
        event.response_size = serde_json::to_vec(&upstream.body)
            .map(|b| b.len() as u64)
            .ok();
        self.store.log_event(&event);

        Ok(GatewayResponse { status: upstream.status, body: upstream.body })
    }
}
