#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use praetor_core::policy::{PolicyConfig, PolicyStore};
    use praetor_core::tracker::BehaviorTracker;
    use praetor_core::types::{EscalationAction, Principal, RequestDescriptor};
    use praetor_store::audit::AuditSink;
    use praetor_store::log_store::LogStore;
    use praetor_store::types::{AuditRecord, AuditStage};

    use crate::auth::{Authenticator, ClaimsAuthenticator};
    use crate::forwarder::{Forwarder, UpstreamResponse};
    use crate::orchestrator::Gateway;

    const POLICY_TOML: &str = r#"
        [roles.analista]
        anomaly_profile = "standard"
        [roles.analista.resources.clientes]
        actions = ["read", "write"]

        [anomaly_profiles.standard]
        time_window_ms = 60000
        max_requests_per_window = 100
        max_bytes_per_window = 10485760
    "#;

    struct MockForwarder {
        calls: AtomicUsize,
        status: u16,
    }

    #[async_trait]
    impl Forwarder for MockForwarder {
        async fn forward(
            &self,
            _request: &RequestDescriptor,
            _payload: &Value,
            _principal: &Principal,
        ) -> UpstreamResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            UpstreamResponse { status: self.status, body: json!({ "ok": true }) }
        }
    }

    #[derive(Default)]
    struct CapturingSink {
        records: Mutex<Vec<AuditRecord>>,
    }

    impl CapturingSink {
        fn stages(&self) -> Vec<AuditStage> {
            self.records.lock().iter().map(|r| r.stage).collect()
        }
    }

    impl AuditSink for CapturingSink {
        fn record(&self, record: &AuditRecord) {
            self.records.lock().push(record.clone());
        }
    }

    fn token(sub: &str, role: &str, exp_offset_secs: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let header = URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(&json!({ "alg": "HS256", "typ": "JWT" })).unwrap());
        let claims = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&json!({
                "sub": sub,
                "role": role,
                "iat": now - 10,
                "exp": now + exp_offset_secs,
            }))
            .unwrap(),
        );
        format!("{}.{}.sig", header, claims)
    }

    struct Harness {
        gateway: Gateway,
        forwarder: Arc<MockForwarder>,
        sink: Arc<CapturingSink>,
        _dir: tempfile::TempDir,
    }

    fn harness(upstream_status: u16) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config: PolicyConfig = toml::from_str(POLICY_TOML).unwrap();
        let forwarder = Arc::new(MockForwarder {
            calls: AtomicUsize::new(0),
            status: upstream_status,
        });
        let sink = Arc::new(CapturingSink::default());
        let store = Arc::new(LogStore::new(dir.path()).unwrap());
        let gateway = Gateway::new(
            Arc::new(PolicyStore::new(config)),
            Arc::new(BehaviorTracker::new()),
            Arc::new(ClaimsAuthenticator),
            forwarder.clone(),
            sink.clone(),
            store,
        );
        Harness { gateway, forwarder, sink, _dir: dir }
    }

    fn request(method: &str, path: &str) -> RequestDescriptor {
        RequestDescriptor::new(method, path, Value::Null)
    }

    // ── ClaimsAuthenticator ─────────────────────────────────────────────

    #[test]
    fn valid_token_yields_principal() {
        let principal = ClaimsAuthenticator
            .validate(&token("ana@example.com", "analista", 3_600))
            .unwrap();
        assert_eq!(principal.id, "ana@example.com");
        assert_eq!(principal.role, "analista");
    }

    #[test]
    fn expired_token_rejected() {
        assert!(ClaimsAuthenticator
            .validate(&token("ana@example.com", "analista", -100))
            .is_none());
    }

    #[test]
    fn malformed_tokens_rejected() {
        assert!(ClaimsAuthenticator.validate("").is_none());
        assert!(ClaimsAuthenticator.validate("only.two").is_none());
        assert!(ClaimsAuthenticator.validate("a.b.c.d").is_none());
        assert!(ClaimsAuthenticator.validate("not base64.!!.sig").is_none());
    }

    #[test]
    fn token_without_role_claim_rejected() {
        let now = chrono::Utc::now().timestamp();
        let header = URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(&json!({ "alg": "HS256", "typ": "JWT" })).unwrap());
        let claims = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&json!({ "sub": "ana", "iat": now, "exp": now + 100 })).unwrap(),
        );
        assert!(ClaimsAuthenticator
            .validate(&format!("{}.{}.sig", header, claims))
            .is_none());
    }

    // ── Orchestrator ────────────────────────────────────────────────────

    #[tokio::test]
    async fn missing_credential_rejected_with_401() {
        let h = harness(200);
        let response = h.gateway.handle(None, request("GET", "/clientes")).await;
        assert_eq!(response.status, 401);
        assert_eq!(h.sink.stages(), vec![AuditStage::AuthFailed]);
        assert_eq!(h.forwarder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_role_denied_and_no_event_recorded() {
        let h = harness(200);
        let tok = token("intruso@example.com", "visitante", 3_600);
        let response = h.gateway.handle(Some(&tok), request("GET", "/clientes")).await;

        assert_eq!(response.status, 403);
        assert_eq!(response.body["reason"], "role_not_found");
        assert!(h.sink.stages().contains(&AuditStage::Block));
        assert_eq!(h.forwarder.calls.load(Ordering::SeqCst), 0);

        // denied requests never reach the anomaly window
        let stats = h.gateway.tracker().stats("intruso@example.com").unwrap();
        assert_eq!(stats.total_events, 0);
        assert_eq!(stats.blocked_attempts, 1);
        assert_eq!(h.gateway.store().blocked_attempts(1.0).len(), 1);
    }

    #[tokio::test]
    async fn allowed_request_passes_upstream_response_through() {
        let h = harness(200);
        let tok = token("ana@example.com", "analista", 3_600);
        let response = h.gateway.handle(Some(&tok), request("GET", "/clientes")).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({ "ok": true }));
        assert_eq!(h.forwarder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.sink.stages(), vec![AuditStage::Pre, AuditStage::Post]);

        let events = h.gateway.store().events_by_user(Some("ana@example.com"), 1.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, Some(200));
    }

    #[tokio::test]
    async fn upstream_status_is_not_rewritten() {
        let h = harness(502);
        let tok = token("ana@example.com", "analista", 3_600);
        let response = h.gateway.handle(Some(&tok), request("GET", "/clientes")).await;
        assert_eq!(response.status, 502);
    }

    #[tokio::test]
    async fn oversized_payload_is_blocked_before_forwarding() {
        let h = harness(200);
        let tok = token("carlos@example.com", "analista", 3_600);
        let payload = Value::String("x".repeat(15 * 1024 * 1024));
        let response = h
            .gateway
            .handle(Some(&tok), RequestDescriptor::new("POST", "/clientes", payload))
            .await;

        assert_eq!(response.status, 429);
        assert_eq!(h.forwarder.calls.load(Ordering::SeqCst), 0);
        let anomalies = response.body["anomalies"].as_array().unwrap();
        assert!(anomalies
            .iter()
            .any(|a| a["type"] == "data_exfiltration" && a["severity"] == "critical"));
        assert!(h.sink.stages().contains(&AuditStage::Anomaly));

        let blocked = h.gateway.store().blocked_attempts(1.0);
        assert_eq!(blocked.len(), 1);
        assert!(!blocked[0].finding_kinds.is_empty());
    }

    #[tokio::test]
    async fn throttle_is_a_soft_signal_and_requests_proceed() {
        let h = harness(200);
        let tok = token("ana@example.com", "analista", 3_600);

        // a tight burst trips the rapid-request heuristic (one high finding)
        for _ in 0..5 {
            let response = h.gateway.handle(Some(&tok), request("GET", "/clientes")).await;
            assert_eq!(response.status, 200);
        }
        assert_eq!(h.forwarder.calls.load(Ordering::SeqCst), 5);

        let throttled = h
            .gateway
            .store()
            .anomalies(1.0, None)
            .into_iter()
            .filter(|a| a.action == EscalationAction::Throttle)
            .count();
        assert!(throttled >= 1);
    }
}
