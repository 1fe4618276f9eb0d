#[cfg(test)]
mod tests {
    use crate::log_store::{LogKind, LogStore, ANOMALIES_LOG, EVENTS_LOG};
    use crate::types::*;

    use praetor_core::types::{
        now_ms, EscalationAction, Finding, FindingKind, Severity,
    };
    use std::io::Write;

    fn store() -> (tempfile::TempDir, LogStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::new(dir.path()).unwrap();
        (dir, store)
    }

    fn finding(kind: FindingKind, severity: Severity) -> Finding {
        Finding { kind, severity, value: 1.0, threshold: 0.0, message: "x".into() }
    }

    fn anomaly(user: &str, severity: Severity) -> StoredAnomaly {
        StoredAnomaly {
            timestamp_ms: now_ms(),
            user_id: user.into(),
            action: EscalationAction::Block,
            findings: vec![finding(FindingKind::DataExfiltration, severity)],
            event_count: 3,
        }
    }

    #[test]
    fn events_round_trip_and_filter_by_user() {
        let (_dir, store) = store();
        let mut e1 = StoredEvent::new(AuditStage::Post, Some("ana"), "GET", "/clientes");
        e1.status = Some(200);
        store.log_event(&e1);
        store.log_event(&StoredEvent::new(AuditStage::Post, Some("bruno"), "GET", "/pedidos"));

        let ana = store.events_by_user(Some("ana"), 1.0);
        assert_eq!(ana.len(), 1);
        assert_eq!(ana[0].status, Some(200));
        assert_eq!(store.events_by_user(None, 1.0).len(), 2);
        assert!(store.events_by_user(Some("carla"), 1.0).is_empty());
    }

    #[test]
    fn old_entries_fall_outside_the_query_period() {
        let (_dir, store) = store();
        let mut old = StoredEvent::new(AuditStage::Post, Some("ana"), "GET", "/clientes");
        old.timestamp_ms = now_ms() - 48 * 3_600_000;
        store.log_event(&old);
        store.log_event(&StoredEvent::new(AuditStage::Post, Some("ana"), "GET", "/clientes"));

        assert_eq!(store.events_by_user(Some("ana"), 24.0).len(), 1);
        assert_eq!(store.events_by_user(Some("ana"), 72.0).len(), 2);
    }

    #[test]
    fn anomaly_stats_aggregate_severity_type_and_user() {
        let (_dir, store) = store();
        store.log_anomaly(&anomaly("ana", Severity::Critical));
        store.log_anomaly(&anomaly("ana", Severity::High));
        store.log_anomaly(&anomaly("bruno", Severity::Critical));
        store.log_blocked_attempt(&StoredBlockedAttempt {
            timestamp_ms: now_ms(),
            user_id: "ana".into(),
            reason: "no_resource_permission".into(),
            method: "GET".into(),
            path: "/clientes".into(),
            resource: Some("clientes".into()),
            finding_kinds: Vec::new(),
        });

        let stats = store.security_stats(24.0);
        assert_eq!(stats.total_anomalies, 3);
        assert_eq!(stats.total_blocked_attempts, 1);
        assert_eq!(stats.anomalies_by_severity[&Severity::Critical], 2);
        assert_eq!(stats.anomalies_by_severity[&Severity::High], 1);
        assert_eq!(stats.anomaly_types[&FindingKind::DataExfiltration], 3);
        assert_eq!(stats.top_affected_users["ana"], 2);
        assert_eq!(stats.top_affected_users["bruno"], 1);
    }

    #[test]
    fn anomalies_filter_by_finding_severity() {
        let (_dir, store) = store();
        store.log_anomaly(&anomaly("ana", Severity::Critical));
        store.log_anomaly(&anomaly("ana", Severity::Medium));

        assert_eq!(store.anomalies(1.0, Some(Severity::Critical)).len(), 1);
        assert_eq!(store.anomalies(1.0, None).len(), 2);
        assert!(store.anomalies(1.0, Some(Severity::Low)).is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped_on_read() {
        let (dir, store) = store();
        store.log_anomaly(&anomaly("ana", Severity::High));
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join(ANOMALIES_LOG))
            .unwrap();
        writeln!(file, "{{not json").unwrap();
        drop(file);

        assert_eq!(store.anomalies(1.0, None).len(), 1);
    }

    #[test]
    fn cleanup_drops_expired_entries_and_keeps_malformed_lines() {
        let (dir, store) = store();
        let mut old = StoredEvent::new(AuditStage::Post, Some("ana"), "GET", "/clientes");
        old.timestamp_ms = now_ms() - 40 * 86_400_000;
        store.log_event(&old);
        store.log_event(&StoredEvent::new(AuditStage::Post, Some("ana"), "GET", "/clientes"));
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join(EVENTS_LOG))
            .unwrap();
        writeln!(file, "not json at all").unwrap();
        drop(file);

        store.cleanup_old_logs(30);

        let content = std::fs::read_to_string(dir.path().join(EVENTS_LOG)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().any(|l| *l == "not json at all"));
        assert_eq!(store.events_by_user(Some("ana"), 24.0 * 60.0).len(), 1);
    }

    #[test]
    fn csv_export_flattens_anomalies() {
        let (_dir, store) = store();
        store.log_anomaly(&anomaly("ana", Severity::Critical));

        let csv = store.export_csv(LogKind::Anomalies, 1.0).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp_ms,user_id,action,event_count,findings"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("ana"));
        assert!(row.contains("block"));
        assert!(row.contains("DataExfiltration"));
    }

    #[test]
    fn csv_export_of_empty_log_has_header_only() {
        let (_dir, store) = store();
        let csv = store.export_csv(LogKind::Events, 1.0).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
