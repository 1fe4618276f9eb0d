//! Escalation policy: reduces a set of findings to a single action.

use crate::types::{
    now_ms, AnomalyVerdict, EscalationAction, Finding, Severity,
};

/// This many `High` findings force a block on their own.
const HIGH_FINDINGS_FOR_BLOCK: usize = 2;

pub struct EscalationPolicy;

impl EscalationPolicy {
    /// Deterministic reduction: any critical finding or two highs block,
    /// one high throttles, anything else alerts. An empty set produces no
    /// action at all — the evaluation is a no-op for that request.
    pub fn resolve(findings: &[Finding]) -> Option<EscalationAction> {
        if findings.is_empty() {
            return None;
        }
        let has_critical = findings.iter().any(|f| f.severity == Severity::Critical);
        let high_count = findings
            .iter()
            .filter(|f| f.severity == Severity::High)
            .count();

        Some(if has_critical || high_count >= HIGH_FINDINGS_FOR_BLOCK {
            EscalationAction::Block
        } else if high_count >= 1 {
            EscalationAction::Throttle
        } else {
            EscalationAction::Alert
        })
    }

    /// Resolve and assemble the verdict for one evaluation. `None` when
    /// there were no findings.
    pub fn verdict(
        principal_id: &str,
        findings: Vec<Finding>,
        event_count: usize,
    ) -> Option<AnomalyVerdict> {
        let action = Self::resolve(&findings)?;
        Some(AnomalyVerdict {
            action,
            findings,
            principal_id: principal_id.to_string(),
            evaluated_at_ms: now_ms(),
            event_count,
        })
    }
}
