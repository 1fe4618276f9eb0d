//! Behavioral anomaly detector: five windowed heuristics over one
//! per-principal activity snapshot.
//!
//! Heuristics:
//! - request volume against the profile ceiling
//! - cumulative payload bytes against the profile ceiling
//! - mean inter-arrival interval of consecutive events
//! - distinct-resource fan-out
//! - read/write mix against the expected read-dominated baseline
//!
//! All five run independently on the same snapshot; one evaluation can
//! yield any subset of them. An empty result means a clean window, not an
//! error, and malformed window data degrades to zero values rather than
//! failing the request.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::policy::AnomalyProfile;
use crate::types::{Event, Finding, FindingKind, LogicalAction, Severity};

/// Mean inter-arrival floor for the rapid-request heuristic.
const RAPID_MEAN_INTERVAL_MS: f64 = 100.0;
/// Minimum events before inter-arrival statistics are meaningful.
const RAPID_MIN_EVENTS: usize = 3;
/// Distinct-resource ceiling before access counts as scattered.
const SCATTERED_RESOURCE_LIMIT: usize = 5;
/// The read-ratio check needs strictly more events than this.
const BEHAVIOR_MIN_EVENTS: usize = 10;
/// Expected floor on the read fraction of a principal's window.
const READ_RATIO_FLOOR: f64 = 0.30;

pub struct AnomalyDetector {
    total_evaluations: AtomicU64,
    total_findings: AtomicU64,
}

impl AnomalyDetector {
    pub fn new() -> Self {
        Self {
            total_evaluations: AtomicU64::new(0),
            total_findings: AtomicU64::new(0),
        }
    }

    /// Evaluate the current (post-pruning) window against the profile
    /// thresholds and produce zero or more findings.
    pub fn detect(
        &self,
        principal_id: &str,
        events: &[Event],
        profile: &AnomalyProfile,
    ) -> Vec<Finding> {
        self.total_evaluations.fetch_add(1, Ordering::Relaxed);
        let mut findings = Vec::new();

        let count = events.len();
        if count > profile.max_requests_per_window {
            findings.push(Finding {
                kind: FindingKind::ExcessiveRequests,
                severity: Severity::High,
                value: count as f64,
                threshold: profile.max_requests_per_window as f64,
                message: format!(
                    "request volume exceeded: {}/{} in window",
                    count, profile.max_requests_per_window
                ),
            });
        }

        let total_bytes: u64 = events.iter().map(|e| e.payload_size).sum();
        if total_bytes > profile.max_bytes_per_window {
            findings.push(Finding {
                kind: FindingKind::DataExfiltration,
                severity: Severity::Critical,
                value: total_bytes as f64,
                threshold: profile.max_bytes_per_window as f64,
                message: format!(
                    "suspicious data volume: {:.2} MB",
                    total_bytes as f64 / 1024.0 / 1024.0
                ),
            });
        }

        if count >= RAPID_MIN_EVENTS {
            let mean_interval = events
                .windows(2)
                .map(|w| (w[1].timestamp_ms - w[0].timestamp_ms) as f64)
                .sum::<f64>()
                / (count - 1) as f64;
            if mean_interval < RAPID_MEAN_INTERVAL_MS {
                findings.push(Finding {
                    kind: FindingKind::RapidRequests,
                    severity: Severity::High,
                    value: mean_interval,
                    threshold: RAPID_MEAN_INTERVAL_MS,
                    message: format!(
                        "rapid request sequence: {:.0} ms mean interval",
                        mean_interval
                    ),
                });
            }
        }

        let distinct: HashSet<&str> =
            events.iter().map(|e| e.resource.as_str()).collect();
        if distinct.len() > SCATTERED_RESOURCE_LIMIT {
            findings.push(Finding {
                kind: FindingKind::ScatteredAccess,
                severity: Severity::Medium,
                value: distinct.len() as f64,
                threshold: SCATTERED_RESOURCE_LIMIT as f64,
                message: format!(
                    "access spread across {} distinct resources",
                    distinct.len()
                ),
            });
        }

        if count > BEHAVIOR_MIN_EVENTS {
            let reads = events
                .iter()
                .filter(|e| LogicalAction::from_method(&e.method) == LogicalAction::Read)
                .count();
            let read_ratio = reads as f64 / count as f64;
            if read_ratio < READ_RATIO_FLOOR {
                findings.push(Finding {
                    kind: FindingKind::BehaviorChange,
                    severity: Severity::Medium,
                    value: read_ratio,
                    threshold: READ_RATIO_FLOOR,
                    message: format!(
                        "access pattern shift: {:.0}% reads (expected 70%+)",
                        read_ratio * 100.0
                    ),
                });
            }
        }

        if !findings.is_empty() {
            self.total_findings
                .fetch_add(findings.len() as u64, Ordering::Relaxed);
            debug!(
                principal = %principal_id,
                findings = findings.len(),
                events = count,
                "behavioral findings"
            );
        }
        findings
    }

    pub fn total_evaluations(&self) -> u64 {
        self.total_evaluations.load(Ordering::Relaxed)
    }

    pub fn total_findings(&self) -> u64 {
        self.total_findings.load(Ordering::Relaxed)
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new()
    }
}
