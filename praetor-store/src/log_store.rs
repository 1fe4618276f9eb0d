//! JSONL-backed security log store.
//!
//! Three append-only files under one directory: `events.jsonl`,
//! `anomalies.jsonl`, `blocked_attempts.jsonl`. Writes never fail the
//! request path — a write error is logged and swallowed. Reads skip
//! malformed lines; retention cleanup keeps them.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use praetor_core::types::{now_ms, FindingKind, Severity};
use praetor_core::{CoreError, CoreResult};

use crate::types::{StoredAnomaly, StoredBlockedAttempt, StoredEvent};

pub const EVENTS_LOG: &str = "events.jsonl";
pub const ANOMALIES_LOG: &str = "anomalies.jsonl";
pub const BLOCKED_LOG: &str = "blocked_attempts.jsonl";

const MS_PER_HOUR: f64 = 3_600_000.0;
const MS_PER_DAY: i64 = 86_400_000;

/// Which log file an export reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Events,
    Anomalies,
}

/// Aggregate security statistics over a trailing period.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityStats {
    pub total_events: u64,
    pub total_anomalies: u64,
    pub total_blocked_attempts: u64,
    pub anomalies_by_severity: HashMap<Severity, u64>,
    pub anomaly_types: HashMap<FindingKind, u64>,
    pub top_affected_users: HashMap<String, u64>,
}

pub struct LogStore {
    dir: PathBuf,
    events_lock: Mutex<()>,
    anomalies_lock: Mutex<()>,
    blocked_lock: Mutex<()>,
}

impl LogStore {
    pub fn new(dir: impl Into<PathBuf>) -> CoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "log store ready");
        Ok(Self {
            dir,
            events_lock: Mutex::new(()),
            anomalies_lock: Mutex::new(()),
            blocked_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ── Writes ──────────────────────────────────────────────────────────

    pub fn log_event(&self, event: &StoredEvent) {
        self.append(EVENTS_LOG, &self.events_lock, event);
    }

    pub fn log_anomaly(&self, anomaly: &StoredAnomaly) {
        self.append(ANOMALIES_LOG, &self.anomalies_lock, anomaly);
    }

    pub fn log_blocked_attempt(&self, attempt: &StoredBlockedAttempt) {
        self.append(BLOCKED_LOG, &self.blocked_lock, attempt);
    }

    fn append<T: Serialize>(&self, file: &str, lock: &Mutex<()>, value: &T) {
        let line = match serde_json::to_string(value) {
            Ok(line) => line,
            Err(err) => {
                error!(file, %err, "failed to serialize log entry");
                return;
            }
        };
        let _guard = lock.lock();
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))
            .and_then(|mut f| writeln!(f, "{}", line));
        if let Err(err) = result {
            error!(file, %err, "failed to write log entry");
        }
    }

    // ── Reads ───────────────────────────────────────────────────────────

    fn read_entries<T: DeserializeOwned>(&self, file: &str) -> Vec<T> {
        let content = match fs::read_to_string(self.dir.join(file)) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                error!(file, %err, "failed to read log file");
                return Vec::new();
            }
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    fn cutoff_ms(hours_back: f64) -> i64 {
        now_ms() - (hours_back * MS_PER_HOUR) as i64
    }

    /// Events in the trailing period; `None` for `user_id` returns all users.
    pub fn events_by_user(&self, user_id: Option<&str>, hours_back: f64) -> Vec<StoredEvent> {
        let cutoff = Self::cutoff_ms(hours_back);
        self.read_entries::<StoredEvent>(EVENTS_LOG)
            .into_iter()
            .filter(|e| e.timestamp_ms >= cutoff)
            .filter(|e| match user_id {
                Some(id) => e.user_id.as_deref() == Some(id),
                None => true,
            })
            .collect()
    }

    /// Anomalies in the trailing period, optionally only those carrying a
    /// finding of the given severity.
    pub fn anomalies(&self, hours_back: f64, severity: Option<Severity>) -> Vec<StoredAnomaly> {
        let cutoff = Self::cutoff_ms(hours_back);
        self.read_entries::<StoredAnomaly>(ANOMALIES_LOG)
            .into_iter()
            .filter(|a| a.timestamp_ms >= cutoff)
            .filter(|a| match severity {
                Some(sev) => a.findings.iter().any(|f| f.severity == sev),
                None => true,
            })
            .collect()
    }

    pub fn blocked_attempts(&self, hours_back: f64) -> Vec<StoredBlockedAttempt> {
        let cutoff = Self::cutoff_ms(hours_back);
        self.read_entries::<StoredBlockedAttempt>(BLOCKED_LOG)
            .into_iter()
            .filter(|b| b.timestamp_ms >= cutoff)
            .collect()
    }

    pub fn security_stats(&self, hours_back: f64) -> SecurityStats {
        let mut stats = SecurityStats {
            total_events: self.events_by_user(None, hours_back).len() as u64,
            total_blocked_attempts: self.blocked_attempts(hours_back).len() as u64,
            ..Default::default()
        };

        for anomaly in self.anomalies(hours_back, None) {
            stats.total_anomalies += 1;
            *stats
                .top_affected_users
                .entry(anomaly.user_id.clone())
                .or_insert(0) += 1;
            for finding in &anomaly.findings {
                *stats.anomalies_by_severity.entry(finding.severity).or_insert(0) += 1;
                *stats.anomaly_types.entry(finding.kind).or_insert(0) += 1;
            }
        }
        stats
    }

    // ── Maintenance & export ────────────────────────────────────────────

    /// Rewrite each log file keeping only entries newer than the retention
    /// cutoff. Malformed lines are kept rather than silently dropped.
    pub fn cleanup_old_logs(&self, days_to_keep: u32) {
        let cutoff = now_ms() - days_to_keep as i64 * MS_PER_DAY;
        for (file, lock) in [
            (EVENTS_LOG, &self.events_lock),
            (ANOMALIES_LOG, &self.anomalies_lock),
            (BLOCKED_LOG, &self.blocked_lock),
        ] {
            let _guard = lock.lock();
            let path = self.dir.join(file);
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    error!(file, %err, "failed to read log for cleanup");
                    continue;
                }
            };
            let kept: Vec<&str> = content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .filter(|line| {
                    serde_json::from_str::<serde_json::Value>(line)
                        .ok()
                        .and_then(|v| v.get("timestamp_ms").and_then(|t| t.as_i64()))
                        .map_or(true, |ts| ts >= cutoff)
                })
                .collect();
            let mut body = kept.join("\n");
            if !body.is_empty() {
                body.push('\n');
            }
            if let Err(err) = fs::write(&path, body) {
                error!(file, %err, "failed to rewrite log during cleanup");
            } else {
                info!(file, kept = kept.len(), "log cleanup complete");
            }
        }
    }

    /// Flatten a trailing period of one log into CSV.
    pub fn export_csv(&self, kind: LogKind, hours_back: f64) -> CoreResult<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        match kind {
            LogKind::Events => {
                writer
                    .write_record([
                        "timestamp_ms",
                        "user_id",
                        "stage",
                        "method",
                        "path",
                        "status",
                        "payload_size",
                        "response_size",
                        "reason",
                    ])
                    .map_err(|e| CoreError::Export(e.to_string()))?;
                for e in self.events_by_user(None, hours_back) {
                    writer
                        .write_record([
                            e.timestamp_ms.to_string(),
                            e.user_id.unwrap_or_default(),
                            e.stage.as_str().to_string(),
                            e.method,
                            e.path,
                            e.status.map(|s| s.to_string()).unwrap_or_default(),
                            e.payload_size.map(|s| s.to_string()).unwrap_or_default(),
                            e.response_size.map(|s| s.to_string()).unwrap_or_default(),
                            e.reason.unwrap_or_default(),
                        ])
                        .map_err(|e| CoreError::Export(e.to_string()))?;
                }
            }
            LogKind::Anomalies => {
                writer
                    .write_record([
                        "timestamp_ms",
                        "user_id",
                        "action",
                        "event_count",
                        "findings",
                    ])
                    .map_err(|e| CoreError::Export(e.to_string()))?;
                for a in self.anomalies(hours_back, None) {
                    let findings = a
                        .findings
                        .iter()
                        .map(|f| format!("{:?}", f.kind))
                        .collect::<Vec<_>>()
                        .join(";");
                    writer
                        .write_record([
                            a.timestamp_ms.to_string(),
                            a.user_id,
                            format!("{:?}", a.action).to_lowercase(),
                            a.event_count.to_string(),
                            findings,
                        ])
                        .map_err(|e| CoreError::Export(e.to_string()))?;
                }
            }
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| CoreError::Export(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| CoreError::Export(e.to_string()))
    }
}
