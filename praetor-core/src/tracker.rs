//! Per-principal behavioral state: bounded event windows and blocked-attempt
//! history.
//!
//! The tracker is the only mutable state shared across requests. Records are
//! keyed by principal identity behind an outer read-mostly map; mutation
//! takes only the per-principal mutex, so concurrent requests from different
//! principals never contend. Pruning is lazy and per-access: only the
//! touched record is cleaned, and only events older than the caller's window
//! are dropped.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::types::{now_ms, BlockedAttempt, Event, RequestDescriptor, UserStats};

/// Trailing sub-window scanned for repeated blocked attempts.
const BLOCKED_SCAN_WINDOW_MS: i64 = 60_000;
/// Blocked attempts above this count inside the scan window raise a warning
/// signal. The signal is informational only; enforcement stays with the
/// escalation path.
const BLOCKED_WARN_THRESHOLD: usize = 5;
/// Recent-activity window reported by `stats`.
const STATS_RECENT_WINDOW_MS: i64 = 300_000;

#[derive(Debug, Default)]
struct UserRecord {
    /// Insertion order is arrival order.
    events: Vec<Event>,
    /// Monotonic history; never pruned.
    blocked_attempts: Vec<BlockedAttempt>,
}

pub struct BehaviorTracker {
    records: RwLock<HashMap<String, Arc<Mutex<UserRecord>>>>,
}

impl BehaviorTracker {
    pub fn new() -> Self {
        Self { records: RwLock::new(HashMap::new()) }
    }

    fn existing(&self, principal_id: &str) -> Option<Arc<Mutex<UserRecord>>> {
        self.records.read().get(principal_id).cloned()
    }

    fn record_for(&self, principal_id: &str) -> Arc<Mutex<UserRecord>> {
        if let Some(record) = self.existing(principal_id) {
            return record;
        }
        self.records
            .write()
            .entry(principal_id.to_string())
            .or_default()
            .clone()
    }

    fn append(record: &mut UserRecord, request: &RequestDescriptor, status: u16, now: i64) {
        record.events.push(Event {
            timestamp_ms: now,
            method: request.method.clone(),
            resource: request.resource().unwrap_or("root").to_string(),
            payload_size: request.payload_size(),
            status,
        });
    }

    fn prune(record: &mut UserRecord, cutoff: i64) {
        record.events.retain(|e| e.timestamp_ms > cutoff);
    }

    /// Append an event built from the request, creating the record if
    /// absent, then prune events that fell out of the window.
    pub fn record_event(
        &self,
        principal_id: &str,
        request: &RequestDescriptor,
        status: u16,
        window_ms: u64,
    ) {
        let record = self.record_for(principal_id);
        let mut rec = record.lock();
        let now = now_ms();
        Self::append(&mut rec, request, status, now);
        Self::prune(&mut rec, now - window_ms as i64);
    }

    /// Append, prune, and snapshot the live window under one record-level
    /// critical section. This is the read-then-decide-then-append sequence
    /// the detector stage relies on; requests from the same principal are
    /// serialized here, requests from different principals are not.
    pub fn record_and_window(
        &self,
        principal_id: &str,
        request: &RequestDescriptor,
        status: u16,
        window_ms: u64,
    ) -> Vec<Event> {
        let record = self.record_for(principal_id);
        let mut rec = record.lock();
        let now = now_ms();
        Self::append(&mut rec, request, status, now);
        Self::prune(&mut rec, now - window_ms as i64);
        rec.events.clone()
    }

    /// Snapshot the current window without recording anything.
    pub fn window(&self, principal_id: &str, window_ms: u64) -> Vec<Event> {
        let Some(record) = self.existing(principal_id) else {
            return Vec::new();
        };
        let mut rec = record.lock();
        Self::prune(&mut rec, now_ms() - window_ms as i64);
        rec.events.clone()
    }

    /// Record a denied access attempt. Returns true when the trailing
    /// minute now holds more than the warning threshold — a signal only,
    /// never a block.
    pub fn record_blocked_attempt(
        &self,
        principal_id: &str,
        reason: &str,
        request: &RequestDescriptor,
    ) -> bool {
        let record = self.record_for(principal_id);
        let mut rec = record.lock();
        let now = now_ms();
        rec.blocked_attempts.push(BlockedAttempt {
            timestamp_ms: now,
            reason: reason.to_string(),
            method: request.method.clone(),
            path: request.path.clone(),
        });
        let recent = rec
            .blocked_attempts
            .iter()
            .filter(|b| b.timestamp_ms > now - BLOCKED_SCAN_WINDOW_MS)
            .count();
        if recent > BLOCKED_WARN_THRESHOLD {
            warn!(
                principal = %principal_id,
                attempts = recent,
                "repeated blocked attempts inside trailing minute"
            );
            return true;
        }
        false
    }

    pub fn stats(&self, principal_id: &str) -> Option<UserStats> {
        let record = self.existing(principal_id)?;
        let rec = record.lock();
        let now = now_ms();
        Some(UserStats {
            total_events: rec.events.len(),
            events_last_5_min: rec
                .events
                .iter()
                .filter(|e| e.timestamp_ms > now - STATS_RECENT_WINDOW_MS)
                .count(),
            last_activity_ms: rec.events.last().map(|e| e.timestamp_ms),
            blocked_attempts: rec.blocked_attempts.len(),
        })
    }

    /// Administrative clear; not part of the request-evaluation path.
    pub fn clear(&self, principal_id: &str) {
        self.records.write().remove(principal_id);
    }

    /// All tracked events per principal, for external reporting.
    pub fn snapshot_all(&self) -> HashMap<String, Vec<Event>> {
        let handles: Vec<(String, Arc<Mutex<UserRecord>>)> = self
            .records
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        handles
            .into_iter()
            .map(|(id, record)| {
                let events = record.lock().events.clone();
                (id, events)
            })
            .collect()
    }

    pub fn tracked_count(&self) -> usize {
        self.records.read().len()
    }
}

impl Default for BehaviorTracker {
    fn default() -> Self {
        Self::new()
    }
}
