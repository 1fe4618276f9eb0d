//! Audit sink seam. The pipeline reports every stage transition through
//! this trait and never performs audit I/O itself.

use tracing::info;

use crate::types::AuditRecord;

pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Sink that emits audit records through the tracing pipeline.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        info!(
            stage = record.stage.as_str(),
            principal = record.principal_id.as_deref().unwrap_or("-"),
            method = %record.method,
            path = %record.path,
            detail = %record.detail,
            "audit"
        );
    }
}
