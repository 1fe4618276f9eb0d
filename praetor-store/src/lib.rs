//! # Praetor Store — audit and security log persistence
//!
//! Write-only from the pipeline's perspective: the gateway reports stage
//! transitions through [`audit::AuditSink`] and security events through
//! [`log_store::LogStore`]; it never reads them back. The administrative
//! surface queries the store for activity, anomalies, and aggregate
//! statistics.

pub mod audit;
pub mod log_store;
pub mod types;

#[cfg(test)]
mod tests;
