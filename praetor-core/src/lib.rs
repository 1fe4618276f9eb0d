//! # Praetor Core — Risk-Evaluation Pipeline
//!
//! The decision-making half of the gateway: a static role-based policy
//! check followed by a behavioral assessment of the calling principal.
//! Every inbound request flows through four stages:
//!
//! 1. **decision** — role/resource/action policy evaluation
//! 2. **tracker** — per-principal sliding window of recent activity
//! 3. **detector** — windowed anomaly heuristics producing findings
//! 4. **escalation** — reduction of findings to one action (alert/throttle/block)
//!
//! The core performs no network or audit I/O itself; those concerns live
//! behind the gateway and store crates.

pub mod decision;
pub mod detector;
pub mod error;
pub mod escalation;
pub mod policy;
pub mod tracker;
pub mod types;

pub use error::{CoreError, CoreResult};
