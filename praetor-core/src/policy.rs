//! Role policy table and anomaly-profile configuration.
//!
//! Loaded once at startup from TOML and immutable afterwards. Profile
//! resolution happens explicitly per request (`PolicyStore::profile_for`),
//! falling back to the documented defaults when a role names no profile or
//! a profile omits a field.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::types::PolicyAction;

pub const DEFAULT_TIME_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_MAX_REQUESTS_PER_WINDOW: usize = 100;
pub const DEFAULT_MAX_BYTES_PER_WINDOW: u64 = 10 * 1024 * 1024;
pub const DEFAULT_COOLDOWN_MS: u64 = 300_000;

/// Permitted actions on one resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcePolicy {
    #[serde(default)]
    pub actions: Vec<PolicyAction>,
}

/// Access rules for a role: a resource→actions map plus the name of the
/// anomaly profile its principals are evaluated against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolePolicy {
    #[serde(default)]
    pub resources: HashMap<String, ResourcePolicy>,
    #[serde(default)]
    pub anomaly_profile: Option<String>,
}

/// Detection thresholds assignable per role.
///
/// `cooldown_ms` is part of the consumed configuration shape; no pipeline
/// path reads it today.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnomalyProfile {
    #[serde(default = "default_time_window_ms")]
    pub time_window_ms: u64,
    #[serde(default = "default_max_requests")]
    pub max_requests_per_window: usize,
    #[serde(default = "default_max_bytes")]
    pub max_bytes_per_window: u64,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_time_window_ms() -> u64 {
    DEFAULT_TIME_WINDOW_MS
}
fn default_max_requests() -> usize {
    DEFAULT_MAX_REQUESTS_PER_WINDOW
}
fn default_max_bytes() -> u64 {
    DEFAULT_MAX_BYTES_PER_WINDOW
}
fn default_cooldown_ms() -> u64 {
    DEFAULT_COOLDOWN_MS
}

impl Default for AnomalyProfile {
    fn default() -> Self {
        Self {
            time_window_ms: DEFAULT_TIME_WINDOW_MS,
            max_requests_per_window: DEFAULT_MAX_REQUESTS_PER_WINDOW,
            max_bytes_per_window: DEFAULT_MAX_BYTES_PER_WINDOW,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }
}

/// Top-level policy configuration consumed by the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub roles: HashMap<String, RolePolicy>,
    #[serde(default)]
    pub anomaly_profiles: HashMap<String, AnomalyProfile>,
}

/// Immutable lookup table over the loaded policy. No mutation at request time.
pub struct PolicyStore {
    config: PolicyConfig,
}

impl PolicyStore {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Load policy from a TOML file. A missing file yields the built-in
    /// defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "policy file not found, using defaults");
            return Ok(Self::new(PolicyConfig::default()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: PolicyConfig = toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("failed to parse policy: {}", e)))?;
        info!(
            path = %path.display(),
            roles = config.roles.len(),
            profiles = config.anomaly_profiles.len(),
            "policy loaded"
        );
        Ok(Self::new(config))
    }

    pub fn role(&self, role: &str) -> Option<&RolePolicy> {
        self.config.roles.get(role)
    }

    /// Resolve the anomaly profile for a role. Unknown roles, unnamed
    /// profiles, and dangling profile names all resolve to the defaults.
    pub fn profile_for(&self, role: &str) -> AnomalyProfile {
        self.config
            .roles
            .get(role)
            .and_then(|r| r.anomaly_profile.as_deref())
            .and_then(|name| self.config.anomaly_profiles.get(name))
            .copied()
            .unwrap_or_default()
    }

    pub fn profiles(&self) -> &HashMap<String, AnomalyProfile> {
        &self.config.anomaly_profiles
    }

    pub fn role_count(&self) -> usize {
        self.config.roles.len()
    }
}
