use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agents::registry::TesterRole;
use crate::errors::RetryPolicy;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ApexConfig {
    pub scheduler: SchedulerConfig,
    pub retry: RetryPolicy,
    pub roles: BTreeMap<TesterRole, RoleConfig>,
    pub consensus: ConsensusConfig,
    pub planner: PlannerConfig,
    pub events: EventsConfig,
    pub audit: AuditConfig,
    pub catalog: CatalogConfig,
    pub server: ServerConfig,
}

impl ApexConfig {
    pub fn role_slots(&self, role: TesterRole) -> usize {
        self.roles
            .get(&role)
            .and_then(|r| r.slots)
            .unwrap_or(role.definition().default_slots)
    }

    /// Per-attempt deadline for a role, before any per-job override.
    pub fn role_timeout(&self, role: TesterRole) -> Duration {
        self.roles
            .get(&role)
            .and_then(|r| r.timeout_secs)
            .or(self.scheduler.default_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(role.definition().default_timeout)
    }

    /// ETA basis until the role has completion samples.
    pub fn role_expected_duration(&self, role: TesterRole) -> Duration {
        self.roles
            .get(&role)
            .and_then(|r| r.expected_duration_secs)
            .map(Duration::from_secs)
            .unwrap_or(role.definition().expected_duration)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Running jobs allowed per project unless the project sets its own.
    pub default_max_concurrency: usize,
    /// Applies to roles without an explicit `timeout_secs`.
    pub default_timeout_secs: Option<u64>,
    /// Dispatcher housekeeping interval.
    pub tick_ms: u64,
    /// Completion samples kept per role for the ETA moving average.
    pub eta_window: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_max_concurrency: 5,
            default_timeout_secs: None,
            tick_ms: 250,
            eta_window: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RoleConfig {
    pub slots: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub expected_duration_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Absolute weighted score required to finalize a finding.
    pub accept_threshold: f64,
    /// Distinct voters required, abstentions included.
    pub quorum: usize,
    /// Ask registered testers to review each new finding.
    pub review_on_create: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self { accept_threshold: 1.5, quorum: 2, review_on_create: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// In-scope targets needed before target-facing cases get +1 priority.
    pub target_boost_threshold: usize,
    /// Rough per-job estimate used for plan duration summaries.
    pub minutes_per_job: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self { target_boost_threshold: 3, minutes_per_job: 5 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Events retained for `events_since` pull consumers.
    pub buffer_size: usize,
    /// Per-subscriber lag tolerated before a push consumer starts dropping.
    pub broadcast_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { buffer_size: 1024, broadcast_capacity: 256 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuditConfig {
    /// JSONL audit trail directory; disabled when unset.
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CatalogConfig {
    pub extensions_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080 }
    }
}
