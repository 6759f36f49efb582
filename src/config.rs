//! The config for the autoscaler
//!
//! Layered the same way as the teacher's `Conf`: a YAML file first, then an
//! environment overlay, both handled by the `config` crate.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::Tier;

/// Helps serde default a value to true
fn default_true() -> bool {
    true
}

/// Default iteration interval: 30 seconds
fn default_iteration_interval_ms() -> u64 {
    30_000
}

/// Default activation delay: 5 minutes
fn default_activation_delay_ms() -> u64 {
    300_000
}

/// Default evaluation timeout: 5 minutes
fn default_evaluation_timeout_ms() -> u64 {
    300_000
}

/// Default removable reaper timeout: 10 minutes
fn default_removable_timeout_ms() -> u64 {
    600_000
}

/// Default scale-up cooldown: 3 minutes
fn default_scale_up_cooldown_ms() -> i64 {
    180_000
}

/// Default scale-down cooldown: 10 minutes
fn default_scale_down_cooldown_ms() -> i64 {
    600_000
}

/// Default idle instance grace period: 2 minutes
fn default_idle_instance_grace_period_ms() -> i64 {
    120_000
}

/// Default task SLO: 5 minutes
fn default_task_slo_ms() -> i64 {
    300_000
}

/// Default request timeout for collaborator HTTP calls
fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Per-tier autoscaling policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    /// The instance type this tier scales
    pub primary_instance_type: String,
    /// The minimum number of idle instances this tier should keep on hand
    #[serde(default)]
    pub min_idle: u64,
    /// The maximum number of idle instances this tier should tolerate before
    /// scaling down
    #[serde(default)]
    pub max_idle: u64,
    /// How long to wait between successive scale-ups
    #[serde(default = "default_scale_up_cooldown_ms")]
    pub scale_up_cooldown_ms: i64,
    /// How long to wait between successive scale-downs
    #[serde(default = "default_scale_down_cooldown_ms")]
    pub scale_down_cooldown_ms: i64,
    /// How long a freshly launched instance is excluded from idle accounting
    #[serde(default = "default_idle_instance_grace_period_ms")]
    pub idle_instance_grace_period_ms: i64,
    /// How long an accepted-but-unplaced task may wait before it counts as an
    /// SLO violator
    #[serde(default = "default_task_slo_ms")]
    pub task_slo_ms: i64,
}

/// The settings for a single collaborator HTTP client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorConf {
    /// The base URL to issue requests against
    pub base_url: String,
    /// The request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// The top-level autoscaler config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoscalerConf {
    /// Whether the autoscaler should run at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How often to run an evaluation
    #[serde(default = "default_iteration_interval_ms")]
    pub iteration_interval_ms: u64,
    /// How long to wait after startup before the first evaluation
    #[serde(default = "default_activation_delay_ms")]
    pub activation_delay_ms: u64,
    /// The hard deadline for a single evaluation
    #[serde(default = "default_evaluation_timeout_ms")]
    pub evaluation_timeout_ms: u64,
    /// How long an instance may sit `REMOVABLE` before the guard clears it
    #[serde(default = "default_removable_timeout_ms")]
    pub agent_instance_removable_timeout_ms: i64,
    /// Per-tier policy
    pub tiers: HashMap<Tier, TierConfig>,
    /// The `AgentManagement` collaborator
    pub agent_management: CollaboratorConf,
    /// The `SchedulingService` collaborator
    pub scheduling_service: CollaboratorConf,
    /// The `JobOperations` collaborator
    pub job_operations: CollaboratorConf,
}

/// The root config object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conf {
    /// The autoscaler's own settings
    pub autoscaler: AutoscalerConf,
}

impl Conf {
    /// Load config from a YAML file, overlaid with any `AUTOSCALER__*` environment
    /// variables
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the config file to load
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path.as_ref()).format(config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix("autoscaler")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
