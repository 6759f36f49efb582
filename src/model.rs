//! The domain types the autoscaler reasons about
//!
//! These mirror spec section 3 (Data model) directly: `Tier`, `InstanceGroup`,
//! `Instance`, `Task`/`Job`, and `PlacementFailure`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attribute key marking an instance (or its group) as never eligible for scale-down
pub const NOT_REMOVABLE: &str = "NOT_REMOVABLE";
/// Attribute key marking an instance as currently draining; its value is the
/// wall-clock millis at which the marking was applied
pub const REMOVABLE: &str = "REMOVABLE";
/// Attribute key that stops the placement engine from sending new tasks to a
/// draining host
pub const SYSTEM_NO_PLACEMENT: &str = "SYSTEM_NO_PLACEMENT";

/// A closed ordinal set of service tiers, each with independent autoscaling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// Latency sensitive work that should never queue
    Critical,
    /// Best-effort, flexible scheduling work
    Flex,
}

impl Tier {
    /// All tiers, in evaluation order
    pub fn all() -> &'static [Tier] {
        &[Tier::Critical, Tier::Flex]
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Tier::Critical => write!(f, "Critical"),
            Tier::Flex => write!(f, "Flex"),
        }
    }
}

/// The lifecycle state of an instance group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceGroupState {
    /// Accepting new instances and eligible for scale-up
    Active,
    /// Draining; preferred target for scale-down
    PhasedOut,
    /// Any other state this crate does not act on
    Other(String),
}

/// The lifecycle state of a single instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceState {
    /// Running and able to accept tasks
    Started,
    /// Any other state this crate does not act on
    Other(String),
}

/// An addressable fleet unit hosting agents of a single tier and instance type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceGroup {
    /// The unique id for this group
    pub id: String,
    /// The tier this group serves
    pub tier: Tier,
    /// The cloud instance type used by this group
    pub instance_type: String,
    /// The minimum number of instances this group must retain
    pub min: u64,
    /// The number of instances currently in this group
    pub current: u64,
    /// The number of instances this group is converging towards
    pub desired: u64,
    /// The maximum number of instances this group may hold
    pub max: u64,
    /// The lifecycle state of this group
    pub lifecycle_state: InstanceGroupState,
    /// Opaque attributes, e.g. `NOT_REMOVABLE`
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl InstanceGroup {
    /// Whether this group is in a state we consider for scaling at all
    pub fn is_scalable(&self) -> bool {
        matches!(
            self.lifecycle_state,
            InstanceGroupState::Active | InstanceGroupState::PhasedOut
        )
    }

    /// The remaining headroom this group can be scaled up by
    pub fn headroom(&self) -> u64 {
        self.max.saturating_sub(self.desired)
    }

    /// Whether every instance in this group is protected from removal
    pub fn not_removable(&self) -> bool {
        self.attributes.contains_key(NOT_REMOVABLE)
    }
}

/// A single agent machine belonging to exactly one instance group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// The unique id for this instance
    pub id: String,
    /// The instance group this instance belongs to
    pub instance_group_id: String,
    /// The lifecycle state of this instance
    pub lifecycle_state: InstanceState,
    /// When this instance was launched
    pub launch_timestamp: DateTime<Utc>,
    /// Opaque attributes, including `NOT_REMOVABLE`/`REMOVABLE`
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl Instance {
    /// Whether this instance is currently marked for reaping
    pub fn is_removable(&self) -> bool {
        self.attributes.contains_key(REMOVABLE)
    }

    /// Whether this instance can never be selected for scale-down
    pub fn is_not_removable(&self) -> bool {
        self.attributes.contains_key(NOT_REMOVABLE)
    }

    /// Parse the wall-clock millis at which this instance was marked `REMOVABLE`
    pub fn removable_marked_at(&self) -> Option<i64> {
        self.attributes.get(REMOVABLE)?.parse::<i64>().ok()
    }
}

/// The status of a single task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// The task's current state
    pub state: TaskState,
    /// When the task entered this state
    pub timestamp: DateTime<Utc>,
}

/// The states a task can be in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Accepted by the scheduler but not yet placed
    Accepted,
    /// Placed and executing
    Running,
    /// Any other state this crate does not act on
    Other(String),
}

/// A container task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// The unique id for this task
    pub id: Uuid,
    /// The job this task belongs to
    pub job_id: Uuid,
    /// This task's current status
    pub status: TaskStatus,
    /// The instance this task is currently assigned to, once placed
    #[serde(default)]
    pub assigned_agent_id: Option<String>,
}

impl Task {
    /// The instance this task currently occupies, if any
    pub fn assigned_agent_id(&self) -> Option<String> {
        self.assigned_agent_id.clone()
    }
}

/// The resource footprint of a container task, or the capacity of an instance type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Resources {
    /// CPU in millicores
    pub cpu: u64,
    /// Memory in MB
    pub mem_mb: u64,
    /// Disk in MB
    pub disk_mb: u64,
    /// Network bandwidth in Mbps
    pub net_mbps: u64,
}

impl Resources {
    /// Add another resource footprint into this one
    pub fn add_assign(&mut self, other: &Resources) {
        self.cpu += other.cpu;
        self.mem_mb += other.mem_mb;
        self.disk_mb += other.disk_mb;
        self.net_mbps += other.net_mbps;
    }

    /// Whether this footprint fits within `limit` on every dimension
    pub fn fits_within(&self, limit: &Resources) -> bool {
        self.cpu <= limit.cpu
            && self.mem_mb <= limit.mem_mb
            && self.disk_mb <= limit.disk_mb
            && self.net_mbps <= limit.net_mbps
    }

    /// The ceiling of `self / unit` on each dimension, ignoring dimensions where
    /// `unit` is zero
    fn ceil_div(value: u64, unit: u64) -> u64 {
        if unit == 0 {
            0
        } else {
            value.div_ceil(unit)
        }
    }

    /// The dominant-resource instance count needed to place this aggregate
    /// footprint given a per-instance resource unit: the max of the four
    /// per-dimension ceiling ratios
    pub fn dominant_instance_count(&self, unit: &Resources) -> u64 {
        [
            Self::ceil_div(self.cpu, unit.cpu),
            Self::ceil_div(self.mem_mb, unit.mem_mb),
            Self::ceil_div(self.disk_mb, unit.disk_mb),
            Self::ceil_div(self.net_mbps, unit.net_mbps),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// A job's catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// The unique id for this job
    pub id: Uuid,
    /// The resources each task of this job requests
    pub container_resources: Resources,
    /// Hard constraints this job's tasks must satisfy, e.g. `machineid`
    #[serde(default)]
    pub hard_constraints: HashMap<String, String>,
}

/// The reasons a task can fail to be placed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Every agent in the tier is already full
    AllAgentsFull,
    /// A transient queueing artifact from the launch guard
    LaunchGuard,
    /// The task could not be placed due to a hard constraint
    Constraint,
    /// An explicit signal that this failure must never drive autoscaling
    NeverTriggerAutoscaling,
    /// Any other failure kind this crate does not special-case
    Other(String),
}

/// A single placement failure reported by the scheduling service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementFailure {
    /// The task that failed to place
    pub task_id: Uuid,
    /// The tier this task was being placed into
    pub tier: Tier,
    /// Why placement failed
    pub failure_kind: FailureKind,
}

/// Hard-constraint keys that pin a task to a specific host; scaling cannot help
/// a task constrained this way
pub const UNSCALABLE_HARD_CONSTRAINTS: &[&str] = &["machineid", "machinetype"];
