//! An immutable per-iteration view of the cluster
//!
//! Grounded on the teacher's pattern of crawling every collaborator before
//! any scaling math runs (`Scaler::single_scale_loop`'s `allocate`/`update_resources!`
//! step), except the reads here are fired concurrently with `tokio::try_join!`
//! since they are fully independent of each other.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

use crate::collaborators::{AgentManagement, JobOperations, SchedulingService};
use crate::error::Error;
use crate::model::{FailureKind, Instance, InstanceGroup, InstanceGroupState, Job, Task};

/// A read-only snapshot of cluster state, captured atomically at the start
/// of an iteration
#[derive(Debug, Clone)]
pub struct ClusterSnapshot {
    /// Every known job, by id
    pub jobs: HashMap<Uuid, Job>,
    /// Every known task, by id
    pub tasks: HashMap<Uuid, Task>,
    /// Active groups first, then `PhasedOut` groups — the scale-up/scale-down
    /// preference order
    pub active_groups: Vec<InstanceGroup>,
    /// The instances belonging to each group, keyed by group id
    pub instances_by_group: HashMap<String, Vec<Instance>>,
    /// How many tasks are currently assigned to each instance
    pub tasks_on_agent: HashMap<String, u64>,
    /// The most recent placement failures, grouped by tier
    pub failures_by_tier: HashMap<crate::model::Tier, Vec<crate::model::PlacementFailure>>,
    /// The time this snapshot was captured
    pub now: DateTime<Utc>,
}

impl ClusterSnapshot {
    /// Build a snapshot by reading every collaborator concurrently
    ///
    /// # Arguments
    ///
    /// * `agent_management` - The fleet collaborator
    /// * `scheduling_service` - The placement collaborator
    /// * `job_operations` - The job/task catalog collaborator
    /// * `now` - The time to stamp this snapshot with
    #[instrument(skip_all, err(Debug))]
    pub async fn build(
        agent_management: &(dyn AgentManagement),
        scheduling_service: &(dyn SchedulingService),
        job_operations: &(dyn JobOperations),
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        let (groups, jobs, tasks, failures) = tokio::try_join!(
            agent_management.list_instance_groups(),
            job_operations.list_jobs(),
            job_operations.list_tasks(),
            scheduling_service.last_task_placement_failures(),
        )?;

        let mut active_groups: Vec<InstanceGroup> = groups
            .into_iter()
            .filter(InstanceGroup::is_scalable)
            .collect();
        active_groups.sort_by_key(|group| match group.lifecycle_state {
            InstanceGroupState::Active => 0,
            _ => 1,
        });

        let mut instances_by_group = HashMap::new();
        for group in &active_groups {
            let instances = agent_management.list_instances(&group.id).await?;
            instances_by_group.insert(group.id.clone(), instances);
        }

        let mut tasks_on_agent: HashMap<String, u64> = HashMap::new();
        for task in &tasks {
            if let Some(agent_id) = task.assigned_agent_id() {
                *tasks_on_agent.entry(agent_id).or_insert(0) += 1;
            }
        }

        let mut failures_by_tier: HashMap<crate::model::Tier, Vec<_>> = HashMap::new();
        for failure in failures {
            failures_by_tier
                .entry(failure.tier)
                .or_default()
                .push(failure);
        }

        let jobs = jobs.into_iter().map(|job| (job.id, job)).collect();
        let tasks = tasks.into_iter().map(|task| (task.id, task)).collect();

        Ok(ClusterSnapshot {
            jobs,
            tasks,
            active_groups,
            instances_by_group,
            tasks_on_agent,
            failures_by_tier,
            now,
        })
    }

    /// The scalable groups matching a tier and instance type
    pub fn groups_for(&self, tier: crate::model::Tier, instance_type: &str) -> Vec<&InstanceGroup> {
        self.active_groups
            .iter()
            .filter(|group| group.tier == tier && group.instance_type == instance_type)
            .collect()
    }

    /// The tier's placement failures, excluding the given kinds
    ///
    /// # Arguments
    ///
    /// * `tier` - The tier to read failures for
    /// * `ignoring` - The failure kinds to drop from the result
    pub fn failures_for(
        &self,
        tier: crate::model::Tier,
        ignoring: &HashSet<FailureKind>,
    ) -> Vec<&crate::model::PlacementFailure> {
        self.failures_by_tier
            .get(&tier)
            .into_iter()
            .flatten()
            .filter(|failure| !ignoring.contains(&failure.failure_kind))
            .collect()
    }
}
