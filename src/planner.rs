//! The action planner: turns an approved scale-up/scale-down count into
//! concrete per-group actions
//!
//! Pure functions over the snapshot's groups/instances; the loop driver is
//! responsible for actually calling `AgentManagement` and folding the results
//! back into cooldown bookkeeping.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::{Instance, InstanceGroup, REMOVABLE, SYSTEM_NO_PLACEMENT};

/// A single scale-up action to issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleUpAction {
    /// The group to scale
    pub group_id: String,
    /// How many instances to add
    pub count: u64,
}

/// A single scale-down marking to issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleDownAction {
    /// The instance to mark
    pub instance_id: String,
    /// The attributes to set on it
    pub attributes: HashMap<String, String>,
}

/// Distribute an approved scale-up count across a tier's scalable groups,
/// preferring `Active` groups before `PhasedOut` ones (the order `groups` is
/// already sorted in)
///
/// # Arguments
///
/// * `groups` - The tier's scalable groups, in preference order
/// * `approved` - The number of agents approved by the rate limiter
pub fn plan_scale_up(groups: &[&InstanceGroup], approved: u64) -> Vec<ScaleUpAction> {
    let mut remaining = approved;
    let mut actions = Vec::new();
    for group in groups {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(group.headroom());
        if take > 0 {
            actions.push(ScaleUpAction {
                group_id: group.id.clone(),
                count: take,
            });
            remaining -= take;
        }
    }
    actions
}

/// Distribute an approved scale-down count across a tier's scalable groups,
/// preferring `PhasedOut` groups before `Active` ones (the reverse of the
/// scale-up preference order)
///
/// # Arguments
///
/// * `groups` - The tier's scalable groups, in scale-up preference order
///   (this function consumes them in reverse)
/// * `instances_by_group` - Every instance in each scalable group, used to
///   count the instances already marked `REMOVABLE` ahead of this iteration
/// * `idle_instances` - The instances counted idle this iteration (never
///   already `REMOVABLE`, by construction of the idle selection step)
/// * `approved` - The number of agents approved by the rate limiter
/// * `now` - The current time, stamped onto the `REMOVABLE` marking
pub fn plan_scale_down(
    groups: &[&InstanceGroup],
    instances_by_group: &HashMap<String, Vec<Instance>>,
    idle_instances: &[Instance],
    approved: u64,
    now: DateTime<Utc>,
) -> Vec<ScaleDownAction> {
    let mut idle_by_group: HashMap<&str, Vec<&Instance>> = HashMap::new();
    for instance in idle_instances {
        idle_by_group
            .entry(instance.instance_group_id.as_str())
            .or_default()
            .push(instance);
    }

    let mut remaining = approved;
    let mut actions = Vec::new();
    for group in groups.iter().rev() {
        if remaining == 0 {
            break;
        }
        if group.not_removable() {
            continue;
        }
        let Some(group_idle) = idle_by_group.get(group.id.as_str()) else {
            continue;
        };
        let already_removable = instances_by_group
            .get(&group.id)
            .into_iter()
            .flatten()
            .filter(|instance| instance.is_removable())
            .count() as u64;
        let floor_cap = group
            .current
            .saturating_sub(group.min)
            .saturating_sub(already_removable);
        let take = remaining.min(floor_cap).min(group_idle.len() as u64);
        for instance in group_idle.iter().take(take as usize) {
            if instance.is_not_removable() {
                continue;
            }
            let mut attributes = HashMap::new();
            attributes.insert(REMOVABLE.to_string(), now.timestamp_millis().to_string());
            attributes.insert(SYSTEM_NO_PLACEMENT.to_string(), "true".to_string());
            actions.push(ScaleDownAction {
                instance_id: instance.id.clone(),
                attributes,
            });
        }
        remaining -= take;
    }
    actions
}
