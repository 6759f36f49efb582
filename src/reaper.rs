//! The removable reaper guard
//!
//! Recovers hosts marked `REMOVABLE` but never terminated by the external
//! reaper (it was down, or a downstream call was dropped), by clearing the
//! marking once it has sat longer than `removableTimeout`.

use chrono::{DateTime, Utc};

use crate::model::{Instance, InstanceGroup, REMOVABLE, SYSTEM_NO_PLACEMENT};

/// An instance whose `REMOVABLE` marking should be cleared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperAction {
    /// The instance to clear
    pub instance_id: String,
    /// The attribute keys to delete
    pub keys: Vec<String>,
}

/// Scan every instance in every considered group for an expired `REMOVABLE`
/// marking
///
/// # Arguments
///
/// * `groups` - The groups to scan
/// * `instances_by_group` - Every instance in each group
/// * `now` - The current time
/// * `removable_timeout_ms` - How long a marking may sit before it's cleared
pub fn find_expired_removable(
    groups: &[InstanceGroup],
    instances_by_group: &std::collections::HashMap<String, Vec<Instance>>,
    now: DateTime<Utc>,
    removable_timeout_ms: i64,
) -> Vec<ReaperAction> {
    groups
        .iter()
        .filter_map(|group| instances_by_group.get(&group.id))
        .flatten()
        .filter_map(|instance| {
            let marked_at = instance.removable_marked_at()?;
            let elapsed = now.timestamp_millis() - marked_at;
            if elapsed >= removable_timeout_ms {
                Some(ReaperAction {
                    instance_id: instance.id.clone(),
                    keys: vec![REMOVABLE.to_string(), SYSTEM_NO_PLACEMENT.to_string()],
                })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InstanceGroupState, InstanceState, Tier};
    use std::collections::HashMap;

    #[test]
    fn clears_instances_past_removable_timeout() {
        let now = Utc::now();
        let marked_at = now.timestamp_millis() - 1_000;
        let mut attributes = HashMap::new();
        attributes.insert(REMOVABLE.to_string(), marked_at.to_string());
        let instance = Instance {
            id: "i1".to_string(),
            instance_group_id: "g1".to_string(),
            lifecycle_state: InstanceState::Started,
            launch_timestamp: now,
            attributes,
        };
        let group = InstanceGroup {
            id: "g1".to_string(),
            tier: Tier::Flex,
            instance_type: "m5.large".to_string(),
            min: 0,
            current: 1,
            desired: 1,
            max: 5,
            lifecycle_state: InstanceGroupState::Active,
            attributes: HashMap::new(),
        };
        let instances_by_group = HashMap::from([("g1".to_string(), vec![instance])]);
        let actions = find_expired_removable(&[group], &instances_by_group, now, 500);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].instance_id, "i1");
    }

    #[test]
    fn leaves_fresh_markings_alone() {
        let now = Utc::now();
        let marked_at = now.timestamp_millis();
        let mut attributes = HashMap::new();
        attributes.insert(REMOVABLE.to_string(), marked_at.to_string());
        let instance = Instance {
            id: "i1".to_string(),
            instance_group_id: "g1".to_string(),
            lifecycle_state: InstanceState::Started,
            launch_timestamp: now,
            attributes,
        };
        let group = InstanceGroup {
            id: "g1".to_string(),
            tier: Tier::Flex,
            instance_type: "m5.large".to_string(),
            min: 0,
            current: 1,
            desired: 1,
            max: 5,
            lifecycle_state: InstanceGroupState::Active,
            attributes: HashMap::new(),
        };
        let instances_by_group = HashMap::from([("g1".to_string(), vec![instance])]);
        let actions = find_expired_removable(&[group], &instances_by_group, now, 600_000);
        assert!(actions.is_empty());
    }
}
