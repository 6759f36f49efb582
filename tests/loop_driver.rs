//! End-to-end exercise of `AutoscalerLoop::run_iteration` against the
//! in-memory fakes, standing in for the three external collaborators.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use fleet_autoscaler::config::{AutoscalerConf, CollaboratorConf, TierConfig};
use fleet_autoscaler::model::{
    FailureKind, Instance, InstanceGroup, InstanceGroupState, InstanceState, PlacementFailure,
    Resources, Tier,
};
use fleet_autoscaler::test_utilities::{FakeAgentManagement, FakeJobOperations, FakeSchedulingService};
use fleet_autoscaler::AutoscalerLoop;

fn collaborator_conf() -> CollaboratorConf {
    CollaboratorConf {
        base_url: "http://unused.invalid".to_string(),
        request_timeout_ms: 10_000,
    }
}

fn conf(tiers: HashMap<Tier, TierConfig>) -> AutoscalerConf {
    AutoscalerConf {
        enabled: true,
        iteration_interval_ms: 30_000,
        activation_delay_ms: 0,
        evaluation_timeout_ms: 300_000,
        agent_instance_removable_timeout_ms: 600_000,
        tiers,
        agent_management: collaborator_conf(),
        scheduling_service: collaborator_conf(),
        job_operations: collaborator_conf(),
    }
}

/// A shortfall against `minIdle`, with no idle instances on hand at all,
/// drives a scale-up call against the one eligible group.
#[tokio::test]
async fn min_idle_shortfall_drives_a_real_scale_up_call() {
    let now = Utc::now();

    let group = InstanceGroup {
        id: "grp-critical-1".to_string(),
        tier: Tier::Critical,
        instance_type: "c5.xlarge".to_string(),
        min: 1,
        current: 1,
        desired: 1,
        max: 5,
        lifecycle_state: InstanceGroupState::Active,
        attributes: HashMap::new(),
    };

    let agent_management = Arc::new(FakeAgentManagement::new());
    *agent_management.groups.lock().unwrap() = vec![group];
    agent_management.instances.lock().unwrap().insert("grp-critical-1".to_string(), Vec::new());
    agent_management.resource_limits.lock().unwrap().insert(
        "c5.xlarge".to_string(),
        Resources { cpu: 16, mem_mb: 32_000, disk_mb: 100_000, net_mbps: 1_000 },
    );

    let mut tiers = HashMap::new();
    tiers.insert(
        Tier::Critical,
        TierConfig {
            primary_instance_type: "c5.xlarge".to_string(),
            min_idle: 1,
            max_idle: 5,
            scale_up_cooldown_ms: 0,
            scale_down_cooldown_ms: 0,
            idle_instance_grace_period_ms: 0,
            task_slo_ms: 300_000,
        },
    );

    let mut autoscaler = AutoscalerLoop::new(
        conf(tiers),
        Arc::clone(&agent_management) as Arc<dyn fleet_autoscaler::collaborators::AgentManagement>,
        Arc::new(FakeSchedulingService::new()),
        Arc::new(FakeJobOperations::new()),
    );

    autoscaler.run_iteration().await.expect("iteration should succeed");

    let calls = agent_management.scale_up_calls.lock().unwrap();
    assert_eq!(calls.as_slice(), &[("grp-critical-1".to_string(), 1)]);
    let _ = now;
}

/// A placement failure outside the launch guard, for a task that fits the
/// tier's resource unit, drives a scale-up sized by the dominant resource
/// dimension rather than by `minIdle` alone.
#[tokio::test]
async fn placement_failure_drives_dominant_resource_scale_up() {
    let now = Utc::now();

    let group = InstanceGroup {
        id: "grp-flex-1".to_string(),
        tier: Tier::Flex,
        instance_type: "m5.large".to_string(),
        min: 0,
        current: 0,
        desired: 0,
        max: 10,
        lifecycle_state: InstanceGroupState::Active,
        attributes: HashMap::new(),
    };

    let agent_management = Arc::new(FakeAgentManagement::new());
    *agent_management.groups.lock().unwrap() = vec![group];
    agent_management.instances.lock().unwrap().insert("grp-flex-1".to_string(), Vec::new());
    agent_management.resource_limits.lock().unwrap().insert(
        "m5.large".to_string(),
        Resources { cpu: 16, mem_mb: 32_000, disk_mb: 100_000, net_mbps: 1_000 },
    );

    let job_operations = FakeJobOperations::new();
    let job_id = uuid::Uuid::new_v4();
    let task_id = uuid::Uuid::new_v4();
    job_operations.jobs.lock().unwrap().push(fleet_autoscaler::model::Job {
        id: job_id,
        container_resources: Resources { cpu: 48, mem_mb: 1_000, disk_mb: 1_000, net_mbps: 10 },
        hard_constraints: HashMap::new(),
    });
    job_operations.tasks.lock().unwrap().push(fleet_autoscaler::model::Task {
        id: task_id,
        job_id,
        status: fleet_autoscaler::model::TaskStatus {
            state: fleet_autoscaler::model::TaskState::Running,
            timestamp: now,
        },
        assigned_agent_id: None,
    });

    let scheduling_service = FakeSchedulingService::new();
    scheduling_service.failures.lock().unwrap().push(PlacementFailure {
        task_id,
        tier: Tier::Flex,
        failure_kind: FailureKind::AllAgentsFull,
    });

    let mut tiers = HashMap::new();
    tiers.insert(
        Tier::Flex,
        TierConfig {
            primary_instance_type: "m5.large".to_string(),
            min_idle: 0,
            max_idle: 5,
            scale_up_cooldown_ms: 0,
            scale_down_cooldown_ms: 0,
            idle_instance_grace_period_ms: 0,
            task_slo_ms: 300_000,
        },
    );

    let mut autoscaler = AutoscalerLoop::new(
        conf(tiers),
        Arc::clone(&agent_management) as Arc<dyn fleet_autoscaler::collaborators::AgentManagement>,
        Arc::new(scheduling_service),
        Arc::new(job_operations),
    );

    autoscaler.run_iteration().await.expect("iteration should succeed");

    // 48 cpu against a 16 cpu unit: ceil(48/16) = 3
    let calls = agent_management.scale_up_calls.lock().unwrap();
    assert_eq!(calls.as_slice(), &[("grp-flex-1".to_string(), 3)]);
}

/// An instance already idle past `maxIdle`, with no competing demand, is
/// marked `REMOVABLE` through a real `update_agent_instance_attributes` call.
#[tokio::test]
async fn idle_surplus_marks_an_instance_removable() {
    let now = Utc::now();

    let group = InstanceGroup {
        id: "grp-flex-2".to_string(),
        tier: Tier::Flex,
        instance_type: "m5.large".to_string(),
        min: 0,
        current: 3,
        desired: 3,
        max: 10,
        lifecycle_state: InstanceGroupState::Active,
        attributes: HashMap::new(),
    };

    let idle_instances = vec![
        Instance {
            id: "inst-1".to_string(),
            instance_group_id: "grp-flex-2".to_string(),
            lifecycle_state: InstanceState::Started,
            launch_timestamp: now - chrono::Duration::hours(1),
            attributes: HashMap::new(),
        },
        Instance {
            id: "inst-2".to_string(),
            instance_group_id: "grp-flex-2".to_string(),
            lifecycle_state: InstanceState::Started,
            launch_timestamp: now - chrono::Duration::hours(1),
            attributes: HashMap::new(),
        },
    ];

    let agent_management = Arc::new(FakeAgentManagement::new());
    *agent_management.groups.lock().unwrap() = vec![group];
    agent_management.instances.lock().unwrap().insert("grp-flex-2".to_string(), idle_instances);
    agent_management.resource_limits.lock().unwrap().insert(
        "m5.large".to_string(),
        Resources { cpu: 16, mem_mb: 32_000, disk_mb: 100_000, net_mbps: 1_000 },
    );

    let mut tiers = HashMap::new();
    tiers.insert(
        Tier::Flex,
        TierConfig {
            primary_instance_type: "m5.large".to_string(),
            min_idle: 0,
            max_idle: 1,
            scale_up_cooldown_ms: 0,
            scale_down_cooldown_ms: 0,
            idle_instance_grace_period_ms: 0,
            task_slo_ms: 300_000,
        },
    );

    let mut autoscaler = AutoscalerLoop::new(
        conf(tiers),
        Arc::clone(&agent_management) as Arc<dyn fleet_autoscaler::collaborators::AgentManagement>,
        Arc::new(FakeSchedulingService::new()),
        Arc::new(FakeJobOperations::new()),
    );

    autoscaler.run_iteration().await.expect("iteration should succeed");

    let calls = agent_management.update_attribute_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1.contains_key(fleet_autoscaler::model::REMOVABLE));
}
