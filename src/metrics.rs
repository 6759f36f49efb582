//! Per-tier gauges, pushed once per iteration as a structured log event
//!
//! The teacher's source polls a gauge that reads back off the autoscaler
//! itself; that cyclic registry/component reference is dropped here in favor
//! of an explicit push after each tier's evaluation, with no backreference.

use tracing::{event, Level};

use crate::model::Tier;

/// The gauge values emitted for a single tier in a single iteration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierGauges {
    /// How many instances were counted idle
    pub total_idle_instances: u64,
    /// How many tasks were failing placement, after exclusion filters
    pub total_failed_tasks: u64,
    /// How many accepted tasks had crossed their SLO
    pub total_tasks_past_slo: u64,
    /// How many distinct tasks contributed to scale-up demand
    pub total_tasks_for_scale_up: u64,
    /// How many agents the evaluator proposed adding
    pub total_agents_to_scale_up: u64,
    /// How many agents were actually requested from the planner
    pub total_agents_being_scaled_up: u64,
    /// How many agents the evaluator proposed removing
    pub total_agents_to_scale_down: u64,
    /// How many agents were actually marked `REMOVABLE`
    pub total_agents_being_scaled_down: u64,
}

/// Push a tier's gauge values for this iteration as a single structured event
///
/// # Arguments
///
/// * `tier` - The tier these gauges belong to
/// * `gauges` - The values to push
pub fn push(tier: Tier, gauges: &TierGauges) {
    event!(
        Level::INFO,
        tier = %tier,
        total_idle_instances = gauges.total_idle_instances,
        total_failed_tasks = gauges.total_failed_tasks,
        total_tasks_past_slo = gauges.total_tasks_past_slo,
        total_tasks_for_scale_up = gauges.total_tasks_for_scale_up,
        total_agents_to_scale_up = gauges.total_agents_to_scale_up,
        total_agents_being_scaled_up = gauges.total_agents_being_scaled_up,
        total_agents_to_scale_down = gauges.total_agents_to_scale_down,
        total_agents_being_scaled_down = gauges.total_agents_being_scaled_down,
        "tier evaluation gauges",
    );
}
