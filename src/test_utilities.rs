//! In-memory fakes for the collaborator traits
//!
//! Grounded on the teacher's `DryRun` scheduler: a `Mutex`-guarded in-memory
//! view of the world that implements the real collaborator traits, so the
//! loop driver and its components can be exercised end-to-end without a
//! network in integration tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::collaborators::{AgentManagement, JobOperations, SchedulingService};
use crate::error::Error;
use crate::model::{Instance, InstanceGroup, Job, PlacementFailure, Resources, Task};

/// An in-memory fake fleet, implementing `AgentManagement` over a fixed
/// in-memory set of groups/instances
#[derive(Debug, Default)]
pub struct FakeAgentManagement {
    /// The instance groups this fake reports
    pub groups: Mutex<Vec<InstanceGroup>>,
    /// The instances belonging to each group, keyed by group id
    pub instances: Mutex<HashMap<String, Vec<Instance>>>,
    /// The resource limits this fake reports per instance type
    pub resource_limits: Mutex<HashMap<String, Resources>>,
    /// Every `scale_up` call received, in order
    pub scale_up_calls: Mutex<Vec<(String, u64)>>,
    /// Every `update_agent_instance_attributes` call received, in order
    pub update_attribute_calls: Mutex<Vec<(String, HashMap<String, String>)>>,
    /// Every `delete_agent_instance_attributes` call received, in order
    pub delete_attribute_calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeAgentManagement {
    /// Build a new fake with no groups, instances, or recorded calls
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AgentManagement for FakeAgentManagement {
    async fn list_instance_groups(&self) -> Result<Vec<InstanceGroup>, Error> {
        Ok(self.groups.lock().expect("groups lock poisoned").clone())
    }

    async fn list_instances(&self, group_id: &str) -> Result<Vec<Instance>, Error> {
        Ok(self
            .instances
            .lock()
            .expect("instances lock poisoned")
            .get(group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn resource_limits(&self, instance_type: &str) -> Result<Resources, Error> {
        self.resource_limits
            .lock()
            .expect("resource_limits lock poisoned")
            .get(instance_type)
            .copied()
            .ok_or_else(|| Error::collaborator(format!("unknown instance type {instance_type}")))
    }

    async fn scale_up(&self, group_id: &str, delta: u64) -> Result<(), Error> {
        self.scale_up_calls
            .lock()
            .expect("scale_up_calls lock poisoned")
            .push((group_id.to_string(), delta));
        Ok(())
    }

    async fn update_agent_instance_attributes(
        &self,
        instance_id: &str,
        attributes: HashMap<String, String>,
    ) -> Result<(), Error> {
        self.update_attribute_calls
            .lock()
            .expect("update_attribute_calls lock poisoned")
            .push((instance_id.to_string(), attributes));
        Ok(())
    }

    async fn delete_agent_instance_attributes(
        &self,
        instance_id: &str,
        keys: &[String],
    ) -> Result<(), Error> {
        self.delete_attribute_calls
            .lock()
            .expect("delete_attribute_calls lock poisoned")
            .push((instance_id.to_string(), keys.to_vec()));
        Ok(())
    }
}

/// An in-memory fake scheduling service reporting a fixed set of placement
/// failures
#[derive(Debug, Default)]
pub struct FakeSchedulingService {
    /// The failures this fake reports on every call
    pub failures: Mutex<Vec<PlacementFailure>>,
}

impl FakeSchedulingService {
    /// Build a new fake reporting no failures
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SchedulingService for FakeSchedulingService {
    async fn last_task_placement_failures(&self) -> Result<Vec<PlacementFailure>, Error> {
        Ok(self
            .failures
            .lock()
            .expect("failures lock poisoned")
            .clone())
    }
}

/// An in-memory fake job/task catalog
#[derive(Debug, Default)]
pub struct FakeJobOperations {
    /// The jobs this fake reports
    pub jobs: Mutex<Vec<Job>>,
    /// The tasks this fake reports
    pub tasks: Mutex<Vec<Task>>,
}

impl FakeJobOperations {
    /// Build a new fake with no jobs or tasks
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl JobOperations for FakeJobOperations {
    async fn list_jobs(&self) -> Result<Vec<Job>, Error> {
        Ok(self.jobs.lock().expect("jobs lock poisoned").clone())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, Error> {
        Ok(self.tasks.lock().expect("tasks lock poisoned").clone())
    }
}
