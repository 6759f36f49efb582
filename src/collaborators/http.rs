//! Thin HTTP-backed implementations of the collaborator traits
//!
//! Grounded on the teacher's own client handlers (e.g. `api/src/client/system.rs`):
//! one small struct per API surface holding a base host and a shared
//! `reqwest::Client`, with each trait method mapping onto a single request.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::config::CollaboratorConf;
use crate::error::Error;
use crate::model::{Instance, InstanceGroup, Job, PlacementFailure, Resources, Task};

use super::{AgentManagement, JobOperations, SchedulingService};

/// An HTTP-backed `AgentManagement` client
#[derive(Clone)]
pub struct HttpAgentManagement {
    /// The base URL of the agent management API
    host: String,
    /// The shared reqwest client
    client: reqwest::Client,
}

impl HttpAgentManagement {
    /// Build a new HTTP `AgentManagement` client
    ///
    /// # Arguments
    ///
    /// * `conf` - The collaborator's connection settings
    pub fn new(conf: &CollaboratorConf) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(conf.request_timeout_ms))
            .build()?;
        Ok(HttpAgentManagement {
            host: conf.base_url.clone(),
            client,
        })
    }
}

#[derive(Serialize)]
struct ScaleUpRequest {
    delta: u64,
}

#[derive(Serialize)]
struct AttributesRequest {
    attributes: HashMap<String, String>,
}

#[derive(Serialize)]
struct DeleteAttributesRequest<'a> {
    keys: &'a [String],
}

#[async_trait::async_trait]
impl AgentManagement for HttpAgentManagement {
    async fn list_instance_groups(&self) -> Result<Vec<InstanceGroup>, Error> {
        let url = format!("{}/instance_groups", self.host);
        let resp = self.client.get(url).send().await?;
        Ok(resp.json().await?)
    }

    async fn list_instances(&self, group_id: &str) -> Result<Vec<Instance>, Error> {
        let url = format!("{}/instance_groups/{group_id}/instances", self.host);
        let resp = self.client.get(url).send().await?;
        Ok(resp.json().await?)
    }

    async fn resource_limits(&self, instance_type: &str) -> Result<Resources, Error> {
        let url = format!("{}/resource_limits/{instance_type}", self.host);
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::collaborator(format!(
                "unknown instance type {instance_type}"
            )));
        }
        Ok(resp.json().await?)
    }

    async fn scale_up(&self, group_id: &str, delta: u64) -> Result<(), Error> {
        let url = format!("{}/instance_groups/{group_id}/scale_up", self.host);
        self.client
            .post(url)
            .json(&ScaleUpRequest { delta })
            .send()
            .await?;
        Ok(())
    }

    async fn update_agent_instance_attributes(
        &self,
        instance_id: &str,
        attributes: HashMap<String, String>,
    ) -> Result<(), Error> {
        let url = format!("{}/instances/{instance_id}/attributes", self.host);
        self.client
            .post(url)
            .json(&AttributesRequest { attributes })
            .send()
            .await?;
        Ok(())
    }

    async fn delete_agent_instance_attributes(
        &self,
        instance_id: &str,
        keys: &[String],
    ) -> Result<(), Error> {
        let url = format!("{}/instances/{instance_id}/attributes/delete", self.host);
        self.client
            .post(url)
            .json(&DeleteAttributesRequest { keys })
            .send()
            .await?;
        Ok(())
    }
}

/// An HTTP-backed `SchedulingService` client
#[derive(Clone)]
pub struct HttpSchedulingService {
    /// The base URL of the scheduling/placement API
    host: String,
    /// The shared reqwest client
    client: reqwest::Client,
}

impl HttpSchedulingService {
    /// Build a new HTTP `SchedulingService` client
    ///
    /// # Arguments
    ///
    /// * `conf` - The collaborator's connection settings
    pub fn new(conf: &CollaboratorConf) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(conf.request_timeout_ms))
            .build()?;
        Ok(HttpSchedulingService {
            host: conf.base_url.clone(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl SchedulingService for HttpSchedulingService {
    async fn last_task_placement_failures(&self) -> Result<Vec<PlacementFailure>, Error> {
        let url = format!("{}/placement_failures", self.host);
        let resp = self.client.get(url).send().await?;
        Ok(resp.json().await?)
    }
}

/// An HTTP-backed `JobOperations` client
#[derive(Clone)]
pub struct HttpJobOperations {
    /// The base URL of the job catalog API
    host: String,
    /// The shared reqwest client
    client: reqwest::Client,
}

impl HttpJobOperations {
    /// Build a new HTTP `JobOperations` client
    ///
    /// # Arguments
    ///
    /// * `conf` - The collaborator's connection settings
    pub fn new(conf: &CollaboratorConf) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(conf.request_timeout_ms))
            .build()?;
        Ok(HttpJobOperations {
            host: conf.base_url.clone(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl JobOperations for HttpJobOperations {
    async fn list_jobs(&self) -> Result<Vec<Job>, Error> {
        let url = format!("{}/jobs", self.host);
        let resp = self.client.get(url).send().await?;
        Ok(resp.json().await?)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, Error> {
        let url = format!("{}/tasks", self.host);
        let resp = self.client.get(url).send().await?;
        Ok(resp.json().await?)
    }
}
