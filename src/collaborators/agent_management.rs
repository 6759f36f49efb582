//! The cloud API that grows/shrinks instance groups and marks instances
//!
//! Out of scope per spec section 1; modeled here purely as the interface the
//! decision loop needs, per spec section 6.

use std::collections::HashMap;

use crate::error::Error;
use crate::model::{InstanceGroup, Resources};

/// The methods required to schedule agent instances in a fleet
#[async_trait::async_trait]
pub trait AgentManagement: Send + Sync {
    /// List every instance group this autoscaler can see
    async fn list_instance_groups(&self) -> Result<Vec<InstanceGroup>, Error>;

    /// List every instance belonging to a group
    ///
    /// # Arguments
    ///
    /// * `group_id` - The group to list instances for
    async fn list_instances(&self, group_id: &str) -> Result<Vec<crate::model::Instance>, Error>;

    /// Get the resource limits for an instance type
    ///
    /// # Arguments
    ///
    /// * `instance_type` - The instance type to look up
    async fn resource_limits(&self, instance_type: &str) -> Result<Resources, Error>;

    /// Request that a group scale up by `delta` instances
    ///
    /// # Arguments
    ///
    /// * `group_id` - The group to scale
    /// * `delta` - How many instances to add
    async fn scale_up(&self, group_id: &str, delta: u64) -> Result<(), Error>;

    /// Atomically update an instance's attributes
    ///
    /// # Arguments
    ///
    /// * `instance_id` - The instance to update
    /// * `attributes` - The attribute keys/values to set
    async fn update_agent_instance_attributes(
        &self,
        instance_id: &str,
        attributes: HashMap<String, String>,
    ) -> Result<(), Error>;

    /// Delete the given attribute keys from an instance
    ///
    /// # Arguments
    ///
    /// * `instance_id` - The instance to update
    /// * `keys` - The attribute keys to remove
    async fn delete_agent_instance_attributes(
        &self,
        instance_id: &str,
        keys: &[String],
    ) -> Result<(), Error>;
}
