//! The placement/scheduler collaborator
//!
//! Out of scope per spec section 1; reports unschedulable tasks from the most
//! recent placement attempt only.

use crate::error::Error;
use crate::model::PlacementFailure;

/// The methods required to read placement failures from the scheduler
#[async_trait::async_trait]
pub trait SchedulingService: Send + Sync {
    /// Get every placement failure from the most recent placement attempt
    async fn last_task_placement_failures(&self) -> Result<Vec<PlacementFailure>, Error>;
}
