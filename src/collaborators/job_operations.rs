//! The job/task catalog collaborator
//!
//! Out of scope per spec section 1; each call returns the full current set.

use crate::error::Error;
use crate::model::{Job, Task};

/// The methods required to read the current job/task catalog
#[async_trait::async_trait]
pub trait JobOperations: Send + Sync {
    /// List every job currently known to the catalog
    async fn list_jobs(&self) -> Result<Vec<Job>, Error>;

    /// List every task currently known to the catalog
    async fn list_tasks(&self) -> Result<Vec<Task>, Error>;
}
