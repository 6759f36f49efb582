//! The external collaborators the autoscaler reads from and writes to
//!
//! These are out of scope per spec section 1 — the real cloud API, placement
//! service, and job catalog are owned by other systems. Each is modeled as an
//! `async_trait` so the decision loop can be exercised against an in-memory
//! fake in tests, the same way the teacher's `Scheduler` trait lets the
//! `Scaler` run against a `DryRun` cluster.

pub mod agent_management;
pub mod http;
pub mod job_operations;
pub mod scheduling_service;

pub use agent_management::AgentManagement;
pub use job_operations::JobOperations;
pub use scheduling_service::SchedulingService;
