//! A cluster agent autoscaler: the decision loop that grows and shrinks
//! fleet-wide instance groups based on unschedulable tasks and idle agent
//! population.
//!
//! This crate implements the decision loop only. The cloud API that actually
//! grows/shrinks an instance group, the placement service, and the job/task
//! catalog are external collaborators, modeled as traits in
//! [`collaborators`] with one real HTTP-backed implementation each and an
//! in-memory fake for tests.

pub mod args;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod loop_driver;
pub mod metrics;
pub mod model;
pub mod planner;
pub mod rate_limiter;
pub mod reaper;
pub mod recently_scaled;
pub mod snapshot;
pub mod tier;
pub mod trace;

#[cfg(feature = "test-utilities")]
pub mod test_utilities;

pub use error::Error;
pub use loop_driver::AutoscalerLoop;
