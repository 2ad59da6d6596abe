//! Fire-and-forget background jobs with retry and backoff.
//!
//! ## Design
//!
//! - Jobs carry a string kind and a JSON payload
//! - Retry policy with exponential backoff
//! - Exhausted jobs are dead-lettered in place for inspection
//! - Handlers must be idempotent; a crash between attempt and update
//!   means the same job can run twice
//!
//! ## Components
//!
//! - `Job`: Core job abstraction with payload and metadata
//! - `JobStore`: Persistence for jobs (in-memory for now)
//! - `JobExecutor`: Polls the store and routes jobs to handlers

pub mod executor;
pub mod store;
pub mod types;

pub use executor::{JobExecutor, JobExecutorHandle, JobHandler};
pub use store::{InMemoryJobStore, JobCounts, JobStore};
pub use types::{BackoffStrategy, Job, JobId, JobStatus, RetryPolicy};
