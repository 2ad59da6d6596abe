//! Job storage implementations.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use stockroom_core::{DomainError, DomainResult};

use super::types::{Job, JobId, JobStatus};

/// Job store abstraction.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Enqueue a new job.
    async fn enqueue(&self, job: Job) -> DomainResult<JobId>;

    /// Get a job by ID.
    async fn get(&self, job_id: JobId) -> DomainResult<Job>;

    /// Update a job.
    async fn update(&self, job: &Job) -> DomainResult<()>;

    /// Claim the next claimable job that is ready to execute, marking it
    /// running. Returns None if no jobs are available.
    async fn claim_next(&self) -> DomainResult<Option<Job>>;

    /// Count jobs by status.
    async fn counts(&self) -> DomainResult<JobCounts>;
}

/// Job counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct JobCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, job: Job) -> DomainResult<JobId> {
        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(DomainError::already_exists("job", job.id.to_string()));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    async fn get(&self, job_id: JobId) -> DomainResult<Job> {
        let jobs = self.jobs.read().unwrap();
        jobs.get(&job_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("job", job_id))
    }

    async fn update(&self, job: &Job) -> DomainResult<()> {
        let mut jobs = self.jobs.write().unwrap();
        if !jobs.contains_key(&job.id) {
            return Err(DomainError::not_found("job", job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn claim_next(&self) -> DomainResult<Option<Job>> {
        let mut jobs = self.jobs.write().unwrap();

        // Oldest ready job first, FIFO within the queue.
        let mut candidates: Vec<_> = jobs
            .values()
            .filter(|j| j.status.is_claimable() && j.is_ready())
            .collect();
        candidates.sort_by_key(|j| j.created_at);

        if let Some(job) = candidates.first() {
            let job_id = job.id;
            if let Some(job) = jobs.get_mut(&job_id) {
                job.mark_running();
                return Ok(Some(job.clone()));
            }
        }

        Ok(None)
    }

    async fn counts(&self) -> DomainResult<JobCounts> {
        let jobs = self.jobs.read().unwrap();
        let mut counts = JobCounts::default();
        for job in jobs.values() {
            match &job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed { .. } => counts.failed += 1,
                JobStatus::DeadLettered { .. } => counts.dead_lettered += 1,
            }
        }
        Ok(counts)
    }
}
