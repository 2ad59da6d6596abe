//! Job executor with retry and backoff logic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use stockroom_core::DomainResult;

use super::store::JobStore;
use super::types::Job;

/// Handler for one kind of job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job kind this handler consumes.
    fn kind(&self) -> &str;

    /// Execute one job. An error marks the attempt failed and lets the
    /// retry policy decide what happens next.
    async fn run(&self, job: &Job) -> DomainResult<()>;
}

/// Handle to control a running executor.
#[derive(Debug)]
pub struct JobExecutorHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl JobExecutorHandle {
    /// Request graceful shutdown and wait for the polling task to stop.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

/// Background job executor.
///
/// Polls a job store for claimable jobs and routes each to the handler
/// registered for its kind. Failures go through the job's retry policy;
/// a dead-lettered job stays in the store for inspection.
pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its own kind.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.kind().to_string(), handler);
    }

    /// Claim and run a single job, returning it in its settled state.
    ///
    /// `Ok(None)` means nothing was ready. A handler failure is not an
    /// `Err` here; it is recorded on the returned job's status.
    pub async fn execute_one(&self) -> DomainResult<Option<Job>> {
        let Some(job) = self.store.claim_next().await? else {
            return Ok(None);
        };
        let settled = self.run_claimed(job).await?;
        Ok(Some(settled))
    }

    async fn run_claimed(&self, mut job: Job) -> DomainResult<Job> {
        let Some(handler) = self.handlers.get(&job.kind) else {
            let error = format!("no handler for job kind: {}", job.kind);
            warn!(job_id = %job.id, kind = %job.kind, "no handler for job");
            job.mark_failed(error);
            self.store.update(&job).await?;
            return Ok(job);
        };

        match handler.run(&job).await {
            Ok(()) => {
                job.mark_completed();
                debug!(job_id = %job.id, kind = %job.kind, "job completed");
            }
            Err(err) => {
                warn!(job_id = %job.id, kind = %job.kind, error = %err, "job attempt failed");
                job.mark_failed(err.to_string());
            }
        }
        self.store.update(&job).await?;
        Ok(job)
    }

    /// Spawn the executor as a background polling task.
    pub fn spawn(self, poll_interval: Duration) -> JobExecutorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            info!("job executor started");
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                match self.execute_one().await {
                    Ok(Some(_)) => {
                        // Keep draining while work is available.
                    }
                    Ok(None) => tokio::time::sleep(poll_interval).await,
                    Err(err) => {
                        error!(error = %err, "failed to claim job");
                        tokio::time::sleep(poll_interval).await;
                    }
                }
            }
            info!("job executor stopped");
        });

        JobExecutorHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use stockroom_core::DomainError;

    use crate::jobs::store::InMemoryJobStore;
    use crate::jobs::types::{JobStatus, RetryPolicy};

    struct RecordingHandler {
        kind: &'static str,
        calls: AtomicUsize,
        fail: bool,
    }

    impl RecordingHandler {
        fn new(kind: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                calls: AtomicUsize::new(0),
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        fn kind(&self) -> &str {
            self.kind
        }

        async fn run(&self, _job: &Job) -> DomainResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(DomainError::internal("handler exploded"))
            } else {
                Ok(())
            }
        }
    }

    fn executor_with(
        handler: Arc<RecordingHandler>,
    ) -> (JobExecutor, Arc<InMemoryJobStore>) {
        let store = Arc::new(InMemoryJobStore::new());
        let mut executor = JobExecutor::new(store.clone());
        executor.register(handler);
        (executor, store)
    }

    #[tokio::test]
    async fn execute_one_completes_a_job() {
        let handler = RecordingHandler::new("report.render", false);
        let (executor, store) = executor_with(handler.clone());

        store
            .enqueue(Job::new("report.render", serde_json::json!({})))
            .await
            .unwrap();

        let job = executor.execute_one().await.unwrap().unwrap();
        assert!(matches!(job.status, JobStatus::Completed));
        assert_eq!(handler.calls(), 1);
        assert_eq!(store.counts().await.unwrap().completed, 1);
    }

    #[tokio::test]
    async fn execute_one_returns_none_when_idle() {
        let handler = RecordingHandler::new("report.render", false);
        let (executor, _) = executor_with(handler);

        assert!(executor.execute_one().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_attempts_follow_the_retry_policy() {
        let handler = RecordingHandler::new("report.render", true);
        let (executor, store) = executor_with(handler.clone());

        let job = Job::new("report.render", serde_json::json!({})).with_retry_policy(
            RetryPolicy::fixed(1, Duration::ZERO),
        );
        let job_id = store.enqueue(job).await.unwrap();

        let settled = executor.execute_one().await.unwrap().unwrap();
        assert!(matches!(settled.status, JobStatus::Failed { attempt: 1, .. }));

        let settled = executor.execute_one().await.unwrap().unwrap();
        assert!(matches!(
            settled.status,
            JobStatus::DeadLettered { attempts: 2, .. }
        ));
        assert_eq!(handler.calls(), 2);

        // Dead-lettered jobs stay visible but are never claimed again.
        assert!(executor.execute_one().await.unwrap().is_none());
        let parked = store.get(job_id).await.unwrap();
        assert_eq!(parked.last_error.as_deref(), Some("internal error: handler exploded"));
    }

    #[tokio::test]
    async fn unroutable_jobs_are_failed_not_lost() {
        let handler = RecordingHandler::new("report.render", false);
        let (executor, store) = executor_with(handler.clone());

        let job = Job::new("unknown.kind", serde_json::json!({}))
            .with_retry_policy(RetryPolicy::no_retry());
        store.enqueue(job).await.unwrap();

        let settled = executor.execute_one().await.unwrap().unwrap();
        assert!(matches!(settled.status, JobStatus::DeadLettered { .. }));
        assert_eq!(handler.calls(), 0);
    }

    #[tokio::test]
    async fn spawned_executor_drains_the_queue_and_shuts_down() {
        let handler = RecordingHandler::new("report.render", false);
        let (executor, store) = executor_with(handler.clone());

        for i in 0..3 {
            store
                .enqueue(Job::new("report.render", serde_json::json!({"i": i})))
                .await
                .unwrap();
        }

        let handle = executor.spawn(Duration::from_millis(10));

        // Generous bound; the executor polls every 10ms.
        let mut done = false;
        for _ in 0..200 {
            if store.counts().await.unwrap().completed == 3 {
                done = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await;

        assert!(done, "executor did not drain the queue in time");
        assert_eq!(handler.calls(), 3);
    }
}
