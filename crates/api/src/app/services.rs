//! Service wiring: stores, locking, the order engine, and the job executor.

use std::sync::Arc;
use std::time::Duration;

use stockroom_infra::catalog::CatalogService;
use stockroom_infra::engine::OrderEngine;
use stockroom_infra::jobs::{InMemoryJobStore, JobExecutor, JobExecutorHandle, JobStore};
use stockroom_infra::locks::LockRegistry;
use stockroom_infra::stores::{
    CatalogStore, InMemoryCatalogStore, InMemoryOrderStore, InMemoryReportStore, OrderStore,
    ReportStore,
};
use stockroom_infra::summary::{SummaryJobHandler, SummaryService};

#[cfg(feature = "postgres")]
use sqlx::PgPool;
#[cfg(feature = "postgres")]
use stockroom_infra::stores::{PostgresCatalogStore, PostgresOrderStore, PostgresReportStore};

/// Shared application services handed to every handler.
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub engine: Arc<OrderEngine>,
    pub summaries: Arc<SummaryService>,
    pub orders: Arc<dyn OrderStore>,
    pub reports: Arc<dyn ReportStore>,
    executor: JobExecutorHandle,
}

impl AppServices {
    /// Stop the background job executor.
    pub async fn shutdown(self) {
        self.executor.shutdown().await;
    }
}

/// Build services per environment configuration.
///
/// `USE_PERSISTENT_STORES=true` selects the Postgres-backed stores; the
/// binary must then be compiled with the `postgres` feature and
/// `DATABASE_URL` must point at a migrated database. Everything else runs
/// on the in-memory stores.
pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    if use_persistent {
        #[cfg(feature = "postgres")]
        {
            return build_persistent_services().await;
        }
        #[cfg(not(feature = "postgres"))]
        tracing::warn!(
            "USE_PERSISTENT_STORES is set but the postgres feature is compiled out; using in-memory stores"
        );
    }

    build_in_memory_services()
}

pub fn build_in_memory_services() -> AppServices {
    wire(
        Arc::new(InMemoryCatalogStore::new()),
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(InMemoryReportStore::new()),
    )
}

#[cfg(feature = "postgres")]
pub async fn build_persistent_services() -> AppServices {
    let url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for persistent stores");
    let pool = PgPool::connect(&url)
        .await
        .expect("failed to connect to postgres");

    wire(
        Arc::new(PostgresCatalogStore::new(pool.clone())),
        Arc::new(PostgresOrderStore::new(pool.clone())),
        Arc::new(PostgresReportStore::new(pool)),
    )
}

fn wire(
    catalog_store: Arc<dyn CatalogStore>,
    orders: Arc<dyn OrderStore>,
    reports: Arc<dyn ReportStore>,
) -> AppServices {
    // One registry: catalog edits and order reservations contend on the
    // same per-product locks.
    let locks = Arc::new(LockRegistry::new());
    let jobs: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());

    let catalog = Arc::new(CatalogService::new(catalog_store.clone(), locks.clone()));
    let engine = Arc::new(OrderEngine::new(
        catalog_store.clone(),
        orders.clone(),
        locks,
    ));
    let summaries = Arc::new(SummaryService::new(
        catalog_store,
        orders.clone(),
        reports.clone(),
        jobs.clone(),
    ));

    let mut executor = JobExecutor::new(jobs);
    executor.register(Arc::new(SummaryJobHandler::new(summaries.clone())));
    let executor = executor.spawn(poll_interval());

    AppServices {
        catalog,
        engine,
        summaries,
        orders,
        reports,
        executor,
    }
}

fn poll_interval() -> Duration {
    let ms = std::env::var("JOB_POLL_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(100);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_infra::summary::{SubmitOutcome, SummaryRequest};

    #[tokio::test]
    async fn wired_services_process_summary_jobs() {
        let services = build_in_memory_services();

        let outcome = services
            .summaries
            .submit(SummaryRequest {
                first_date: Some("2000-01-01".to_string()),
                second_date: Some("2100-01-01".to_string()),
                name: Some(serde_json::json!("wiring-check")),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Scheduled { .. }));

        let mut report = None;
        for _ in 0..100 {
            if let Some(found) = services.reports.get_by_name("wiring-check").await.unwrap() {
                report = Some(found);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        services.shutdown().await;

        let report = report.expect("summary job never produced a report");
        assert_eq!(report.name, "wiring-check");
        assert_eq!(report.artifact, "reports/wiring-check.csv");
    }
}
