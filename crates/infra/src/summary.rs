//! Summary report scheduling and generation.
//!
//! Submission is fire-and-forget: the request is validated, checked
//! against existing report names, and turned into a background job. The
//! job renders the CSV artifact and files the report record; re-running
//! a name that already exists is a no-op, which makes retries safe.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use stockroom_core::{DomainError, DomainResult, ReportId};
use stockroom_reports::{default_report_name, render_csv, summarize, SummaryReport, Window};

use crate::jobs::{Job, JobHandler, JobStore};
use crate::stores::{CatalogStore, LineFilter, OrderStore, ReportStore};

/// Job kind consumed by [`SummaryJobHandler`].
pub const SUMMARY_JOB_KIND: &str = "summary.generate";

/// Raw report request, straight off the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryRequest {
    pub first_date: Option<String>,
    pub second_date: Option<String>,
    /// Kept as raw JSON so a non-string name can be rejected explicitly
    /// instead of failing opaquely at deserialization.
    pub name: Option<serde_json::Value>,
}

/// What a submission resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A job was enqueued; the report will appear under this name.
    Scheduled { name: String },
    /// A report with this name already exists; nothing was enqueued.
    AlreadyExists { report_id: ReportId, name: String },
}

/// Payload carried by a summary job.
///
/// Dates travel as the raw request strings and are re-parsed by the
/// handler, so the payload stays readable in the job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryJobPayload {
    pub name: String,
    pub first_date: String,
    pub second_date: String,
}

/// Schedules and generates summary reports.
pub struct SummaryService {
    catalog: Arc<dyn CatalogStore>,
    orders: Arc<dyn OrderStore>,
    reports: Arc<dyn ReportStore>,
    jobs: Arc<dyn JobStore>,
}

impl SummaryService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        orders: Arc<dyn OrderStore>,
        reports: Arc<dyn ReportStore>,
        jobs: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            catalog,
            orders,
            reports,
            jobs,
        }
    }

    /// Validate a request and enqueue the generation job.
    ///
    /// Both dates are required and must parse; the name, when given, must
    /// be a JSON string. A name that already has a report short-circuits
    /// to `AlreadyExists` without enqueueing anything.
    #[instrument(skip(self, request), err)]
    pub async fn submit(&self, request: SummaryRequest) -> DomainResult<SubmitOutcome> {
        let (Some(first_date), Some(second_date)) = (request.first_date, request.second_date)
        else {
            return Err(DomainError::invalid_argument(
                "first_date and second_date are required",
            ));
        };
        // Bad dates are rejected here, not discovered inside the job.
        Window::parse(&first_date, &second_date)?;

        let name = match request.name {
            None => default_report_name(Utc::now()),
            Some(serde_json::Value::String(name)) => name,
            Some(other) => {
                return Err(DomainError::invalid_argument(format!(
                    "report name must be a string, got {other}"
                )));
            }
        };

        if let Some(existing) = self.reports.get_by_name(&name).await? {
            info!(report_id = %existing.id, name = %name, "summary report already exists");
            return Ok(SubmitOutcome::AlreadyExists {
                report_id: existing.id,
                name,
            });
        }

        let payload = serde_json::to_value(SummaryJobPayload {
            name: name.clone(),
            first_date,
            second_date,
        })
        .map_err(|e| DomainError::internal(format!("encode summary payload: {e}")))?;
        self.jobs.enqueue(Job::new(SUMMARY_JOB_KIND, payload)).await?;

        info!(name = %name, "summary report scheduled");
        Ok(SubmitOutcome::Scheduled { name })
    }

    /// Aggregate the window, write the artifact, and file the report.
    ///
    /// Idempotent per name: if the report already exists, before or mid
    /// way through a race, the existing record is returned untouched.
    #[instrument(skip(self, window), fields(name = %name), err)]
    pub async fn generate(&self, name: &str, window: Window) -> DomainResult<SummaryReport> {
        if let Some(existing) = self.reports.get_by_name(name).await? {
            return Ok(existing);
        }

        let products = self.catalog.list().await?;
        let filter = LineFilter {
            updated_range: Some((window.first, window.second)),
            ..LineFilter::default()
        };
        let lines = self.orders.list_lines(&filter).await?;

        let rows = summarize(&products, &lines);
        let location = self.reports.write_artifact(name, &render_csv(&rows)).await?;

        let report = SummaryReport::new(name.to_string(), window, location);
        match self.reports.save(&report).await {
            Ok(()) => {
                info!(report_id = %report.id, rows = rows.len(), "summary report generated");
                Ok(report)
            }
            // Lost a race with a concurrent run of the same name; theirs
            // stands.
            Err(DomainError::AlreadyExists { .. }) => match self.reports.get_by_name(name).await? {
                Some(existing) => Ok(existing),
                None => Err(DomainError::internal(format!(
                    "report {name} missing after unique-name conflict"
                ))),
            },
            Err(err) => Err(err),
        }
    }
}

/// Bridges summary jobs to [`SummaryService::generate`].
pub struct SummaryJobHandler {
    service: Arc<SummaryService>,
}

impl SummaryJobHandler {
    pub fn new(service: Arc<SummaryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl JobHandler for SummaryJobHandler {
    fn kind(&self) -> &str {
        SUMMARY_JOB_KIND
    }

    async fn run(&self, job: &Job) -> DomainResult<()> {
        let payload: SummaryJobPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| DomainError::invalid_argument(format!("bad summary payload: {e}")))?;
        let window = Window::parse(&payload.first_date, &payload.second_date)?;
        self.service.generate(&payload.name, window).await?;
        Ok(())
    }
}
