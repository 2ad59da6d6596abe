use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_core::ReportId;
use stockroom_infra::summary::{SubmitOutcome, SummaryRequest};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(generate_summary).get(list_reports))
        .route("/by-name/:name", get(get_report_by_name))
        .route("/:id", get(get_report))
        .route("/:id/artifact", get(get_report_artifact))
}

pub async fn generate_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<SummaryRequest>,
) -> axum::response::Response {
    match services.summaries.submit(body).await {
        Ok(SubmitOutcome::Scheduled { name }) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "status": "scheduled",
                "name": name,
            })),
        )
            .into_response(),
        Ok(SubmitOutcome::AlreadyExists { report_id, name }) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "already_exists",
                "name": name,
                "report_id": report_id.to_string(),
            })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_report(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let report_id: ReportId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.reports.get(report_id).await {
        Ok(report) => (StatusCode::OK, Json(dto::report_to_json(&report))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_report_by_name(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    match services.reports.get_by_name(&name).await {
        Ok(Some(report)) => (StatusCode::OK, Json(dto::report_to_json(&report))).into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("report not found: {name}"),
        ),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_report_artifact(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let report_id: ReportId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let report = match services.reports.get(report_id).await {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.reports.read_artifact(&report.artifact).await {
        Ok(csv) => ([(header::CONTENT_TYPE, "text/csv")], csv).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_reports(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.reports.list().await {
        Ok(reports) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "items": reports.iter().map(dto::report_to_json).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
