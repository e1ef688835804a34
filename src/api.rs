use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::export;
use crate::worker::{parse_urls, BatchReport, ScrapeJob, Worker};

pub struct AppState {
    pub worker: Arc<Worker>,
    pub jobs: RwLock<HashMap<String, JobRecord>>,
    /// Held for the whole batch so only one browser session exists at a time
    pub run_lock: Mutex<()>,
}

impl AppState {
    pub fn new(worker: Arc<Worker>) -> Self {
        Self {
            worker,
            jobs: RwLock::new(HashMap::new()),
            run_lock: Mutex::new(()),
        }
    }
}

type ApiError = (StatusCode, String);

#[derive(Deserialize, ToSchema)]
pub struct ScrapeRequest {
    /// One or more URLs separated by whitespace
    pub urls: String,
    pub fields: Option<Vec<String>>,
    pub extract: Option<bool>,
    pub paginate: Option<bool>,
    /// Free-text description of how the site paginates
    pub pagination_hint: Option<String>,
    pub instruction: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ScrapeResponse {
    pub job_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub error: Option<String>,
    pub report: Option<BatchReport>,
}

#[derive(Serialize, ToSchema)]
pub struct JobSummary {
    pub id: String,
    pub status: JobStatus,
    pub urls: Vec<String>,
    pub created_at: String,
    pub succeeded: usize,
}

#[utoipa::path(
    post,
    path = "/scrape",
    request_body = ScrapeRequest,
    responses(
        (status = 200, description = "Scrape job queued", body = ScrapeResponse),
        (status = 400, description = "No URLs given")
    ),
    tag = "scraper"
)]
pub async fn trigger_scrape(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ScrapeRequest>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    let urls = parse_urls(&payload.urls);
    if urls.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Enter at least one URL".to_string()));
    }

    let job = ScrapeJob {
        urls: urls.clone(),
        fields: payload.fields.unwrap_or_default(),
        extract: payload.extract.unwrap_or(true),
        paginate: payload.paginate.unwrap_or(false),
        pagination_hint: payload.pagination_hint,
        instruction: payload.instruction,
    };

    let job_id = Uuid::new_v4().to_string();
    state.jobs.write().await.insert(
        job_id.clone(),
        JobRecord {
            id: job_id.clone(),
            status: JobStatus::Queued,
            urls,
            created_at: Utc::now(),
            error: None,
            report: None,
        },
    );

    let id = job_id.clone();
    tokio::spawn(async move {
        let _turn = state.run_lock.lock().await;
        set_status(&state, &id, JobStatus::Running).await;
        info!("👷 Job {} started", id);

        let outcome = state.worker.run(&job).await;

        let mut jobs = state.jobs.write().await;
        if let Some(record) = jobs.get_mut(&id) {
            match outcome {
                Ok(report) => {
                    record.status = JobStatus::Completed;
                    record.report = Some(report);
                }
                Err(e) => {
                    error!("❌ Job {} failed: {}", id, e);
                    record.status = JobStatus::Failed;
                    record.error = Some(e.to_string());
                }
            }
        }
    });

    Ok(Json(ScrapeResponse {
        job_id,
        message: "Scrape started".to_string(),
    }))
}

async fn set_status(state: &AppState, id: &str, status: JobStatus) {
    if let Some(record) = state.jobs.write().await.get_mut(id) {
        record.status = status;
    }
}

#[utoipa::path(
    get,
    path = "/scrape/{job_id}",
    params(("job_id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job state, with the batch report once completed"),
        (status = 404, description = "Unknown job")
    ),
    tag = "scraper"
)]
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    state
        .jobs
        .read()
        .await
        .get(&job_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found(&job_id))
}

#[utoipa::path(
    get,
    path = "/jobs",
    responses((status = 200, description = "All jobs, newest first", body = [JobSummary])),
    tag = "scraper"
)]
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobSummary>> {
    let jobs = state.jobs.read().await;
    let mut records: Vec<&JobRecord> = jobs.values().collect();
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Json(
        records
            .into_iter()
            .map(|r| JobSummary {
                id: r.id.clone(),
                status: r.status,
                urls: r.urls.clone(),
                created_at: r.created_at.to_rfc3339(),
                succeeded: r.report.as_ref().map(BatchReport::succeeded).unwrap_or(0),
            })
            .collect(),
    )
}

fn not_found(job_id: &str) -> ApiError {
    (StatusCode::NOT_FOUND, format!("Job {} not found", job_id))
}

async fn completed_report(state: &AppState, job_id: &str) -> Result<BatchReport, ApiError> {
    let jobs = state.jobs.read().await;
    let record = jobs.get(job_id).ok_or_else(|| not_found(job_id))?;
    record.report.clone().ok_or_else(|| {
        (
            StatusCode::CONFLICT,
            format!("Job {} has no results yet ({:?})", job_id, record.status),
        )
    })
}

fn attachment(content_type: &'static str, file_name: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
}

#[utoipa::path(
    get,
    path = "/scrape/{job_id}/export.json",
    params(("job_id" = String, Path, description = "Job id")),
    responses((status = 200, description = "Extraction results per URL as JSON")),
    tag = "scraper"
)]
pub async fn export_json(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = completed_report(&state, &job_id).await?;
    let body = export::batch_json(&report)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(attachment("application/json", "scraped_data.json", body))
}

#[utoipa::path(
    get,
    path = "/scrape/{job_id}/export.csv",
    params(("job_id" = String, Path, description = "Job id")),
    responses((status = 200, description = "All listings as one CSV table")),
    tag = "scraper"
)]
pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = completed_report(&state, &job_id).await?;
    Ok(attachment("text/csv", "scraped_data.csv", export::batch_csv(&report)))
}

async fn pagination_of(state: &AppState, job_id: &str) -> Result<crate::pagination::PaginationData, ApiError> {
    let report = completed_report(state, job_id).await?;
    report.pagination.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            report
                .pagination_error
                .unwrap_or_else(|| "Pagination was not requested for this job".to_string()),
        )
    })
}

#[utoipa::path(
    get,
    path = "/scrape/{job_id}/pagination.json",
    params(("job_id" = String, Path, description = "Job id")),
    responses((status = 200, description = "Detected page URLs as a JSON array")),
    tag = "scraper"
)]
pub async fn pagination_json(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let data = pagination_of(&state, &job_id).await?;
    let body = export::pagination_json(&data)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(attachment("application/json", "pagination_urls.json", body))
}

#[utoipa::path(
    get,
    path = "/scrape/{job_id}/pagination.csv",
    params(("job_id" = String, Path, description = "Job id")),
    responses((status = 200, description = "Detected page URLs as CSV")),
    tag = "scraper"
)]
pub async fn pagination_csv(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let data = pagination_of(&state, &job_id).await?;
    Ok(attachment("text/csv", "pagination_urls.csv", export::pagination_csv(&data)))
}
