use crate::server::AppContext;
use crate::status::JobStatus;
use crate::transcode::{TranscodeError, TranscodeRequest};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use hlsforge_av::check_tools;
use hlsforge_common::JobId;
use serde::{Deserialize, Serialize};

pub fn api_routes() -> Router<AppContext> {
    Router::new()
        .route("/jobs", get(list_jobs).post(submit_job))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/stop", post(stop_job))
        .route("/presets", get(get_presets))
        .route("/tools", get(get_tools))
}

type ApiError = (StatusCode, String);

fn error_response(err: TranscodeError) -> ApiError {
    let status = match &err {
        TranscodeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        TranscodeError::SourceMissing(_) => StatusCode::NOT_FOUND,
        TranscodeError::AlreadyRunning(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn parse_job_id(id: &str) -> Result<JobId, ApiError> {
    JobId::new(id).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

#[derive(Deserialize)]
struct SubmitJobRequest {
    job_id: Option<String>,
    source_filename: String,
    #[serde(default)]
    renditions: Option<Vec<String>>,
    #[serde(default)]
    network_mbps: Option<f64>,
}

#[derive(Serialize)]
struct SubmitJobResponse {
    job_id: JobId,
}

async fn submit_job(
    State(ctx): State<AppContext>,
    Json(payload): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), ApiError> {
    let job_id = match payload.job_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => parse_job_id(id)?,
        _ => JobId::generate(),
    };

    if let Some(mbps) = payload.network_mbps {
        if !mbps.is_finite() || mbps < 0.0 {
            return Err((
                StatusCode::BAD_REQUEST,
                "network_mbps must be a non-negative number".to_string(),
            ));
        }
    }

    let req = TranscodeRequest {
        job_id: job_id.clone(),
        source_filename: payload.source_filename.trim().to_string(),
        renditions: payload.renditions,
        network_mbps: payload.network_mbps,
    };

    ctx.orchestrator.trigger(req).map_err(error_response)?;
    tracing::info!("Accepted job {} via API", job_id);

    Ok((StatusCode::ACCEPTED, Json(SubmitJobResponse { job_id })))
}

async fn list_jobs(State(ctx): State<AppContext>) -> Result<Json<Vec<JobStatus>>, ApiError> {
    ctx.orchestrator
        .store()
        .list()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn get_job(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<JobStatus>, ApiError> {
    let job_id = parse_job_id(&id)?;
    match ctx.orchestrator.status(&job_id).await {
        Ok(Some(status)) => Ok(Json(status)),
        Ok(None) => Err((StatusCode::NOT_FOUND, format!("job {} not found", job_id))),
        Err(e) => Err(error_response(e)),
    }
}

async fn stop_job(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let job_id = parse_job_id(&id)?;
    if !ctx.orchestrator.is_active(&job_id) {
        match ctx.orchestrator.status(&job_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err((StatusCode::NOT_FOUND, format!("job {} not found", job_id)));
            }
            Err(e) => return Err(error_response(e)),
        }
    }
    ctx.orchestrator.request_stop(&job_id);
    Ok(StatusCode::ACCEPTED)
}

async fn get_presets(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.orchestrator.catalog().presets().to_vec())
}

async fn get_tools(State(ctx): State<AppContext>) -> Result<impl IntoResponse, ApiError> {
    let tools = ctx.config.tools.clone();
    let infos = tokio::task::spawn_blocking(move || {
        check_tools(tools.ffmpeg_path.as_deref(), tools.ffprobe_path.as_deref())
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(infos))
}
