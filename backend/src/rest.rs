use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use shared::{
    BulkStatusRequest, BulkStatusResponse, DeleteMarkRequest, MarkPayload, MessageResponse,
    ResetStatusRequest, ResetStatusResponse, UpdateMarkRequest,
};

use crate::domain::{MarkService, ResetOutcome};
use crate::error::MarkError;
use crate::render::DocumentRenderer;
use crate::report::ScorecardReporter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub marks: MarkService,
    pub reporter: ScorecardReporter,
    pub renderer: Arc<dyn DocumentRenderer>,
}

impl AppState {
    pub fn new(
        marks: MarkService,
        reporter: ScorecardReporter,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            marks,
            reporter,
            renderer,
        }
    }
}

/// The `/api` route table
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/marks",
            get(list_marks)
                .post(create_mark)
                .put(update_mark)
                .delete(delete_mark),
        )
        .route("/update", post(bulk_update_status))
        .route("/reset-status", post(reset_status))
        .route("/scorecard/:name", get(scorecard))
}

/// GET /api/marks
pub async fn list_marks(State(state): State<AppState>) -> Result<Response, MarkError> {
    info!("GET /api/marks");
    let marks = state.marks.list().await?;
    Ok(Json(marks).into_response())
}

/// POST /api/marks
pub async fn create_mark(
    State(state): State<AppState>,
    Json(payload): Json<MarkPayload>,
) -> Result<Response, MarkError> {
    info!("POST /api/marks - name: {:?}", payload.name);
    let mark = state.marks.create(payload).await?;
    Ok((StatusCode::CREATED, Json(mark)).into_response())
}

/// PUT /api/marks - id plus any subset of mark fields in the body
pub async fn update_mark(
    State(state): State<AppState>,
    Json(request): Json<UpdateMarkRequest>,
) -> Result<Response, MarkError> {
    let id = request.id.ok_or(MarkError::InvalidIdList("id"))?;
    info!("PUT /api/marks - id: {}", id);
    let mark = state.marks.update(id, request.fields).await?;
    Ok(Json(mark).into_response())
}

/// DELETE /api/marks - id in the body
pub async fn delete_mark(
    State(state): State<AppState>,
    Json(request): Json<DeleteMarkRequest>,
) -> Result<Response, MarkError> {
    let id = request.id.ok_or(MarkError::InvalidIdList("id"))?;
    info!("DELETE /api/marks - id: {}", id);
    state.marks.delete(id).await?;
    Ok(Json(MessageResponse {
        message: "Mark deleted successfully.".to_string(),
    })
    .into_response())
}

/// POST /api/update - bulk review-status change
pub async fn bulk_update_status(
    State(state): State<AppState>,
    Json(request): Json<BulkStatusRequest>,
) -> Result<Response, MarkError> {
    let ids = request.ids.ok_or(MarkError::InvalidIdList("ids"))?;
    let new_status = request.new_status.unwrap_or_default();
    info!("POST /api/update - {} ids -> {}", ids.len(), new_status);

    let updated_count = state.marks.bulk_set_status(&ids, &new_status).await?;
    Ok(Json(BulkStatusResponse {
        success: true,
        updated_count,
    })
    .into_response())
}

/// POST /api/reset-status
pub async fn reset_status(
    State(state): State<AppState>,
    Json(request): Json<ResetStatusRequest>,
) -> Result<Response, MarkError> {
    let id = request.id.ok_or(MarkError::InvalidIdList("id"))?;
    info!("POST /api/reset-status - id: {}", id);

    match state.marks.reset_status(id).await? {
        ResetOutcome::Reset => Ok(Json(ResetStatusResponse {
            success: true,
            message: format!("Status for ID {} reset to 'pending'.", id),
        })
        .into_response()),
        // Informational miss, not a validation failure
        ResetOutcome::NoMatch => Ok((
            StatusCode::NOT_FOUND,
            Json(MessageResponse {
                message: "No matching entry found or already pending.".to_string(),
            }),
        )
            .into_response()),
    }
}

/// Query parameters for the scorecard endpoint
#[derive(Deserialize, Debug)]
pub struct ScorecardQuery {
    pub pdf: Option<String>,
}

/// GET /api/scorecard/:name?pdf=true|false
pub async fn scorecard(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ScorecardQuery>,
) -> Result<Response, MarkError> {
    info!("GET /api/scorecard/{} - query: {:?}", name, query);

    let report = state.reporter.build_report(&name).await?;

    let pdf_mode = query
        .pdf
        .as_deref()
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    if !pdf_mode {
        return Ok(Json(report).into_response());
    }

    let bytes = state.renderer.render(&report)?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}_scorecard.pdf\"", name),
            ),
        ],
        bytes,
    )
        .into_response())
}
