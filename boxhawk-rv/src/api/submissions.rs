//! Submission endpoints: create, list, detail, upload and review transitions

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use boxhawk_common::db::{Image, Submission, SubmissionFields, SubmissionStatus};
use boxhawk_common::Error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::Caller;
use super::error::ApiResult;
use crate::db::images::NewImage;
use crate::pagination::{calculate_pagination, MAX_PAGE_SIZE};
use crate::services::{ListRequest, SubmissionView};
use crate::AppState;

/// Parse a path segment as a submission or image id
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(raw).map_err(|_| Error::Validation(format!("invalid id: {}", raw)))
}

/// Comma-separated status list; blank entries are ignored
fn parse_statuses(raw: Option<&str>) -> Result<Vec<SubmissionStatus>, Error> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

/// POST /api/submissions
pub async fn create_submission(
    State(state): State<AppState>,
    Caller(principal): Caller,
    payload: Result<Json<SubmissionFields>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Submission>)> {
    let Json(fields) = payload?;
    let submission = state.workflow.create_submission(&principal, fields).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// Query parameters for submission listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Comma-separated statuses to include
    pub include: Option<String>,
    /// Comma-separated statuses to exclude
    pub exclude: Option<String>,
    /// Case-insensitive substring of name or manufacturer
    pub search: Option<String>,
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: i64,
    /// Page size; falls back to the configured default
    pub limit: Option<i64>,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSubmissionsResponse {
    pub items: Vec<SubmissionView>,
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// GET /api/submissions
pub async fn list_submissions(
    State(state): State<AppState>,
    Caller(principal): Caller,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<ListSubmissionsResponse>> {
    let Query(query) = query?;

    let page_size = query.limit.unwrap_or(state.default_page_size);
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(Error::Validation(format!("limit must be between 1 and {}", MAX_PAGE_SIZE)).into());
    }
    let offset = crate::pagination::page_offset(query.page, page_size)?;

    let response = state
        .listing
        .list_submissions(
            &principal,
            ListRequest {
                include: parse_statuses(query.include.as_deref())?,
                exclude: parse_statuses(query.exclude.as_deref())?,
                search: query.search,
                limit: page_size,
                offset,
            },
        )
        .await?;

    let pagination = calculate_pagination(response.total_count, query.page, page_size)?;
    Ok(Json(ListSubmissionsResponse {
        items: response.items,
        total_count: response.total_count,
        page: pagination.page,
        page_size: pagination.page_size,
        total_pages: pagination.total_pages,
    }))
}

/// GET /api/submissions/:id
pub async fn get_submission(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<SubmissionView>> {
    let view = state.listing.get_submission(&principal, parse_id(&id)?).await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub files: Vec<NewImage>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub images: Vec<Image>,
}

/// POST /api/submissions/:id/images
///
/// Registers blobs already written through `PUT /api/blobs/*path`.
pub async fn upload_images(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let Json(request) = payload?;
    let images = state
        .registry
        .register_uploaded(&principal, parse_id(&id)?, &request.files)
        .await?;
    Ok((StatusCode::CREATED, Json(UploadResponse { images })))
}

/// POST /api/submissions/:id/review/start
pub async fn start_review(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Submission>> {
    let submission = state.workflow.begin_review(&principal, parse_id(&id)?).await?;
    Ok(Json(submission))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    pub ok: bool,
    pub submission: Submission,
    pub next_submission_id: Option<Uuid>,
}

/// POST /api/submissions/:id/complete
pub async fn complete_submission(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    payload: Result<Json<SubmissionFields>, JsonRejection>,
) -> ApiResult<Json<TransitionResponse>> {
    let Json(fields) = payload?;
    let outcome = state
        .workflow
        .mark_complete(&principal, parse_id(&id)?, fields)
        .await?;
    Ok(Json(TransitionResponse {
        ok: true,
        submission: outcome.submission,
        next_submission_id: outcome.next_submission_id,
    }))
}

/// POST /api/submissions/:id/reject
pub async fn reject_submission(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<TransitionResponse>> {
    let outcome = state.workflow.reject(&principal, parse_id(&id)?).await?;
    Ok(Json(TransitionResponse {
        ok: true,
        submission: outcome.submission,
        next_submission_id: outcome.next_submission_id,
    }))
}

/// POST /api/submissions/:id/reopen
pub async fn reopen_submission(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Submission>> {
    let submission = state.workflow.reopen(&principal, parse_id(&id)?).await?;
    Ok(Json(submission))
}
