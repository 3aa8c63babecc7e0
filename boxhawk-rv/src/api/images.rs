//! Image endpoints: delete, reassignment and audit history

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use boxhawk_common::db::{AuditEntry, SubmissionFields};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::Caller;
use super::error::ApiResult;
use super::submissions::parse_id;
use crate::services::{replay, MoveToExistingOutcome, MoveToNewOutcome, ReplayedImage};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub image_ids: Vec<Uuid>,
    #[serde(default)]
    pub hard_delete: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DeleteResponse {
    SoftDeleted(usize),
    HardDeleted(usize),
}

/// POST /api/images/delete
///
/// Soft delete by default; `hardDelete: true` also removes the blobs.
pub async fn delete_images(
    State(state): State<AppState>,
    Caller(principal): Caller,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> ApiResult<Json<DeleteResponse>> {
    let Json(request) = payload?;
    let response = if request.hard_delete {
        DeleteResponse::HardDeleted(state.registry.hard_delete(&principal, &request.image_ids).await?)
    } else {
        DeleteResponse::SoftDeleted(state.registry.soft_delete(&principal, &request.image_ids).await?)
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToExistingRequest {
    pub image_ids: Vec<Uuid>,
    pub target_submission_id: Uuid,
}

/// POST /api/images/reassign/existing
pub async fn move_to_existing(
    State(state): State<AppState>,
    Caller(principal): Caller,
    payload: Result<Json<MoveToExistingRequest>, JsonRejection>,
) -> ApiResult<Json<MoveToExistingOutcome>> {
    let Json(request) = payload?;
    let outcome = state
        .reassignment
        .move_to_existing_submission(&principal, request.target_submission_id, &request.image_ids)
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToNewRequest {
    pub source_submission_id: Uuid,
    pub image_ids: Vec<Uuid>,
    pub new_submission: SubmissionFields,
}

/// POST /api/images/reassign/new
pub async fn move_to_new(
    State(state): State<AppState>,
    Caller(principal): Caller,
    payload: Result<Json<MoveToNewRequest>, JsonRejection>,
) -> ApiResult<Json<MoveToNewOutcome>> {
    let Json(request) = payload?;
    let outcome = state
        .reassignment
        .move_to_new_submission(
            &principal,
            request.source_submission_id,
            &request.image_ids,
            request.new_submission,
        )
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub image_id: Uuid,
    pub entries: Vec<AuditEntry>,
    /// Owner and status derived from `entries`; null once hard-deleted
    pub replayed: Option<ReplayedImage>,
}

/// GET /api/images/:id/history
pub async fn image_history(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<HistoryResponse>> {
    let image_id = parse_id(&id)?;
    let entries = state.registry.image_history(&principal, image_id).await?;
    Ok(Json(HistoryResponse {
        image_id,
        replayed: replay(&entries),
        entries,
    }))
}
