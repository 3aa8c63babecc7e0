//! Blob upload endpoint
//!
//! Clients write the image bytes first, then register the returned storage
//! path with `POST /api/submissions/:id/images`.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use boxhawk_common::roles::actions;
use serde::Serialize;

use super::auth::Caller;
use super::error::ApiResult;
use crate::AppState;

/// Largest accepted blob body
pub const MAX_BLOB_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PutBlobResponse {
    pub storage_path: String,
    pub url: String,
    pub size_bytes: usize,
}

/// PUT /api/blobs/*path
pub async fn put_blob(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(path): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<PutBlobResponse>)> {
    principal.authorize(actions::BLOB_PUT)?;

    let size_bytes = body.len();
    let storage_path = state
        .store
        .put(path.trim_start_matches('/'), body.to_vec())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(PutBlobResponse {
            url: state.store.public_url(&storage_path),
            storage_path,
            size_bytes,
        }),
    ))
}
