//! Caller session info: role, reachable pages and landing page

use axum::{
    extract::{rejection::QueryRejection, Query},
    Json,
};
use boxhawk_common::roles;
use serde::{Deserialize, Serialize};

use super::auth::Caller;
use super::error::ApiResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: String,
    pub role: String,
    pub accessible_pages: Vec<&'static str>,
    pub default_redirect: &'static str,
}

/// GET /api/session
pub async fn get_session(Caller(principal): Caller) -> Json<SessionResponse> {
    Json(SessionResponse {
        accessible_pages: roles::accessible_pages(&principal.role),
        default_redirect: roles::default_redirect(&principal.role),
        id: principal.id,
        role: principal.role,
    })
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    /// Page path or action name
    pub route: String,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub route: String,
    pub allowed: bool,
}

/// GET /api/session/access?route=...
pub async fn check_access(
    Caller(principal): Caller,
    query: Result<Query<AccessQuery>, QueryRejection>,
) -> ApiResult<Json<AccessResponse>> {
    let Query(query) = query?;
    let allowed = roles::is_allowed(&query.route, &principal.role);
    Ok(Json(AccessResponse {
        route: query.route,
        allowed,
    }))
}
