//! Caller identity extraction
//!
//! The identity provider sits in front of this service and forwards the
//! authenticated principal and role as headers. A request without them is
//! unauthenticated. The role is lowercased and otherwise untouched; unknown
//! roles fail the role table check in the service layer.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use boxhawk_common::{Error, Principal};

use super::error::ApiError;

pub const PRINCIPAL_HEADER: &str = "x-boxhawk-principal";
pub const ROLE_HEADER: &str = "x-boxhawk-role";

/// Authenticated caller of a request
#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, PRINCIPAL_HEADER).ok_or_else(|| {
            Error::Unauthenticated(format!("missing {} header", PRINCIPAL_HEADER))
        })?;
        let role = header(parts, ROLE_HEADER)
            .ok_or_else(|| Error::Unauthenticated(format!("missing {} header", ROLE_HEADER)))?;

        Ok(Caller(Principal::new(id, role.to_ascii_lowercase())))
    }
}
