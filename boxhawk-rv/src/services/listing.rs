//! Listing Facade
//!
//! Read-only queries for reviewers: filtered, paginated submission pages and
//! single-submission detail, each with active images resolved to public URLs.

use boxhawk_common::db::{Image, Submission, SubmissionStatus};
use boxhawk_common::roles::{actions, Principal};
use boxhawk_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::db::submissions::SubmissionFilter;
use crate::db::{images, submissions};
use crate::pagination::MAX_PAGE_SIZE;
use crate::storage::ObjectStore;

/// Listing query
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub include: Vec<SubmissionStatus>,
    pub exclude: Vec<SubmissionStatus>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Active image as shown to reviewers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageView {
    pub id: Uuid,
    pub storage_path: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Submission with its active images, oldest image first
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: Submission,
    pub images: Vec<ImageView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub items: Vec<SubmissionView>,
    pub total_count: i64,
}

/// Listing facade service
#[derive(Clone)]
pub struct Listing {
    db: SqlitePool,
    store: Arc<dyn ObjectStore>,
}

impl Listing {
    pub fn new(db: SqlitePool, store: Arc<dyn ObjectStore>) -> Self {
        Self { db, store }
    }

    /// One page of submissions, newest first
    ///
    /// `total_count` counts every match regardless of `limit` and `offset`.
    pub async fn list_submissions(&self, actor: &Principal, request: ListRequest) -> Result<ListResponse> {
        actor.authorize(actions::SUBMISSION_LIST)?;

        if !(1..=MAX_PAGE_SIZE).contains(&request.limit) {
            return Err(Error::Validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if request.offset < 0 {
            return Err(Error::Validation("offset must not be negative".to_string()));
        }

        let filter = SubmissionFilter {
            include: request.include,
            exclude: request.exclude,
            search: request.search,
        };

        let mut conn = self.db.acquire().await?;
        let total_count = submissions::count(&mut conn, &filter).await?;
        let page = submissions::list(&mut conn, &filter, request.limit, request.offset).await?;

        let ids: Vec<Uuid> = page.iter().map(|s| s.id).collect();
        let mut grouped = images::active_for_submissions(&mut conn, &ids).await?;

        let items = page
            .into_iter()
            .map(|submission| {
                let images = grouped.remove(&submission.id).unwrap_or_default();
                self.view(submission, images)
            })
            .collect::<Vec<_>>();

        debug!(
            actor = %actor.id,
            total_count,
            returned = items.len(),
            "Listed submissions"
        );
        Ok(ListResponse { items, total_count })
    }

    pub async fn get_submission(&self, actor: &Principal, id: Uuid) -> Result<SubmissionView> {
        actor.authorize(actions::SUBMISSION_GET)?;

        let mut conn = self.db.acquire().await?;
        let submission = submissions::fetch(&mut conn, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("submission {}", id)))?;
        let images = images::active_for_submissions(&mut conn, &[id])
            .await?
            .remove(&id)
            .unwrap_or_default();

        Ok(self.view(submission, images))
    }

    fn view(&self, submission: Submission, images: Vec<Image>) -> SubmissionView {
        let images = images
            .into_iter()
            .map(|image| ImageView {
                url: self.store.public_url(&image.storage_path),
                id: image.id,
                storage_path: image.storage_path,
                created_at: image.created_at,
            })
            .collect();
        SubmissionView { submission, images }
    }
}
