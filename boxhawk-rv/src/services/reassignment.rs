//! Reassignment Orchestrator
//!
//! Splits images off into a new submission or consolidates them into an
//! existing one. Each operation is one write transaction: the new submission,
//! every image move and every audit entry commit together, so a failed move
//! never leaves an empty submission behind.

use boxhawk_common::db::{ImageStatus, SubmissionFields, SubmissionStatus};
use boxhawk_common::roles::{actions, Principal};
use boxhawk_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::db::{begin_write, images, submissions};
use crate::services::image_registry::reassign_within;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToNewOutcome {
    pub new_submission_id: Uuid,
    pub moved_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToExistingOutcome {
    pub moved_count: usize,
}

/// Reassignment orchestrator service
#[derive(Clone)]
pub struct Reassignment {
    db: SqlitePool,
}

impl Reassignment {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create an `in_review` submission from `seed` and move the images into it
    ///
    /// The new submission inherits `created_by` from the source. Ids that do
    /// not exist are skipped; every other id must be an active image of the
    /// source.
    pub async fn move_to_new_submission(
        &self,
        actor: &Principal,
        source_submission_id: Uuid,
        image_ids: &[Uuid],
        seed: SubmissionFields,
    ) -> Result<MoveToNewOutcome> {
        actor.authorize(actions::IMAGES_REASSIGN_NEW)?;
        if image_ids.is_empty() {
            return Err(Error::Validation("imageIds required".to_string()));
        }

        let mut tx = begin_write(&self.db).await?;

        let source = submissions::fetch(&mut tx, source_submission_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("submission {}", source_submission_id)))?;

        let seed = seed.normalized();
        seed.validate_required()?;

        let found = images::fetch_many(&mut tx, image_ids).await?;
        if found.is_empty() {
            return Err(Error::PreconditionFailed(
                "none of the selected images exist".to_string(),
            ));
        }
        if let Some(image) = found
            .iter()
            .find(|i| i.submission_id != source.id || i.status != ImageStatus::Active)
        {
            return Err(Error::PreconditionFailed(format!(
                "image {} is not an active image of submission {}",
                image.id, source.id
            )));
        }

        let created =
            submissions::insert(&mut tx, &seed, SubmissionStatus::InReview, &source.created_by).await?;
        let moved_count = reassign_within(&mut tx, image_ids, created.id, Some(source.id), &actor.id).await?;

        tx.commit().await?;

        info!(
            source = %source.id,
            new_submission_id = %created.id,
            actor = %actor.id,
            moved_count,
            "Moved images to new submission"
        );
        Ok(MoveToNewOutcome {
            new_submission_id: created.id,
            moved_count,
        })
    }

    /// Move images from any owner into `target_submission_id`
    ///
    /// Images already in the target are neither counted nor logged.
    pub async fn move_to_existing_submission(
        &self,
        actor: &Principal,
        target_submission_id: Uuid,
        image_ids: &[Uuid],
    ) -> Result<MoveToExistingOutcome> {
        actor.authorize(actions::IMAGES_REASSIGN_EXISTING)?;
        if image_ids.is_empty() {
            return Err(Error::Validation("imageIds required".to_string()));
        }

        let mut tx = begin_write(&self.db).await?;
        if !submissions::exists(&mut tx, target_submission_id).await? {
            return Err(Error::NotFound(format!("submission {}", target_submission_id)));
        }

        let moved_count = reassign_within(&mut tx, image_ids, target_submission_id, None, &actor.id).await?;
        tx.commit().await?;

        info!(
            target = %target_submission_id,
            actor = %actor.id,
            moved_count,
            "Moved images to existing submission"
        );
        Ok(MoveToExistingOutcome { moved_count })
    }
}
