//! Image Registry
//!
//! Owns the image rows and their audit trail. Every state change to an image
//! (upload, soft delete, hard delete, reassignment) appends exactly one audit
//! entry in the same transaction as the row change, so replaying the log of an
//! image reproduces its current owner and status.

use boxhawk_common::db::{AuditAction, AuditEntry, Image, ImageStatus};
use boxhawk_common::roles::{actions, Principal};
use boxhawk_common::{Error, Result};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::images::{self, LogEntry, NewImage};
use crate::db::{begin_write, submissions};
use crate::storage::{validate_storage_path, ObjectStore};

/// Image registry service
#[derive(Clone)]
pub struct ImageRegistry {
    db: SqlitePool,
    store: Arc<dyn ObjectStore>,
}

impl ImageRegistry {
    pub fn new(db: SqlitePool, store: Arc<dyn ObjectStore>) -> Self {
        Self { db, store }
    }

    /// Register already-stored blobs as active images of a submission
    ///
    /// All rows and their `upload` entries commit together or not at all.
    pub async fn register_uploaded(
        &self,
        actor: &Principal,
        submission_id: Uuid,
        files: &[NewImage],
    ) -> Result<Vec<Image>> {
        actor.authorize(actions::IMAGES_UPLOAD)?;

        if files.is_empty() {
            return Err(Error::Validation("at least one file is required".to_string()));
        }
        let mut seen = HashSet::new();
        for file in files {
            validate_storage_path(&file.storage_path)?;
            if !seen.insert(file.storage_path.as_str()) {
                return Err(Error::Validation(format!(
                    "duplicate storage path in request: {}",
                    file.storage_path
                )));
            }
        }

        let mut tx = begin_write(&self.db).await?;

        if !submissions::exists(&mut tx, submission_id).await? {
            return Err(Error::Validation(format!("submission {} does not exist", submission_id)));
        }

        let mut registered = Vec::with_capacity(files.len());
        for file in files {
            if images::storage_path_taken(&mut tx, &file.storage_path).await? {
                return Err(Error::Validation(format!(
                    "storage path already registered: {}",
                    file.storage_path
                )));
            }

            let image = images::insert(&mut tx, submission_id, file).await?;
            images::append_log(
                &mut tx,
                &LogEntry {
                    image_id: image.id,
                    action: AuditAction::Upload,
                    from_submission_id: None,
                    to_submission_id: Some(submission_id),
                    actor: &actor.id,
                },
            )
            .await?;
            registered.push(image);
        }

        tx.commit().await?;

        info!(
            submission_id = %submission_id,
            actor = %actor.id,
            count = registered.len(),
            "Registered uploaded images"
        );
        Ok(registered)
    }

    /// Mark active images deleted; returns how many changed
    ///
    /// Missing and already-deleted ids are skipped without a log entry.
    pub async fn soft_delete(&self, actor: &Principal, image_ids: &[Uuid]) -> Result<usize> {
        actor.authorize(actions::IMAGES_DELETE)?;
        require_ids(image_ids)?;

        let mut tx = begin_write(&self.db).await?;
        let found = images::fetch_many(&mut tx, &dedup(image_ids)).await?;

        let mut deleted = 0;
        for image in found.iter().filter(|i| i.status == ImageStatus::Active) {
            if images::mark_deleted(&mut tx, image.id).await? == 0 {
                continue;
            }
            images::append_log(
                &mut tx,
                &LogEntry {
                    image_id: image.id,
                    action: AuditAction::DeleteSoft,
                    from_submission_id: Some(image.submission_id),
                    to_submission_id: None,
                    actor: &actor.id,
                },
            )
            .await?;
            deleted += 1;
        }

        tx.commit().await?;

        info!(actor = %actor.id, requested = image_ids.len(), deleted, "Soft-deleted images");
        Ok(deleted)
    }

    /// Remove blobs, then rows, then log
    ///
    /// The write lock is held from the first read to the commit. A blob store
    /// failure aborts before any row is removed.
    pub async fn hard_delete(&self, actor: &Principal, image_ids: &[Uuid]) -> Result<usize> {
        actor.authorize(actions::IMAGES_DELETE_HARD)?;
        require_ids(image_ids)?;

        let mut tx = begin_write(&self.db).await?;
        let found = images::fetch_many(&mut tx, &dedup(image_ids)).await?;
        if found.is_empty() {
            return Ok(0);
        }

        let paths: Vec<String> = found.iter().map(|i| i.storage_path.clone()).collect();
        if let Err(e) = self.store.delete(&paths).await {
            warn!(actor = %actor.id, error = %e, "Blob removal failed; image rows kept");
            return Err(match e {
                Error::Storage(_) => e,
                other => Error::Storage(other.to_string()),
            });
        }

        let mut deleted = 0;
        for image in &found {
            if images::delete_row(&mut tx, image.id).await? == 0 {
                continue;
            }
            images::append_log(
                &mut tx,
                &LogEntry {
                    image_id: image.id,
                    action: AuditAction::DeleteHard,
                    from_submission_id: Some(image.submission_id),
                    to_submission_id: None,
                    actor: &actor.id,
                },
            )
            .await?;
            deleted += 1;
        }

        tx.commit().await?;

        info!(actor = %actor.id, deleted, "Hard-deleted images");
        Ok(deleted)
    }

    /// Move images to `to`, optionally requiring they currently belong to `from`
    pub async fn reassign(
        &self,
        actor: &Principal,
        image_ids: &[Uuid],
        to: Uuid,
        from: Option<Uuid>,
    ) -> Result<usize> {
        actor.authorize(actions::IMAGES_REASSIGN_EXISTING)?;
        require_ids(image_ids)?;

        let mut tx = begin_write(&self.db).await?;
        if !submissions::exists(&mut tx, to).await? {
            return Err(Error::NotFound(format!("submission {}", to)));
        }
        let moved = reassign_within(&mut tx, image_ids, to, from, &actor.id).await?;
        tx.commit().await?;

        info!(actor = %actor.id, to = %to, moved, "Reassigned images");
        Ok(moved)
    }

    /// Audit entries for one image in insertion order
    pub async fn image_history(&self, actor: &Principal, image_id: Uuid) -> Result<Vec<AuditEntry>> {
        actor.authorize(actions::IMAGES_HISTORY)?;
        let mut conn = self.db.acquire().await?;
        images::history(&mut conn, image_id).await
    }
}

/// Owner and status reconstructed from an image's audit entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayedImage {
    pub submission_id: Uuid,
    pub status: ImageStatus,
}

/// Fold audit entries into the image state they describe
///
/// `None` means the image was never uploaded or has been hard-deleted.
pub fn replay(entries: &[AuditEntry]) -> Option<ReplayedImage> {
    let mut state: Option<ReplayedImage> = None;
    for entry in entries {
        state = match entry.action {
            AuditAction::Upload => entry.to_submission_id.map(|submission_id| ReplayedImage {
                submission_id,
                status: ImageStatus::Active,
            }),
            AuditAction::DeleteSoft => state.map(|s| ReplayedImage {
                status: ImageStatus::Deleted,
                ..s
            }),
            AuditAction::DeleteHard => None,
            AuditAction::Reassign => match (state, entry.to_submission_id) {
                (Some(s), Some(to)) => Some(ReplayedImage {
                    submission_id: to,
                    ..s
                }),
                _ => state,
            },
        };
    }
    state
}

/// Reassign inside a caller-owned write transaction
///
/// Missing ids are skipped, as are images already owned by `to`. A deleted
/// image, or one not owned by `from` when given, fails the whole call. Each
/// move is conditional on the owner read here; a mismatch means a concurrent
/// writer got there first.
pub(crate) async fn reassign_within(
    conn: &mut SqliteConnection,
    image_ids: &[Uuid],
    to: Uuid,
    from: Option<Uuid>,
    actor: &str,
) -> Result<usize> {
    let found = images::fetch_many(conn, &dedup(image_ids)).await?;

    for image in &found {
        if image.status != ImageStatus::Active {
            return Err(Error::PreconditionFailed(format!("image {} is deleted", image.id)));
        }
        if let Some(from) = from {
            if image.submission_id != from {
                return Err(Error::PreconditionFailed(format!(
                    "image {} does not belong to submission {}",
                    image.id, from
                )));
            }
        }
    }

    let mut moved = 0;
    for image in found.iter().filter(|i| i.submission_id != to) {
        if images::move_active(conn, image.id, image.submission_id, to).await? != 1 {
            return Err(Error::PreconditionFailed(format!(
                "image {} changed owner during reassignment",
                image.id
            )));
        }
        images::append_log(
            conn,
            &LogEntry {
                image_id: image.id,
                action: AuditAction::Reassign,
                from_submission_id: Some(image.submission_id),
                to_submission_id: Some(to),
                actor,
            },
        )
        .await?;
        moved += 1;
    }

    Ok(moved)
}

fn require_ids(image_ids: &[Uuid]) -> Result<()> {
    if image_ids.is_empty() {
        Err(Error::Validation("imageIds required".to_string()))
    } else {
        Ok(())
    }
}

/// Drop repeated ids, keeping first occurrence order
fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
