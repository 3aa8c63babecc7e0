//! Review Workflow
//!
//! Submission lifecycle: `uploaded -> in_review -> complete | rejected`.
//! Every transition is read, checked and written under one write lock, so two
//! reviewers acting on the same submission serialize and the loser sees the
//! winner's status.

use boxhawk_common::db::{Submission, SubmissionFields, SubmissionStatus};
use boxhawk_common::roles::{actions, Principal};
use boxhawk_common::{time, Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::db::{begin_write, submissions};

/// Whether a reviewer action may move a submission from `from` to `to`
///
/// Re-applying the same terminal status is allowed (last writer wins).
/// Moving between terminal statuses requires [`ReviewWorkflow::reopen`].
pub fn transition_allowed(from: SubmissionStatus, to: SubmissionStatus) -> bool {
    use SubmissionStatus::*;
    matches!(
        (from, to),
        (Uploaded, InReview | Complete | Rejected)
            | (InReview, Complete | Rejected)
            | (Complete, Complete)
            | (Rejected, Rejected)
    )
}

/// Result of a terminal transition plus the next queue item
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub submission: Submission,
    pub next_submission_id: Option<Uuid>,
}

/// Submission state machine
#[derive(Clone)]
pub struct ReviewWorkflow {
    db: SqlitePool,
}

impl ReviewWorkflow {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// New submission in `uploaded`, owned by the caller
    pub async fn create_submission(&self, actor: &Principal, fields: SubmissionFields) -> Result<Submission> {
        actor.authorize(actions::SUBMISSION_CREATE)?;
        let fields = fields.normalized();
        fields.validate_required()?;

        let mut conn = self.db.acquire().await?;
        let submission =
            submissions::insert(&mut conn, &fields, SubmissionStatus::Uploaded, &actor.id).await?;

        info!(submission_id = %submission.id, actor = %actor.id, "Submission created");
        Ok(submission)
    }

    /// `uploaded -> in_review`; already in review is a no-op
    pub async fn begin_review(&self, actor: &Principal, id: Uuid) -> Result<Submission> {
        actor.authorize(actions::REVIEW_START)?;

        let mut tx = begin_write(&self.db).await?;
        let mut submission = load(&mut tx, id).await?;

        if submission.status == SubmissionStatus::InReview {
            return Ok(submission);
        }
        check_transition(submission.status, SubmissionStatus::InReview)?;

        let now = time::now();
        submissions::update_status(&mut tx, id, SubmissionStatus::InReview, submission.reviewed, now).await?;
        tx.commit().await?;

        submission.status = SubmissionStatus::InReview;
        submission.updated_at = now;
        info!(submission_id = %id, actor = %actor.id, "Review started");
        Ok(submission)
    }

    /// Overwrite fields and mark complete
    ///
    /// Field validation runs first; a validation failure leaves the row
    /// untouched.
    pub async fn mark_complete(
        &self,
        actor: &Principal,
        id: Uuid,
        fields: SubmissionFields,
    ) -> Result<TransitionOutcome> {
        actor.authorize(actions::COMPLETE)?;
        let fields = fields.normalized();
        fields.validate_required()?;

        let mut tx = begin_write(&self.db).await?;
        let mut submission = load(&mut tx, id).await?;
        check_transition(submission.status, SubmissionStatus::Complete)?;

        let now = time::now();
        submissions::update_fields_and_status(&mut tx, id, &fields, SubmissionStatus::Complete, true, now)
            .await?;
        let next_submission_id = submissions::oldest_in_review(&mut tx, Some(id)).await?;
        tx.commit().await?;

        submission.fields = fields;
        submission.status = SubmissionStatus::Complete;
        submission.reviewed = true;
        submission.updated_at = now;

        info!(
            submission_id = %id,
            actor = %actor.id,
            next = ?next_submission_id,
            "Submission completed"
        );
        Ok(TransitionOutcome {
            submission,
            next_submission_id,
        })
    }

    pub async fn reject(&self, actor: &Principal, id: Uuid) -> Result<TransitionOutcome> {
        actor.authorize(actions::REJECT)?;

        let mut tx = begin_write(&self.db).await?;
        let mut submission = load(&mut tx, id).await?;
        check_transition(submission.status, SubmissionStatus::Rejected)?;

        let now = time::now();
        submissions::update_status(&mut tx, id, SubmissionStatus::Rejected, true, now).await?;
        let next_submission_id = submissions::oldest_in_review(&mut tx, Some(id)).await?;
        tx.commit().await?;

        submission.status = SubmissionStatus::Rejected;
        submission.reviewed = true;
        submission.updated_at = now;

        info!(
            submission_id = %id,
            actor = %actor.id,
            next = ?next_submission_id,
            "Submission rejected"
        );
        Ok(TransitionOutcome {
            submission,
            next_submission_id,
        })
    }

    /// Return a terminal submission to `in_review`
    pub async fn reopen(&self, actor: &Principal, id: Uuid) -> Result<Submission> {
        actor.authorize(actions::REOPEN)?;

        let mut tx = begin_write(&self.db).await?;
        let mut submission = load(&mut tx, id).await?;
        if !submission.status.is_terminal() {
            return Err(Error::InvalidTransition(format!(
                "only complete or rejected submissions can be reopened (is {})",
                submission.status
            )));
        }

        let now = time::now();
        submissions::update_status(&mut tx, id, SubmissionStatus::InReview, false, now).await?;
        tx.commit().await?;

        submission.status = SubmissionStatus::InReview;
        submission.reviewed = false;
        submission.updated_at = now;
        info!(submission_id = %id, actor = %actor.id, "Submission reopened");
        Ok(submission)
    }

    /// Oldest `in_review` submission, skipping `exclude`
    pub async fn next_in_review(&self, exclude: Option<Uuid>) -> Result<Option<Uuid>> {
        let mut conn = self.db.acquire().await?;
        submissions::oldest_in_review(&mut conn, exclude).await
    }
}

async fn load(conn: &mut sqlx::SqliteConnection, id: Uuid) -> Result<Submission> {
    submissions::fetch(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("submission {}", id)))
}

fn check_transition(from: SubmissionStatus, to: SubmissionStatus) -> Result<()> {
    if transition_allowed(from, to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition(format!("cannot move a {} submission to {}", from, to)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxhawk_common::db::init_memory_database;
    use boxhawk_common::symbols::GeneralSymbol;

    fn photo_user() -> Principal {
        Principal::new("photo-1", "photouser")
    }

    fn expert() -> Principal {
        Principal::new("expert-1", "expert")
    }

    async fn setup() -> (ReviewWorkflow, SqlitePool) {
        let pool = init_memory_database().await.unwrap();
        (ReviewWorkflow::new(pool.clone()), pool)
    }

    async fn in_review(workflow: &ReviewWorkflow, name: &str) -> Submission {
        let created = workflow
            .create_submission(&photo_user(), SubmissionFields::named(name, "Acme"))
            .await
            .unwrap();
        workflow.begin_review(&expert(), created.id).await.unwrap()
    }

    #[test]
    fn test_transition_table() {
        use SubmissionStatus::*;
        assert!(transition_allowed(Uploaded, InReview));
        assert!(transition_allowed(InReview, Complete));
        assert!(transition_allowed(Complete, Complete));
        assert!(!transition_allowed(Complete, Rejected));
        assert!(!transition_allowed(Rejected, Complete));
        assert!(!transition_allowed(Complete, InReview));
        assert!(!transition_allowed(InReview, Uploaded));
    }

    #[tokio::test]
    async fn test_create_requires_fields_and_role() {
        let (workflow, _pool) = setup().await;

        let err = workflow
            .create_submission(&photo_user(), SubmissionFields::named(" ", "Acme"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = workflow
            .create_submission(&expert(), SubmissionFields::named("Gauze", "Acme"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let created = workflow
            .create_submission(&photo_user(), SubmissionFields::named("Gauze", "Acme"))
            .await
            .unwrap();
        assert_eq!(created.status, SubmissionStatus::Uploaded);
        assert_eq!(created.created_by, "photo-1");
    }

    #[tokio::test]
    async fn test_complete_overwrites_fields_and_returns_next() {
        let (workflow, pool) = setup().await;
        let first = in_review(&workflow, "First").await;
        let second = in_review(&workflow, "Second").await;

        let mut fields = SubmissionFields::named("Gauze pad", "Acme");
        fields.labels.insert(GeneralSymbol::Sterile);
        fields.lot = Some("L-7".to_string());

        let outcome = workflow.mark_complete(&expert(), first.id, fields.clone()).await.unwrap();
        assert_eq!(outcome.next_submission_id, Some(second.id));
        assert_eq!(outcome.submission.status, SubmissionStatus::Complete);
        assert!(outcome.submission.reviewed);

        let mut conn = pool.acquire().await.unwrap();
        let stored = submissions::fetch(&mut conn, first.id).await.unwrap().unwrap();
        assert_eq!(stored.fields, fields);
        assert_eq!(stored.status, SubmissionStatus::Complete);
    }

    #[tokio::test]
    async fn test_complete_validation_leaves_status_unchanged() {
        let (workflow, pool) = setup().await;
        let item = in_review(&workflow, "First").await;

        let err = workflow
            .mark_complete(&expert(), item.id, SubmissionFields::named("Gauze", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let mut conn = pool.acquire().await.unwrap();
        let stored = submissions::fetch(&mut conn, item.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubmissionStatus::InReview);
        assert_eq!(stored.fields.name, "First");
    }

    #[tokio::test]
    async fn test_terminal_statuses_need_reopen() {
        let (workflow, _pool) = setup().await;
        let item = in_review(&workflow, "First").await;

        workflow.reject(&expert(), item.id).await.unwrap();
        let err = workflow
            .mark_complete(&expert(), item.id, SubmissionFields::named("First", "Acme"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));

        // Same terminal status again is allowed
        workflow.reject(&expert(), item.id).await.unwrap();

        let err = workflow.reopen(&expert(), item.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let reopened = workflow.reopen(&Principal::new("admin-1", "admin"), item.id).await.unwrap();
        assert_eq!(reopened.status, SubmissionStatus::InReview);
        assert!(!reopened.reviewed);

        workflow
            .mark_complete(&expert(), item.id, SubmissionFields::named("First", "Acme"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reopen_refuses_open_submission() {
        let (workflow, _pool) = setup().await;
        let item = in_review(&workflow, "First").await;

        let err = workflow
            .reopen(&Principal::new("admin-1", "admin"), item.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_unknown_submission_is_not_found() {
        let (workflow, _pool) = setup().await;
        let err = workflow.reject(&expert(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_queue_drains_oldest_first() {
        let (workflow, _pool) = setup().await;
        let first = in_review(&workflow, "First").await;
        let second = in_review(&workflow, "Second").await;

        assert_eq!(workflow.next_in_review(None).await.unwrap(), Some(first.id));

        let outcome = workflow.reject(&expert(), first.id).await.unwrap();
        assert_eq!(outcome.next_submission_id, Some(second.id));

        let outcome = workflow.reject(&expert(), second.id).await.unwrap();
        assert_eq!(outcome.next_submission_id, None);
    }
}
