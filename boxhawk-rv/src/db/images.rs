//! Image registry rows and their audit log

use boxhawk_common::db::{AuditAction, AuditEntry, Image, ImageStatus, IMAGE_COLUMNS};
use boxhawk_common::{time, Result};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use uuid::Uuid;

use super::placeholders;

/// Metadata captured at upload time
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct NewImage {
    pub storage_path: String,
    #[serde(default)]
    pub size_bytes: Option<i64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
}

impl NewImage {
    pub fn at(storage_path: impl Into<String>) -> Self {
        Self {
            storage_path: storage_path.into(),
            ..Default::default()
        }
    }
}

pub async fn insert(conn: &mut SqliteConnection, submission_id: Uuid, image: &NewImage) -> Result<Image> {
    let id = Uuid::new_v4();
    let now = time::now();

    sqlx::query(
        r#"
        INSERT INTO submission_images
            (id, submission_id, storage_path, status, size_bytes, mime_type, width, height, created_at)
        VALUES (?, ?, ?, 'active', ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(submission_id.to_string())
    .bind(&image.storage_path)
    .bind(image.size_bytes)
    .bind(&image.mime_type)
    .bind(image.width)
    .bind(image.height)
    .bind(time::to_db(now))
    .execute(&mut *conn)
    .await?;

    Ok(Image {
        id,
        submission_id,
        storage_path: image.storage_path.clone(),
        status: ImageStatus::Active,
        size_bytes: image.size_bytes,
        mime_type: image.mime_type.clone(),
        width: image.width,
        height: image.height,
        created_at: now,
    })
}

pub async fn storage_path_taken(conn: &mut SqliteConnection, storage_path: &str) -> Result<bool> {
    let taken: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM submission_images WHERE storage_path = ?)")
            .bind(storage_path)
            .fetch_one(&mut *conn)
            .await?;
    Ok(taken)
}

/// Rows for the given ids that exist, in no particular order
pub async fn fetch_many(conn: &mut SqliteConnection, ids: &[Uuid]) -> Result<Vec<Image>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT {} FROM submission_images WHERE id IN ({})",
        IMAGE_COLUMNS,
        placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id.to_string());
    }
    let rows = query.fetch_all(&mut *conn).await?;

    rows.iter().map(Image::from_row).collect()
}

/// `active -> deleted`; 0 when the row is missing or already deleted
pub async fn mark_deleted(conn: &mut SqliteConnection, id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE submission_images SET status = 'deleted' WHERE id = ? AND status = 'active'",
    )
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// Move an active image, conditional on its current owner
pub async fn move_active(conn: &mut SqliteConnection, id: Uuid, from: Uuid, to: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE submission_images SET submission_id = ?
        WHERE id = ? AND submission_id = ? AND status = 'active'
        "#,
    )
    .bind(to.to_string())
    .bind(id.to_string())
    .bind(from.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_row(conn: &mut SqliteConnection, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM submission_images WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Active images grouped by owner, oldest first within each submission
pub async fn active_for_submissions(
    conn: &mut SqliteConnection,
    submission_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Image>>> {
    let mut grouped: HashMap<Uuid, Vec<Image>> = HashMap::new();
    if submission_ids.is_empty() {
        return Ok(grouped);
    }

    let sql = format!(
        "SELECT {} FROM submission_images \
         WHERE status = 'active' AND submission_id IN ({}) \
         ORDER BY created_at ASC, rowid ASC",
        IMAGE_COLUMNS,
        placeholders(submission_ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in submission_ids {
        query = query.bind(id.to_string());
    }

    for row in query.fetch_all(&mut *conn).await? {
        let image = Image::from_row(&row)?;
        grouped.entry(image.submission_id).or_default().push(image);
    }

    Ok(grouped)
}

/// One audit entry to append
#[derive(Debug, Clone)]
pub struct LogEntry<'a> {
    pub image_id: Uuid,
    pub action: AuditAction,
    pub from_submission_id: Option<Uuid>,
    pub to_submission_id: Option<Uuid>,
    pub actor: &'a str,
}

pub async fn append_log(conn: &mut SqliteConnection, entry: &LogEntry<'_>) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO submission_image_logs
            (image_id, action, from_submission_id, to_submission_id, actor, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.image_id.to_string())
    .bind(entry.action.as_str())
    .bind(entry.from_submission_id.map(|id| id.to_string()))
    .bind(entry.to_submission_id.map(|id| id.to_string()))
    .bind(entry.actor)
    .bind(time::to_db(time::now()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Audit entries for one image in insertion order
pub async fn history(conn: &mut SqliteConnection, image_id: Uuid) -> Result<Vec<AuditEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, image_id, action, from_submission_id, to_submission_id, actor, created_at
        FROM submission_image_logs
        WHERE image_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(image_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(AuditEntry::from_row).collect()
}
