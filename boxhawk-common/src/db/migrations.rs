//! Database schema migrations
//!
//! Versioned, idempotent migrations tracked in `schema_version`.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - they must stay stable for upgrades
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Check before altering** - every migration must be safe to re-run

use crate::db::models::search_key;
use crate::storage_path::validate_storage_path;
use crate::{time, Result};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Version recorded once legacy image slots have been backfilled
const LEGACY_SLOTS_VERSION: i32 = 100;

/// Number of fixed image columns in the legacy submission shape
pub const LEGACY_IMAGE_SLOTS: usize = 10;

/// Actor recorded on audit entries written by migrations
pub const MIGRATION_ACTOR: &str = "migration";

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let version: Option<i32> = sqlx::query_scalar(
        "SELECT version FROM schema_version WHERE version < ? ORDER BY version DESC LIMIT 1",
    )
    .bind(LEGACY_SLOTS_VERSION)
    .fetch_optional(pool)
    .await?;

    Ok(version.unwrap_or(0))
}

async fn has_version(pool: &SqlitePool, version: i32) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM schema_version WHERE version = ?)")
            .bind(version)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: baseline; tables are created by init
async fn migrate_v1(_pool: &SqlitePool) -> Result<()> {
    Ok(())
}

/// Migration v2: `submissions.search_key` for Unicode case-insensitive search
///
/// Databases created before v2 lack the column; it is added and filled from
/// the current `name` and `manufacturer`.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    let present: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('submissions') WHERE name = 'search_key'",
    )
    .fetch_one(pool)
    .await?;

    if present == 0 {
        info!("Adding submissions.search_key column");
        sqlx::query("ALTER TABLE submissions ADD COLUMN search_key TEXT NOT NULL DEFAULT ''")
            .execute(pool)
            .await?;
    }

    let mut tx = pool.begin().await?;
    let rows = sqlx::query("SELECT id, name, manufacturer FROM submissions WHERE search_key = ''")
        .fetch_all(&mut *tx)
        .await?;

    for row in &rows {
        let id: String = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let manufacturer: String = row.try_get("manufacturer")?;
        sqlx::query("UPDATE submissions SET search_key = ? WHERE id = ?")
            .bind(search_key(&name, &manufacturer))
            .bind(&id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    if !rows.is_empty() {
        info!("Filled search_key for {} submissions", rows.len());
    }
    Ok(())
}

async fn legacy_slot_columns(pool: &SqlitePool) -> Result<Vec<String>> {
    let mut columns = Vec::new();
    for slot in 1..=LEGACY_IMAGE_SLOTS {
        let name = format!("image_{}", slot);
        let present: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('submissions') WHERE name = ?",
        )
        .bind(&name)
        .fetch_one(pool)
        .await?;
        if present > 0 {
            columns.push(name);
        }
    }
    Ok(columns)
}

/// Convert a legacy slot value (full public URL or bare path) to a storage path
pub fn legacy_slot_to_storage_path(value: &str, public_base_url: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let prefix = format!("{}/", public_base_url.trim_end_matches('/'));
    if let Some(path) = value.strip_prefix(&prefix) {
        return (!path.is_empty()).then(|| path.to_string());
    }

    if value.contains("://") {
        // URL outside the configured store
        return None;
    }

    Some(value.trim_start_matches('/').to_string())
}

/// Backfill image rows from legacy `image_1..image_10` columns
///
/// Only submissions that own no image rows are touched. Each backfilled image
/// gets an `upload` audit entry. Recorded in `schema_version` so later runs
/// are no-ops. Returns the number of images registered.
pub async fn backfill_legacy_image_slots(pool: &SqlitePool, public_base_url: &str) -> Result<usize> {
    if has_version(pool, LEGACY_SLOTS_VERSION).await? {
        return Ok(0);
    }

    let columns = legacy_slot_columns(pool).await?;
    if columns.is_empty() {
        set_schema_version(pool, LEGACY_SLOTS_VERSION).await?;
        return Ok(0);
    }

    info!("Backfilling legacy image slots ({} columns)", columns.len());

    let sql = format!(
        "SELECT s.id, s.created_at, {} FROM submissions s \
         WHERE NOT EXISTS (SELECT 1 FROM submission_images i WHERE i.submission_id = s.id)",
        columns.join(", ")
    );

    let mut tx = pool.begin().await?;
    let rows = sqlx::query(&sql).fetch_all(&mut *tx).await?;
    let mut registered = 0usize;

    for row in &rows {
        let submission_id: String = row.try_get("id")?;
        let created_at: String = row.try_get("created_at")?;

        for column in &columns {
            let Some(value) = row.try_get::<Option<String>, _>(column.as_str())? else {
                continue;
            };
            let Some(storage_path) = legacy_slot_to_storage_path(&value, public_base_url) else {
                warn!(
                    submission_id = %submission_id,
                    "Skipping legacy slot {} with foreign URL: {}", column, value
                );
                continue;
            };
            if let Err(e) = validate_storage_path(&storage_path) {
                warn!(
                    submission_id = %submission_id,
                    "Skipping legacy slot {} with unusable path: {}", column, e
                );
                continue;
            }

            let image_id = Uuid::new_v4().to_string();
            let inserted = sqlx::query(
                r#"
                INSERT OR IGNORE INTO submission_images (id, submission_id, storage_path, status, created_at)
                VALUES (?, ?, ?, 'active', ?)
                "#,
            )
            .bind(&image_id)
            .bind(&submission_id)
            .bind(&storage_path)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;

            if inserted.rows_affected() == 0 {
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO submission_image_logs (image_id, action, to_submission_id, actor, created_at)
                VALUES (?, 'upload', ?, ?, ?)
                "#,
            )
            .bind(&image_id)
            .bind(&submission_id)
            .bind(MIGRATION_ACTOR)
            .bind(time::to_db(time::now()))
            .execute(&mut *tx)
            .await?;

            registered += 1;
        }
    }

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(LEGACY_SLOTS_VERSION)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!("Legacy image slot backfill registered {} images", registered);
    Ok(registered)
}
