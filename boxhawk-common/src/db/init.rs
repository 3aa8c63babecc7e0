//! Database initialization
//!
//! Creates the database file on first run, applies connection pragmas and
//! creates every table idempotently before running versioned migrations.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// Every connection to `sqlite::memory:` is its own database, so the pool is
/// pinned to one connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Create tables and run migrations (idempotent)
pub async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_schema_version_table(pool).await?;
    create_submissions_table(pool).await?;
    create_submission_images_table(pool).await?;
    create_submission_image_logs_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Submissions: aggregate root of the review workflow; rows are never deleted
async fn create_submissions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submissions (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            manufacturer TEXT NOT NULL,
            barcode TEXT,
            size TEXT,
            date_of_manufacture TEXT,
            expiration TEXT,
            lot TEXT,
            ref_number TEXT,
            quantity TEXT,
            labels TEXT,
            recycling_symbol TEXT,
            manufacture_address TEXT,
            manufacture_site TEXT,
            sponsor TEXT,
            notes TEXT,
            search_key TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'uploaded'
                CHECK (status IN ('uploaded', 'in_review', 'complete', 'rejected')),
            reviewed INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_submissions_status_created ON submissions(status, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Image registry rows; `storage_path` is the immutable key into the object store
async fn create_submission_images_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submission_images (
            id TEXT PRIMARY KEY,
            submission_id TEXT NOT NULL REFERENCES submissions(id),
            storage_path TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'deleted')),
            size_bytes INTEGER,
            mime_type TEXT,
            width INTEGER,
            height INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_images_submission ON submission_images(submission_id, status, created_at)",
    )
    .execute(pool)
    .await?;

    // storage_path never changes after insert
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS submission_images_path_immutable
        BEFORE UPDATE OF storage_path ON submission_images
        WHEN NEW.storage_path <> OLD.storage_path
        BEGIN
            SELECT RAISE(ABORT, 'storage_path is immutable');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Audit log; no foreign key to images so entries outlive hard deletes
async fn create_submission_image_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submission_image_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            image_id TEXT NOT NULL,
            action TEXT NOT NULL
                CHECK (action IN ('upload', 'delete_soft', 'delete_hard', 'reassign')),
            from_submission_id TEXT,
            to_submission_id TEXT,
            actor TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_image_logs_image ON submission_image_logs(image_id, id)",
    )
    .execute(pool)
    .await?;

    // Append-only
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS submission_image_logs_no_update
        BEFORE UPDATE ON submission_image_logs
        BEGIN
            SELECT RAISE(ABORT, 'submission_image_logs is append-only');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS submission_image_logs_no_delete
        BEFORE DELETE ON submission_image_logs
        BEGIN
            SELECT RAISE(ABORT, 'submission_image_logs is append-only');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
