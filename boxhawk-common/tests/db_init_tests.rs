//! Tests for database initialization, append-only audit log and legacy backfill

use boxhawk_common::db::{backfill_legacy_image_slots, init_database, init_memory_database};
use boxhawk_common::time;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("boxhawk.db");

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("boxhawk.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_tables_exist() {
    let pool = init_memory_database().await.unwrap();

    for table in ["submissions", "submission_images", "submission_image_logs", "schema_version"] {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "missing table {}", table);
    }
}

#[tokio::test]
async fn test_audit_log_is_append_only() {
    let pool = init_memory_database().await.unwrap();
    let now = time::to_db(time::now());

    sqlx::query(
        "INSERT INTO submission_image_logs (image_id, action, created_at) VALUES (?, 'upload', ?)",
    )
    .bind("00000000-0000-0000-0000-0000000000aa")
    .bind(&now)
    .execute(&pool)
    .await
    .unwrap();

    let update = sqlx::query("UPDATE submission_image_logs SET action = 'reassign'")
        .execute(&pool)
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM submission_image_logs").execute(&pool).await;
    assert!(delete.is_err());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM submission_image_logs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_storage_path_is_immutable() {
    let pool = init_memory_database().await.unwrap();
    let now = time::to_db(time::now());
    let submission_id = "00000000-0000-0000-0000-000000000001";

    sqlx::query(
        "INSERT INTO submissions (id, name, manufacturer, created_by, created_at, updated_at) \
         VALUES (?, 'Gauze', 'Acme', 'user-1', ?, ?)",
    )
    .bind(submission_id)
    .bind(&now)
    .bind(&now)
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO submission_images (id, submission_id, storage_path, created_at) VALUES ('img-1', ?, 'photos/a.jpg', ?)",
    )
    .bind(submission_id)
    .bind(&now)
    .execute(&pool)
    .await
    .unwrap();

    let result = sqlx::query("UPDATE submission_images SET storage_path = 'photos/b.jpg'")
        .execute(&pool)
        .await;
    assert!(result.is_err());

    // Status changes stay allowed
    sqlx::query("UPDATE submission_images SET status = 'deleted'")
        .execute(&pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_legacy_backfill_without_slot_columns_is_noop() {
    let pool = init_memory_database().await.unwrap();
    let registered = backfill_legacy_image_slots(&pool, "http://localhost/media").await.unwrap();
    assert_eq!(registered, 0);
}

#[tokio::test]
async fn test_legacy_backfill_registers_slots_once() {
    let pool = init_memory_database().await.unwrap();
    let now = time::to_db(time::now());

    for slot in 1..=3 {
        sqlx::query(&format!("ALTER TABLE submissions ADD COLUMN image_{} TEXT", slot))
            .execute(&pool)
            .await
            .unwrap();
    }

    sqlx::query(
        "INSERT INTO submissions (id, name, manufacturer, created_by, created_at, updated_at, image_1, image_2) \
         VALUES ('00000000-0000-0000-0000-000000000001', 'Gauze', 'Acme', 'user-1', ?, ?, \
                 'http://localhost/media/photos/s1/image_1.jpg', 'https://other.host/x.jpg')",
    )
    .bind(&now)
    .bind(&now)
    .execute(&pool)
    .await
    .unwrap();

    let registered = backfill_legacy_image_slots(&pool, "http://localhost/media").await.unwrap();
    assert_eq!(registered, 1);

    let path: String = sqlx::query_scalar("SELECT storage_path FROM submission_images")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(path, "photos/s1/image_1.jpg");

    let uploads: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM submission_image_logs WHERE action = 'upload'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(uploads, 1);

    // Second run is a no-op
    let again = backfill_legacy_image_slots(&pool, "http://localhost/media").await.unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn test_legacy_backfill_skips_unusable_paths() {
    let pool = init_memory_database().await.unwrap();
    let now = time::to_db(time::now());

    for slot in 1..=3 {
        sqlx::query(&format!("ALTER TABLE submissions ADD COLUMN image_{} TEXT", slot))
            .execute(&pool)
            .await
            .unwrap();
    }

    sqlx::query(
        "INSERT INTO submissions (id, name, manufacturer, created_by, created_at, updated_at, image_1, image_2, image_3) \
         VALUES ('00000000-0000-0000-0000-000000000001', 'Gauze', 'Acme', 'user-1', ?, ?, \
                 'http://localhost/media/../outside.jpg', 'photos\\s1\\b.jpg', 'photos/s1/c.jpg')",
    )
    .bind(&now)
    .bind(&now)
    .execute(&pool)
    .await
    .unwrap();

    let registered = backfill_legacy_image_slots(&pool, "http://localhost/media").await.unwrap();
    assert_eq!(registered, 1);

    let paths: Vec<String> = sqlx::query_scalar("SELECT storage_path FROM submission_images")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(paths, vec!["photos/s1/c.jpg".to_string()]);
}

#[tokio::test]
async fn test_search_key_added_to_existing_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("boxhawk.db");
    let now = time::to_db(time::now());

    // Database as written before search_key existed
    {
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = sqlx::SqlitePool::connect(&url).await.unwrap();
        for sql in [
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP)",
            "INSERT INTO schema_version (version) VALUES (1)",
            "CREATE TABLE submissions (id TEXT PRIMARY KEY, name TEXT NOT NULL, manufacturer TEXT NOT NULL, \
             status TEXT NOT NULL DEFAULT 'uploaded', reviewed INTEGER NOT NULL DEFAULT 0, \
             created_by TEXT NOT NULL, created_at TEXT NOT NULL, updated_at TEXT NOT NULL)",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        sqlx::query(
            "INSERT INTO submissions (id, name, manufacturer, created_by, created_at, updated_at) \
             VALUES ('00000000-0000-0000-0000-000000000001', 'ÉTUDE Gauze', 'Acme', 'user-1', ?, ?)",
        )
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let key: String = sqlx::query_scalar("SELECT search_key FROM submissions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(key, "étude gauze\u{1f}acme");

    let version: i32 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version WHERE version < 100")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, 2);
}
