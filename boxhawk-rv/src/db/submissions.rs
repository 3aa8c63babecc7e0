//! Submission rows

use boxhawk_common::db::{Submission, SubmissionFields, SubmissionStatus, SUBMISSION_COLUMNS};
use boxhawk_common::{time, Result};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::placeholders;

/// Insert a new submission row and return it as stored
pub async fn insert(
    conn: &mut SqliteConnection,
    fields: &SubmissionFields,
    status: SubmissionStatus,
    created_by: &str,
) -> Result<Submission> {
    let id = Uuid::new_v4();
    let now = time::now();
    let stamp = time::to_db(now);

    sqlx::query(
        r#"
        INSERT INTO submissions (
            id, name, manufacturer, barcode, size, date_of_manufacture, expiration,
            lot, ref_number, quantity, labels, recycling_symbol, manufacture_address,
            manufacture_site, sponsor, notes, search_key, status, reviewed, created_by,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&fields.name)
    .bind(&fields.manufacturer)
    .bind(&fields.barcode)
    .bind(&fields.size)
    .bind(&fields.date_of_manufacture)
    .bind(&fields.expiration)
    .bind(&fields.lot)
    .bind(&fields.ref_number)
    .bind(&fields.quantity)
    .bind(fields.labels.to_column())
    .bind(fields.recycling_symbol.to_column())
    .bind(&fields.manufacture_address)
    .bind(&fields.manufacture_site)
    .bind(&fields.sponsor)
    .bind(&fields.notes)
    .bind(fields.search_key())
    .bind(status.as_str())
    .bind(created_by)
    .bind(&stamp)
    .bind(&stamp)
    .execute(&mut *conn)
    .await?;

    Ok(Submission {
        id,
        fields: fields.clone(),
        status,
        reviewed: false,
        created_by: created_by.to_string(),
        created_at: now,
        updated_at: now,
    })
}

pub async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Submission>> {
    let sql = format!("SELECT {} FROM submissions WHERE id = ?", SUBMISSION_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(Submission::from_row).transpose()
}

pub async fn exists(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM submissions WHERE id = ?)")
        .bind(id.to_string())
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

/// Overwrite the descriptive fields and set status in one statement
pub async fn update_fields_and_status(
    conn: &mut SqliteConnection,
    id: Uuid,
    fields: &SubmissionFields,
    status: SubmissionStatus,
    reviewed: bool,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE submissions SET
            name = ?, manufacturer = ?, barcode = ?, size = ?, date_of_manufacture = ?,
            expiration = ?, lot = ?, ref_number = ?, quantity = ?, labels = ?,
            recycling_symbol = ?, manufacture_address = ?, manufacture_site = ?,
            sponsor = ?, notes = ?, search_key = ?, status = ?, reviewed = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&fields.name)
    .bind(&fields.manufacturer)
    .bind(&fields.barcode)
    .bind(&fields.size)
    .bind(&fields.date_of_manufacture)
    .bind(&fields.expiration)
    .bind(&fields.lot)
    .bind(&fields.ref_number)
    .bind(&fields.quantity)
    .bind(fields.labels.to_column())
    .bind(fields.recycling_symbol.to_column())
    .bind(&fields.manufacture_address)
    .bind(&fields.manufacture_site)
    .bind(&fields.sponsor)
    .bind(&fields.notes)
    .bind(fields.search_key())
    .bind(status.as_str())
    .bind(reviewed)
    .bind(time::to_db(now))
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn update_status(
    conn: &mut SqliteConnection,
    id: Uuid,
    status: SubmissionStatus,
    reviewed: bool,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE submissions SET status = ?, reviewed = ?, updated_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(reviewed)
    .bind(time::to_db(now))
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Oldest `in_review` submission other than `exclude`
pub async fn oldest_in_review(conn: &mut SqliteConnection, exclude: Option<Uuid>) -> Result<Option<Uuid>> {
    let id: Option<String> = sqlx::query_scalar(
        r#"
        SELECT id FROM submissions
        WHERE status = 'in_review' AND id != ?
        ORDER BY created_at ASC, rowid ASC
        LIMIT 1
        "#,
    )
    .bind(exclude.map(|id| id.to_string()).unwrap_or_default())
    .fetch_optional(&mut *conn)
    .await?;

    id.map(|id| {
        Uuid::parse_str(&id)
            .map_err(|e| boxhawk_common::Error::Internal(format!("Invalid submission id {}: {}", id, e)))
    })
    .transpose()
}

/// Status and text filters for a listing query
#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub include: Vec<SubmissionStatus>,
    pub exclude: Vec<SubmissionStatus>,
    pub search: Option<String>,
}

impl SubmissionFilter {
    /// WHERE clause and its binds, in bind order
    fn where_clause(&self) -> (String, Vec<String>) {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();

        if !self.include.is_empty() {
            conditions.push(format!("status IN ({})", placeholders(self.include.len())));
            binds.extend(self.include.iter().map(|s| s.as_str().to_string()));
        }

        for status in &self.exclude {
            conditions.push("status != ?".to_string());
            binds.push(status.as_str().to_string());
        }

        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            // search_key is folded in Rust; SQLite's LIKE folds ASCII only
            conditions.push(r"search_key LIKE ? ESCAPE '\'".to_string());
            binds.push(format!("%{}%", escape_like(&term.to_lowercase())));
        }

        if conditions.is_empty() {
            (String::new(), binds)
        } else {
            (format!("WHERE {}", conditions.join(" AND ")), binds)
        }
    }
}

/// Escape LIKE wildcards so the search term matches literally
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Total rows matching a filter, ignoring pagination
pub async fn count(conn: &mut SqliteConnection, filter: &SubmissionFilter) -> Result<i64> {
    let (where_clause, binds) = filter.where_clause();
    let sql = format!("SELECT COUNT(*) FROM submissions {}", where_clause);

    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for bind in &binds {
        query = query.bind(bind);
    }
    Ok(query.fetch_one(&mut *conn).await?)
}

/// One page of matching rows, newest first
pub async fn list(
    conn: &mut SqliteConnection,
    filter: &SubmissionFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Submission>> {
    let (where_clause, binds) = filter.where_clause();
    let sql = format!(
        "SELECT {} FROM submissions {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
        SUBMISSION_COLUMNS, where_clause
    );

    let mut query = sqlx::query(&sql);
    for bind in &binds {
        query = query.bind(bind);
    }
    let rows = query.bind(limit).bind(offset).fetch_all(&mut *conn).await?;

    rows.iter().map(Submission::from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxhawk_common::db::init_memory_database;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), r"50\%\_off");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("gauze"), "gauze");
    }

    #[test]
    fn test_where_clause_shape() {
        let filter = SubmissionFilter {
            include: vec![SubmissionStatus::Uploaded, SubmissionStatus::InReview],
            exclude: vec![SubmissionStatus::Rejected],
            search: Some("  Acme ".to_string()),
        };
        let (sql, binds) = filter.where_clause();
        assert_eq!(
            sql,
            r"WHERE status IN (?, ?) AND status != ? AND search_key LIKE ? ESCAPE '\'"
        );
        assert_eq!(binds, vec!["uploaded", "in_review", "rejected", "%acme%"]);

        let (sql, binds) = SubmissionFilter::default().where_clause();
        assert!(sql.is_empty());
        assert!(binds.is_empty());
    }

    #[tokio::test]
    async fn test_insert_then_fetch() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let mut fields = SubmissionFields::named("Gauze", "Acme");
        fields.labels.insert(boxhawk_common::symbols::GeneralSymbol::Sterile);
        let created = insert(&mut conn, &fields, SubmissionStatus::Uploaded, "user-1")
            .await
            .unwrap();

        let fetched = fetch(&mut conn, created.id).await.unwrap().unwrap();
        assert_eq!(fetched.fields, fields);
        assert_eq!(fetched.status, SubmissionStatus::Uploaded);
        assert_eq!(fetched.created_by, "user-1");
        assert!(exists(&mut conn, created.id).await.unwrap());
        assert!(fetch(&mut conn, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_matches_literally() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        insert(&mut conn, &SubmissionFields::named("100% Cotton", "Acme"), SubmissionStatus::Uploaded, "u")
            .await
            .unwrap();
        insert(&mut conn, &SubmissionFields::named("1000 Cotton", "Acme"), SubmissionStatus::Uploaded, "u")
            .await
            .unwrap();

        let filter = SubmissionFilter {
            search: Some("100%".to_string()),
            ..Default::default()
        };
        assert_eq!(count(&mut conn, &filter).await.unwrap(), 1);

        let filter = SubmissionFilter {
            search: Some("ACME".to_string()),
            ..Default::default()
        };
        assert_eq!(count(&mut conn, &filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_case() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let created = insert(
            &mut conn,
            &SubmissionFields::named("ÉTUDE Gauze", "Acme"),
            SubmissionStatus::Uploaded,
            "u",
        )
        .await
        .unwrap();
        insert(&mut conn, &SubmissionFields::named("Swab", "Müller AG"), SubmissionStatus::Uploaded, "u")
            .await
            .unwrap();

        for term in ["ÉTUDE", "étude", "Étude gauze"] {
            let filter = SubmissionFilter {
                search: Some(term.to_string()),
                ..Default::default()
            };
            assert_eq!(count(&mut conn, &filter).await.unwrap(), 1, "search {:?}", term);
        }

        let filter = SubmissionFilter {
            search: Some("MÜLLER".to_string()),
            ..Default::default()
        };
        assert_eq!(count(&mut conn, &filter).await.unwrap(), 1);

        // Rewritten fields are searchable under their new text
        update_fields_and_status(
            &mut conn,
            created.id,
            &SubmissionFields::named("Ölfilter", "Acme"),
            SubmissionStatus::Complete,
            true,
            time::now(),
        )
        .await
        .unwrap();
        let filter = SubmissionFilter {
            search: Some("ÖLFILTER".to_string()),
            ..Default::default()
        };
        assert_eq!(count(&mut conn, &filter).await.unwrap(), 1);
        let filter = SubmissionFilter {
            search: Some("étude".to_string()),
            ..Default::default()
        };
        assert_eq!(count(&mut conn, &filter).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_oldest_in_review_skips_excluded() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = insert(&mut conn, &SubmissionFields::named("A", "M"), SubmissionStatus::InReview, "u")
            .await
            .unwrap();
        let second = insert(&mut conn, &SubmissionFields::named("B", "M"), SubmissionStatus::InReview, "u")
            .await
            .unwrap();
        insert(&mut conn, &SubmissionFields::named("C", "M"), SubmissionStatus::Uploaded, "u")
            .await
            .unwrap();

        assert_eq!(oldest_in_review(&mut conn, None).await.unwrap(), Some(first.id));
        assert_eq!(oldest_in_review(&mut conn, Some(first.id)).await.unwrap(), Some(second.id));
    }
}
