//! Row-level SQL for the review engine
//!
//! Every function takes a `&mut SqliteConnection` so the same statement can run
//! on a pooled connection or inside a transaction. Services own the
//! transaction boundaries.

use boxhawk_common::Result;
use sqlx::{Sqlite, SqlitePool, Transaction};

pub mod images;
pub mod submissions;

/// Begin a transaction that already holds the database write lock
///
/// A deferred transaction that reads first and writes later can fail on
/// upgrade once another writer has committed. Issuing a write as the first
/// statement takes the lock before any row is read.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE schema_version SET version = version WHERE 0")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// `?, ?, ?` for an `IN (...)` clause of `n` binds
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
