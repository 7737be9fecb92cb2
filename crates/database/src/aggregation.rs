//! Summary counters over the catalog, computed with grouped queries so no
//! caller ever has to materialise every show.

use crate::error::DbError;
use core_types::{Association, Summary};
use sqlx::postgres::PgConnection;
use sqlx::{Postgres, Transaction};
use std::collections::BTreeMap;

/// Number of shows.
pub async fn total(conn: &mut PgConnection) -> Result<i64, DbError> {
    let total = sqlx::query_scalar("SELECT COUNT(*) FROM shows")
        .fetch_one(&mut *conn)
        .await?;
    Ok(total)
}

/// Number of shows per distinct `type`.
pub async fn total_by_type(conn: &mut PgConnection) -> Result<BTreeMap<String, i64>, DbError> {
    let rows: Vec<(String, i64)> = sqlx::query_as("SELECT type, COUNT(*) FROM shows GROUP BY type")
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Number of shows carrying each distinct listing value.
pub async fn total_by_listing(conn: &mut PgConnection) -> Result<BTreeMap<String, i64>, DbError> {
    let association = Association::ListedIn;
    let sql = format!(
        "SELECT {value}, COUNT(DISTINCT show_id) FROM {table} GROUP BY {value}",
        value = association.value_column(),
        table = association.table(),
    );
    let rows: Vec<(String, i64)> = sqlx::query_as(&sql).fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().collect())
}

/// Pins one REPEATABLE READ snapshot for every later statement of `tx`.
/// Must be the first statement of the transaction.
pub async fn begin_snapshot(tx: &mut Transaction<'_, Postgres>) -> Result<(), DbError> {
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// All counters, read inside `tx`. Call [`begin_snapshot`] first for a
/// consistent result.
pub async fn summarize(tx: &mut Transaction<'_, Postgres>) -> Result<Summary, DbError> {
    let total = total(&mut **tx).await?;
    let total_by_type = total_by_type(&mut **tx).await?;
    let total_by_listing = total_by_listing(&mut **tx).await?;
    Ok(Summary {
        total,
        total_by_type,
        total_by_listing,
    })
}
