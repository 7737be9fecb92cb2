//! Keeps a show's association rows equal to a desired set of values.
//!
//! The reconciler never rewrites a whole association set. It computes the
//! values to remove and the values to add, leaves the intersection alone, and
//! applies both halves inside the caller's transaction. Deletes are always
//! scoped to the owning show, so rows of other shows that carry the same
//! value are never touched.

use crate::error::DbError;
use crate::store;
use core_types::{Association, ShowId};
use sqlx::postgres::PgConnection;
use sqlx::{Postgres, Transaction};
use std::collections::BTreeSet;

/// The writes that turn one association set into another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// Persisted values that are no longer wanted.
    pub to_delete: BTreeSet<String>,
    /// Wanted values that are not persisted yet.
    pub to_add: BTreeSet<String>,
}

impl Delta {
    /// `current − desired` and `desired − current`.
    pub fn between(current: &BTreeSet<String>, desired: &BTreeSet<String>) -> Self {
        Self {
            to_delete: current.difference(desired).cloned().collect(),
            to_add: desired.difference(current).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_add.is_empty()
    }
}

/// Loads the values currently persisted for one show and association.
pub async fn current_values(
    conn: &mut PgConnection,
    show_id: &ShowId,
    association: Association,
) -> Result<BTreeSet<String>, DbError> {
    let sql = format!(
        "SELECT {value} FROM {table} WHERE show_id = $1",
        value = association.value_column(),
        table = association.table(),
    );
    let values: Vec<String> = sqlx::query_scalar(&sql)
        .bind(show_id.as_str())
        .fetch_all(&mut *conn)
        .await?;
    Ok(values.into_iter().collect())
}

/// Applies the delta from `current` to `desired` for one show and association.
///
/// Fails with `NotFound` before any write when the show does not exist. Runs
/// entirely inside `tx`; if any statement fails the error propagates and the
/// caller's transaction is rolled back on drop, so a half-applied delta is
/// never committed. Inserting a pair that already exists is a no-op.
pub async fn reconcile(
    tx: &mut Transaction<'_, Postgres>,
    show_id: &ShowId,
    association: Association,
    current: &BTreeSet<String>,
    desired: &BTreeSet<String>,
) -> Result<Delta, DbError> {
    store::ensure_exists(&mut **tx, show_id).await?;

    let delta = Delta::between(current, desired);

    if !delta.to_delete.is_empty() {
        let sql = format!(
            "DELETE FROM {table} WHERE show_id = $1 AND {value} = ANY($2)",
            table = association.table(),
            value = association.value_column(),
        );
        sqlx::query(&sql)
            .bind(show_id.as_str())
            .bind(delta.to_delete.iter().cloned().collect::<Vec<String>>())
            .execute(&mut **tx)
            .await?;
    }

    if !delta.to_add.is_empty() {
        let sql = format!(
            "INSERT INTO {table} (show_id, {value}) SELECT $1, UNNEST($2::varchar[]) ON CONFLICT DO NOTHING",
            table = association.table(),
            value = association.value_column(),
        );
        sqlx::query(&sql)
            .bind(show_id.as_str())
            .bind(delta.to_add.iter().cloned().collect::<Vec<String>>())
            .execute(&mut **tx)
            .await?;
    }

    tracing::debug!(
        show_id = %show_id,
        association = %association,
        deleted = delta.to_delete.len(),
        added = delta.to_add.len(),
        "Reconciled association."
    );

    Ok(delta)
}

/// Loads the persisted set and reconciles it against `desired`.
pub async fn sync(
    tx: &mut Transaction<'_, Postgres>,
    show_id: &ShowId,
    association: Association,
    desired: &BTreeSet<String>,
) -> Result<Delta, DbError> {
    let current = current_values(&mut **tx, show_id, association).await?;
    reconcile(tx, show_id, association, &current, desired).await
}
