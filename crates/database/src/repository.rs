use crate::aggregation;
use crate::error::DbError;
use crate::query::{self, ShowQuery};
use crate::reconciler;
use crate::store::{self, ShowRow};
use chrono::Utc;
use core_types::{Association, ListRequest, NewShow, Show, ShowId, ShowUpdate, Summary};
use futures::TryStreamExt;
use sqlx::postgres::{PgConnection, PgPool};
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;

/// The `DbRepository` provides a high-level, application-specific interface
/// to the show catalog.
///
/// It holds only the pool. Each call checks out its own connection, does all
/// of its work in one transaction and gives the connection back on every exit
/// path: an early `?` drops the transaction, which rolls it back.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Whether a pooled connection can reach the database.
    pub async fn alive(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Database liveness check failed.");
                false
            }
        }
    }

    /// One page of shows, filtered and sorted as `request` asks.
    ///
    /// The request is validated before a connection is even acquired.
    #[tracing::instrument(skip(self), err)]
    pub async fn list(&self, request: &ListRequest) -> Result<Vec<Show>, DbError> {
        let plan = ShowQuery::new(request)?;

        let mut tx = self.begin_read().await?;
        let mut builder = plan.to_builder();
        let rows: Vec<ShowRow> = query::fetch_rows(&mut builder, &mut *tx)
            .try_collect()
            .await?;
        let shows = hydrate(&mut tx, rows).await?;
        tx.commit().await?;

        tracing::debug!(returned = shows.len(), "Listed shows.");
        Ok(shows)
    }

    #[tracing::instrument(skip(self), fields(show_id = %show_id), err)]
    pub async fn get(&self, show_id: &ShowId) -> Result<Show, DbError> {
        let mut tx = self.begin_read().await?;
        let row = store::fetch_one(&mut tx, show_id, false).await?;
        let mut shows = hydrate(&mut tx, vec![row]).await?;
        tx.commit().await?;
        shows.pop().ok_or_else(|| DbError::NotFound(show_id.to_string()))
    }

    /// Creates a show together with its cast and listings.
    ///
    /// `date_added` defaults to today (UTC) when absent.
    #[tracing::instrument(skip(self, new_show), fields(title = %new_show.fields.title), err)]
    pub async fn create(&self, new_show: NewShow) -> Result<Show, DbError> {
        let NewShow {
            show_id,
            mut fields,
            cast,
            listed_in,
        } = new_show;
        fields.fill_date_added(Utc::now().date_naive());

        let mut tx = self.pool.begin().await?;
        let row = store::insert(&mut tx, show_id, &fields).await?;
        let show_id = row.show_id();
        reconciler::sync(&mut tx, &show_id, Association::Cast, &cast).await?;
        reconciler::sync(&mut tx, &show_id, Association::ListedIn, &listed_in).await?;
        tx.commit().await?;

        tracing::info!(show_id = %show_id, "Created show.");
        Ok(assemble(row, cast, listed_in))
    }

    /// Merges the non-empty scalar fields of `update` into the show and
    /// replaces its cast and listings with the given sets.
    #[tracing::instrument(skip(self, update), fields(show_id = %show_id), err)]
    pub async fn patch(&self, show_id: &ShowId, update: ShowUpdate) -> Result<Show, DbError> {
        let ShowUpdate {
            fields,
            cast,
            listed_in,
        } = update;

        let mut tx = self.pool.begin().await?;
        let row = store::patch(&mut tx, show_id, &fields).await?;
        let cast_delta = reconciler::sync(&mut tx, show_id, Association::Cast, &cast).await?;
        let listing_delta =
            reconciler::sync(&mut tx, show_id, Association::ListedIn, &listed_in).await?;
        tx.commit().await?;

        tracing::info!(
            show_id = %show_id,
            cast_added = cast_delta.to_add.len(),
            cast_removed = cast_delta.to_delete.len(),
            listings_added = listing_delta.to_add.len(),
            listings_removed = listing_delta.to_delete.len(),
            "Updated show."
        );
        Ok(assemble(row, cast, listed_in))
    }

    /// Deletes the show and, through the cascade, its associations. Deleting
    /// a show that does not exist succeeds.
    #[tracing::instrument(skip(self), fields(show_id = %show_id), err)]
    pub async fn delete(&self, show_id: &ShowId) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        let removed = store::delete(&mut tx, show_id).await?;
        tx.commit().await?;

        if removed {
            tracing::info!(show_id = %show_id, "Deleted show.");
        } else {
            tracing::debug!(show_id = %show_id, "Show to delete was already absent.");
        }
        Ok(())
    }

    /// Catalog-wide counters, all read from one snapshot.
    #[tracing::instrument(skip(self), err)]
    pub async fn summarize(&self) -> Result<Summary, DbError> {
        let mut tx = self.begin_read().await?;
        let summary = aggregation::summarize(&mut tx).await?;
        tx.commit().await?;
        Ok(summary)
    }

    /// A read-only transaction on one snapshot, so a page and the
    /// associations loaded for it agree with each other.
    async fn begin_read(&self) -> Result<Transaction<'static, Postgres>, DbError> {
        let mut tx = self.pool.begin().await?;
        aggregation::begin_snapshot(&mut tx).await?;
        Ok(tx)
    }
}

/// Attaches cast and listings to each row, keeping the rows' order.
async fn hydrate(conn: &mut PgConnection, rows: Vec<ShowRow>) -> Result<Vec<Show>, DbError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = rows.iter().map(|row| row.show_id.clone()).collect();
    let mut cast = load_values(conn, &ids, Association::Cast).await?;
    let mut listings = load_values(conn, &ids, Association::ListedIn).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let cast = cast.remove(&row.show_id).unwrap_or_default();
            let listed_in = listings.remove(&row.show_id).unwrap_or_default();
            assemble(row, cast, listed_in)
        })
        .collect())
}

/// Association values of several shows, grouped by show id.
async fn load_values(
    conn: &mut PgConnection,
    show_ids: &[String],
    association: Association,
) -> Result<HashMap<String, Vec<String>>, DbError> {
    let sql = format!(
        "SELECT show_id, {value} FROM {table} WHERE show_id = ANY($1)",
        value = association.value_column(),
        table = association.table(),
    );
    let pairs: Vec<(String, String)> = sqlx::query_as(&sql)
        .bind(show_ids)
        .fetch_all(&mut *conn)
        .await?;

    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for (show_id, value) in pairs {
        grouped.entry(show_id).or_default().push(value);
    }
    Ok(grouped)
}

fn assemble<C, L>(row: ShowRow, cast: C, listed_in: L) -> Show
where
    C: IntoIterator<Item = String>,
    L: IntoIterator<Item = String>,
{
    let (show_id, fields) = row.into_parts();
    Show::new(show_id, fields, cast, listed_in)
}
