//! Scalar CRUD over the `shows` table.
//!
//! Every function here runs on a connection the caller already holds,
//! normally the inside of a [`sqlx::Transaction`] opened by
//! [`crate::DbRepository`], so that scalar writes and association writes
//! commit together.

use crate::error::{DbError, UNIQUE_VIOLATION};
use core_types::{ShowFields, ShowId};
use sqlx::postgres::{PgArguments, PgConnection};
use sqlx::query::QueryAs;
use sqlx::{FromRow, Postgres, QueryBuilder};

/// Column list of the `shows` table, in registry order.
macro_rules! show_columns {
    () => {
        "show_id, type, title, director, country, date_added, release_year, rating, duration, description"
    };
}
pub(crate) use show_columns;

const INSERT_SQL: &str = concat!(
    "INSERT INTO shows (",
    show_columns!(),
    ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING ",
    show_columns!()
);

const INSERT_IF_ABSENT_SQL: &str = concat!(
    "INSERT INTO shows (",
    show_columns!(),
    ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) ON CONFLICT (show_id) DO NOTHING RETURNING ",
    show_columns!()
);

const SELECT_BY_ID_SQL: &str = concat!("SELECT ", show_columns!(), " FROM shows WHERE show_id = $1");

const SELECT_BY_ID_FOR_UPDATE_SQL: &str = concat!(
    "SELECT ",
    show_columns!(),
    " FROM shows WHERE show_id = $1 FOR UPDATE"
);

/// How many freshly generated identifiers to try before giving up.
const GENERATED_ID_ATTEMPTS: usize = 3;

/// A row of the `shows` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ShowRow {
    pub show_id: String,
    #[sqlx(rename = "type")]
    pub show_type: String,
    pub title: String,
    pub director: String,
    pub country: String,
    pub date_added: String,
    pub release_year: String,
    pub rating: String,
    pub duration: String,
    pub description: String,
}

impl ShowRow {
    pub fn show_id(&self) -> ShowId {
        ShowId::new(self.show_id.clone())
    }

    pub fn into_parts(self) -> (ShowId, ShowFields) {
        let fields = ShowFields {
            show_type: self.show_type,
            title: self.title,
            director: self.director,
            country: self.country,
            date_added: self.date_added,
            release_year: self.release_year,
            rating: self.rating,
            duration: self.duration,
            description: self.description,
        };
        (ShowId::new(self.show_id), fields)
    }
}

fn bind_insert<'q>(
    sql: &'q str,
    show_id: &'q ShowId,
    fields: &'q ShowFields,
) -> QueryAs<'q, Postgres, ShowRow, PgArguments> {
    sqlx::query_as::<_, ShowRow>(sql)
        .bind(show_id.as_str())
        .bind(fields.show_type.as_str())
        .bind(fields.title.as_str())
        .bind(fields.director.as_str())
        .bind(fields.country.as_str())
        .bind(fields.date_added.as_str())
        .bind(fields.release_year.as_str())
        .bind(fields.rating.as_str())
        .bind(fields.duration.as_str())
        .bind(fields.description.as_str())
}

/// Inserts a new show row and returns it as stored.
///
/// A caller-supplied identifier that is already taken fails with
/// `DuplicateId`. Without one, a random identifier is
/// generated; a taken one is skipped, never overwritten.
pub async fn insert(
    conn: &mut PgConnection,
    show_id: Option<ShowId>,
    fields: &ShowFields,
) -> Result<ShowRow, DbError> {
    if let Some(show_id) = show_id {
        return bind_insert(INSERT_SQL, &show_id, fields)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| insert_error(&show_id, e));
    }

    for _ in 0..GENERATED_ID_ATTEMPTS {
        let show_id = ShowId::generate();
        if let Some(row) = bind_insert(INSERT_IF_ABSENT_SQL, &show_id, fields)
            .fetch_optional(&mut *conn)
            .await?
        {
            return Ok(row);
        }
        tracing::warn!(show_id = %show_id, "Generated show id is already taken, retrying.");
    }

    Err(DbError::ConflictOrTransient(sqlx::Error::Protocol(
        "could not allocate an unused show id".to_string(),
    )))
}

fn insert_error(show_id: &ShowId, error: sqlx::Error) -> DbError {
    let duplicate = error
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION);
    if duplicate {
        DbError::DuplicateId(show_id.to_string())
    } else {
        DbError::ConflictOrTransient(error)
    }
}

/// Fetches the single row for `show_id`.
///
/// With `for_update` the row stays locked until the surrounding transaction
/// ends, which serialises concurrent patches of the same show.
pub async fn fetch_one(
    conn: &mut PgConnection,
    show_id: &ShowId,
    for_update: bool,
) -> Result<ShowRow, DbError> {
    let sql = if for_update {
        SELECT_BY_ID_FOR_UPDATE_SQL
    } else {
        SELECT_BY_ID_SQL
    };
    let rows = sqlx::query_as::<_, ShowRow>(sql)
        .bind(show_id.as_str())
        .fetch_all(&mut *conn)
        .await?;
    exactly_one(show_id, rows)
}

fn exactly_one(show_id: &ShowId, mut rows: Vec<ShowRow>) -> Result<ShowRow, DbError> {
    match rows.len() {
        0 => Err(DbError::NotFound(show_id.to_string())),
        1 => Ok(rows.remove(0)),
        matches => {
            tracing::error!(show_id = %show_id, matches, "Show id matched more than one row.");
            Err(DbError::Ambiguous {
                show_id: show_id.to_string(),
                matches,
            })
        }
    }
}

/// Fails with `NotFound` or `Ambiguous` unless exactly one row has `show_id`.
pub async fn ensure_exists(conn: &mut PgConnection, show_id: &ShowId) -> Result<(), DbError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shows WHERE show_id = $1")
        .bind(show_id.as_str())
        .fetch_one(&mut *conn)
        .await?;
    match count {
        0 => Err(DbError::NotFound(show_id.to_string())),
        1 => Ok(()),
        matches => Err(DbError::Ambiguous {
            show_id: show_id.to_string(),
            matches: matches as usize,
        }),
    }
}

/// Builds the `UPDATE` for the non-empty fields of `fields`, or `None` when
/// there is nothing to write.
pub fn build_patch(show_id: &ShowId, fields: &ShowFields) -> Option<QueryBuilder<'static, Postgres>> {
    let assignments = fields.assignments();
    if assignments.is_empty() {
        return None;
    }

    let mut builder = QueryBuilder::new("UPDATE shows SET ");
    {
        let mut set = builder.separated(", ");
        for (column, value) in assignments {
            set.push(format!("\"{}\" = ", column.as_str()));
            set.push_bind_unseparated(value.to_string());
        }
    }
    builder.push(" WHERE show_id = ");
    builder.push_bind(show_id.as_str().to_string());
    builder.push(concat!(" RETURNING ", show_columns!()));
    Some(builder)
}

/// Merges the non-empty fields into the stored row and returns the result.
///
/// The row is locked first, so missing and duplicated identifiers are
/// reported before anything is written.
pub async fn patch(
    conn: &mut PgConnection,
    show_id: &ShowId,
    fields: &ShowFields,
) -> Result<ShowRow, DbError> {
    let current = fetch_one(conn, show_id, true).await?;
    let Some(mut builder) = build_patch(show_id, fields) else {
        return Ok(current);
    };
    let row = builder
        .build_query_as::<ShowRow>()
        .fetch_one(&mut *conn)
        .await?;
    Ok(row)
}

/// Removes the show row; association rows go with it through the cascading
/// foreign keys. Returns whether a row was removed.
pub async fn delete(conn: &mut PgConnection, show_id: &ShowId) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM shows WHERE show_id = $1")
        .bind(show_id.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::ShowColumn;

    #[test]
    fn column_list_matches_registry() {
        let registry: Vec<&str> = ShowColumn::ALL.iter().map(|c| c.as_str()).collect();
        let listed: Vec<&str> = show_columns!().split(", ").collect();
        assert_eq!(listed, registry);
    }

    #[test]
    fn patch_writes_only_non_empty_fields() {
        let fields = ShowFields {
            title: String::new(),
            rating: "PG".to_string(),
            ..ShowFields::default()
        };
        let builder = build_patch(&ShowId::from("s1"), &fields).unwrap();
        assert_eq!(
            builder.sql(),
            concat!(
                "UPDATE shows SET \"rating\" = $1 WHERE show_id = $2 RETURNING ",
                show_columns!()
            )
        );
    }

    #[test]
    fn patch_numbers_binds_in_registry_order() {
        let mut fields = ShowFields::new("Movie", "Alpha");
        fields.duration = "90 min".to_string();
        let builder = build_patch(&ShowId::from("s1"), &fields).unwrap();
        assert!(builder.sql().starts_with(
            "UPDATE shows SET \"type\" = $1, \"title\" = $2, \"duration\" = $3 WHERE show_id = $4"
        ));
    }

    #[test]
    fn empty_patch_builds_nothing() {
        assert!(build_patch(&ShowId::from("s1"), &ShowFields::default()).is_none());
    }

    #[test]
    fn non_database_insert_failures_stay_storage_errors() {
        let err = insert_error(&ShowId::from("s1"), sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DbError::ConflictOrTransient(sqlx::Error::PoolTimedOut)));
    }

    #[test]
    fn exactly_one_classifies_row_counts() {
        let id = ShowId::from("s1");
        let row = ShowRow {
            show_id: "s1".to_string(),
            show_type: "Movie".to_string(),
            title: "Alpha".to_string(),
            director: String::new(),
            country: String::new(),
            date_added: String::new(),
            release_year: String::new(),
            rating: String::new(),
            duration: String::new(),
            description: String::new(),
        };

        assert!(matches!(exactly_one(&id, Vec::new()), Err(DbError::NotFound(_))));
        assert_eq!(exactly_one(&id, vec![row.clone()]).unwrap(), row);
        assert!(matches!(
            exactly_one(&id, vec![row.clone(), row]),
            Err(DbError::Ambiguous { matches: 2, .. })
        ));
    }

    #[test]
    fn row_splits_into_id_and_fields() {
        let row = ShowRow {
            show_id: "s1".to_string(),
            show_type: "TV Show".to_string(),
            title: "Kotter".to_string(),
            director: String::new(),
            country: "United States".to_string(),
            date_added: String::new(),
            release_year: "1975".to_string(),
            rating: String::new(),
            duration: "30m".to_string(),
            description: String::new(),
        };
        let (id, fields) = row.into_parts();
        assert_eq!(id.as_str(), "s1");
        assert_eq!(fields.show_type, "TV Show");
        assert_eq!(fields.release_year, "1975");
    }
}
