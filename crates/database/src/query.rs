//! Filter/sort/paginate queries over the `shows` table.
//!
//! A [`ShowQuery`] is a validated plan: every sort and filter name has been
//! resolved through the Schema Registry before any SQL text exists. Caller
//! patterns and paging values are always bound parameters; the only text
//! spliced into the statement are the registry's own static names.

use crate::error::DbError;
use crate::store::{ShowRow, show_columns};
use core_types::registry::{self, ShowAttribute};
use core_types::{ListRequest, ShowColumn};
use futures::stream::BoxStream;
use sqlx::{Executor, Postgres, QueryBuilder};

/// A validated list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowQuery {
    sort: Vec<ShowColumn>,
    filters: Vec<(ShowAttribute, String)>,
    limit: u32,
    offset: u32,
}

impl ShowQuery {
    /// Validates `request` against the Schema Registry.
    ///
    /// Unknown sort names fail with `InvalidSortField`, unknown filter keys
    /// with `InvalidFilterField`, listing every offender. An empty sort list
    /// sorts by title.
    pub fn new(request: &ListRequest) -> Result<Self, DbError> {
        let sort = if request.sort.is_empty() {
            vec![ShowColumn::Title]
        } else {
            registry::sort_columns(&request.sort)?
        };
        let filters = registry::filter_attributes(&request.filters)?
            .into_iter()
            .map(|(attribute, pattern)| (attribute, pattern.to_string()))
            .collect();

        Ok(Self {
            sort,
            filters,
            limit: request.limit,
            offset: request.offset,
        })
    }

    pub fn sort(&self) -> &[ShowColumn] {
        &self.sort
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The sort keys actually emitted: the requested ones plus `show_id` as a
    /// final tie-breaker, so equal keys never make pages overlap.
    pub fn order_keys(&self) -> Vec<ShowColumn> {
        let mut keys = self.sort.clone();
        if !keys.contains(&ShowColumn::ShowId) {
            keys.push(ShowColumn::ShowId);
        }
        keys
    }

    /// Renders the plan into a fresh builder.
    ///
    /// Strings compare byte-wise (`COLLATE "C"`), so results match a plain
    /// byte-ordinal sort regardless of the server's locale.
    pub fn to_builder(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(concat!("SELECT ", show_columns!(), " FROM shows"));

        for (i, (attribute, pattern)) in self.filters.iter().enumerate() {
            builder.push(if i == 0 { " WHERE " } else { " AND " });
            match attribute {
                ShowAttribute::Column(column) => {
                    builder.push(format!("\"{}\" LIKE ", column.as_str()));
                    builder.push_bind(contains_pattern(pattern));
                    builder.push(" ESCAPE '\\'");
                }
                ShowAttribute::Association(association) => {
                    builder.push(format!(
                        "EXISTS (SELECT 1 FROM {table} a WHERE a.show_id = shows.show_id AND a.{value} LIKE ",
                        table = association.table(),
                        value = association.value_column(),
                    ));
                    builder.push_bind(contains_pattern(pattern));
                    builder.push(" ESCAPE '\\')");
                }
            }
        }

        builder.push(" ORDER BY ");
        {
            let mut order = builder.separated(", ");
            for column in self.order_keys() {
                order.push(format!("\"{}\" COLLATE \"C\" ASC", column.as_str()));
            }
        }

        builder.push(" LIMIT ");
        builder.push_bind(i64::from(self.limit));
        builder.push(" OFFSET ");
        builder.push_bind(i64::from(self.offset));
        builder
    }

    /// The SQL text this plan renders to.
    pub fn sql(&self) -> String {
        self.to_builder().sql().to_string()
    }
}

/// Runs a rendered list query and yields rows lazily, as the server sends them.
///
/// A builder can be executed once; render a new one with
/// [`ShowQuery::to_builder`] to run the same plan again.
pub fn fetch_rows<'e, 'c: 'e, E>(
    builder: &'e mut QueryBuilder<'static, Postgres>,
    executor: E,
) -> BoxStream<'e, Result<ShowRow, sqlx::Error>>
where
    E: 'e + Executor<'c, Database = Postgres>,
{
    builder.build_query_as::<ShowRow>().fetch(executor)
}

/// Wraps `pattern` for a literal substring `LIKE`, escaping the wildcard
/// characters and the escape character itself.
pub fn contains_pattern(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() + 2);
    escaped.push('%');
    for ch in pattern.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}
