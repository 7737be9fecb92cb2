use crate::registry::ShowColumn;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_LIMIT: u32 = 50;

/// `date_added` format of the source catalog, e.g. "September 9, 2019".
pub const DATE_ADDED_FORMAT: &str = "%B %-d, %Y";

/// Opaque, stable identifier of a show.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShowId(String);

impl ShowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ShowId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ShowId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The scalar attributes of a show.
///
/// An empty string means "absent". On create, absent optional fields are
/// stored as empty; on patch, absent fields leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShowFields {
    #[serde(rename = "type")]
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

impl ShowFields {
    /// Fields for a new show with its two required attributes.
    pub fn new(show_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            show_type: show_type.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// The value held for `column`, or `None` for the identifier column,
    /// which is not a field.
    pub fn value(&self, column: ShowColumn) -> Option<&str> {
        let value = match column {
            ShowColumn::ShowId => return None,
            ShowColumn::Type => &self.show_type,
            ShowColumn::Title => &self.title,
            ShowColumn::Director => &self.director,
            ShowColumn::Country => &self.country,
            ShowColumn::DateAdded => &self.date_added,
            ShowColumn::ReleaseYear => &self.release_year,
            ShowColumn::Rating => &self.rating,
            ShowColumn::Duration => &self.duration,
            ShowColumn::Description => &self.description,
        };
        Some(value.as_str())
    }

    /// The columns a patch with these fields writes: every non-empty field,
    /// in registry order.
    pub fn assignments(&self) -> Vec<(ShowColumn, &str)> {
        ShowColumn::ALL
            .into_iter()
            .filter_map(|column| self.value(column).map(|value| (column, value)))
            .filter(|(_, value)| !value.is_empty())
            .collect()
    }

    /// Stamps `date_added` with `today` unless the caller already set it.
    pub fn fill_date_added(&mut self, today: NaiveDate) {
        if self.date_added.is_empty() {
            self.date_added = today.format(DATE_ADDED_FORMAT).to_string();
        }
    }
}

/// Everything needed to create a show.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShow {
    /// Caller-chosen identifier; a random one is assigned when absent.
    #[serde(default)]
    pub show_id: Option<ShowId>,
    #[serde(flatten)]
    pub fields: ShowFields,
    #[serde(default)]
    pub cast: BTreeSet<String>,
    #[serde(default)]
    pub listed_in: BTreeSet<String>,
}

/// An update to an existing show.
///
/// Scalars are merged (empty fields are skipped); `cast` and `listed_in` are
/// the complete desired sets and replace whatever is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowUpdate {
    #[serde(flatten)]
    pub fields: ShowFields,
    #[serde(default)]
    pub cast: BTreeSet<String>,
    #[serde(default)]
    pub listed_in: BTreeSet<String>,
}

/// A show as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Show {
    pub show_id: ShowId,
    #[serde(flatten)]
    pub fields: ShowFields,
    pub cast: Vec<String>,
    pub listed_in: Vec<String>,
    pub uri: String,
}

impl Show {
    /// Assembles a show; associated values are sorted byte-wise for display.
    pub fn new<C, L>(show_id: ShowId, fields: ShowFields, cast: C, listed_in: L) -> Self
    where
        C: IntoIterator<Item = String>,
        L: IntoIterator<Item = String>,
    {
        let mut cast: Vec<String> = cast.into_iter().collect();
        let mut listed_in: Vec<String> = listed_in.into_iter().collect();
        cast.sort();
        cast.dedup();
        listed_in.sort();
        listed_in.dedup();
        let uri = show_uri(&show_id);
        Self {
            show_id,
            fields,
            cast,
            listed_in,
            uri,
        }
    }
}

pub fn show_uri(show_id: &ShowId) -> String {
    format!("/shows/{show_id}")
}

/// Parameters of a list call, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    /// Sort keys, applied in order, all ascending. Empty means "by title".
    pub sort: Vec<String>,
    /// Attribute name to substring pattern; all filters must match.
    pub filters: BTreeMap<String, String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            sort: vec![ShowColumn::Title.as_str().to_string()],
            filters: BTreeMap::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Aggregated counters over the whole catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: i64,
    pub total_by_type: BTreeMap<String, i64>,
    /// A show counts once towards every listing it carries, so the values
    /// may add up to more than `total`.
    #[serde(rename = "total_by_listed_in")]
    pub total_by_listing: BTreeMap<String, i64>,
}
