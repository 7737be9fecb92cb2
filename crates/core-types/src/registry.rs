//! The Schema Registry: the fixed, authoritative set of attribute names that
//! may be used to sort or filter shows.
//!
//! Caller-supplied names are resolved here into enum values before anything
//! else happens. Only the `&'static str` names returned by these enums are
//! ever written into query text.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar column of the `shows` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowColumn {
    ShowId,
    Type,
    Title,
    Director,
    Country,
    DateAdded,
    ReleaseYear,
    Rating,
    Duration,
    Description,
}

impl ShowColumn {
    pub const ALL: [ShowColumn; 10] = [
        ShowColumn::ShowId,
        ShowColumn::Type,
        ShowColumn::Title,
        ShowColumn::Director,
        ShowColumn::Country,
        ShowColumn::DateAdded,
        ShowColumn::ReleaseYear,
        ShowColumn::Rating,
        ShowColumn::Duration,
        ShowColumn::Description,
    ];

    /// The column name as it appears in the `shows` table.
    pub const fn as_str(self) -> &'static str {
        match self {
            ShowColumn::ShowId => "show_id",
            ShowColumn::Type => "type",
            ShowColumn::Title => "title",
            ShowColumn::Director => "director",
            ShowColumn::Country => "country",
            ShowColumn::DateAdded => "date_added",
            ShowColumn::ReleaseYear => "release_year",
            ShowColumn::Rating => "rating",
            ShowColumn::Duration => "duration",
            ShowColumn::Description => "description",
        }
    }

    /// Resolves a caller-supplied name. Surrounding whitespace is ignored,
    /// everything else must match exactly.
    pub fn lookup(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for ShowColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A multi-valued attribute, persisted as a `(show_id, value)` association table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Association {
    Cast,
    ListedIn,
}

impl Association {
    pub const ALL: [Association; 2] = [Association::Cast, Association::ListedIn];

    /// The attribute name callers use for this association.
    pub const fn attribute(self) -> &'static str {
        match self {
            Association::Cast => "cast",
            Association::ListedIn => "listed_in",
        }
    }

    pub const fn table(self) -> &'static str {
        match self {
            Association::Cast => "show_cast",
            Association::ListedIn => "show_listings",
        }
    }

    /// The column holding the associated value; the other column is always `show_id`.
    pub const fn value_column(self) -> &'static str {
        match self {
            Association::Cast => "name",
            Association::ListedIn => "listed_in",
        }
    }

    pub fn lookup(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|a| a.attribute() == name)
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}

/// Any storable attribute of a show. Scalar columns can be sorted and
/// filtered; associations can only be filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShowAttribute {
    Column(ShowColumn),
    Association(Association),
}

impl ShowAttribute {
    pub fn lookup(name: &str) -> Option<Self> {
        ShowColumn::lookup(name)
            .map(ShowAttribute::Column)
            .or_else(|| Association::lookup(name).map(ShowAttribute::Association))
    }
}

/// Resolves an ordered list of sort field names.
///
/// Every unknown name is reported, not only the first one.
pub fn sort_columns<S: AsRef<str>>(names: &[S]) -> Result<Vec<ShowColumn>, CoreError> {
    let mut columns = Vec::with_capacity(names.len());
    let mut invalid = Vec::new();
    for name in names {
        match ShowColumn::lookup(name.as_ref()) {
            Some(column) => columns.push(column),
            None => invalid.push(name.as_ref().trim().to_string()),
        }
    }
    if invalid.is_empty() {
        Ok(columns)
    } else {
        Err(CoreError::InvalidSortField(invalid))
    }
}

/// Resolves filter keys, keeping each pattern paired with its attribute.
pub fn filter_attributes<'a, I>(filters: I) -> Result<Vec<(ShowAttribute, &'a str)>, CoreError>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut resolved = Vec::new();
    let mut invalid = Vec::new();
    for (key, pattern) in filters {
        match ShowAttribute::lookup(key) {
            Some(attribute) => resolved.push((attribute, pattern.as_str())),
            None => invalid.push(key.trim().to_string()),
        }
    }
    if invalid.is_empty() {
        Ok(resolved)
    } else {
        Err(CoreError::InvalidFilterField(invalid))
    }
}

/// Splits a `field=pattern` expression on the first `=`, trimming both sides.
pub fn parse_filter(raw: &str) -> Result<(String, String), CoreError> {
    match raw.split_once('=') {
        Some((key, pattern)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), pattern.trim().to_string()))
        }
        _ => Err(CoreError::InvalidFilterSyntax(raw.to_string())),
    }
}
