//! Shape-tolerant extraction of record lists from catalog payloads.
//!
//! The proxy passes upstream JSON through untouched, and the upstream answers
//! in at least five envelopes:
//!
//! ```text
//! [ ... ]
//! { "data":   [ ... ] }
//! { "data":   { "bookList": [ ... ] } }     // or "list"
//! { "result": [ ... ] }
//! { "result": { "bookList": [ ... ] } }     // or "list"
//! ```
//!
//! [`find_records`] resolves all of them to the same slice and reports `None`
//! when no list is present. [`extract_records`] never fails; anything
//! unrecognised yields an empty slice.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::rules::{COVER_RULES, ID_RULES, KEYWORD_RULES, TITLE_RULES};

/// Title used when a record carries no usable title field.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Where a list of records may live inside a payload.
///
/// Containers are tried in order; the first *present* container decides the
/// outcome even if its content turns out to be unusable.
#[derive(Debug, Clone, Copy)]
pub struct ListShape {
    pub containers: &'static [&'static str],
    pub nested: &'static [&'static str],
}

/// Catalog listings (`foryou`, `search`, ...).
pub const CATALOG_LIST: ListShape = ListShape {
    containers: &["data", "result"],
    nested: &["bookList", "list"],
};

/// Episode listings carry a wider set of nested names.
pub const EPISODE_LIST: ListShape = ListShape {
    containers: &["data", "result"],
    nested: &["episodeList", "list", "episodes"],
};

/// Popular-search keywords.
pub const KEYWORD_LIST: ListShape = ListShape {
    containers: &["data", "result"],
    nested: &["list"],
};

/// Locate the ordered record list in `payload` according to `shape`.
///
/// Returns `None` when the payload holds no list at any known position. An
/// empty list is `Some(&[])`: the backend said "no results".
pub fn find_records<'a>(payload: &'a Value, shape: &ListShape) -> Option<&'a [Value]> {
    if let Value::Array(items) = payload {
        return Some(items);
    }

    let container = shape
        .containers
        .iter()
        .find_map(|name| payload.get(*name).filter(|v| is_present(v)))?;

    if let Value::Array(items) = container {
        return Some(items);
    }

    shape
        .nested
        .iter()
        .find_map(|name| container.get(*name).and_then(Value::as_array))
        .map(Vec::as_slice)
}

/// Extract the ordered record list from `payload` according to `shape`.
///
/// Unrecognised payloads yield an empty slice.
pub fn extract_records<'a>(payload: &'a Value, shape: &ListShape) -> &'a [Value] {
    find_records(payload, shape).unwrap_or(&[])
}

/// A container counts as present when it holds something other than
/// `null`, `false`, `0` or `""`.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A normalized catalog card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub cover_url: String,
}

impl CatalogItem {
    /// Project a raw record. Missing fields degrade, they never fail.
    pub fn from_record(record: &Value) -> Self {
        Self {
            id: ID_RULES.resolve_or(record, ""),
            title: TITLE_RULES.resolve_or(record, UNKNOWN_TITLE),
            cover_url: COVER_RULES.resolve_or(record, ""),
        }
    }

    /// Whether the card can be opened (it carries an identifier).
    pub fn is_openable(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Normalize a catalog payload into cards, preserving server order.
pub fn normalize_items(payload: &Value) -> Vec<CatalogItem> {
    try_normalize_items(payload).unwrap_or_default()
}

/// Like [`normalize_items`], but `None` when the payload carries no list,
/// so callers can tell "no results" apart from an unusable reply.
pub fn try_normalize_items(payload: &Value) -> Option<Vec<CatalogItem>> {
    find_records(payload, &CATALOG_LIST)
        .map(|records| records.iter().map(CatalogItem::from_record).collect())
}

/// Normalize the popular-search payload into keywords.
///
/// Keywords are either bare strings or records resolved through
/// [`KEYWORD_RULES`]; entries that resolve to nothing are skipped.
pub fn normalize_keywords(payload: &Value) -> Vec<String> {
    extract_records(payload, &KEYWORD_LIST)
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            other => KEYWORD_RULES.resolve(other),
        })
        .collect()
}
