//! Drama detail records (also used for the random-pick endpoint).
use serde::Serialize;
use serde_json::Value;

use super::normalize::{CatalogItem, UNKNOWN_TITLE};
use super::rules::{
    non_empty_text, DETAIL_COVER_RULES, DETAIL_TITLE_RULES, ID_RULES, SYNOPSIS_RULES,
    TAG_NAME_RULES, TITLE_RULES,
};

/// Synopsis shown when the backend has none.
pub const NO_SYNOPSIS: &str = "No description available.";

/// Full description of one drama.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DramaDetail {
    pub id: String,
    pub title: String,
    pub cover_url: String,
    pub synopsis: String,
    pub tags: Vec<String>,
}

/// Unwrap a single-record envelope: `data`, then `result`, then the value itself.
pub fn unwrap_record(payload: &Value) -> &Value {
    ["data", "result"]
        .iter()
        .find_map(|name| payload.get(*name).filter(|v| !v.is_null()))
        .unwrap_or(payload)
}

impl DramaDetail {
    /// Build a detail from a detail payload.
    ///
    /// `card` is the catalog card the user opened; its title and cover fill
    /// in when the detail record lacks them.
    pub fn from_payload(payload: &Value, card: &CatalogItem) -> Self {
        let record = unwrap_record(payload);
        Self {
            id: card.id.clone(),
            title: DETAIL_TITLE_RULES
                .resolve(record)
                .unwrap_or_else(|| card.title.clone()),
            cover_url: DETAIL_COVER_RULES
                .resolve(record)
                .unwrap_or_else(|| card.cover_url.clone()),
            synopsis: SYNOPSIS_RULES.resolve_or(record, NO_SYNOPSIS),
            tags: extract_tags(record),
        }
    }

    /// Build a detail from a random-pick payload, which carries its own id.
    ///
    /// Returns `None` when the payload holds no openable record.
    pub fn from_random_payload(payload: &Value) -> Option<Self> {
        let record = unwrap_record(payload);
        Some(Self {
            id: ID_RULES.resolve(record)?,
            title: TITLE_RULES.resolve_or(record, UNKNOWN_TITLE),
            cover_url: DETAIL_COVER_RULES.resolve_or(record, ""),
            synopsis: SYNOPSIS_RULES.resolve_or(record, ""),
            tags: extract_tags(record),
        })
    }

    /// The card this detail can be reopened from.
    pub fn as_card(&self) -> CatalogItem {
        CatalogItem {
            id: self.id.clone(),
            title: self.title.clone(),
            cover_url: self.cover_url.clone(),
        }
    }
}

/// Tags arrive as an array of strings, an array of `{name|tagName}` records,
/// or a single comma-separated string.
fn extract_tags(record: &Value) -> Vec<String> {
    let raw = ["tags", "tagList"]
        .iter()
        .find_map(|name| record.get(*name).filter(|v| !v.is_null()));

    match raw {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|tag| match tag {
                Value::Object(_) => TAG_NAME_RULES.resolve(tag),
                other => non_empty_text(other),
            })
            .collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
