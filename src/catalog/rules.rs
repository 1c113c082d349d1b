//! Ordered field-resolution rules for heterogeneous backend records.
//!
//! The catalog proxy forwards records from several upstream shapes, so the
//! same attribute can live under different keys (`bookId` vs `id` vs
//! `book_id`). Each attribute is described by a [`FieldRules`] table that is
//! evaluated top to bottom; the first rule whose extractor yields a value wins.
use serde_json::Value;

/// Extracts a displayable value from a single JSON field.
pub type Extractor = fn(&Value) -> Option<String>;

/// One `(field-name, extractor)` pair.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub extract: Extractor,
}

impl FieldRule {
    /// Rule that accepts non-empty strings and non-zero numbers.
    pub const fn text(field: &'static str) -> Self {
        Self {
            field,
            extract: non_empty_text,
        }
    }

    /// Apply this rule to a record. Non-object records never match.
    pub fn apply(&self, record: &Value) -> Option<String> {
        record.get(self.field).and_then(self.extract)
    }
}

/// A first-match-wins table of [`FieldRule`]s for one attribute.
#[derive(Debug, Clone, Copy)]
pub struct FieldRules {
    rules: &'static [FieldRule],
}

impl FieldRules {
    /// Resolve the attribute, returning the first matching rule's value.
    pub fn resolve(&self, record: &Value) -> Option<String> {
        self.rules.iter().find_map(|rule| rule.apply(record))
    }

    /// Resolve the attribute, falling back to `default` when nothing matches.
    pub fn resolve_or(&self, record: &Value, default: &str) -> String {
        self.resolve(record).unwrap_or_else(|| default.to_string())
    }

    /// Field names in evaluation order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|rule| rule.field)
    }
}

/// Truthy text: strings that are not empty, numbers that are not zero.
///
/// Booleans, nulls, arrays and objects never count as a present value.
pub fn non_empty_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => {
            if n.as_f64().is_some_and(|f| f == 0.0) {
                None
            } else {
                Some(n.to_string())
            }
        }
        _ => None,
    }
}

// ============================================================================
// Rule Tables
// ============================================================================

/// Catalog item identifier.
pub const ID_RULES: FieldRules = FieldRules {
    rules: &[
        FieldRule::text("bookId"),
        FieldRule::text("id"),
        FieldRule::text("book_id"),
    ],
};

/// Catalog item title.
pub const TITLE_RULES: FieldRules = FieldRules {
    rules: &[
        FieldRule::text("bookName"),
        FieldRule::text("name"),
        FieldRule::text("title"),
    ],
};

/// Catalog item cover image.
pub const COVER_RULES: FieldRules = FieldRules {
    rules: &[
        FieldRule::text("coverWap"),
        FieldRule::text("cover"),
        FieldRule::text("coverUrl"),
        FieldRule::text("image"),
    ],
};

/// Detail title. Detail records never carry `title`; the card title is the fallback.
pub const DETAIL_TITLE_RULES: FieldRules = FieldRules {
    rules: &[
        FieldRule::text("bookName"),
        FieldRule::text("name"),
    ],
};

/// Detail cover.
pub const DETAIL_COVER_RULES: FieldRules = FieldRules {
    rules: &[
        FieldRule::text("coverWap"),
        FieldRule::text("cover"),
    ],
};

/// Detail synopsis.
pub const SYNOPSIS_RULES: FieldRules = FieldRules {
    rules: &[
        FieldRule::text("description"),
        FieldRule::text("synopsis"),
        FieldRule::text("intro"),
    ],
};

/// Tag record label (`{ "name": .. }` or `{ "tagName": .. }`).
pub const TAG_NAME_RULES: FieldRules = FieldRules {
    rules: &[
        FieldRule::text("name"),
        FieldRule::text("tagName"),
    ],
};

/// Popular-search keyword record.
pub const KEYWORD_RULES: FieldRules = FieldRules {
    rules: &[
        FieldRule::text("keyword"),
        FieldRule::text("name"),
        FieldRule::text("word"),
    ],
};

/// Episode label shown on the episode grid.
pub const EPISODE_LABEL_RULES: FieldRules = FieldRules {
    rules: &[
        FieldRule::text("chapterName"),
        FieldRule::text("episodeNumber"),
        FieldRule::text("number"),
        FieldRule::text("idx"),
    ],
};

/// Direct (non-CDN) episode video URL.
pub const DIRECT_VIDEO_RULES: FieldRules = FieldRules {
    rules: &[
        FieldRule::text("videoUrl"),
        FieldRule::text("url"),
        FieldRule::text("video"),
        FieldRule::text("playUrl"),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_present_field_wins() {
        let record = json!({ "id": "b", "bookId": "a", "book_id": "c" });
        assert_eq!(ID_RULES.resolve(&record).as_deref(), Some("a"));
    }

    #[test]
    fn test_empty_string_falls_through() {
        let record = json!({ "bookName": "", "name": "Second" });
        assert_eq!(TITLE_RULES.resolve(&record).as_deref(), Some("Second"));
    }

    #[test]
    fn test_numeric_id_is_stringified() {
        let record = json!({ "bookId": 41000102 });
        assert_eq!(ID_RULES.resolve(&record).as_deref(), Some("41000102"));
    }

    #[test]
    fn test_zero_and_null_do_not_match() {
        let record = json!({ "bookId": 0, "id": null, "book_id": "x9" });
        assert_eq!(ID_RULES.resolve(&record).as_deref(), Some("x9"));
    }

    #[test]
    fn test_non_object_record_never_matches() {
        assert_eq!(COVER_RULES.resolve(&json!("just a string")), None);
        assert_eq!(COVER_RULES.resolve(&json!(null)), None);
        assert_eq!(COVER_RULES.resolve(&json!([1, 2])), None);
    }

    #[test]
    fn test_resolve_or_default() {
        assert_eq!(TITLE_RULES.resolve_or(&json!({}), "Unknown"), "Unknown");
    }

    #[test]
    fn test_rule_table_order_is_inspectable() {
        let fields: Vec<_> = COVER_RULES.fields().collect();
        assert_eq!(fields, vec!["coverWap", "cover", "coverUrl", "image"]);
    }
}
