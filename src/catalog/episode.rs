//! Episode references and video URL resolution.
use serde::Serialize;
use serde_json::Value;

use super::normalize::{extract_records, EPISODE_LIST};
use super::rules::{non_empty_text, DIRECT_VIDEO_RULES, EPISODE_LABEL_RULES};

/// How a quality variant is picked out of a CDN's `videoPathList`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantPick {
    /// Variant flagged `isDefault == 1`.
    Default,
    /// Variant with the given vertical resolution.
    Quality(u64),
    /// First variant in server order.
    First,
}

/// Variant preference: an explicit default outranks any quality match.
pub const VARIANT_PREFERENCE: &[VariantPick] = &[
    VariantPick::Default,
    VariantPick::Quality(720),
    VariantPick::Quality(540),
    VariantPick::First,
];

/// CDN preference: the default CDN, otherwise the first one listed.
pub const CDN_PREFERENCE: &[VariantPick] = &[VariantPick::Default, VariantPick::First];

impl VariantPick {
    fn select<'a>(&self, candidates: &'a [Value]) -> Option<&'a Value> {
        match self {
            VariantPick::Default => candidates.iter().find(|c| is_default(c)),
            VariantPick::Quality(q) => candidates
                .iter()
                .find(|c| c.get("quality").and_then(Value::as_u64) == Some(*q)),
            VariantPick::First => candidates.first(),
        }
    }
}

fn is_default(candidate: &Value) -> bool {
    candidate.get("isDefault").and_then(Value::as_i64) == Some(1)
}

fn pick<'a>(candidates: &'a [Value], preference: &[VariantPick]) -> Option<&'a Value> {
    preference.iter().find_map(|p| p.select(candidates))
}

/// Resolve the playable URL of a raw episode record.
///
/// Direct fields win; otherwise the nested `cdnList[].videoPathList[]`
/// structure is walked using [`CDN_PREFERENCE`] and [`VARIANT_PREFERENCE`].
pub fn resolve_video_url(record: &Value) -> Option<String> {
    if let Some(url) = DIRECT_VIDEO_RULES.resolve(record) {
        return Some(url);
    }

    let cdns = record.get("cdnList")?.as_array()?;
    let cdn = pick(cdns, CDN_PREFERENCE)?;
    let variants = cdn.get("videoPathList")?.as_array()?;
    let variant = pick(variants, VARIANT_PREFERENCE)?;
    variant.get("videoPath").and_then(non_empty_text)
}

/// A single playable (or not) episode of a drama.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeRef {
    /// Zero-based position in the episode list; the entitlement input.
    pub index: usize,
    /// Label shown to the user (chapter name or number).
    pub display_number: String,
    /// Resolved video URL, if the record carried one.
    pub video_url: Option<String>,
}

impl EpisodeRef {
    pub fn from_record(index: usize, record: &Value) -> Self {
        Self {
            index,
            display_number: EPISODE_LABEL_RULES
                .resolve(record)
                .unwrap_or_else(|| (index + 1).to_string()),
            video_url: resolve_video_url(record),
        }
    }
}

/// Normalize an episode-list payload, preserving server order.
pub fn normalize_episodes(payload: &Value) -> Vec<EpisodeRef> {
    extract_records(payload, &EPISODE_LIST)
        .iter()
        .enumerate()
        .map(|(i, record)| EpisodeRef::from_record(i, record))
        .collect()
}
