//! Catalog payload normalization.
//!
//! The backend proxy forwards upstream catalog JSON without reshaping it, so
//! every consumer goes through this module to turn raw payloads into typed
//! values:
//!
//! - [`normalize`] - list-envelope extraction and [`CatalogItem`] projection
//! - [`episode`] - [`EpisodeRef`] and CDN/quality video URL resolution
//! - [`detail`] - [`DramaDetail`] for the detail and random-pick endpoints
//! - [`rules`] - the first-match-wins field tables behind all of the above
//!
//! Nothing here returns an error. Unrecognised shapes degrade to empty lists
//! and placeholder fields so one malformed record never hides its siblings.

pub mod detail;
pub mod episode;
pub mod normalize;
pub mod rules;

pub use detail::{DramaDetail, NO_SYNOPSIS};
pub use episode::{normalize_episodes, resolve_video_url, EpisodeRef};
pub use normalize::{
    extract_records, find_records, normalize_items, normalize_keywords, try_normalize_items,
    CatalogItem, ListShape, CATALOG_LIST, EPISODE_LIST, UNKNOWN_TITLE,
};
