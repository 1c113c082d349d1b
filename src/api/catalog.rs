//! Catalog endpoints behind the backend's `/api/proxy/*` passthrough.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ApiClient, ApiError};
use crate::catalog::{
    normalize_episodes, normalize_keywords, try_normalize_items, CatalogItem, DramaDetail,
    EpisodeRef,
};

/// A home-screen tab. Each tab is its own paginated feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HomeTab {
    ForYou,
    Latest,
    Trending,
    DubIndo,
}

impl HomeTab {
    pub const ALL: [HomeTab; 4] = [
        HomeTab::ForYou,
        HomeTab::Latest,
        HomeTab::Trending,
        HomeTab::DubIndo,
    ];

    /// Upstream endpoint name.
    pub fn endpoint(self) -> &'static str {
        match self {
            HomeTab::ForYou => "foryou",
            HomeTab::Latest => "latest",
            HomeTab::Trending => "trending",
            HomeTab::DubIndo => "dubindo",
        }
    }

    /// Extra query parameters the tab needs besides `page`.
    pub fn extra_params(self) -> &'static [(&'static str, &'static str)] {
        match self {
            HomeTab::DubIndo => &[("classify", "terpopuler")],
            _ => &[],
        }
    }
}

impl fmt::Display for HomeTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

impl FromStr for HomeTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HomeTab::ALL
            .into_iter()
            .find(|tab| tab.endpoint().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown tab '{s}' (expected foryou, latest, trending or dubindo)"))
    }
}

/// Detail and episode list of one drama, fetched together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DramaBundle {
    pub detail: DramaDetail,
    pub episodes: Vec<EpisodeRef>,
}

fn proxy(endpoint: &str) -> String {
    format!("api/proxy/{endpoint}")
}

/// Cards of a catalog page. A reply without any item list (an error object,
/// an empty body) is malformed, not an empty page.
fn catalog_page(payload: &serde_json::Value, path: &str) -> Result<Vec<CatalogItem>, ApiError> {
    try_normalize_items(payload).ok_or_else(|| ApiError::UnexpectedShape(path.to_string()))
}

impl ApiClient {
    /// Fetch one page of a home tab.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses and replies that carry no item
    /// list. An empty list is `Ok(vec![])`.
    pub async fn fetch_tab(&self, tab: HomeTab, page: u32) -> Result<Vec<CatalogItem>, ApiError> {
        let page = page.to_string();
        let mut query = vec![("page", page.as_str())];
        query.extend_from_slice(tab.extra_params());

        let path = proxy(tab.endpoint());
        let payload = self.get_json(&path, &query).await?;
        let items = catalog_page(&payload, &path)?;
        tracing::debug!(%tab, page = %page, count = items.len(), "Fetched tab page");
        Ok(items)
    }

    /// Fetch one page of search results. Errors as for [`fetch_tab`](Self::fetch_tab).
    pub async fn search(&self, query: &str, page: u32) -> Result<Vec<CatalogItem>, ApiError> {
        let page = page.to_string();
        let path = proxy("search");
        let payload = self
            .get_json(&path, &[("query", query), ("page", page.as_str())])
            .await?;
        let items = catalog_page(&payload, &path)?;
        tracing::debug!(query = %query, page = %page, count = items.len(), "Fetched search page");
        Ok(items)
    }

    /// Popular search keywords shown before the user has typed enough.
    pub async fn popular_searches(&self) -> Result<Vec<String>, ApiError> {
        let payload = self.get_json(&proxy("populersearch"), &[]).await?;
        Ok(normalize_keywords(&payload))
    }

    /// Fetch detail and episodes in parallel.
    ///
    /// # Errors
    ///
    /// Both requests must succeed; a transport or HTTP failure of either
    /// fails the bundle. Unrecognised payloads degrade to placeholder detail
    /// fields and an empty episode list.
    pub async fn drama(&self, card: &CatalogItem) -> Result<DramaBundle, ApiError> {
        let query = [("bookId", card.id.as_str())];
        let detail_path = proxy("detail");
        let episodes_path = proxy("allepisode");
        let (detail, episodes) = futures::try_join!(
            self.get_json(&detail_path, &query),
            self.get_json(&episodes_path, &query),
        )?;

        let bundle = DramaBundle {
            detail: DramaDetail::from_payload(&detail, card),
            episodes: normalize_episodes(&episodes),
        };
        tracing::debug!(
            book_id = %card.id,
            episodes = bundle.episodes.len(),
            "Fetched drama"
        );
        Ok(bundle)
    }

    /// Pick a random drama. `Ok(None)` when the backend returned nothing usable.
    pub async fn random_drama(&self) -> Result<Option<DramaDetail>, ApiError> {
        let payload = self.get_json(&proxy("randomdrama"), &[]).await?;
        Ok(DramaDetail::from_random_payload(&payload))
    }
}
