//! Request and response bodies for the search and clips endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a quick-search request.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    /// Item types to search.
    pub item_types: Vec<String>,
    /// AND-filter tree (see [`crate::search::SearchFilters::filter_tree`]).
    pub filter: Value,
}

/// Quick-search response; only candidate ids are read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    /// Matching items, in service ranking order.
    #[serde(default)]
    pub features: Vec<SearchFeature>,
}

impl SearchResponse {
    /// Identifier of the first candidate, if any.
    #[must_use]
    pub fn first_id(&self) -> Option<&str> {
        self.features.first().map(|feature| feature.id.as_str())
    }
}

/// One search candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchFeature {
    /// Image identifier.
    pub id: String,
}

/// Body of a clip-prepare request.
#[derive(Debug, Clone, Serialize)]
pub struct ClipRequest {
    /// Footprint to cut out, as a GeoJSON polygon.
    pub aoi: Value,
    /// Images to clip.
    pub targets: Vec<ClipTarget>,
}

/// Image/asset reference inside a [`ClipRequest`].
#[derive(Debug, Clone, Serialize)]
pub struct ClipTarget {
    /// Image identifier.
    pub item_id: String,
    /// Item type tag.
    pub item_type: String,
    /// Asset type tag.
    pub asset_type: String,
}

/// Accepted clip job.
#[derive(Debug, Clone, Deserialize)]
pub struct ClipJob {
    /// Job identifier used for status polling.
    pub id: String,
}

/// Clip job status as returned by the poll endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ClipJobStatus {
    /// Job state, for example `queued`, `running`, `succeeded`.
    pub state: String,
    /// Result links, present once the job succeeded.
    #[serde(rename = "_links", default)]
    pub links: ClipLinks,
}

/// `_links` section of a clip job status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClipLinks {
    /// Download URLs of the finished clip.
    #[serde(default)]
    pub results: Vec<String>,
}

impl ClipJobStatus {
    /// True once the job is ready to download.
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.state.eq_ignore_ascii_case("succeeded")
    }

    /// First result URL, if any.
    #[must_use]
    pub fn first_result(&self) -> Option<&str> {
        self.links.results.first().map(String::as_str)
    }
}
