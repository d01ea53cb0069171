//! Search filter tree construction.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::api::SearchRequest;
use crate::geo::{GeoBox, ImageRef};

/// Default item type searched for.
pub const DEFAULT_ITEM_TYPE: &str = "PSScene3Band";

/// Default asset type clipped and downloaded.
pub const DEFAULT_ASSET_TYPE: &str = "visual";

/// Default maximum cloud-cover fraction.
pub const DEFAULT_MAX_CLOUD_COVER: f64 = 0.05;

/// 2016-07-01T00:00:00Z
const DEFAULT_ACQUIRED_GTE_SECS: i64 = 1_467_331_200;

/// 2018-08-01T00:00:00Z
const DEFAULT_ACQUIRED_LTE_SECS: i64 = 1_533_081_600;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Timestamp format expected by the date-range filter.
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Fixed search criteria applied to every tile.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFilters {
    /// Item type tag, also recorded on resolved tiles.
    pub item_type: String,
    /// Asset type tag, used in the permission filter and clip requests.
    pub asset_type: String,
    /// Earliest acquisition time (inclusive).
    pub acquired_gte: DateTime<Utc>,
    /// Latest acquisition time (inclusive).
    pub acquired_lte: DateTime<Utc>,
    /// Maximum cloud-cover fraction in `[0, 1]`.
    pub max_cloud_cover: f64,
    /// Only accept images whose usable-data flag is set.
    pub full_image_only: bool,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            item_type: DEFAULT_ITEM_TYPE.to_string(),
            asset_type: DEFAULT_ASSET_TYPE.to_string(),
            acquired_gte: DateTime::from_timestamp_nanos(DEFAULT_ACQUIRED_GTE_SECS * NANOS_PER_SEC),
            acquired_lte: DateTime::from_timestamp_nanos(DEFAULT_ACQUIRED_LTE_SECS * NANOS_PER_SEC),
            max_cloud_cover: DEFAULT_MAX_CLOUD_COVER,
            full_image_only: false,
        }
    }
}

impl SearchFilters {
    /// AND-filter combining `geometry` with the fixed criteria.
    ///
    /// Order: geometry, acquisition window, cloud cover, usable data (only
    /// when `full_image_only`), download permission.
    #[must_use]
    pub fn filter_tree(&self, geometry: Value) -> Value {
        let mut config = vec![
            json!({
                "type": "GeometryFilter",
                "field_name": "geometry",
                "config": geometry,
            }),
            json!({
                "type": "DateRangeFilter",
                "field_name": "acquired",
                "config": {
                    "gte": self.acquired_gte.format(DATE_FORMAT).to_string(),
                    "lte": self.acquired_lte.format(DATE_FORMAT).to_string(),
                },
            }),
            json!({
                "type": "RangeFilter",
                "field_name": "cloud_cover",
                "config": { "lte": self.max_cloud_cover },
            }),
        ];
        if self.full_image_only {
            config.push(json!({
                "type": "NumberInFilter",
                "field_name": "usable_data",
                "config": [1],
            }));
        }
        config.push(json!({
            "type": "PermissionFilter",
            "config": [format!("assets.{}:download", self.asset_type)],
        }));

        json!({ "type": "AndFilter", "config": config })
    }

    /// Search request for one tile's footprint.
    #[must_use]
    pub fn search_request(&self, tile: &GeoBox) -> SearchRequest {
        SearchRequest {
            item_types: vec![self.item_type.clone()],
            filter: self.filter_tree(tile.geojson_polygon()),
        }
    }

    /// Image reference for a resolved candidate id.
    #[must_use]
    pub fn image_ref(&self, image_id: &str) -> ImageRef {
        ImageRef::new(image_id, &self.item_type, &self.asset_type)
    }
}
