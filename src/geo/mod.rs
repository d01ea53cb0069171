//! Geographic boxes, geodesic math, and tile grid generation.
//!
//! A [`GeoBox`] is the unit of work for the whole pipeline: the area of
//! interest is one box, every tile carved out of it is another. Boxes are
//! built in exactly one of two ways:
//!
//! - from explicit northwest and southeast corners (width and height are
//!   derived with the inverse geodesic)
//! - from a northwest corner plus width and height in meters (the southeast
//!   corner is derived with the direct geodesic, bearing 90° for east and
//!   180° for south)
//!
//! # Example
//!
//! ```
//! use tileclip_core::geo::{GeoBox, GeoPoint};
//!
//! # fn example() -> Result<(), tileclip_core::geo::GeoError> {
//! let nw = GeoPoint::new(37.807952, -122.509337)?;
//! let tile = GeoBox::builder("tile-1", nw).size(200.0, 200.0).build()?;
//! assert!(tile.southeast().lat() < nw.lat());
//! # Ok(())
//! # }
//! ```

mod error;
pub mod geodesic;
pub mod grid;
mod ids;

use std::fmt;

use serde_json::{Value, json};

pub use error::GeoError;
pub use grid::TileGridBuilder;
pub use ids::{BoxIdGenerator, SequentialIdGenerator, UuidIdGenerator};

/// Bearing for "due east" in degrees.
const BEARING_EAST: f64 = 90.0;

/// Bearing for "due south" in degrees.
const BEARING_SOUTH: f64 = 180.0;

/// A latitude/longitude pair in degrees.
///
/// Construction validates the range, so every `GeoPoint` in circulation is
/// a usable coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

impl GeoPoint {
    /// Creates a point, failing fast on out-of-range or non-finite input.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidCoordinate`] when latitude is outside
    /// `[-90, 90]` or longitude outside `[-180, 180]`.
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeoError> {
        let lat_ok = lat.is_finite() && (-90.0..=90.0).contains(&lat);
        let lng_ok = lng.is_finite() && (-180.0..=180.0).contains(&lng);
        if !lat_ok || !lng_ok {
            return Err(GeoError::InvalidCoordinate { lat, lng });
        }
        Ok(Self { lat, lng })
    }

    /// Latitude in degrees.
    #[must_use]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    #[must_use]
    pub fn lng(&self) -> f64 {
        self.lng
    }
}

/// Reference to the remote image chosen for a tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Identifier of the image returned by the search API.
    pub image_id: String,
    /// Item type tag (for example `PSScene3Band`).
    pub item_type: String,
    /// Asset type tag (for example `visual`).
    pub asset_type: String,
}

impl ImageRef {
    /// Creates an image reference.
    #[must_use]
    pub fn new(
        image_id: impl Into<String>,
        item_type: impl Into<String>,
        asset_type: impl Into<String>,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            item_type: item_type.into(),
            asset_type: asset_type.into(),
        }
    }
}

/// A rectangular geographic box: the AOI or one tile of it.
///
/// Boxes are immutable once built. Resolving an image for a tile produces a
/// new box via [`GeoBox::with_image`] rather than mutating the original.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoBox {
    id: String,
    nw: GeoPoint,
    se: GeoPoint,
    width_m: f64,
    height_m: f64,
    image: Option<ImageRef>,
}

impl GeoBox {
    /// Starts building a box anchored at `nw`.
    #[must_use]
    pub fn builder(id: impl Into<String>, nw: GeoPoint) -> GeoBoxBuilder {
        GeoBoxBuilder {
            id: id.into(),
            nw,
            se: None,
            size: None,
        }
    }

    /// Builds a box from explicit corners; width and height are geodesic
    /// distances along the north edge and the west edge.
    ///
    /// Corners may coincide in one dimension (a zero-area box), which the
    /// tile grid treats as "nothing to cover".
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvertedCorners`] if `se` is north or west of `nw`.
    pub fn from_corners(id: impl Into<String>, nw: GeoPoint, se: GeoPoint) -> Result<Self, GeoError> {
        check_corner_order(nw, se)?;
        let width_m = geodesic::distance(nw, GeoPoint::new(nw.lat, se.lng)?)?;
        let height_m = geodesic::distance(nw, GeoPoint::new(se.lat, nw.lng)?)?;
        Ok(Self {
            id: id.into(),
            nw,
            se,
            width_m,
            height_m,
            image: None,
        })
    }

    /// Builds a box from its northwest corner and a size in meters.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidDimension`] for non-positive sizes and
    /// [`GeoError::InvertedCorners`] if the box would wrap the antimeridian.
    pub fn from_size(
        id: impl Into<String>,
        nw: GeoPoint,
        width_m: f64,
        height_m: f64,
    ) -> Result<Self, GeoError> {
        let se = southeast_for_size(nw, width_m, height_m)?;
        Ok(Self::sized(id.into(), nw, se, width_m, height_m))
    }

    /// Rebuilds a box from persisted fields without recomputing geometry.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvertedCorners`] for misordered corners and
    /// [`GeoError::InvalidDimension`] for negative or non-finite sizes.
    pub fn from_parts(
        id: impl Into<String>,
        nw: GeoPoint,
        se: GeoPoint,
        width_m: f64,
        height_m: f64,
        image: Option<ImageRef>,
    ) -> Result<Self, GeoError> {
        check_corner_order(nw, se)?;
        if !width_m.is_finite() || width_m < 0.0 {
            return Err(GeoError::invalid_dimension("width", width_m));
        }
        if !height_m.is_finite() || height_m < 0.0 {
            return Err(GeoError::invalid_dimension("height", height_m));
        }
        Ok(Self {
            id: id.into(),
            nw,
            se,
            width_m,
            height_m,
            image,
        })
    }

    /// Assembles a box whose corners were already derived from its size.
    pub(crate) fn sized(id: String, nw: GeoPoint, se: GeoPoint, width_m: f64, height_m: f64) -> Self {
        Self {
            id,
            nw,
            se,
            width_m,
            height_m,
            image: None,
        }
    }

    /// Returns this box with its resolved image attached.
    #[must_use]
    pub fn with_image(self, image: ImageRef) -> Self {
        Self {
            image: Some(image),
            ..self
        }
    }

    /// Opaque identifier, unique per run.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Northwest corner.
    #[must_use]
    pub fn northwest(&self) -> GeoPoint {
        self.nw
    }

    /// Southeast corner.
    #[must_use]
    pub fn southeast(&self) -> GeoPoint {
        self.se
    }

    /// Width in meters.
    #[must_use]
    pub fn width_m(&self) -> f64 {
        self.width_m
    }

    /// Height in meters.
    #[must_use]
    pub fn height_m(&self) -> f64 {
        self.height_m
    }

    /// Resolved image, if the search phase found one.
    #[must_use]
    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    /// True when the box covers no area.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.width_m <= 0.0 || self.height_m <= 0.0
    }

    /// GeoJSON polygon of the box footprint in `[lng, lat]` order.
    ///
    /// The ring starts at the southwest corner, runs clockwise, and repeats
    /// the start point to close it.
    #[must_use]
    pub fn geojson_polygon(&self) -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[
                [self.nw.lng, self.se.lat],
                [self.nw.lng, self.nw.lat],
                [self.se.lng, self.nw.lat],
                [self.se.lng, self.se.lat],
                [self.nw.lng, self.se.lat],
            ]]
        })
    }
}

impl fmt::Display for GeoBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: NW ({}, {}), SE ({}, {}), {:.1}m x {:.1}m",
            self.id, self.nw.lat, self.nw.lng, self.se.lat, self.se.lng, self.width_m, self.height_m
        )?;
        match &self.image {
            Some(image) => write!(f, ", image {}", image.image_id),
            None => write!(f, ", no image"),
        }
    }
}

/// Builder enforcing that exactly one construction mode is chosen.
#[derive(Debug, Clone)]
pub struct GeoBoxBuilder {
    id: String,
    nw: GeoPoint,
    se: Option<GeoPoint>,
    size: Option<(f64, f64)>,
}

impl GeoBoxBuilder {
    /// Uses an explicit southeast corner.
    #[must_use]
    pub fn southeast(mut self, se: GeoPoint) -> Self {
        self.se = Some(se);
        self
    }

    /// Uses a width and height in meters.
    #[must_use]
    pub fn size(mut self, width_m: f64, height_m: f64) -> Self {
        self.size = Some((width_m, height_m));
        self
    }

    /// Builds the box.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::MissingBounds`] when neither mode was chosen,
    /// [`GeoError::AmbiguousBounds`] when both were, and any error from the
    /// chosen constructor.
    pub fn build(self) -> Result<GeoBox, GeoError> {
        match (self.se, self.size) {
            (Some(se), None) => GeoBox::from_corners(self.id, self.nw, se),
            (None, Some((width_m, height_m))) => GeoBox::from_size(self.id, self.nw, width_m, height_m),
            (None, None) => Err(GeoError::missing_bounds(self.id)),
            (Some(_), Some(_)) => Err(GeoError::ambiguous_bounds(self.id)),
        }
    }
}

/// Southeast corner of a box of the given size anchored at `nw`.
pub(crate) fn southeast_for_size(nw: GeoPoint, width_m: f64, height_m: f64) -> Result<GeoPoint, GeoError> {
    if !width_m.is_finite() || width_m <= 0.0 {
        return Err(GeoError::invalid_dimension("width", width_m));
    }
    if !height_m.is_finite() || height_m <= 0.0 {
        return Err(GeoError::invalid_dimension("height", height_m));
    }
    let east = geodesic::destination(nw, BEARING_EAST, width_m)?;
    let south = geodesic::destination(nw, BEARING_SOUTH, height_m)?;
    let se = GeoPoint::new(south.lat, east.lng)?;
    check_corner_order(nw, se)?;
    Ok(se)
}

fn check_corner_order(nw: GeoPoint, se: GeoPoint) -> Result<(), GeoError> {
    if se.lat > nw.lat || se.lng < nw.lng {
        return Err(GeoError::InvertedCorners {
            nw_lat: nw.lat,
            nw_lng: nw.lng,
            se_lat: se.lat,
            se_lng: se.lng,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn marin_nw() -> GeoPoint {
        GeoPoint::new(37.807_952, -122.509_337).unwrap()
    }

    #[test]
    fn test_point_rejects_out_of_range_latitude() {
        assert!(matches!(
            GeoPoint::new(90.5, 0.0),
            Err(GeoError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_point_rejects_out_of_range_longitude() {
        assert!(GeoPoint::new(0.0, -180.5).is_err());
        assert!(GeoPoint::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_point_accepts_bounds() {
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_from_size_places_southeast_south_and_east() {
        let tile = GeoBox::from_size("t", marin_nw(), 200.0, 300.0).unwrap();
        assert!(tile.southeast().lat() < tile.northwest().lat());
        assert!(tile.southeast().lng() > tile.northwest().lng());
        assert!((tile.width_m() - 200.0).abs() < f64::EPSILON);
        assert!((tile.height_m() - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_construction_modes_round_trip() {
        let sized = GeoBox::from_size("a", marin_nw(), 500.0, 500.0).unwrap();
        let cornered = GeoBox::from_corners("b", marin_nw(), sized.southeast()).unwrap();

        assert!((cornered.width_m() - 500.0).abs() < 0.1, "width {}", cornered.width_m());
        assert!((cornered.height_m() - 500.0).abs() < 0.1, "height {}", cornered.height_m());

        let rebuilt = GeoBox::from_size("c", marin_nw(), cornered.width_m(), cornered.height_m()).unwrap();
        assert!((rebuilt.southeast().lat() - sized.southeast().lat()).abs() < 1e-8);
        assert!((rebuilt.southeast().lng() - sized.southeast().lng()).abs() < 1e-8);
    }

    #[test]
    fn test_from_corners_rejects_inverted_corners() {
        let se = GeoPoint::new(37.9, -122.4).unwrap();
        let result = GeoBox::from_corners("t", marin_nw(), se);
        assert!(matches!(result, Err(GeoError::InvertedCorners { .. })));
    }

    #[test]
    fn test_from_corners_allows_zero_area() {
        let aoi = GeoBox::from_corners("aoi", marin_nw(), marin_nw()).unwrap();
        assert!(aoi.is_degenerate());
    }

    #[test]
    fn test_from_size_rejects_non_positive_dimensions() {
        assert!(matches!(
            GeoBox::from_size("t", marin_nw(), 0.0, 10.0),
            Err(GeoError::InvalidDimension { name: "width", .. })
        ));
        assert!(matches!(
            GeoBox::from_size("t", marin_nw(), 10.0, -1.0),
            Err(GeoError::InvalidDimension { name: "height", .. })
        ));
    }

    #[test]
    fn test_builder_requires_exactly_one_mode() {
        let neither = GeoBox::builder("x", marin_nw()).build();
        assert!(matches!(neither, Err(GeoError::MissingBounds { .. })));

        let se = GeoPoint::new(37.7, -122.3).unwrap();
        let both = GeoBox::builder("y", marin_nw())
            .southeast(se)
            .size(10.0, 10.0)
            .build();
        assert!(matches!(both, Err(GeoError::AmbiguousBounds { .. })));

        assert!(GeoBox::builder("z", marin_nw()).southeast(se).build().is_ok());
        assert!(GeoBox::builder("w", marin_nw()).size(10.0, 10.0).build().is_ok());
    }

    #[test]
    fn test_with_image_returns_new_value() {
        let tile = GeoBox::from_size("t", marin_nw(), 200.0, 200.0).unwrap();
        let resolved = tile.clone().with_image(ImageRef::new("img-1", "PSScene3Band", "visual"));
        assert!(tile.image().is_none());
        assert_eq!(resolved.image().unwrap().image_id, "img-1");
        assert_eq!(resolved.id(), tile.id());
    }

    #[test]
    fn test_geojson_polygon_is_closed_lng_lat_ring() {
        let tile = GeoBox::from_size("t", marin_nw(), 200.0, 200.0).unwrap();
        let polygon = tile.geojson_polygon();
        assert_eq!(polygon["type"], "Polygon");

        let ring = polygon["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
        assert_eq!(ring[1][0].as_f64().unwrap(), tile.northwest().lng());
        assert_eq!(ring[1][1].as_f64().unwrap(), tile.northwest().lat());
        assert_eq!(ring[3][0].as_f64().unwrap(), tile.southeast().lng());
        assert_eq!(ring[3][1].as_f64().unwrap(), tile.southeast().lat());
    }

    #[test]
    fn test_from_parts_keeps_stored_dimensions() {
        let se = GeoPoint::new(37.8, -122.5).unwrap();
        let tile = GeoBox::from_parts("p", marin_nw(), se, 123.0, 456.0, None).unwrap();
        assert!((tile.width_m() - 123.0).abs() < f64::EPSILON);
        assert!((tile.height_m() - 456.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display_mentions_image_state() {
        let tile = GeoBox::from_size("tile-9", marin_nw(), 200.0, 200.0).unwrap();
        assert!(tile.to_string().contains("no image"));
        let resolved = tile.with_image(ImageRef::new("img-9", "PSScene3Band", "visual"));
        assert!(resolved.to_string().contains("image img-9"));
        assert!(resolved.to_string().starts_with("tile-9"));
    }
}
