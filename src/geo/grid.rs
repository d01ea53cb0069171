//! Tile grid generation over an area of interest.
//!
//! The grid is anchored at the AOI's northwest corner and grows row by row:
//! each row extends east until the next tile would cross the AOI's east
//! edge, and new rows are added south until the next row would cross the
//! AOI's south edge.
//!
//! Only whole tiles are produced. A strip narrower than one tile along the
//! south or east edge is left uncovered: a 500 m x 500 m AOI with 200 m
//! tiles yields a 2 x 2 grid and leaves a 100 m band uncovered on both edges.
//! The anchor tile itself is always emitted for a non-empty AOI, even when
//! the AOI is smaller than one tile.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::ids::{BoxIdGenerator, UuidIdGenerator};
use super::{GeoBox, GeoError, GeoPoint, southeast_for_size};

/// Slack, in degrees, when comparing a tile edge to the AOI edge (~0.1 mm).
///
/// Chained geodesic hops and a single long hop differ by rounding noise;
/// without slack an evenly divisible AOI could lose its last row or column.
pub const EDGE_TOLERANCE_DEG: f64 = 1e-9;

/// Splits an AOI into fixed-size tiles.
#[derive(Debug, Clone)]
pub struct TileGridBuilder {
    tile_width_m: f64,
    tile_height_m: f64,
    ids: Arc<dyn BoxIdGenerator>,
}

impl TileGridBuilder {
    /// Creates a builder for tiles of the given size, naming tiles with UUIDs.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidDimension`] if either size is non-positive
    /// or not finite.
    pub fn new(tile_width_m: f64, tile_height_m: f64) -> Result<Self, GeoError> {
        if !tile_width_m.is_finite() || tile_width_m <= 0.0 {
            return Err(GeoError::invalid_dimension("width", tile_width_m));
        }
        if !tile_height_m.is_finite() || tile_height_m <= 0.0 {
            return Err(GeoError::invalid_dimension("height", tile_height_m));
        }
        Ok(Self {
            tile_width_m,
            tile_height_m,
            ids: Arc::new(UuidIdGenerator),
        })
    }

    /// Replaces the identifier source.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn BoxIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Tile width in meters.
    #[must_use]
    pub fn tile_width_m(&self) -> f64 {
        self.tile_width_m
    }

    /// Tile height in meters.
    #[must_use]
    pub fn tile_height_m(&self) -> f64 {
        self.tile_height_m
    }

    /// Generates the tiles covering `aoi`, row by row from the northwest.
    ///
    /// Returns an empty grid for a zero-area AOI.
    ///
    /// # Errors
    ///
    /// Propagates [`GeoError`] from geodesic computations, for example an
    /// anchor tile that would wrap the antimeridian.
    #[instrument(skip(self, aoi), fields(aoi = %aoi.id(), tile_width_m = self.tile_width_m, tile_height_m = self.tile_height_m))]
    pub fn build(&self, aoi: &GeoBox) -> Result<Vec<GeoBox>, GeoError> {
        if aoi.is_degenerate() {
            debug!("AOI has zero area; no tiles");
            return Ok(Vec::new());
        }

        let aoi_nw = aoi.northwest();
        let aoi_se = aoi.southeast();
        let mut tiles = Vec::new();
        let mut rows = 0usize;

        let mut row_nw = aoi_nw;
        let mut row_se = self.southeast_of(row_nw)?;

        loop {
            rows += 1;
            let row_start = tiles.len();
            tiles.push(self.tile(row_nw, row_se));

            let mut east_nw = GeoPoint::new(row_nw.lat(), row_se.lng())?;
            loop {
                let Some(east_se) = self.candidate_southeast(east_nw)? else {
                    break;
                };
                if east_se.lng() > aoi_se.lng() + EDGE_TOLERANCE_DEG {
                    break;
                }
                tiles.push(self.tile(east_nw, east_se));
                east_nw = GeoPoint::new(east_nw.lat(), east_se.lng())?;
            }
            debug!(row = rows, columns = tiles.len() - row_start, "row complete");

            let next_nw = GeoPoint::new(row_se.lat(), aoi_nw.lng())?;
            let Some(next_se) = self.candidate_southeast(next_nw)? else {
                break;
            };
            if next_se.lat() < aoi_se.lat() - EDGE_TOLERANCE_DEG {
                break;
            }
            row_nw = next_nw;
            row_se = next_se;
        }

        info!(tiles = tiles.len(), rows, "built tile grid");
        Ok(tiles)
    }

    fn southeast_of(&self, nw: GeoPoint) -> Result<GeoPoint, GeoError> {
        southeast_for_size(nw, self.tile_width_m, self.tile_height_m)
    }

    /// Southeast corner of a candidate tile, or `None` when the tile would
    /// wrap the antimeridian or a pole (which is outside any valid AOI).
    fn candidate_southeast(&self, nw: GeoPoint) -> Result<Option<GeoPoint>, GeoError> {
        match self.southeast_of(nw) {
            Ok(se) => Ok(Some(se)),
            Err(GeoError::InvertedCorners { .. } | GeoError::InvalidCoordinate { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn tile(&self, nw: GeoPoint, se: GeoPoint) -> GeoBox {
        GeoBox::sized(self.ids.next_id(), nw, se, self.tile_width_m, self.tile_height_m)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geo::SequentialIdGenerator;

    fn marin_nw() -> GeoPoint {
        GeoPoint::new(37.807_952, -122.509_337).unwrap()
    }

    fn aoi(width_m: f64, height_m: f64) -> GeoBox {
        GeoBox::from_size("aoi", marin_nw(), width_m, height_m).unwrap()
    }

    fn builder(size: f64) -> TileGridBuilder {
        TileGridBuilder::new(size, size)
            .unwrap()
            .with_id_generator(Arc::new(SequentialIdGenerator::default()))
    }

    #[test]
    fn test_500m_aoi_with_200m_tiles_yields_four_tiles() {
        let area = aoi(500.0, 500.0);
        let tiles = builder(200.0).build(&area).unwrap();

        assert_eq!(tiles.len(), 4);
        for tile in &tiles {
            assert!((tile.width_m() - 200.0).abs() < f64::EPSILON);
            assert!((tile.height_m() - 200.0).abs() < f64::EPSILON);
            assert!(tile.southeast().lng() <= area.southeast().lng());
            assert!(tile.southeast().lat() >= area.southeast().lat());
        }
    }

    #[test]
    fn test_fractional_strip_is_left_uncovered() {
        let area = aoi(500.0, 500.0);
        let tiles = builder(200.0).build(&area).unwrap();

        let covered: f64 = tiles.iter().map(|t| t.width_m() * t.height_m()).sum();
        assert!(covered < area.width_m() * area.height_m());

        let east_edge = tiles
            .iter()
            .map(|t| t.southeast().lng())
            .fold(f64::MIN, f64::max);
        let south_edge = tiles
            .iter()
            .map(|t| t.southeast().lat())
            .fold(f64::MAX, f64::min);
        assert!(east_edge < area.southeast().lng());
        assert!(south_edge > area.southeast().lat());
    }

    #[test]
    fn test_evenly_divisible_aoi_is_fully_tiled() {
        let tiles = builder(200.0).build(&aoi(400.0, 400.0)).unwrap();
        assert_eq!(tiles.len(), 4);
    }

    #[test]
    fn test_rectangular_grid_counts() {
        let tiles = TileGridBuilder::new(200.0, 100.0)
            .unwrap()
            .build(&aoi(900.0, 350.0))
            .unwrap();
        // 4 columns x 3 rows
        assert_eq!(tiles.len(), 12);
    }

    #[test]
    fn test_tiles_abut_within_a_row() {
        let tiles = builder(200.0).build(&aoi(700.0, 200.0)).unwrap();
        assert_eq!(tiles.len(), 3);
        for pair in tiles.windows(2) {
            assert_eq!(pair[0].southeast().lng(), pair[1].northwest().lng());
            assert_eq!(pair[0].northwest().lat(), pair[1].northwest().lat());
        }
    }

    #[test]
    fn test_rows_start_at_aoi_west_edge() {
        let area = aoi(500.0, 500.0);
        let tiles = builder(200.0).build(&area).unwrap();
        assert_eq!(tiles[0].northwest(), area.northwest());
        assert_eq!(tiles[2].northwest().lng(), area.northwest().lng());
        assert_eq!(tiles[2].northwest().lat(), tiles[0].southeast().lat());
    }

    #[test]
    fn test_ids_come_from_injected_generator() {
        let tiles = builder(200.0).build(&aoi(500.0, 500.0)).unwrap();
        let ids: Vec<&str> = tiles.iter().map(GeoBox::id).collect();
        assert_eq!(ids, ["tile-0001", "tile-0002", "tile-0003", "tile-0004"]);
    }

    #[test]
    fn test_zero_area_aoi_yields_no_tiles() {
        let area = GeoBox::from_corners("aoi", marin_nw(), marin_nw()).unwrap();
        assert!(builder(200.0).build(&area).unwrap().is_empty());
    }

    #[test]
    fn test_aoi_smaller_than_tile_keeps_anchor_tile() {
        let tiles = builder(200.0).build(&aoi(50.0, 50.0)).unwrap();
        assert_eq!(tiles.len(), 1);
    }

    #[test]
    fn test_non_positive_tile_size_fails_fast() {
        assert!(matches!(
            TileGridBuilder::new(0.0, 200.0),
            Err(GeoError::InvalidDimension { name: "width", .. })
        ));
        assert!(matches!(
            TileGridBuilder::new(200.0, -3.0),
            Err(GeoError::InvalidDimension { name: "height", .. })
        ));
        assert!(TileGridBuilder::new(f64::NAN, 200.0).is_err());
    }

    #[test]
    fn test_large_grid_builds_without_recursion() {
        let tiles = builder(20.0).build(&aoi(2_000.0, 2_000.0)).unwrap();
        assert_eq!(tiles.len(), 100 * 100);
    }
}
