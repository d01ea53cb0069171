//! Download ledger and tile summary persistence.
//!
//! Two CSV files are produced in the output directory:
//!
//! - `Clips_Summary_<YYYY-MM-DD>.csv`: every tile after resolution (id,
//!   corners, size, image reference). [`load_summary`] reads it back so the
//!   download phase can be resumed without searching again.
//! - `boundary_hits.csv`: one row per tile after the download phase, led by
//!   the ledger status code and terminal state. Rows that are not
//!   `SUCCEEDED`/`SKIPPED_EXISTING` need manual follow-up.
//!
//! The ledger repeats the summary columns, so [`load_summary`] also accepts a
//! ledger file (extra columns are ignored). Feeding the boundary hits back
//! into a download run re-attempts exactly those tiles.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::Writer;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::clip::{ClipOutcome, ClipState};
use crate::geo::{GeoBox, GeoError, GeoPoint, ImageRef};

/// File name of the download ledger.
pub const LEDGER_FILE_NAME: &str = "boundary_hits.csv";

/// `Clips_Summary_<YYYY-MM-DD>.csv`
#[must_use]
pub fn summary_file_name(date: NaiveDate) -> String {
    format!("Clips_Summary_{}.csv", date.format("%Y-%m-%d"))
}

/// Errors raised while reading or writing ledger files.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// CSV encoding or decoding failed.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// The file being read or written.
        path: PathBuf,
        /// The underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// File system error.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file being read or written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A row decoded but does not describe a valid tile.
    #[error("invalid tile on line {line} of {path}: {reason}")]
    InvalidRecord {
        /// The file being read.
        path: PathBuf,
        /// 1-based line number (the header is line 1).
        line: u64,
        /// Why the row was rejected.
        reason: String,
    },
}

impl LedgerError {
    fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One tile with its terminal clip outcome.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    /// The tile as it was handed to the download phase.
    pub tile: GeoBox,
    /// How the tile ended.
    pub outcome: ClipOutcome,
}

/// Every tile of a download run, in input order.
#[derive(Debug, Clone, Default)]
pub struct DownloadLedger {
    entries: Vec<LedgerEntry>,
}

impl DownloadLedger {
    /// Wraps collected entries.
    #[must_use]
    pub fn new(entries: Vec<LedgerEntry>) -> Self {
        Self { entries }
    }

    /// All entries.
    #[must_use]
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Consumes the ledger, returning its entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<LedgerEntry> {
        self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no tile was processed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries in `state`.
    #[must_use]
    pub fn count(&self, state: ClipState) -> usize {
        self.entries.iter().filter(|e| e.outcome.state == state).count()
    }

    /// Entries whose clip is not on disk.
    pub fn follow_up(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().filter(|e| !e.outcome.state.is_success())
    }
}

/// CSV row for one tile.
#[derive(Debug, Serialize, Deserialize)]
struct TileRecord {
    box_id: String,
    nw_lat: f64,
    nw_lng: f64,
    se_lat: f64,
    se_lng: f64,
    width: f64,
    height: f64,
    image_id: Option<String>,
    item_type: Option<String>,
    asset_type: Option<String>,
}

impl From<&GeoBox> for TileRecord {
    fn from(tile: &GeoBox) -> Self {
        let image = tile.image();
        Self {
            box_id: tile.id().to_string(),
            nw_lat: tile.northwest().lat(),
            nw_lng: tile.northwest().lng(),
            se_lat: tile.southeast().lat(),
            se_lng: tile.southeast().lng(),
            width: tile.width_m(),
            height: tile.height_m(),
            image_id: image.map(|i| i.image_id.clone()),
            item_type: image.map(|i| i.item_type.clone()),
            asset_type: image.map(|i| i.asset_type.clone()),
        }
    }
}

impl TileRecord {
    fn into_tile(self) -> Result<GeoBox, String> {
        let image = match (self.image_id, self.item_type, self.asset_type) {
            (Some(image_id), Some(item_type), Some(asset_type)) => Some(ImageRef::new(image_id, item_type, asset_type)),
            (None, _, _) => None,
            (Some(image_id), _, _) => {
                return Err(format!("image {image_id} is missing its item or asset type"));
            }
        };
        let build = || -> Result<GeoBox, GeoError> {
            let nw = GeoPoint::new(self.nw_lat, self.nw_lng)?;
            let se = GeoPoint::new(self.se_lat, self.se_lng)?;
            GeoBox::from_parts(self.box_id, nw, se, self.width, self.height, image)
        };
        build().map_err(|e| e.to_string())
    }
}

/// CSV row for one ledger entry: status code and state, then the tile.
#[derive(Debug, Serialize)]
struct LedgerRecord {
    status_code: u16,
    state: &'static str,
    box_id: String,
    nw_lat: f64,
    nw_lng: f64,
    se_lat: f64,
    se_lng: f64,
    width: f64,
    height: f64,
    image_id: Option<String>,
    item_type: Option<String>,
    asset_type: Option<String>,
}

impl From<&LedgerEntry> for LedgerRecord {
    fn from(entry: &LedgerEntry) -> Self {
        let tile = TileRecord::from(&entry.tile);
        Self {
            status_code: entry.outcome.ledger_status_code(),
            state: entry.outcome.state.as_str(),
            box_id: tile.box_id,
            nw_lat: tile.nw_lat,
            nw_lng: tile.nw_lng,
            se_lat: tile.se_lat,
            se_lng: tile.se_lng,
            width: tile.width,
            height: tile.height,
            image_id: tile.image_id,
            item_type: tile.item_type,
            asset_type: tile.asset_type,
        }
    }
}

fn create_writer(path: &Path) -> Result<Writer<BufWriter<File>>, LedgerError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LedgerError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| LedgerError::io(path, e))?;
    Ok(Writer::from_writer(BufWriter::new(file)))
}

fn finish(path: &Path, writer: Writer<BufWriter<File>>) -> Result<(), LedgerError> {
    let mut inner = writer
        .into_inner()
        .map_err(|e| LedgerError::io(path, e.into_error()))?;
    inner.flush().map_err(|e| LedgerError::io(path, e))
}

/// Writes the tile summary file. An empty tile list produces an empty file.
///
/// # Errors
///
/// Returns [`LedgerError`] if the file cannot be created or written.
#[instrument(skip(tiles), fields(path = %path.display(), tiles = tiles.len()))]
pub fn write_summary(path: &Path, tiles: &[GeoBox]) -> Result<(), LedgerError> {
    let mut writer = create_writer(path)?;
    for tile in tiles {
        writer
            .serialize(TileRecord::from(tile))
            .map_err(|e| LedgerError::csv(path, e))?;
    }
    finish(path, writer)?;
    info!("tile summary written");
    Ok(())
}

/// Reads tiles back from a summary (or ledger) file.
///
/// # Errors
///
/// Returns [`LedgerError::Csv`] for malformed CSV and
/// [`LedgerError::InvalidRecord`] for rows that do not form a valid tile.
#[instrument(fields(path = %path.display()))]
pub fn load_summary(path: &Path) -> Result<Vec<GeoBox>, LedgerError> {
    let file = File::open(path).map_err(|e| LedgerError::io(path, e))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut tiles = Vec::new();
    for (index, result) in reader.deserialize::<TileRecord>().enumerate() {
        let record = result.map_err(|e| LedgerError::csv(path, e))?;
        let tile = record.into_tile().map_err(|reason| LedgerError::InvalidRecord {
            path: path.to_path_buf(),
            line: index as u64 + 2,
            reason,
        })?;
        tiles.push(tile);
    }

    let resolved = tiles.iter().filter(|t| t.image().is_some()).count();
    info!(tiles = tiles.len(), resolved, "tile summary loaded");
    Ok(tiles)
}

/// Writes the download ledger, one row per entry.
///
/// # Errors
///
/// Returns [`LedgerError`] if the file cannot be created or written.
#[instrument(skip(ledger), fields(path = %path.display(), entries = ledger.len()))]
pub fn write_ledger(path: &Path, ledger: &DownloadLedger) -> Result<(), LedgerError> {
    let mut writer = create_writer(path)?;
    for entry in ledger.entries() {
        writer
            .serialize(LedgerRecord::from(entry))
            .map_err(|e| LedgerError::csv(path, e))?;
    }
    finish(path, writer)?;
    debug!(follow_up = ledger.follow_up().count(), "ledger written");
    Ok(())
}
