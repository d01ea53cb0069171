//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgGroup, Args as ClapArgs, Parser, Subcommand};

/// Default tile edge length in meters.
const DEFAULT_TILE_SIZE_M: f64 = 200.0;

/// Tile an area of interest and download one satellite image clip per tile.
///
/// Tileclip carves the area into fixed-size tiles, searches for an image
/// covering each tile, and downloads a clip of that image cut to the tile.
#[derive(Parser, Debug)]
#[command(name = "tileclip")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// TOML config file (defaults apply when omitted)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory for clips, summary and ledger (overrides PL_IMAGE_DIR and the config file)
    #[arg(short, long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum concurrent requests per phase (1-100, overrides the config file)
    #[arg(short = 'c', long, global = true, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    #[command(subcommand)]
    pub command: Command,
}

/// Pipeline stages.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the tile grid for an area of interest (no network access)
    Grid(GridArgs),
    /// Build the grid, resolve an image for every tile, and write the tile summary
    Resolve(GridArgs),
    /// Download clips for the tiles of a summary file and write the ledger
    Download(DownloadArgs),
    /// Resolve, write the summary, then download and write the ledger
    Run(GridArgs),
}

/// Area of interest plus tile size.
#[derive(ClapArgs, Debug, Clone)]
pub struct GridArgs {
    #[command(flatten)]
    pub aoi: AoiArgs,

    /// Tile width in meters
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE_M)]
    pub tile_width: f64,

    /// Tile height in meters
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE_M)]
    pub tile_height: f64,
}

/// Area of interest: northwest corner plus either the southeast corner or a
/// size in meters.
#[derive(ClapArgs, Debug, Clone)]
#[command(group(ArgGroup::new("extent").required(true).args(["se_lat", "width"])))]
pub struct AoiArgs {
    /// Northwest corner latitude
    #[arg(long, allow_negative_numbers = true)]
    pub nw_lat: f64,

    /// Northwest corner longitude
    #[arg(long, allow_negative_numbers = true)]
    pub nw_lng: f64,

    /// Southeast corner latitude
    #[arg(long, allow_negative_numbers = true, requires = "se_lng")]
    pub se_lat: Option<f64>,

    /// Southeast corner longitude
    #[arg(long, allow_negative_numbers = true, requires = "se_lat")]
    pub se_lng: Option<f64>,

    /// Area width in meters
    #[arg(long, requires = "height", conflicts_with = "se_lng")]
    pub width: Option<f64>,

    /// Area height in meters
    #[arg(long, requires = "width", conflicts_with = "se_lng")]
    pub height: Option<f64>,
}

/// The two ways of bounding an area of interest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AoiExtent {
    /// Explicit southeast corner.
    Corner { lat: f64, lng: f64 },
    /// Width and height in meters.
    Size { width_m: f64, height_m: f64 },
}

impl AoiArgs {
    /// Returns the chosen extent. Clap guarantees exactly one complete pair.
    #[must_use]
    pub fn extent(&self) -> Option<AoiExtent> {
        match (self.se_lat, self.se_lng, self.width, self.height) {
            (Some(lat), Some(lng), None, None) => Some(AoiExtent::Corner { lat, lng }),
            (None, None, Some(width_m), Some(height_m)) => Some(AoiExtent::Size { width_m, height_m }),
            _ => None,
        }
    }
}

/// Arguments for `download`.
#[derive(ClapArgs, Debug, Clone)]
pub struct DownloadArgs {
    /// Tile summary (or ledger) CSV produced by `resolve`
    #[arg(long, value_name = "PATH")]
    pub summary: PathBuf,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn with_corners<'a>(extra: &[&'a str]) -> Vec<&'a str> {
        let mut argv = vec![
            "tileclip",
            "grid",
            "--nw-lat",
            "37.807952",
            "--nw-lng",
            "-122.509337",
            "--se-lat",
            "37.7",
            "--se-lng",
            "-122.35",
        ];
        argv.extend_from_slice(extra);
        argv
    }

    fn grid_args(args: Args) -> GridArgs {
        match args.command {
            Command::Grid(grid) | Command::Resolve(grid) | Command::Run(grid) => grid,
            Command::Download(_) => panic!("expected a grid command"),
        }
    }

    // ==================== AOI Tests ====================

    #[test]
    fn test_cli_corner_mode_parses_negative_longitudes() {
        let args = Args::try_parse_from(with_corners(&[])).unwrap();
        let grid = grid_args(args);
        assert_eq!(
            grid.aoi.extent(),
            Some(AoiExtent::Corner {
                lat: 37.7,
                lng: -122.35
            })
        );
        assert!((grid.aoi.nw_lng + 122.509_337).abs() < 1e-12);
        assert!((grid.tile_width - 200.0).abs() < f64::EPSILON);
        assert!((grid.tile_height - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cli_size_mode() {
        let args = Args::try_parse_from([
            "tileclip", "run", "--nw-lat", "10", "--nw-lng", "20", "--width", "500", "--height", "300",
            "--tile-width", "100", "--tile-height", "50",
        ])
        .unwrap();
        let grid = grid_args(args);
        assert_eq!(
            grid.aoi.extent(),
            Some(AoiExtent::Size {
                width_m: 500.0,
                height_m: 300.0
            })
        );
        assert!((grid.tile_width - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cli_requires_an_extent() {
        let err = Args::try_parse_from(["tileclip", "grid", "--nw-lat", "10", "--nw-lng", "20"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_rejects_both_extents() {
        let err = Args::try_parse_from(with_corners(&["--width", "5", "--height", "5"])).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_rejects_half_corner() {
        let err = Args::try_parse_from(["tileclip", "grid", "--nw-lat", "10", "--nw-lng", "20", "--se-lat", "9"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_rejects_half_size() {
        let err = Args::try_parse_from(["tileclip", "grid", "--nw-lat", "10", "--nw-lng", "20", "--width", "9"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    // ==================== Global Flag Tests ====================

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(with_corners(&["-vv"])).unwrap();
        assert_eq!(args.verbose, 2);
        assert!(!args.quiet);
    }

    #[test]
    fn test_cli_globals_after_subcommand() {
        let args = Args::try_parse_from(with_corners(&["-q", "--config", "tileclip.toml", "-o", "out", "-c", "7"]))
            .unwrap();
        assert!(args.quiet);
        assert_eq!(args.config, Some(PathBuf::from("tileclip.toml")));
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert_eq!(args.concurrency, Some(7));
    }

    #[test]
    fn test_cli_concurrency_bounds() {
        let err = Args::try_parse_from(with_corners(&["-c", "0"])).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        let err = Args::try_parse_from(with_corners(&["-c", "101"])).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Subcommand Tests ====================

    #[test]
    fn test_cli_download_requires_summary() {
        let err = Args::try_parse_from(["tileclip", "download"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let args = Args::try_parse_from(["tileclip", "download", "--summary", "Clips_Summary_2018-01-09.csv"]).unwrap();
        match args.command {
            Command::Download(download) => {
                assert_eq!(download.summary, PathBuf::from("Clips_Summary_2018-01-09.csv"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_missing_subcommand() {
        let err = Args::try_parse_from(["tileclip"]).unwrap_err();
        assert!(matches!(
            err.kind(),
            clap::error::ErrorKind::MissingSubcommand | clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        ));
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["tileclip", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["tileclip", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
