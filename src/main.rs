//! CLI entry point for the tileclip tool.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use tileclip_core::clip::ClipPaths;
use tileclip_core::config::OUTPUT_DIR_ENV;
use tileclip_core::ledger::{self, LEDGER_FILE_NAME};
use tileclip_core::{
    AppConfig, DownloadOrchestrator, GeoBox, GeoPoint, IdResolver, PlanetClient, ResolveOutcome, TileGridBuilder,
};
use tracing::{debug, info, warn};

mod cli;

use cli::{AoiExtent, Args, Command, GridArgs};

/// Settings shared by the network commands.
struct Pipeline {
    config: AppConfig,
    client: PlanetClient,
    output_dir: PathBuf,
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = AppConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    match args.command {
        Command::Grid(grid) => print_grid(&grid),
        Command::Resolve(grid) => {
            let pipeline = Pipeline::from_args(config, args.output_dir.as_deref(), args.concurrency)?;
            let tiles = build_tiles(&grid)?;
            pipeline.resolve(tiles).await.map(|_| ())
        }
        Command::Download(download) => {
            let pipeline = Pipeline::from_args(config, args.output_dir.as_deref(), args.concurrency)?;
            let tiles = ledger::load_summary(&download.summary)
                .with_context(|| format!("failed to load tile summary {}", download.summary.display()))?;
            pipeline.download(tiles).await
        }
        Command::Run(grid) => {
            let pipeline = Pipeline::from_args(config, args.output_dir.as_deref(), args.concurrency)?;
            let tiles = build_tiles(&grid)?;
            let resolved = pipeline.resolve(tiles).await?;
            pipeline.download(resolved).await
        }
    }
}

/// Builds the area of interest from CLI arguments and carves it into tiles.
fn build_tiles(grid: &GridArgs) -> Result<Vec<GeoBox>> {
    let nw = GeoPoint::new(grid.aoi.nw_lat, grid.aoi.nw_lng).context("invalid northwest corner")?;
    let aoi = match grid.aoi.extent() {
        Some(AoiExtent::Corner { lat, lng }) => {
            let se = GeoPoint::new(lat, lng).context("invalid southeast corner")?;
            GeoBox::from_corners("aoi", nw, se)
        }
        Some(AoiExtent::Size { width_m, height_m }) => GeoBox::from_size("aoi", nw, width_m, height_m),
        None => bail!("provide either --se-lat/--se-lng or --width/--height"),
    }
    .context("invalid area of interest")?;

    info!(aoi = %aoi, "area of interest");

    let tiles = TileGridBuilder::new(grid.tile_width, grid.tile_height)
        .context("invalid tile size")?
        .build(&aoi)
        .context("failed to build tile grid")?;
    Ok(tiles)
}

fn print_grid(grid: &GridArgs) -> Result<()> {
    let tiles = build_tiles(grid)?;
    println!("{} tiles", tiles.len());
    for tile in &tiles {
        println!("{tile}");
    }
    Ok(())
}

impl Pipeline {
    fn from_args(config: AppConfig, output_dir: Option<&Path>, concurrency: Option<u8>) -> Result<Self> {
        let credentials = config
            .credentials(|var| std::env::var(var).ok())
            .context("missing API credentials")?;
        let client = PlanetClient::with_settings(
            credentials,
            config.endpoints(),
            config.api.connect_timeout_secs,
            config.api.read_timeout_secs,
        )
        .context("failed to build HTTP client")?;

        let output_dir = config.output_dir(output_dir, std::env::var_os(OUTPUT_DIR_ENV).map(PathBuf::from));
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;

        let concurrency = concurrency.map_or(config.pipeline.concurrency, usize::from);
        debug!(output_dir = %output_dir.display(), concurrency, "pipeline configured");

        Ok(Self {
            config,
            client,
            output_dir,
            concurrency,
        })
    }

    /// Resolves image ids and writes the tile summary. Returns every tile,
    /// resolved or not.
    async fn resolve(&self, tiles: Vec<GeoBox>) -> Result<Vec<GeoBox>> {
        let resolver = IdResolver::new(
            self.concurrency,
            self.config.retry_policy(),
            self.config.search_filters(),
        )?;
        let resolutions = resolver.resolve(&self.client, tiles).await?;

        let mut tiles = Vec::with_capacity(resolutions.len());
        for resolution in resolutions {
            match &resolution.outcome {
                ResolveOutcome::Resolved { .. } => {}
                ResolveOutcome::NoCandidate => {
                    warn!(box_id = %resolution.tile.id(), "no image found for tile");
                }
                ResolveOutcome::Failed { status, error } => {
                    warn!(box_id = %resolution.tile.id(), ?status, %error, "image search failed");
                }
            }
            tiles.push(resolution.tile);
        }

        let path = self
            .output_dir
            .join(ledger::summary_file_name(Utc::now().date_naive()));
        ledger::write_summary(&path, &tiles)
            .with_context(|| format!("failed to write tile summary {}", path.display()))?;
        info!(path = %path.display(), "tile summary saved");
        Ok(tiles)
    }

    /// Downloads clips and writes the ledger.
    async fn download(&self, tiles: Vec<GeoBox>) -> Result<()> {
        let orchestrator = DownloadOrchestrator::new(
            self.concurrency,
            self.config.retry_policy(),
            self.config.poll_settings(),
            ClipPaths::new(&self.output_dir),
        )?;
        let results = orchestrator.download_all(&self.client, tiles).await?;

        let path = self.output_dir.join(LEDGER_FILE_NAME);
        ledger::write_ledger(&path, &results)
            .with_context(|| format!("failed to write ledger {}", path.display()))?;

        let follow_up = results.follow_up().count();
        if follow_up > 0 {
            warn!(
                follow_up,
                total = results.len(),
                path = %path.display(),
                "some tiles need manual follow-up"
            );
        } else {
            info!(total = results.len(), path = %path.display(), "all clips on disk");
        }
        Ok(())
    }
}
