//! Tileclip Core Library
//!
//! This library provides the core functionality for the tileclip tool, which
//! carves an area of interest into fixed-size tiles, finds one satellite
//! image for each tile, and downloads a clip of that image cut to the tile.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`geo`] - Geographic boxes, geodesic math and tile grid generation
//! - [`api`] - HTTP client for search, clip jobs and downloads, plus the retry policy
//! - [`search`] - Search filters and the concurrent image-id resolver
//! - [`clip`] - Clip preparation, polling and download orchestration
//! - [`ledger`] - Tile summary and download ledger CSV files
//! - [`config`] - TOML configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod clip;
pub mod config;
pub mod geo;
pub mod ledger;
pub mod pool;
pub mod search;
mod user_agent;

// Re-export commonly used types
pub use api::{ApiError, Credentials, Endpoints, FailureType, PlanetClient, RetryDecision, RetryPolicy, classify_error};
pub use clip::{ClipError, ClipOutcome, ClipPaths, ClipState, DownloadOrchestrator, PollSettings};
pub use config::{AppConfig, ConfigError};
pub use geo::{GeoBox, GeoError, GeoPoint, ImageRef, TileGridBuilder};
pub use ledger::{DownloadLedger, LedgerEntry, LedgerError};
pub use pool::DEFAULT_CONCURRENCY;
pub use search::{IdResolver, ResolveError, ResolveOutcome, SearchFilters, TileResolution};
