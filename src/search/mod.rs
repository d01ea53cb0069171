//! Image-id resolution: search filters and the concurrent [`IdResolver`].
//!
//! For each tile the resolver builds the tile's footprint polygon, wraps it
//! in an AND-filter with the fixed [`SearchFilters`], runs a quick search
//! under the retry policy, and takes the **first** returned candidate.
//! Candidates are not checked against the tile footprint; a candidate that
//! only partly covers the tile shows up later as a boundary failure in the
//! clip phase.

mod error;
mod filters;
mod resolver;

pub use error::ResolveError;
pub use filters::{DEFAULT_ASSET_TYPE, DEFAULT_ITEM_TYPE, DEFAULT_MAX_CLOUD_COVER, SearchFilters};
pub use resolver::{IdResolver, ResolveOutcome, TileResolution};
