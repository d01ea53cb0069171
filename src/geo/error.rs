//! Error types for geometry and tiling operations.

use thiserror::Error;

/// Errors raised while constructing boxes or running geodesic computations.
#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    /// Latitude or longitude outside the valid range (or not finite).
    #[error("invalid coordinate ({lat}, {lng}): latitude must be within [-90, 90] and longitude within [-180, 180]")]
    InvalidCoordinate {
        /// Offending latitude in degrees.
        lat: f64,
        /// Offending longitude in degrees.
        lng: f64,
    },

    /// A width, height, or distance that is non-positive or not finite.
    #[error("invalid {name} {value}: must be a positive, finite number of meters")]
    InvalidDimension {
        /// Which dimension was rejected (`width`, `height`, `distance`).
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// The southeast corner is north or west of the northwest corner.
    #[error(
        "southeast corner ({se_lat}, {se_lng}) must lie south and east of northwest corner ({nw_lat}, {nw_lng})"
    )]
    InvertedCorners {
        /// Northwest latitude.
        nw_lat: f64,
        /// Northwest longitude.
        nw_lng: f64,
        /// Southeast latitude.
        se_lat: f64,
        /// Southeast longitude.
        se_lng: f64,
    },

    /// Neither a southeast corner nor a width/height was supplied.
    #[error("box {id} needs either a southeast corner or a width and height")]
    MissingBounds {
        /// Identifier of the box being built.
        id: String,
    },

    /// Both a southeast corner and a width/height were supplied.
    #[error("box {id} was given both a southeast corner and a width/height; provide exactly one")]
    AmbiguousBounds {
        /// Identifier of the box being built.
        id: String,
    },

    /// The inverse geodesic iteration did not converge (nearly antipodal points).
    #[error("geodesic distance did not converge between ({from_lat}, {from_lng}) and ({to_lat}, {to_lng})")]
    NoConvergence {
        /// Start latitude.
        from_lat: f64,
        /// Start longitude.
        from_lng: f64,
        /// End latitude.
        to_lat: f64,
        /// End longitude.
        to_lng: f64,
    },
}

impl GeoError {
    /// Creates an invalid dimension error.
    pub fn invalid_dimension(name: &'static str, value: f64) -> Self {
        Self::InvalidDimension { name, value }
    }

    /// Creates a missing bounds error.
    pub fn missing_bounds(id: impl Into<String>) -> Self {
        Self::MissingBounds { id: id.into() }
    }

    /// Creates an ambiguous bounds error.
    pub fn ambiguous_bounds(id: impl Into<String>) -> Self {
        Self::AmbiguousBounds { id: id.into() }
    }
}
