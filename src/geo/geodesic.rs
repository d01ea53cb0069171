//! Geodesic distance and destination on the WGS-84 ellipsoid.
//!
//! Both directions use Vincenty's iterative formulae:
//! - [`distance`] solves the inverse problem (two points to meters)
//! - [`destination`] solves the direct problem (origin, bearing, meters to point)
//!
//! The same ellipsoid parameters are used everywhere in the crate so box
//! widths derived from corners agree with corners derived from widths.

use tracing::trace;

use super::{GeoError, GeoPoint};

/// WGS-84 semi-major axis in meters.
pub const WGS84_A: f64 = 6_378_137.0;

/// WGS-84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// WGS-84 semi-minor axis in meters.
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);

/// Iteration stops once successive estimates differ by less than this (radians).
const CONVERGENCE_THRESHOLD: f64 = 1e-12;

/// Upper bound on Vincenty iterations before giving up.
const MAX_ITERATIONS: usize = 200;

/// Returns the geodesic distance in meters between two points.
///
/// # Errors
///
/// Returns [`GeoError::NoConvergence`] for nearly antipodal points, where the
/// inverse iteration does not settle.
pub fn distance(from: GeoPoint, to: GeoPoint) -> Result<f64, GeoError> {
    let l = (to.lng() - from.lng()).to_radians();
    let u1 = ((1.0 - WGS84_F) * from.lat().to_radians().tan()).atan();
    let u2 = ((1.0 - WGS84_F) * to.lat().to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    let mut converged = None;

    for iteration in 0..MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();

        if sin_sigma == 0.0 {
            // Coincident points.
            return Ok(0.0);
        }

        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // Equatorial lines have cos_sq_alpha == 0.
        let cos_2sigma_m = if cos_sq_alpha == 0.0 {
            0.0
        } else {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        };
        let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));

        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * WGS84_F
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

        if (lambda - previous).abs() < CONVERGENCE_THRESHOLD {
            trace!(iteration, "inverse geodesic converged");
            converged = Some((sin_sigma, cos_sigma, sigma, cos_sq_alpha, cos_2sigma_m));
            break;
        }
    }

    let Some((sin_sigma, cos_sigma, sigma, cos_sq_alpha, cos_2sigma_m)) = converged else {
        return Err(GeoError::NoConvergence {
            from_lat: from.lat(),
            from_lng: from.lng(),
            to_lat: to.lat(),
            to_lng: to.lng(),
        });
    };

    let u_sq = cos_sq_alpha * (WGS84_A.powi(2) - WGS84_B.powi(2)) / WGS84_B.powi(2);
    let (a, b) = series_coefficients(u_sq);
    let delta_sigma = delta_sigma(b, sin_sigma, cos_sigma, cos_2sigma_m);

    Ok(WGS84_B * a * (sigma - delta_sigma))
}

/// Returns the point reached by travelling `distance_m` meters from `origin`
/// along the geodesic with initial bearing `bearing_deg` (clockwise from north).
///
/// Longitudes past the antimeridian are wrapped back into `[-180, 180]`.
///
/// # Errors
///
/// Returns [`GeoError::InvalidDimension`] if the distance is negative or not
/// finite or the bearing is not finite, and [`GeoError::InvalidCoordinate`] if
/// the computed point falls outside the valid coordinate range.
pub fn destination(origin: GeoPoint, bearing_deg: f64, distance_m: f64) -> Result<GeoPoint, GeoError> {
    if !distance_m.is_finite() || distance_m < 0.0 {
        return Err(GeoError::invalid_dimension("distance", distance_m));
    }
    if !bearing_deg.is_finite() {
        return Err(GeoError::invalid_dimension("bearing", bearing_deg));
    }
    if distance_m == 0.0 {
        return Ok(origin);
    }

    let alpha1 = bearing_deg.to_radians();
    let (sin_alpha1, cos_alpha1) = alpha1.sin_cos();

    let tan_u1 = (1.0 - WGS84_F) * origin.lat().to_radians().tan();
    let cos_u1 = 1.0 / (1.0 + tan_u1 * tan_u1).sqrt();
    let sin_u1 = tan_u1 * cos_u1;

    let sigma1 = tan_u1.atan2(cos_alpha1);
    let sin_alpha = cos_u1 * sin_alpha1;
    let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
    let u_sq = cos_sq_alpha * (WGS84_A.powi(2) - WGS84_B.powi(2)) / WGS84_B.powi(2);
    let (a, b) = series_coefficients(u_sq);

    let base_sigma = distance_m / (WGS84_B * a);
    let mut sigma = base_sigma;
    for _ in 0..MAX_ITERATIONS {
        let cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
        let (sin_sigma, cos_sigma) = sigma.sin_cos();
        let next = base_sigma + delta_sigma(b, sin_sigma, cos_sigma, cos_2sigma_m);
        let settled = (next - sigma).abs() < CONVERGENCE_THRESHOLD;
        sigma = next;
        if settled {
            break;
        }
    }
    let cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
    let (sin_sigma, cos_sigma) = sigma.sin_cos();

    let tmp = sin_u1 * sin_sigma - cos_u1 * cos_sigma * cos_alpha1;
    let lat2 = (sin_u1 * cos_sigma + cos_u1 * sin_sigma * cos_alpha1)
        .atan2((1.0 - WGS84_F) * (sin_alpha * sin_alpha + tmp * tmp).sqrt());
    let lambda = (sin_sigma * sin_alpha1).atan2(cos_u1 * cos_sigma - sin_u1 * sin_sigma * cos_alpha1);
    let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));
    let l = lambda
        - (1.0 - c)
            * WGS84_F
            * sin_alpha
            * (sigma
                + c * sin_sigma
                    * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

    let lng2 = normalize_longitude(origin.lng() + l.to_degrees());
    GeoPoint::new(lat2.to_degrees(), lng2)
}

/// Vincenty's A and B series coefficients for a reduced `u²`.
fn series_coefficients(u_sq: f64) -> (f64, f64) {
    let a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    (a, b)
}

fn delta_sigma(b: f64, sin_sigma: f64, cos_sigma: f64, cos_2sigma_m: f64) -> f64 {
    b * sin_sigma
        * (cos_2sigma_m
            + b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
                    - b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma.powi(2))
                        * (-3.0 + 4.0 * cos_2sigma_m.powi(2))))
}

fn normalize_longitude(lng: f64) -> f64 {
    if (-180.0..=180.0).contains(&lng) {
        lng
    } else {
        (lng + 180.0).rem_euclid(360.0) - 180.0
    }
}
