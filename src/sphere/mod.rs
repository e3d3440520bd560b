//! Great-circle geometry on the spherical Earth.
//!
//! All public functions take coordinates in degrees and distances in
//! kilometres, using the mean Earth radius from [crate::constants].
//! The angular distance uses the atan2 formulation, which stays stable
//! for both very small and near-antipodal separations.

use crate::constants::EARTH_RADIUS_KM;
use map_3d::{deg2rad, rad2deg};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A coordinate or fraction was missing, NaN or out of its domain.
    #[error("invalid input to spherical geometry")]
    InvalidInput,
}

fn check_finite(values: &[f64]) -> Result<(), Error> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(Error::InvalidInput)
    }
}

/// Angular separation of two points in radians, without input validation.
/// Callers inside the crate use it where coordinates were already vetted.
pub(crate) fn angular_distance_unchecked(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = deg2rad(lat1);
    let lon1 = deg2rad(lon1);
    let lat2 = deg2rad(lat2);
    let lon2 = deg2rad(lon2);

    let delta_lambda = (lon1 - lon2).abs();
    let a = lat2.cos() * delta_lambda.sin();
    let b = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lambda.cos();
    let numerator = (a * a + b * b).sqrt();
    let denominator = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * delta_lambda.cos();
    numerator.atan2(denominator)
}

pub(crate) fn sphere_distance_unchecked(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    angular_distance_unchecked(lat1, lon1, lat2, lon2) * EARTH_RADIUS_KM
}

/// Angular separation of two points in radians.
pub fn angular_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<f64, Error> {
    check_finite(&[lat1, lon1, lat2, lon2])?;
    Ok(angular_distance_unchecked(lat1, lon1, lat2, lon2))
}

/// Great-circle distance between two points in kilometres.
pub fn sphere_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<f64, Error> {
    Ok(angular_distance(lat1, lon1, lat2, lon2)? * EARTH_RADIUS_KM)
}

/// Initial true course at the first point along the great circle towards
/// the second, in degrees in [0, 360). Zero when the points coincide.
pub fn course_between(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<f64, Error> {
    let d = angular_distance(lat1, lon1, lat2, lon2)?;
    if d == 0.0 {
        return Ok(0.0);
    }
    // starting on a pole every direction is south (or north)
    if deg2rad(lat1).cos() < 1e-7 {
        return Ok(if lat1 > 0.0 { 180.0 } else { 0.0 });
    }
    let lat1 = deg2rad(lat1);
    let lon1 = deg2rad(lon1);
    let lat2 = deg2rad(lat2);
    let lon2 = deg2rad(lon2);
    let y = (lon2 - lon1).sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * (lon2 - lon1).cos();
    let course = rad2deg(y.atan2(x)).rem_euclid(360.0);
    // rem_euclid can return exactly 360 when the bearing is a hair below zero
    Ok(if course >= 360.0 { 0.0 } else { course })
}

/// Destination point after travelling `distance_km` along the given
/// initial course.
pub fn lat_lon_from_course_and_distance(
    lat1: f64,
    lon1: f64,
    course_deg: f64,
    distance_km: f64,
) -> Result<(f64, f64), Error> {
    check_finite(&[lat1, lon1, course_deg, distance_km])?;

    let lat1 = deg2rad(lat1);
    let lon1 = deg2rad(lon1);
    let tcr = deg2rad(course_deg);
    let dr = distance_km / EARTH_RADIUS_KM;

    let lat = (lat1.sin() * dr.cos() + lat1.cos() * dr.sin() * tcr.cos()).asin();
    let dlon = (tcr.sin() * dr.sin() * lat1.cos()).atan2(dr.cos() - lat1.sin() * lat.sin());
    let lon = (lon1 + dlon + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI;

    Ok((rad2deg(lat), rad2deg(lon)))
}

/// Point a fraction `f` in [0, 1] of the way along the great circle from
/// the first point to the second. Degenerate arcs return the first point.
pub fn intermediate_point(lat1: f64, lon1: f64, lat2: f64, lon2: f64, f: f64) -> Result<(f64, f64), Error> {
    check_finite(&[lat1, lon1, lat2, lon2, f])?;
    if !(0.0..=1.0).contains(&f) {
        return Err(Error::InvalidInput);
    }

    let d = angular_distance_unchecked(lat1, lon1, lat2, lon2);
    if d == 0.0 {
        return Ok((lat1, lon1));
    }

    let lat1 = deg2rad(lat1);
    let lon1 = deg2rad(lon1);
    let lat2 = deg2rad(lat2);
    let lon2 = deg2rad(lon2);

    let a = ((1.0 - f) * d).sin() / d.sin();
    let b = (f * d).sin() / d.sin();
    let x = a * lat1.cos() * lon1.cos() + b * lat2.cos() * lon2.cos();
    let y = a * lat1.cos() * lon1.sin() + b * lat2.cos() * lon2.sin();
    let z = a * lat1.sin() + b * lat2.sin();

    Ok((rad2deg(z.atan2((x * x + y * y).sqrt())), rad2deg(y.atan2(x))))
}

/// Displacement produced by one hundredth of a degree of latitude and
/// longitude at the equator: the positional jitter floor used by the
/// drifter checks.
pub(crate) fn jitter_tolerance_km() -> f64 {
    sphere_distance_unchecked(0.0, 0.0, 0.01, 0.01)
}
