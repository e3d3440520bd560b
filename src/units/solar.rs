//! Sun position from date, time and location.
//!
//! The low-accuracy NOAA formulation: fractional year, equation of time
//! and solar declination from a short Fourier series, then elevation
//! from the local hour angle. Accuracy is a small fraction of a degree,
//! which is ample for a day/night decision.

use crate::units::is_leap_year;
use map_3d::{deg2rad, rad2deg};

/// Solar coordinates as seen from a point on the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    /// Elevation above the horizon, degrees. Negative below.
    pub elevation: f64,
    /// Azimuth clockwise from north, degrees in [0, 360).
    pub azimuth: f64,
    /// Solar declination, degrees.
    pub declination: f64,
}

/// Sun position for the given UTC instant.
///
/// `day_of_year` is 1-based; `hour` is the whole UTC hour (may carry a
/// fractional part), `minute` in [0, 60).
pub fn sun_position(year: i32, day_of_year: u32, hour: f64, minute: f64, lat: f64, lon: f64) -> SunPosition {
    let days_in_year = if is_leap_year(year) { 366.0 } else { 365.0 };
    let frac_hour = hour + minute / 60.0;

    // fractional year in radians
    let gamma = 2.0 * std::f64::consts::PI / days_in_year * (day_of_year as f64 - 1.0 + (frac_hour - 12.0) / 24.0);

    // equation of time in minutes
    let eqtime = 229.18
        * (0.000075 + 0.001868 * gamma.cos()
            - 0.032077 * gamma.sin()
            - 0.014615 * (2.0 * gamma).cos()
            - 0.040849 * (2.0 * gamma).sin());

    // solar declination in radians
    let decl = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin() - 0.006758 * (2.0 * gamma).cos()
        + 0.000907 * (2.0 * gamma).sin()
        - 0.002697 * (3.0 * gamma).cos()
        + 0.00148 * (3.0 * gamma).sin();

    // true solar time in minutes, then hour angle in degrees
    let time_offset = eqtime + 4.0 * lon;
    let tst = frac_hour * 60.0 + time_offset;
    let ha = deg2rad(tst / 4.0 - 180.0);

    let lat_r = deg2rad(lat);
    let cos_zenith = lat_r.sin() * decl.sin() + lat_r.cos() * decl.cos() * ha.cos();
    let zenith = cos_zenith.clamp(-1.0, 1.0).acos();
    let elevation = 90.0 - rad2deg(zenith);

    let azimuth = if zenith.sin().abs() < 1e-9 {
        0.0
    } else {
        let cos_az = (decl.sin() - lat_r.sin() * zenith.cos()) / (lat_r.cos() * zenith.sin());
        let az = rad2deg(cos_az.clamp(-1.0, 1.0).acos());
        if ha.sin() > 0.0 {
            360.0 - az
        } else {
            az
        }
    };

    SunPosition {
        elevation,
        azimuth: azimuth.rem_euclid(360.0),
        declination: rad2deg(decl),
    }
}

/// Elevation of the sun above the horizon in degrees.
pub fn sun_elevation(year: i32, day_of_year: u32, hour: f64, minute: f64, lat: f64, lon: f64) -> f64 {
    sun_position(year, day_of_year, hour, minute, lat, lon).elevation
}
