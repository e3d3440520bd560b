//! Single-report QC predicates.
//!
//! Every check is a pure function over optional inputs returning a
//! [QcOutcome]: pass, fail, or untestable when an input is missing or a
//! parameter set is self-inconsistent. The engine stores the outcome
//! under the canonical flag name.

pub mod blacklist;

use crate::report::flag::QcOutcome;
use crate::units::{self, solar};
use chrono::{Datelike, Utc};

fn valid(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

/// Latitude within [-90, 90] and longitude within [-180, 360].
pub fn position_check(latitude: Option<f64>, longitude: Option<f64>) -> QcOutcome {
    let (lat, lon) = match (valid(latitude), valid(longitude)) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return QcOutcome::Untestable,
    };
    QcOutcome::fail_if(!(-90.0..=90.0).contains(&lat) || !(-180.0..=360.0).contains(&lon))
}

/// Year within [1850, current year], month within 1..=12, day within the
/// actual month.
pub fn date_check(year: Option<i32>, month: Option<u32>, day: Option<u32>) -> QcOutcome {
    let (y, m, d) = match (year, month, day) {
        (Some(y), Some(m), Some(d)) => (y, m, d),
        _ => return QcOutcome::Untestable,
    };
    if !(1850..=Utc::now().year()).contains(&y) {
        return QcOutcome::Fail;
    }
    if !(1..=12).contains(&m) {
        return QcOutcome::Fail;
    }
    QcOutcome::fail_if(d < 1 || d > units::month_lengths(y)[m as usize - 1])
}

/// Hour within [0, 24).
pub fn time_check(hour: Option<f64>) -> QcOutcome {
    match valid(hour) {
        Some(h) => QcOutcome::fail_if(!(0.0..24.0).contains(&h)),
        None => QcOutcome::Untestable,
    }
}

/// Day/night decision: pass means "daytime".
///
/// The sun elevation is evaluated `hours_since_sun_above_horizon` before
/// the observation, so a report counts as night until that long after
/// sunset. Failure or untestability of the position, date or time checks
/// propagates.
pub fn day_check(
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    hour: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    hours_since_sun_above_horizon: f64,
) -> QcOutcome {
    let position = position_check(latitude, longitude);
    let date = date_check(year, month, day);
    let time = time_check(hour);
    for outcome in [position, date, time] {
        if outcome == QcOutcome::Fail {
            return QcOutcome::Fail;
        }
    }
    for outcome in [position, date, time] {
        if outcome == QcOutcome::Untestable {
            return QcOutcome::Untestable;
        }
    }

    // checks passed, everything is present
    let (y, m, d, h) = (year.unwrap_or(0), month.unwrap_or(0), day.unwrap_or(0), hour.unwrap_or(0.0));
    let mut year2 = y;
    let mut day2 = units::day_in_year(y, m, d).unwrap_or(1) as i64;
    let minute2 = (h - h.floor()) * 60.0;
    let mut hour2 = h.floor() - hours_since_sun_above_horizon;
    if hour2 < 0.0 {
        hour2 += 24.0;
        day2 -= 1;
        if day2 <= 0 {
            year2 -= 1;
            day2 = units::day_in_year(year2, 12, 31).unwrap_or(365) as i64;
        }
    }

    let lat = latitude.unwrap_or(0.0);
    let lon = longitude.unwrap_or(0.0);
    let lat = if lat == 0.0 { 0.0001 } else { lat };
    let lon = if lon == 0.0 { 0.0001 } else { lon };

    let elevation = solar::sun_elevation(year2, day2 as u32, hour2, minute2, lat, lon);
    QcOutcome::fail_if(elevation <= 0.0)
}

/// Fails when the value is missing.
pub fn value_check(value: Option<f64>) -> QcOutcome {
    match valid(value) {
        Some(_) => QcOutcome::Pass,
        None => QcOutcome::Fail,
    }
}

/// Fails when the attached climatological normal is missing.
pub fn no_normal_check(normal: Option<f64>) -> QcOutcome {
    value_check(normal)
}

/// Value within inclusive hard limits.
pub fn hard_limit_check(value: Option<f64>, limits: (f64, f64)) -> QcOutcome {
    if limits.1 <= limits.0 {
        return QcOutcome::Untestable;
    }
    match valid(value) {
        Some(v) => QcOutcome::fail_if(v < limits.0 || v > limits.1),
        None => QcOutcome::Untestable,
    }
}

/// Compare a value against its climatological normal.
///
/// With a standard deviation the anomaly is standardised first; the
/// stdev is clamped into `stdev_limits` when given. An anomaly at or
/// below `lowbar` passes regardless.
pub fn climatology_check(
    value: Option<f64>,
    mean: Option<f64>,
    maximum_anomaly: f64,
    standard_deviation: Option<f64>,
    stdev_limits: Option<(f64, f64)>,
    lowbar: Option<f64>,
) -> QcOutcome {
    if !maximum_anomaly.is_finite() || maximum_anomaly <= 0.0 {
        return QcOutcome::Untestable;
    }
    if let Some((lo, hi)) = stdev_limits {
        if hi <= lo {
            return QcOutcome::Untestable;
        }
    }
    let (value, mean) = match (valid(value), valid(mean)) {
        (Some(v), Some(m)) => (v, m),
        _ => return QcOutcome::Untestable,
    };
    let stdev = match standard_deviation {
        Some(s) if !s.is_finite() => return QcOutcome::Untestable,
        Some(s) => match stdev_limits {
            Some((lo, hi)) => s.clamp(lo, hi),
            None => s,
        },
        None => 1.0,
    };

    let diff = (value - mean).abs();
    if let Some(lowbar) = lowbar {
        if diff <= lowbar {
            return QcOutcome::Pass;
        }
    }
    QcOutcome::fail_if(diff / stdev > maximum_anomaly)
}

/// SST above the freezing point, allowing `n_sigma` observational
/// uncertainties below it.
pub fn sst_freeze_check(
    sst: Option<f64>,
    sst_uncertainty: Option<f64>,
    freezing_point: Option<f64>,
    n_sigma: Option<f64>,
) -> QcOutcome {
    let (unc, fp, n) = match (valid(sst_uncertainty), valid(freezing_point), valid(n_sigma)) {
        (Some(u), Some(f), Some(n)) => (u, f, n),
        _ => return QcOutcome::Untestable,
    };
    match valid(sst) {
        Some(sst) => QcOutcome::fail_if(sst < fp - n * unc),
        None => QcOutcome::Untestable,
    }
}

/// Dew point must not exceed the air temperature.
pub fn supersaturation_check(dewpoint: Option<f64>, air_temperature: Option<f64>) -> QcOutcome {
    match (valid(dewpoint), valid(air_temperature)) {
        (Some(dpt), Some(at)) => QcOutcome::fail_if(dpt > at),
        _ => QcOutcome::Untestable,
    }
}

/// A calm must report both zero speed and zero direction; exactly one
/// zero is inconsistent.
pub fn wind_consistency_check(wind_speed: Option<f64>, wind_direction: Option<f64>) -> QcOutcome {
    match (valid(wind_speed), valid(wind_direction)) {
        (Some(w), Some(d)) => QcOutcome::fail_if((w == 0.0) != (d == 0.0)),
        _ => QcOutcome::Untestable,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use QcOutcome::{Fail, Pass, Untestable};

    #[test]
    fn position() {
        assert_eq!(position_check(Some(0.0), Some(0.0)), Pass);
        assert_eq!(position_check(Some(-91.0), Some(0.0)), Fail);
        assert_eq!(position_check(Some(0.0), Some(361.0)), Fail);
        assert_eq!(position_check(Some(0.0), Some(355.0)), Pass);
        assert_eq!(position_check(None, Some(0.0)), Untestable);
        assert_eq!(position_check(Some(f64::NAN), Some(0.0)), Untestable);
    }

    #[test]
    fn date() {
        assert_eq!(date_check(Some(1985), Some(2), Some(28)), Pass);
        assert_eq!(date_check(Some(1985), Some(2), Some(29)), Fail);
        assert_eq!(date_check(Some(1984), Some(2), Some(29)), Pass);
        assert_eq!(date_check(Some(1849), Some(1), Some(1)), Fail);
        assert_eq!(date_check(Some(3000), Some(1), Some(1)), Fail);
        assert_eq!(date_check(Some(1985), Some(13), Some(1)), Fail);
        assert_eq!(date_check(Some(1985), None, Some(1)), Untestable);
    }

    #[test]
    fn time() {
        assert_eq!(time_check(Some(0.0)), Pass);
        assert_eq!(time_check(Some(23.99)), Pass);
        assert_eq!(time_check(Some(24.0)), Fail);
        assert_eq!(time_check(Some(-0.1)), Fail);
        assert_eq!(time_check(None), Untestable);
    }

    #[test]
    fn day_night() {
        // noon at the equator is day
        assert_eq!(
            day_check(Some(2015), Some(3), Some(21), Some(13.0), Some(0.0), Some(0.0), 1.0),
            Pass
        );
        // midnight is night
        assert_eq!(
            day_check(Some(2015), Some(3), Some(21), Some(1.0), Some(0.0), Some(0.0), 1.0),
            Fail
        );
        // bad position propagates as fail
        assert_eq!(
            day_check(Some(2015), Some(3), Some(21), Some(12.0), Some(95.0), Some(0.0), 1.0),
            Fail
        );
        // missing hour propagates as untestable
        assert_eq!(
            day_check(Some(2015), Some(3), Some(21), None, Some(0.0), Some(0.0), 1.0),
            Untestable
        );
    }

    #[test]
    fn values_and_limits() {
        assert_eq!(value_check(Some(0.0)), Pass);
        assert_eq!(value_check(None), Fail);
        assert_eq!(hard_limit_check(Some(5.0), (0.0, 10.0)), Pass);
        assert_eq!(hard_limit_check(Some(15.0), (0.0, 10.0)), Fail);
        assert_eq!(hard_limit_check(Some(5.0), (10.0, 0.0)), Untestable);
        assert_eq!(hard_limit_check(None, (0.0, 10.0)), Untestable);
    }

    #[test]
    fn climatology() {
        // scenario: 20 vs 15, stdev 2, max 3 sigma -> 2.5 sigma passes
        assert_eq!(
            climatology_check(Some(20.0), Some(15.0), 3.0, Some(2.0), None, None),
            Pass
        );
        assert_eq!(
            climatology_check(Some(22.0), Some(15.0), 3.0, Some(2.0), None, None),
            Fail
        );
        // without stdev the raw anomaly is compared
        assert_eq!(climatology_check(Some(20.0), Some(15.0), 4.0, None, None, None), Pass);
        assert_eq!(climatology_check(Some(20.0), Some(15.0), 4.0, None, None, None), Pass);
        // lowbar waives small anomalies even with a tiny stdev
        assert_eq!(
            climatology_check(Some(16.0), Some(15.0), 1.0, Some(0.1), None, Some(2.0)),
            Pass
        );
        // clamping pulls an extreme stdev back into range
        assert_eq!(
            climatology_check(Some(25.0), Some(15.0), 3.0, Some(100.0), Some((0.5, 2.0)), None),
            Fail
        );
        // broken parameters
        assert_eq!(
            climatology_check(Some(20.0), Some(15.0), 0.0, None, None, None),
            Untestable
        );
        assert_eq!(
            climatology_check(Some(20.0), Some(15.0), 3.0, Some(1.0), Some((2.0, 1.0)), None),
            Untestable
        );
        assert_eq!(climatology_check(None, Some(15.0), 3.0, None, None, None), Untestable);
    }

    #[test]
    fn climatology_is_idempotent() {
        let run = || climatology_check(Some(20.0), Some(15.0), 3.0, Some(2.0), None, None);
        assert_eq!(run(), run());
    }

    #[test]
    fn freeze() {
        // -2.5 with no uncertainty is below -1.8
        assert_eq!(
            sst_freeze_check(Some(-2.5), Some(0.0), Some(-1.8), Some(2.0)),
            Fail
        );
        assert_eq!(
            sst_freeze_check(Some(-1.9), Some(0.0), Some(-1.8), Some(2.0)),
            Fail
        );
        assert_eq!(
            sst_freeze_check(Some(-1.8), Some(0.0), Some(-1.8), Some(2.0)),
            Pass
        );
        // uncertainty loosens the bound
        assert_eq!(
            sst_freeze_check(Some(-2.5), Some(0.5), Some(-1.8), Some(2.0)),
            Pass
        );
        assert_eq!(sst_freeze_check(None, Some(0.0), Some(-1.8), Some(2.0)), Untestable);
        assert_eq!(sst_freeze_check(Some(-1.0), None, Some(-1.8), Some(2.0)), Untestable);
    }

    #[test]
    fn supersaturation() {
        assert_eq!(supersaturation_check(Some(15.0), Some(14.9)), Fail);
        assert_eq!(supersaturation_check(Some(14.9), Some(15.0)), Pass);
        assert_eq!(supersaturation_check(Some(15.0), Some(15.0)), Pass);
        assert_eq!(supersaturation_check(None, Some(15.0)), Untestable);
    }

    #[test]
    fn wind_consistency() {
        assert_eq!(wind_consistency_check(Some(0.0), Some(90.0)), Fail);
        assert_eq!(wind_consistency_check(Some(5.0), Some(0.0)), Fail);
        assert_eq!(wind_consistency_check(Some(0.0), Some(0.0)), Pass);
        assert_eq!(wind_consistency_check(Some(5.0), Some(90.0)), Pass);
        assert_eq!(wind_consistency_check(None, Some(90.0)), Untestable);
    }
}
