//! The MDS track check.
//!
//! A 1990s procedure: derive the platform's modal speed from its
//! position-derived speeds, then flag interior reports that are both
//! far from the midpoint interpolation of their neighbours and
//! kinematically implausible against the reported speed and heading.

use crate::checks::blacklist;
use crate::config::TrackConfig;
use crate::report::flag::{QcCategory, QcCheck};
use crate::sphere;
use crate::units::{kmh_to_knots, knots_to_kmh};
use crate::voyage::Voyage;

/// Speed limits derived from the modal speed, km/h.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedLimits {
    pub amax: f64,
    pub amax_abs: f64,
    pub amin: f64,
}

/// Modal speed of a voyage from its segment speeds, in km/h.
///
/// Speeds are binned into 3-knot bins with centres 1.5 to 34.5 knots,
/// anything beyond 36 knots landing in the top bin. The first segment
/// (which has no predecessor) is ignored. The returned mode is floored
/// at 8.5 knots; fewer than one usable speed yields `None`.
pub fn modal_speed(speeds: &[Option<f64>]) -> Option<f64> {
    let mut freq = [0u32; 12];
    let mut count = 0u32;
    for speed in speeds.iter().skip(1).flatten() {
        let knots = kmh_to_knots(*speed);
        let bin = ((knots / 3.0).floor() as i64).clamp(0, 11) as usize;
        freq[bin] += 1;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let mut best = 0usize;
    for (bin, &f) in freq.iter().enumerate() {
        if f > freq[best] {
            best = bin;
        }
    }
    let centre = (best as f64 + 1.0) * 3.0 - 1.5;
    Some(knots_to_kmh(centre.max(8.5)))
}

/// Track-check speed limits from the modal speed.
///
/// Modes at or below 8.51 knots (and unknown modes) fall back to the
/// historical defaults of 15, 20 and 0 knots.
pub fn speed_limits(modal_kmh: Option<f64>) -> SpeedLimits {
    let defaults = SpeedLimits {
        amax: knots_to_kmh(15.0),
        amax_abs: knots_to_kmh(20.0),
        amin: 0.0,
    };
    match modal_kmh {
        Some(m) if m > knots_to_kmh(8.51) => SpeedLimits {
            amax: m * 1.25,
            amax_abs: knots_to_kmh(30.0),
            amin: m * 0.75,
        },
        _ => defaults,
    }
}

/// Latitude and longitude increments after travelling at the reported
/// speed and heading for half the time difference.
pub fn increment_position(
    lat: f64,
    lon: f64,
    speed_kmh: f64,
    direction_deg: f64,
    time_diff: f64,
) -> Option<(f64, f64)> {
    let distance = speed_kmh * time_diff / 2.0;
    let (lat2, lon2) = sphere::lat_lon_from_course_and_distance(lat, lon, direction_deg, distance).ok()?;
    Some((lat2 - lat, lon2 - lon))
}

/// 10 when both the forward and backward estimated positions are
/// further from the reported one than the reported speeds allow.
pub fn check_distance_from_estimate(
    speed: Option<f64>,
    speed_previous: Option<f64>,
    time_diff: Option<f64>,
    fwd_diff: Option<f64>,
    rev_diff: Option<f64>,
) -> f64 {
    let (vs, vs_prev, td, fwd, rev) = match (speed, speed_previous, time_diff, fwd_diff, rev_diff) {
        (Some(a), Some(b), Some(c), Some(d), Some(e)) => (a, b, c, d, e),
        _ => return 0.0,
    };
    if vs > 0.0 && vs_prev > 0.0 && td > 0.0 {
        let allowed = td * (vs + vs_prev) / 2.0;
        if fwd > allowed && rev > allowed {
            return 10.0;
        }
    }
    0.0
}

/// 10 when the course made good sits more than `max_change` degrees
/// from both the current and previous reported headings.
pub fn direction_continuity(
    heading: Option<f64>,
    heading_previous: Option<f64>,
    course: Option<f64>,
    max_change: f64,
) -> f64 {
    let (dsi, dsi_prev, course) = match (heading, heading_previous, course) {
        (Some(a), Some(b), Some(c)) => (a, b, c),
        _ => return 0.0,
    };
    let outside = |reported: f64| {
        let diff = (reported - course).abs();
        max_change < diff && diff < 360.0 - max_change
    };
    if outside(dsi) || outside(dsi_prev) {
        10.0
    } else {
        0.0
    }
}

/// 10 when the derived speed differs from both the current and previous
/// reported speeds by more than `max_change` km/h.
pub fn speed_continuity(
    speed: Option<f64>,
    speed_previous: Option<f64>,
    derived_speed: Option<f64>,
    max_change: f64,
) -> f64 {
    let (vs, vs_prev, derived) = match (speed, speed_previous, derived_speed) {
        (Some(a), Some(b), Some(c)) => (a, b, c),
        _ => return 0.0,
    };
    if (vs - derived).abs() > max_change && (vs_prev - derived).abs() > max_change {
        10.0
    } else {
        0.0
    }
}

impl Voyage {
    /// Distance between each report and its position as estimated
    /// forwards in time from the reported speed and heading.
    fn forward_discrepancies(&self) -> Vec<Option<f64>> {
        let n = self.len();
        let mut out = vec![None];
        for i in 1..n {
            let value = (|| {
                let vs = self.get(i).speed_kmh()?;
                let vs_prev = self.get(i - 1).speed_kmh()?;
                let ds = self.get(i).course_deg()?;
                let ds_prev = self.get(i - 1).course_deg()?;
                let td = self.segment(i).time_diff?;
                let (dlat1, dlon1) = increment_position(self.lats[i - 1], self.lons[i - 1], vs_prev, ds_prev, td)?;
                let (dlat2, dlon2) = increment_position(self.lats[i], self.lons[i], vs, ds, td)?;
                let est_lat = self.lats[i - 1] + dlat1 + dlat2;
                let est_lon = self.lons[i - 1] + dlon1 + dlon2;
                sphere::sphere_distance(self.lats[i], self.lons[i], est_lat, est_lon).ok()
            })();
            out.push(value);
        }
        out
    }

    /// Same, estimated backwards in time from the later report.
    fn reverse_discrepancies(&self) -> Vec<Option<f64>> {
        let n = self.len();
        let mut out = vec![None; n];
        for i in 1..n {
            let value = (|| {
                let vs = self.get(i).speed_kmh()?;
                let vs_prev = self.get(i - 1).speed_kmh()?;
                let ds = self.get(i).course_deg()?;
                let ds_prev = self.get(i - 1).course_deg()?;
                let td = self.segment(i).time_diff?;
                let (dlat1, dlon1) = increment_position(self.lats[i], self.lons[i], vs, ds - 180.0, td)?;
                let (dlat2, dlon2) =
                    increment_position(self.lats[i - 1], self.lons[i - 1], vs_prev, ds_prev - 180.0, td)?;
                let est_lat = self.lats[i] + dlat1 + dlat2;
                let est_lon = self.lons[i] + dlon1 + dlon2;
                sphere::sphere_distance(self.lats[i - 1], self.lons[i - 1], est_lat, est_lon).ok()
            })();
            out[i - 1] = value;
        }
        out
    }

    /// Distance between each interior report and the interpolation of
    /// its two neighbours at its own time.
    fn midpoint_discrepancies(&self) -> Vec<Option<f64>> {
        let n = self.len();
        let mut out = vec![None; n];
        for i in 1..n.saturating_sub(1) {
            let fraction = match (self.segment(i).time_diff, self.segment(i + 1).time_diff) {
                (Some(t0), Some(t1)) if t0 + t1 != 0.0 => t0 / (t0 + t1),
                _ => 0.0,
            };
            out[i] = sphere::intermediate_point(
                self.lats[i - 1],
                self.lons[i - 1],
                self.lats[i + 1],
                self.lons[i + 1],
                fraction.clamp(0.0, 1.0),
            )
            .and_then(|(lat, lon)| sphere::sphere_distance(self.lats[i], self.lons[i], lat, lon))
            .ok();
        }
        out
    }

    /// MDS track check. Requires sorted reports with derived kinematics
    /// except on the bypass paths (generic ids, buoys, short voyages).
    pub fn track_check(&mut self, cfg: &TrackConfig) {
        let n = self.len();
        if n == 0 {
            return;
        }

        // generic ids and buoys get a free pass
        let generic = blacklist::id_is_generic(self.get(0).id(), self.get(0).year());
        if generic || self.is_buoy() {
            self.set_flag_all(QcCategory::Position, QcCheck::Track, 0);
            self.set_flag_all(QcCategory::Position, QcCheck::FewObs, 0);
            return;
        }

        // short voyages: deck 720 gets a pass prior to 1891
        if n < 3 {
            let deck720 = self.get(0).deck() == Some(720)
                && matches!(self.get(0).year(), Some(y) if y < 1891);
            self.set_flag_all(QcCategory::Position, QcCheck::Track, 0);
            self.set_flag_all(
                QcCategory::Position,
                QcCheck::FewObs,
                u8::from(!deck720),
            );
            return;
        }

        if !self.derived {
            log::warn!("track check called before kinematics were derived, skipping");
            return;
        }

        let modal = modal_speed(&self.speeds());
        let limits = speed_limits(modal);

        let forward = self.forward_discrepancies();
        let reverse = self.reverse_discrepancies();
        let midpoint = self.midpoint_discrepancies();

        let mut failures = vec![false; n];
        for i in 1..n - 1 {
            let speed = self.segment(i).speed;
            let speed_next = self.segment(i + 1).speed;
            let over = |s: Option<f64>| matches!(s, Some(v) if v > limits.amax);

            let mut qc_a = 0.0;
            if over(speed) && over(self.alternate(i - 1).speed) {
                qc_a += 1.0;
            } else if over(speed_next) && over(self.alternate(i + 1).speed) {
                qc_a += 2.0;
            } else if over(speed) && over(speed_next) {
                qc_a += 3.0;
            }

            let mut qc_b = 0.0;
            qc_b += check_distance_from_estimate(
                self.get(i).speed_kmh(),
                self.get(i - 1).speed_kmh(),
                self.segment(i).time_diff,
                forward[i],
                reverse[i],
            );
            qc_b += direction_continuity(
                self.get(i).course_deg(),
                self.get(i - 1).course_deg(),
                self.segment(i).course,
                cfg.max_direction_change,
            );
            qc_b += speed_continuity(
                self.get(i).speed_kmh(),
                self.get(i - 1).speed_kmh(),
                speed,
                cfg.max_speed_change,
            );
            if matches!(speed, Some(v) if v > cfg.max_absolute_speed) {
                qc_b += 10.0;
            }

            failures[i] = matches!(midpoint[i], Some(d) if d > cfg.max_midpoint_discrepancy)
                && qc_a > 0.0
                && qc_b > 0.0;
        }

        for (i, failed) in failures.iter().enumerate() {
            self.reps[i].set_flag(QcCategory::Position, QcCheck::Track, u8::from(*failed));
            self.reps[i].set_flag(QcCategory::Position, QcCheck::FewObs, 0);
        }
    }
}
