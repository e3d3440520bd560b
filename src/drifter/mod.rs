//! Tracking QC for drifting buoys (Atkinson et al. 2013, as revised
//! for SST CCI 2).
//!
//! Positional checks work on median-smoothed position series to tame
//! the jitter of hundredth-of-a-degree positions; the tolerance is the
//! displacement that jitter produces at the equator. Each check exists
//! in its original windowed form and a revised form, selected through
//! its configuration.

pub mod background;
pub mod tail;

use crate::config::{AgroundConfig, DriftSpeedConfig, IquamConfig};
use crate::report::flag::{QcCategory, QcCheck};
use crate::sphere;
use crate::units::kmh_to_ms;
use crate::voyage::iquam::iquam_violation_flags;
use crate::voyage::Voyage;
use std::cmp::Ordering;

fn median(window: &[f64]) -> f64 {
    let mut buf = window.to_vec();
    buf.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    buf[buf.len() / 2]
}

/// Median-smoothed latitude, longitude and hour series. The hour series
/// keeps the centre of each window.
fn smoothed_positions(voyage: &Voyage, smooth_win: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let lats = voyage.lats();
    let lons = voyage.lons();
    let hrs = voyage.hours();
    let n = voyage.len();
    let half_win = (smooth_win - 1) / 2;
    let n_smooth = n - smooth_win + 1;

    let mut lat_s = Vec::with_capacity(n_smooth);
    let mut lon_s = Vec::with_capacity(n_smooth);
    let mut hrs_s = Vec::with_capacity(n_smooth);
    for i in 0..n_smooth {
        lat_s.push(median(&lats[i..i + smooth_win]));
        lon_s.push(median(&lons[i..i + smooth_win]));
        hrs_s.push(hrs[i + half_win]);
    }
    (lat_s, lon_s, hrs_s)
}

/// Aground check: a drifter whose smoothed position stays within the
/// jitter tolerance over a long enough window has run aground, and
/// every report from there on is flagged. A drifter that moves again
/// later is reinstated.
///
/// With `max_win_period` set, each position is compared to the furthest
/// smoothed position inside the window; without it, the revised rule
/// compares against the final position of the record.
pub fn aground_check(voyage: &mut Voyage, cfg: &AgroundConfig) {
    let n = voyage.len();
    if n == 0 || !voyage.is_drifter() {
        return;
    }
    if n <= cfg.smooth_win {
        voyage.set_flag_all(QcCategory::Position, QcCheck::Aground, 0);
        return;
    }

    let half_win = (cfg.smooth_win - 1) / 2;
    let (lat_s, lon_s, hrs_s) = smoothed_positions(voyage, cfg.smooth_win);
    let ns = hrs_s.len();
    let tolerance = sphere::jitter_tolerance_km();
    let min_hours = cfg.min_win_period * 24.0;
    let max_hours = cfg.max_win_period.map(|d| d * 24.0);

    let mut is_aground = false;
    let mut aground_start = 0usize;
    let mut i = 0usize;
    while i < ns && hrs_s[ns - 1] - hrs_s[i] >= min_hours {
        let other = match max_hours {
            Some(max_h) => {
                let last = hrs_s.partition_point(|&h| h <= hrs_s[i] + max_h) - 1;
                if hrs_s[last] - hrs_s[i] < min_hours {
                    i += 1;
                    continue;
                }
                last
            },
            None => ns - 1,
        };
        let displacement = sphere::sphere_distance_unchecked(lat_s[i], lon_s[i], lat_s[other], lon_s[other]);
        if displacement <= tolerance {
            if !is_aground {
                is_aground = true;
                aground_start = i;
            }
        } else {
            is_aground = false;
        }
        i += 1;
    }

    // map the smoothed index back onto the original series
    let first_flagged = if is_aground {
        if aground_start > 0 {
            aground_start + half_win
        } else {
            0
        }
    } else {
        n
    };
    for (ind, rep) in voyage.reports_mut().iter_mut().enumerate() {
        rep.set_flag(
            QcCategory::Position,
            QcCheck::Aground,
            u8::from(is_aground && ind >= first_flagged),
        );
    }
}

/// Speed check: a drifter moving faster than a fast ocean current has
/// probably been picked up by a ship. Every report inside an offending
/// window is flagged.
///
/// With `max_win_period` set, speed is assessed over the longest
/// separation inside the window. Without it, the revised rule applies:
/// the record is first screened with the IQUAM track check run as if
/// the platform were a ship, the surviving positions are assessed over
/// the shortest separation exceeding `min_win_period`.
pub fn speed_check(voyage: &mut Voyage, cfg: &DriftSpeedConfig, iquam_cfg: &IquamConfig) {
    let n = voyage.len();
    if n == 0 || !voyage.is_drifter() {
        return;
    }
    voyage.set_flag_all(QcCategory::Position, QcCheck::DriftSpeed, 0);
    if n <= 1 {
        return;
    }

    let min_hours = cfg.min_win_period * 24.0;
    let lats = voyage.lats().to_vec();
    let lons = voyage.lons().to_vec();
    let hrs = voyage.hours().to_vec();

    // positional outliers to ignore, revised variant only
    let screened: Vec<bool> = match cfg.max_win_period {
        Some(_) => vec![false; n],
        None => iquam_violation_flags(voyage, iquam_cfg, iquam_cfg.ship_speed_limit),
    };

    let mut i = 0usize;
    while i < n && hrs[n - 1] - hrs[i] >= min_hours {
        if screened[i] {
            i += 1;
            continue;
        }
        let other = match cfg.max_win_period {
            Some(max_days) => {
                let last = hrs.partition_point(|&h| h <= hrs[i] + max_days * 24.0) - 1;
                if hrs[last] - hrs[i] < min_hours {
                    i += 1;
                    continue;
                }
                last
            },
            None => {
                match (i + 1..n).find(|&k| hrs[k] >= hrs[i] + min_hours && !screened[k]) {
                    Some(k) => k,
                    None => {
                        i += 1;
                        continue;
                    },
                }
            },
        };

        let window_hours = hrs[other] - hrs[i];
        let displacement = sphere::sphere_distance_unchecked(lats[i], lons[i], lats[other], lons[other]);
        let speed_ms = kmh_to_ms(displacement / window_hours);
        if speed_ms > cfg.speed_limit {
            for rep in &mut voyage.reports_mut()[i..=other] {
                rep.set_flag(QcCategory::Position, QcCheck::DriftSpeed, 1);
            }
        }
        i += 1;
    }
}
