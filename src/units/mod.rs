//! Unit conversions and civil-time helpers.
//!
//! Speeds inside the engine are km/h throughout; reported sector speeds
//! arrive in knots and drifter limits are given in m/s, hence the
//! conversions here. Calendar arithmetic leans on [chrono], the
//! climatological year is indexed by 73 pentads.

use crate::constants::KM_PER_HOUR_PER_KNOT;
use chrono::{Datelike, NaiveDate};

pub mod solar;

/// Cumulative day count at the start of each month, non-leap year.
const CUMULATIVE_DAYS: [u32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

pub fn knots_to_kmh(knots: f64) -> f64 {
    knots * KM_PER_HOUR_PER_KNOT
}

pub fn kmh_to_knots(kmh: f64) -> f64 {
    kmh / KM_PER_HOUR_PER_KNOT
}

pub fn ms_to_kmh(ms: f64) -> f64 {
    ms * 3.6
}

pub fn kmh_to_ms(kmh: f64) -> f64 {
    kmh / 3.6
}

/// Proleptic Gregorian leap rule.
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Lengths of the twelve months for the given year.
pub fn month_lengths(year: i32) -> [u32; 12] {
    let feb = if is_leap_year(year) { 29 } else { 28 };
    [31, feb, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
}

/// True when (year, month, day) denotes a real civil date.
pub fn valid_date(year: i32, month: u32, day: u32) -> bool {
    NaiveDate::from_ymd_opt(year, month, day).is_some()
}

/// True when the decimal hour lies in [0, 24).
pub fn valid_hour(hour: f64) -> bool {
    hour.is_finite() && (0.0..24.0).contains(&hour)
}

/// Day of the year, 1-based, or None for an invalid date.
pub fn day_in_year(year: i32, month: u32, day: u32) -> Option<u32> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.ordinal())
}

/// Julian day number of the given civil date.
pub fn julian_day_number(year: i32, month: u32, day: u32) -> Option<i64> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.num_days_from_ce() as i64 + 1_721_425)
}

/// Index of the pentad containing (month, day), in 1..=73.
/// February 29th folds into pentad 12 along with the end of February.
pub fn which_pentad(month: u32, day: u32) -> Option<u32> {
    if !(1..=12).contains(&month) || day < 1 {
        return None;
    }
    let limit = if month == 2 { 29 } else { month_lengths(2001)[month as usize - 1] };
    if day > limit {
        return None;
    }
    let doy = CUMULATIVE_DAYS[month as usize - 1] + day;
    let doy = doy.min(365);
    Some((doy - 1) / 5 + 1)
}

/// First (month, day) of the given pentad, in the 365-day climatological year.
pub fn pentad_to_month_day(pentad: u32) -> Option<(u32, u32)> {
    if !(1..=73).contains(&pentad) {
        return None;
    }
    let doy = (pentad - 1) * 5 + 1;
    let lengths = month_lengths(2001);
    let mut remaining = doy;
    for (m, len) in lengths.iter().enumerate() {
        if remaining <= *len {
            return Some((m as u32 + 1, remaining));
        }
        remaining -= len;
    }
    None
}

/// Difference in decimal hours between two timestamps, second minus first.
/// None when any component is missing or does not form a valid time.
#[allow(clippy::too_many_arguments)]
pub fn time_difference(
    year1: Option<i32>,
    month1: Option<u32>,
    day1: Option<u32>,
    hour1: Option<f64>,
    year2: Option<i32>,
    month2: Option<u32>,
    day2: Option<u32>,
    hour2: Option<f64>,
) -> Option<f64> {
    let (y1, m1, d1, h1) = (year1?, month1?, day1?, hour1?);
    let (y2, m2, d2, h2) = (year2?, month2?, day2?, hour2?);
    if !valid_hour(h1) || !valid_hour(h2) {
        return None;
    }
    let date1 = NaiveDate::from_ymd_opt(y1, m1, d1)?;
    let date2 = NaiveDate::from_ymd_opt(y2, m2, d2)?;
    let days = (date2.num_days_from_ce() - date1.num_days_from_ce()) as f64;
    Some(days * 24.0 + (h2 - h1))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn leap_years() {
        assert!(is_leap_year(2000));
        assert!(is_leap_year(1968));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2001));
    }

    #[test]
    fn month_lengths_respect_leap_rule() {
        assert_eq!(month_lengths(1999)[1], 28);
        assert_eq!(month_lengths(2000)[1], 29);
        assert_eq!(month_lengths(1999).iter().sum::<u32>(), 365);
        assert_eq!(month_lengths(2000).iter().sum::<u32>(), 366);
    }

    #[test]
    fn pentads_cover_the_year() {
        assert_eq!(which_pentad(1, 1), Some(1));
        assert_eq!(which_pentad(1, 5), Some(1));
        assert_eq!(which_pentad(1, 6), Some(2));
        assert_eq!(which_pentad(12, 31), Some(73));
        assert_eq!(which_pentad(13, 1), None);
        assert_eq!(which_pentad(4, 31), None);
    }

    #[test]
    fn leap_day_folds_into_pentad_12() {
        assert_eq!(which_pentad(2, 25), Some(12));
        assert_eq!(which_pentad(2, 29), Some(12));
        assert_eq!(which_pentad(3, 1), Some(12));
        assert_eq!(which_pentad(3, 2), Some(13));
    }

    #[test]
    fn pentad_round_trip() {
        for p in 1..=73 {
            let (m, d) = pentad_to_month_day(p).unwrap();
            assert_eq!(which_pentad(m, d), Some(p));
        }
        assert_eq!(pentad_to_month_day(0), None);
        assert_eq!(pentad_to_month_day(74), None);
    }

    #[test]
    fn julian_day_reference_epochs() {
        assert_eq!(julian_day_number(2000, 1, 1), Some(2_451_545));
        assert_eq!(julian_day_number(1970, 1, 1), Some(2_440_588));
        assert_eq!(julian_day_number(1970, 2, 30), None);
    }

    #[test]
    fn time_differences() {
        let td = time_difference(
            Some(2001),
            Some(1),
            Some(1),
            Some(0.0),
            Some(2001),
            Some(1),
            Some(2),
            Some(6.5),
        );
        assert_eq!(td, Some(30.5));
        let td = time_difference(
            Some(2001),
            Some(1),
            Some(2),
            Some(6.5),
            Some(2001),
            Some(1),
            Some(1),
            Some(0.0),
        );
        assert_eq!(td, Some(-30.5));
        let td = time_difference(
            None,
            Some(1),
            Some(1),
            Some(0.0),
            Some(2001),
            Some(1),
            Some(2),
            Some(6.5),
        );
        assert_eq!(td, None);
    }

    #[test]
    fn knots_conversion_is_exact() {
        assert_eq!(knots_to_kmh(1.0), 1.852);
        assert!((kmh_to_knots(knots_to_kmh(8.5)) - 8.5).abs() < 1e-12);
    }
}
