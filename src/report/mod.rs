//! The per-observation record and its attached QC state.
//!
//! A [Report] owns the immutable identity and observed values of one
//! marine report, plus the mutable state QC accumulates around it:
//! attached climatological normals, derived humidity variables, a
//! background-field match and the flag table. Missing numbers are
//! `None` everywhere; zero is always a real value.

pub mod filter;
pub mod flag;

use crate::humidity;
use crate::observable::Observable;
use crate::units;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use flag::{FlagTable, QcCategory, QcCheck, QcOutcome};

/// Climatological normal attached to a report for one variable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Normal {
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
}

/// Background-field match attached to a report for the drifter checks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BackgroundMatch {
    /// Background SST, °C
    pub sst: Option<f64>,
    /// Background error variance, °C²
    pub error_variance: Option<f64>,
    /// Sea-ice fraction in [0, 1]
    pub ice: Option<f64>,
}

/// Observed and derived variable slots.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ObsValues {
    sst: Option<f64>,
    at: Option<f64>,
    at2: Option<f64>,
    dpt: Option<f64>,
    slp: Option<f64>,
    wind_speed: Option<f64>,
    wind_direction: Option<f64>,
    shu: Option<f64>,
    vap: Option<f64>,
    crh: Option<f64>,
    cwb: Option<f64>,
    dpd: Option<f64>,
    ds: Option<f64>,
    vs: Option<f64>,
}

impl ObsValues {
    fn get(&self, obs: Observable) -> Option<f64> {
        match obs {
            Observable::Sst => self.sst,
            Observable::At => self.at,
            Observable::At2 => self.at2,
            Observable::Dpt => self.dpt,
            Observable::Slp => self.slp,
            Observable::WindSpeed => self.wind_speed,
            Observable::WindDirection => self.wind_direction,
            Observable::Shu => self.shu,
            Observable::Vap => self.vap,
            Observable::Crh => self.crh,
            Observable::Cwb => self.cwb,
            Observable::Dpd => self.dpd,
            Observable::DirectionSector => self.ds,
            Observable::SpeedSector => self.vs,
        }
    }

    fn set(&mut self, obs: Observable, value: Option<f64>) {
        let slot = match obs {
            Observable::Sst => &mut self.sst,
            Observable::At => &mut self.at,
            Observable::At2 => &mut self.at2,
            Observable::Dpt => &mut self.dpt,
            Observable::Slp => &mut self.slp,
            Observable::WindSpeed => &mut self.wind_speed,
            Observable::WindDirection => &mut self.wind_direction,
            Observable::Shu => &mut self.shu,
            Observable::Vap => &mut self.vap,
            Observable::Crh => &mut self.crh,
            Observable::Cwb => &mut self.cwb,
            Observable::Dpd => &mut self.dpd,
            Observable::DirectionSector => &mut self.ds,
            Observable::SpeedSector => &mut self.vs,
        };
        *slot = value;
    }
}

/// One marine surface weather report.
#[derive(Debug, Clone, Default)]
pub struct Report {
    id: String,
    uid: String,
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    hour: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    deck: Option<u16>,
    source_id: Option<u16>,
    platform_type: Option<u8>,
    values: ObsValues,
    course_deg: Option<f64>,
    speed_kmh: Option<f64>,
    normals: BTreeMap<Observable, Normal>,
    background: Option<BackgroundMatch>,
    flags: FlagTable,
    timestamp: Option<NaiveDateTime>,
}

impl Report {
    pub fn new(id: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uid: uid.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn month(&self) -> Option<u32> {
        self.month
    }

    pub fn day(&self) -> Option<u32> {
        self.day
    }

    pub fn hour(&self) -> Option<f64> {
        self.hour
    }

    pub fn latitude(&self) -> Option<f64> {
        self.latitude
    }

    /// Longitude folded into [-180, 180].
    pub fn longitude(&self) -> Option<f64> {
        self.longitude.map(|lon| if lon > 180.0 { lon - 360.0 } else { lon })
    }

    /// Longitude exactly as reported, in (-180, 360].
    pub fn longitude_raw(&self) -> Option<f64> {
        self.longitude
    }

    pub fn deck(&self) -> Option<u16> {
        self.deck
    }

    pub fn source_id(&self) -> Option<u16> {
        self.source_id
    }

    pub fn platform_type(&self) -> Option<u8> {
        self.platform_type
    }

    pub fn set_date(&mut self, year: Option<i32>, month: Option<u32>, day: Option<u32>) {
        self.year = year;
        self.month = month;
        self.day = day;
        self.recompute_timestamp();
        self.recompute_motion();
    }

    pub fn set_hour(&mut self, hour: Option<f64>) {
        self.hour = hour;
        self.recompute_timestamp();
    }

    pub fn set_position(&mut self, latitude: Option<f64>, longitude: Option<f64>) {
        self.latitude = latitude;
        self.longitude = longitude;
    }

    pub fn value(&self, obs: Observable) -> Option<f64> {
        self.values.get(obs)
    }

    pub fn set_value(&mut self, obs: Observable, value: Option<f64>) {
        self.values.set(obs, value);
        if matches!(obs, Observable::DirectionSector | Observable::SpeedSector) {
            self.recompute_motion();
        }
    }

    /// Course made good derived from the reported direction sector,
    /// degrees in [0, 360).
    pub fn course_deg(&self) -> Option<f64> {
        self.course_deg
    }

    /// Reported speed derived from the speed sector, km/h.
    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed_kmh
    }

    /// Timestamp truncated to the minute, when Y/M/D/H form a real time.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamp
    }

    pub fn timestamp_is_valid(&self) -> bool {
        self.timestamp.is_some()
    }

    /// Civil date of the report, when valid.
    pub fn date(&self) -> Option<NaiveDate> {
        self.timestamp.map(|ts| ts.date())
    }

    fn recompute_timestamp(&mut self) {
        self.timestamp = (|| {
            let (y, m, d, h) = (self.year?, self.month?, self.day?, self.hour?);
            if !units::valid_hour(h) {
                return None;
            }
            let date = NaiveDate::from_ymd_opt(y, m, d)?;
            let hours = h.floor() as u32;
            let minutes = (60.0 * (h - h.floor())).floor() as u32;
            let time = NaiveTime::from_hms_opt(hours, minutes.min(59), 0)?;
            Some(NaiveDateTime::new(date, time))
        })();
    }

    /// Converts the reported direction and speed sectors to a course in
    /// degrees and a speed in km/h. The speed-sector scale changed with
    /// the 1968 data year.
    fn recompute_motion(&mut self) {
        self.course_deg = self.values.ds.map(|ds| ds.rem_euclid(360.0));
        self.speed_kmh = self.values.vs.map(|vs| {
            if vs == 0.0 {
                return 0.0;
            }
            let knots = match self.year {
                Some(y) if y < 1968 => vs * 3.0 - 1.0,
                _ => vs * 5.0 - 2.0,
            };
            units::knots_to_kmh(knots)
        });
    }

    pub fn attach_normal(&mut self, obs: Observable, mean: Option<f64>, stdev: Option<f64>) {
        self.normals.insert(obs, Normal { mean, stdev });
    }

    /// Climatological mean for the variable, when attached.
    pub fn norm(&self, obs: Observable) -> Option<f64> {
        self.normals.get(&obs).and_then(|n| n.mean)
    }

    /// Climatological standard deviation for the variable, when attached.
    pub fn norm_stdev(&self, obs: Observable) -> Option<f64> {
        self.normals.get(&obs).and_then(|n| n.stdev)
    }

    /// Observation minus climatological mean.
    pub fn anomaly(&self, obs: Observable) -> Option<f64> {
        Some(self.value(obs)? - self.norm(obs)?)
    }

    /// Anomaly divided by the climatological standard deviation.
    pub fn standardised_anomaly(&self, obs: Observable) -> Option<f64> {
        let stdev = self.norm_stdev(obs)?;
        if stdev == 0.0 {
            return None;
        }
        Some(self.anomaly(obs)? / stdev)
    }

    /// Derives the five humidity variables from the observed dew point
    /// and air temperature using the attached climatological sea-level
    /// pressure. All five are set missing unless the whole set is
    /// plausible.
    pub fn calculate_humidity(&mut self) {
        let derived = humidity::derive(
            self.value(Observable::Dpt),
            self.value(Observable::At),
            self.norm(Observable::Slp),
        );
        self.values.shu = derived.map(|d| d.shu);
        self.values.vap = derived.map(|d| d.vap);
        self.values.crh = derived.map(|d| d.crh);
        self.values.cwb = derived.map(|d| d.cwb);
        self.values.dpd = derived.map(|d| d.dpd);
    }

    pub fn set_background(&mut self, background: BackgroundMatch) {
        self.background = Some(background);
    }

    pub fn background(&self) -> Option<&BackgroundMatch> {
        self.background.as_ref()
    }

    pub fn set_flag(&mut self, category: QcCategory, check: QcCheck, value: u8) {
        self.flags.set(category, check, value);
    }

    pub fn set_outcome(&mut self, category: QcCategory, check: QcCheck, outcome: QcOutcome) {
        self.flags.set_outcome(category, check, outcome);
    }

    /// Stored flag value, or 9 when the check never ran.
    pub fn flag(&self, category: QcCategory, check: QcCheck) -> u8 {
        self.flags.get(category, check)
    }

    pub fn flags(&self) -> &FlagTable {
        &self.flags
    }

    /// True when the air is saturated: dew point equals air temperature.
    pub fn saturated(&self) -> bool {
        match (self.value(Observable::Dpt), self.value(Observable::At)) {
            (Some(dpt), Some(at)) => dpt == at,
            _ => false,
        }
    }

    fn sort_key(&self) -> (&str, Option<NaiveDateTime>, Option<u64>) {
        // the decimal hour breaks ties between reports sharing the same
        // truncated minute, keeping segment time differences non-negative
        (&self.id, self.timestamp, self.hour.map(f64::to_bits))
    }

    pub fn with_date(&self, year: i32, month: u32, day: u32) -> Self {
        let mut s = self.clone();
        s.set_date(Some(year), Some(month), Some(day));
        s
    }

    pub fn with_hour(&self, hour: f64) -> Self {
        let mut s = self.clone();
        s.set_hour(Some(hour));
        s
    }

    pub fn with_position(&self, latitude: f64, longitude: f64) -> Self {
        let mut s = self.clone();
        s.set_position(Some(latitude), Some(longitude));
        s
    }

    pub fn with_deck(&self, deck: u16) -> Self {
        let mut s = self.clone();
        s.deck = Some(deck);
        s
    }

    pub fn with_source_id(&self, source_id: u16) -> Self {
        let mut s = self.clone();
        s.source_id = Some(source_id);
        s
    }

    pub fn with_platform_type(&self, platform_type: u8) -> Self {
        let mut s = self.clone();
        s.platform_type = Some(platform_type);
        s
    }

    pub fn with_value(&self, obs: Observable, value: f64) -> Self {
        let mut s = self.clone();
        s.set_value(obs, Some(value));
        s
    }
}

impl PartialEq for Report {
    /// Two reports are equal when they share a platform id and a
    /// timestamp.
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for Report {}

impl PartialOrd for Report {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Report {
    /// Reports order by platform id, then by time.
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}
