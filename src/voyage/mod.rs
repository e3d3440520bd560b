//! Voyages: the reports of one platform in time order.
//!
//! A [Voyage] owns its reports. After [Voyage::sort] and
//! [Voyage::derive_kinematics] it also carries, per report, the segment
//! from its predecessor (distance, course, time difference, speed) and
//! the alternate segment spanning its two neighbours. Track-level
//! checks live in the submodules.

pub mod iquam;
pub mod runs;
pub mod track;

use crate::errors::VoyageError;
use crate::report::flag::{QcCategory, QcCheck};
use crate::report::{filter::QcFilter, Report};
use crate::sphere;
use crate::units;
use std::collections::HashMap;

/// Derived kinematics of one segment. The first report of a voyage has
/// an all-missing segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Segment {
    /// km/h
    pub speed: Option<f64>,
    /// km
    pub distance: Option<f64>,
    /// Initial great-circle course at the earlier point, degrees
    pub course: Option<f64>,
    /// Hours
    pub time_diff: Option<f64>,
}

/// Motion between an arbitrary ordered pair of reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairMotion {
    pub speed: f64,
    pub distance: f64,
    pub course: f64,
    pub time_diff: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Voyage {
    reps: Vec<Report>,
    segments: Vec<Segment>,
    alternates: Vec<Segment>,
    /// Hours since the first report, cumulative
    hours: Vec<f64>,
    lats: Vec<f64>,
    lons: Vec<f64>,
    derived: bool,
}

impl Voyage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_reports(reps: Vec<Report>) -> Self {
        Self {
            reps,
            ..Self::default()
        }
    }

    pub fn push(&mut self, rep: Report) {
        self.reps.push(rep);
        self.derived = false;
    }

    pub fn len(&self) -> usize {
        self.reps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reps.is_empty()
    }

    pub fn get(&self, index: usize) -> &Report {
        &self.reps[index]
    }

    pub fn reports(&self) -> &[Report] {
        &self.reps
    }

    pub fn reports_mut(&mut self) -> &mut [Report] {
        &mut self.reps
    }

    pub fn into_reports(self) -> Vec<Report> {
        self.reps
    }

    /// Platform id of the voyage, from its first report.
    pub fn id(&self) -> &str {
        self.reps.first().map(|r| r.id()).unwrap_or("")
    }

    /// True when the platform is a moored or drifting buoy.
    pub fn is_buoy(&self) -> bool {
        matches!(self.reps.first().and_then(|r| r.platform_type()), Some(6) | Some(7))
    }

    /// True when the platform is a drifting buoy.
    pub fn is_drifter(&self) -> bool {
        self.reps.first().and_then(|r| r.platform_type()) == Some(7)
    }

    pub(crate) fn set_flag_all(&mut self, category: QcCategory, check: QcCheck, value: u8) {
        for rep in &mut self.reps {
            rep.set_flag(category, check, value);
        }
    }

    /// Sorts the reports into time order.
    pub fn sort(&mut self) {
        self.reps.sort();
        self.derived = false;
    }

    /// Motion of the pair (from, to): distance, course at `from`,
    /// signed time difference and speed. An identical-timestamp pair
    /// degenerates to speed = distance over a zero time difference.
    pub fn pair_motion(&self, from: usize, to: usize) -> Result<PairMotion, VoyageError> {
        let a = &self.reps[from];
        let b = &self.reps[to];
        let (lat1, lon1) = (
            a.latitude().ok_or(VoyageError::MissingPosition(from))?,
            a.longitude().ok_or(VoyageError::MissingPosition(from))?,
        );
        let (lat2, lon2) = (
            b.latitude().ok_or(VoyageError::MissingPosition(to))?,
            b.longitude().ok_or(VoyageError::MissingPosition(to))?,
        );
        let distance = sphere::sphere_distance(lat1, lon1, lat2, lon2)
            .map_err(|_| VoyageError::MissingPosition(from))?;
        let course = sphere::course_between(lat1, lon1, lat2, lon2)
            .map_err(|_| VoyageError::MissingPosition(from))?;
        let time_diff = units::time_difference(
            a.year(),
            a.month(),
            a.day(),
            a.hour(),
            b.year(),
            b.month(),
            b.day(),
            b.hour(),
        );
        let (speed, time_diff) = match time_diff {
            Some(td) if td != 0.0 => (distance / td, td),
            _ => (distance, 0.0),
        };
        Ok(PairMotion {
            speed,
            distance,
            course,
            time_diff,
        })
    }

    /// Computes segment and alternate-segment kinematics, plus the
    /// cached position and cumulative-hour series the drifter checks
    /// work on. The voyage must already be sorted.
    pub fn derive_kinematics(&mut self) -> Result<(), VoyageError> {
        let n = self.reps.len();
        self.lats.clear();
        self.lons.clear();
        self.hours.clear();

        for (i, rep) in self.reps.iter().enumerate() {
            if !rep.timestamp_is_valid() {
                return Err(VoyageError::MissingTimestamp(i));
            }
            let lat = rep.latitude().filter(|v| v.is_finite());
            let lon = rep.longitude().filter(|v| v.is_finite());
            self.lats.push(lat.ok_or(VoyageError::MissingPosition(i))?);
            self.lons.push(lon.ok_or(VoyageError::MissingPosition(i))?);
        }

        self.segments = vec![Segment::default(); n];
        self.alternates = vec![Segment::default(); n];
        self.hours = vec![0.0; n];

        for i in 1..n {
            let m = self.pair_motion(i - 1, i)?;
            if m.time_diff < 0.0 {
                return Err(VoyageError::NonMonotonicTime(i));
            }
            self.segments[i] = Segment {
                speed: Some(m.speed),
                distance: Some(m.distance),
                course: Some(m.course),
                time_diff: Some(m.time_diff),
            };
            self.hours[i] = self.hours[i - 1] + m.time_diff;
        }
        for i in 1..n.saturating_sub(1) {
            let m = self.pair_motion(i - 1, i + 1)?;
            self.alternates[i] = Segment {
                speed: Some(m.speed),
                distance: Some(m.distance),
                course: Some(m.course),
                time_diff: Some(m.time_diff),
            };
        }
        self.derived = true;
        Ok(())
    }

    pub fn kinematics_derived(&self) -> bool {
        self.derived
    }

    /// Segment from the previous report.
    pub fn segment(&self, index: usize) -> Segment {
        self.segments.get(index).copied().unwrap_or_default()
    }

    /// Alternate segment spanning the two neighbouring reports.
    pub fn alternate(&self, index: usize) -> Segment {
        self.alternates.get(index).copied().unwrap_or_default()
    }

    /// Segment speeds for the whole voyage, km/h.
    pub fn speeds(&self) -> Vec<Option<f64>> {
        self.segments.iter().map(|s| s.speed).collect()
    }

    /// Hours since the first report.
    pub(crate) fn hours(&self) -> &[f64] {
        &self.hours
    }

    pub(crate) fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub(crate) fn lons(&self) -> &[f64] {
        &self.lons
    }
}

/// An unordered batch of reports, indexable by platform.
///
/// The name is ICOADS terminology: a literal deck of punched cards,
/// each carrying one report.
#[derive(Debug, Clone, Default)]
pub struct Deck {
    reports: Vec<Report>,
}

impl Deck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rep: Report) {
        self.reports.push(rep);
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn reports_mut(&mut self) -> &mut [Report] {
        &mut self.reports
    }

    pub fn into_reports(self) -> Vec<Report> {
        self.reports
    }

    /// Sorts into (id, time) order.
    pub fn sort(&mut self) {
        self.reports.sort();
    }

    /// Moves every report passing the filter into per-platform voyages,
    /// keyed in first-seen order. Reports failing the filter stay put.
    pub fn extract_voyages(&mut self, filter: &QcFilter) -> Vec<Voyage> {
        let all = std::mem::take(&mut self.reports);
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Report>> = HashMap::new();

        for rep in all {
            if filter.passes(&rep) {
                let id = rep.id().to_string();
                groups
                    .entry(id.clone())
                    .or_insert_with(|| {
                        order.push(id);
                        Vec::new()
                    })
                    .push(rep);
            } else {
                self.reports.push(rep);
            }
        }

        order
            .into_iter()
            .filter_map(|id| groups.remove(&id))
            .map(Voyage::from_reports)
            .collect()
    }

    /// Returns voyage reports to the deck after track-level QC.
    pub fn absorb(&mut self, voyages: Vec<Voyage>) {
        for voyage in voyages {
            self.reports.extend(voyage.into_reports());
        }
    }

    /// Splits the deck, keeping reports that pass the filter and
    /// returning the rest.
    pub fn partition(&mut self, filter: &QcFilter) -> Deck {
        let all = std::mem::take(&mut self.reports);
        let (passes, fails) = filter.split(all);
        self.reports = passes;
        Deck { reports: fails }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::report::flag::QcOutcome;

    fn rep(id: &str, day: u32, hour: f64, lat: f64) -> Report {
        Report::new(id, format!("{id}-{day}-{hour}"))
            .with_date(1985, 6, day)
            .with_hour(hour)
            .with_position(lat, 0.0)
    }

    #[test]
    fn sort_then_derive() {
        let mut v = Voyage::new();
        v.push(rep("SHIP1", 1, 12.0, 1.0));
        v.push(rep("SHIP1", 1, 0.0, 0.0));
        v.sort();
        v.derive_kinematics().unwrap();

        assert_eq!(v.get(0).hour(), Some(0.0));
        let seg = v.segment(1);
        assert_eq!(seg.time_diff, Some(12.0));
        // one degree of latitude in 12 hours
        let speed = seg.speed.unwrap();
        assert!((speed - 111.195 / 12.0).abs() < 0.01, "speed {speed}");
        assert_eq!(v.hours(), &[0.0, 12.0]);
    }

    #[test]
    fn identical_times_degenerate_to_distance() {
        let mut v = Voyage::new();
        v.push(rep("SHIP1", 1, 6.0, 0.0));
        v.push(rep("SHIP1", 1, 6.0, 1.0));
        v.sort();
        v.derive_kinematics().unwrap();
        let seg = v.segment(1);
        assert_eq!(seg.time_diff, Some(0.0));
        assert_eq!(seg.speed, seg.distance);
    }

    #[test]
    fn missing_position_is_unprocessable() {
        let mut v = Voyage::new();
        v.push(rep("SHIP1", 1, 0.0, 0.0));
        let mut bad = rep("SHIP1", 1, 6.0, 1.0);
        bad.set_position(None, Some(0.0));
        v.push(bad);
        v.sort();
        assert_eq!(v.derive_kinematics(), Err(VoyageError::MissingPosition(1)));
    }

    #[test]
    fn invalid_timestamp_is_unprocessable() {
        let mut v = Voyage::new();
        let mut bad = rep("SHIP1", 1, 6.0, 1.0);
        bad.set_hour(None);
        v.push(bad);
        assert_eq!(v.derive_kinematics(), Err(VoyageError::MissingTimestamp(0)));
    }

    #[test]
    fn alternates_span_two_steps() {
        let mut v = Voyage::new();
        v.push(rep("SHIP1", 1, 0.0, 0.0));
        v.push(rep("SHIP1", 1, 6.0, 0.5));
        v.push(rep("SHIP1", 1, 12.0, 1.0));
        v.sort();
        v.derive_kinematics().unwrap();
        let alt = v.alternate(1);
        assert_eq!(alt.time_diff, Some(12.0));
        assert_eq!(v.alternate(0).time_diff, None);
        assert_eq!(v.alternate(2).time_diff, None);
    }

    #[test]
    fn deck_partitions_by_platform() {
        let mut deck = Deck::new();
        deck.push(rep("AAAA", 1, 0.0, 0.0));
        deck.push(rep("BBBB", 1, 0.0, 0.0));
        deck.push(rep("AAAA", 1, 6.0, 0.5));

        let voyages = deck.extract_voyages(&QcFilter::new());
        assert_eq!(voyages.len(), 2);
        assert_eq!(voyages[0].id(), "AAAA");
        assert_eq!(voyages[0].len(), 2);
        assert_eq!(voyages[1].id(), "BBBB");
        assert!(deck.is_empty());

        deck.absorb(voyages);
        assert_eq!(deck.len(), 3);
    }

    #[test]
    fn deck_extract_respects_filter() {
        let mut deck = Deck::new();
        let mut good = rep("AAAA", 1, 0.0, 0.0);
        good.set_outcome(QcCategory::Position, QcCheck::Date, QcOutcome::Pass);
        deck.push(good);
        deck.push(rep("BBBB", 1, 0.0, 0.0));

        let filt = QcFilter::new().require(QcCategory::Position, QcCheck::Date, 0);
        let voyages = deck.extract_voyages(&filt);
        assert_eq!(voyages.len(), 1);
        assert_eq!(voyages[0].id(), "AAAA");
        assert_eq!(deck.len(), 1);
    }
}
