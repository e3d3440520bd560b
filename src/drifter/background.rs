//! Background-field access for the drifter checks.
//!
//! The engine consumes the [BackgroundField] trait and copies a match
//! onto each report; the drifter checks only ever read the attached
//! [BackgroundMatch](crate::report::BackgroundMatch).

use crate::report::{BackgroundMatch, Report};
use chrono::NaiveDate;

/// A daily background analysis (SST, its error variance and the sea-ice
/// fraction). The interface is total: anything unanswerable is `None`.
pub trait BackgroundField: Send + Sync {
    /// Background SST in °C.
    fn sst(&self, lat: f64, lon: f64, date: NaiveDate) -> Option<f64>;
    /// Background error variance in °C².
    fn error_variance(&self, lat: f64, lon: f64, date: NaiveDate) -> Option<f64>;
    /// Sea-ice fraction in [0, 1].
    fn ice_fraction(&self, lat: f64, lon: f64, date: NaiveDate) -> Option<f64>;
}

/// Looks the report's position and date up in the background field and
/// attaches the match. Reports without a usable position or date get an
/// all-missing match.
pub fn attach_background(report: &mut Report, field: &dyn BackgroundField) {
    let matched = match (report.latitude(), report.longitude(), report.date()) {
        (Some(lat), Some(lon), Some(date)) => BackgroundMatch {
            sst: field.sst(lat, lon, date),
            error_variance: field.error_variance(lat, lon, date),
            ice: field.ice_fraction(lat, lon, date),
        },
        _ => BackgroundMatch::default(),
    };
    report.set_background(matched);
}

/// A uniform background, mostly useful in tests and calibration runs.
#[derive(Debug, Clone, Copy)]
pub struct UniformBackground {
    pub sst: f64,
    pub error_variance: f64,
    pub ice: f64,
}

impl BackgroundField for UniformBackground {
    fn sst(&self, _lat: f64, _lon: f64, _date: NaiveDate) -> Option<f64> {
        Some(self.sst)
    }

    fn error_variance(&self, _lat: f64, _lon: f64, _date: NaiveDate) -> Option<f64> {
        Some(self.error_variance)
    }

    fn ice_fraction(&self, _lat: f64, _lon: f64, _date: NaiveDate) -> Option<f64> {
        Some(self.ice)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn attachment_requires_position_and_date() {
        let field = UniformBackground {
            sst: 18.0,
            error_variance: 0.1,
            ice: 0.0,
        };

        let mut rep = Report::new("53901    ", "u1")
            .with_date(1995, 3, 4)
            .with_hour(2.0)
            .with_position(10.0, 10.0);
        attach_background(&mut rep, &field);
        assert_eq!(rep.background().unwrap().sst, Some(18.0));

        let mut rep = Report::new("53901    ", "u2").with_hour(2.0);
        attach_background(&mut rep, &field);
        assert_eq!(rep.background().unwrap().sst, None);
    }
}
