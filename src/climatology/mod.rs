//! Climatology access.
//!
//! The engine only ever sees the [ClimatologyField] trait: a total
//! lookup keyed by position and calendar day that yields `None` for
//! anything it cannot answer. The bundled [GriddedField] implements the
//! legacy nearest-neighbour lookup on a 1°x1° grid with a single,
//! pentad or daily time axis. A [ClimatologyLibrary] holds the named
//! fields an engine instance is bound to.

use crate::buddy::{lat_to_yindex, lon_to_xindex};
use crate::constants::Grid;
use crate::observable::Observable;
use crate::units;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A read-only climatological field. Implementations never fail:
/// out-of-range coordinates and missing cells both surface as `None`.
pub trait ClimatologyField: Send + Sync {
    /// Field value for the given position and calendar day.
    fn value(&self, lat: f64, lon: f64, month: u32, day: u32) -> Option<f64>;
}

/// Names of the fields an engine can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClimField {
    /// Climatological mean of a variable
    Mean(Observable),
    /// Climatological standard deviation of a variable
    Stdev(Observable),
    /// Stdev of the difference between a grid cell and the full
    /// neighbour average (Bayesian buddy)
    BuddyOneBoxToBuddyAvg,
    /// Stdev of the difference between one observation and its grid
    /// cell average (Bayesian buddy)
    BuddyOneObToBoxAvg,
    /// Uncertainty of the neighbour average itself (Bayesian buddy)
    BuddyAvgSampling,
}

/// Temporal indexing of a [GriddedField].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAxis {
    /// One field for the whole year
    Single,
    /// 73 pentads
    Pentad,
    /// 365 days, with February 29th folded onto the 28th
    Daily,
}

impl TimeAxis {
    fn len(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Pentad => Grid::N_PENTADS,
            Self::Daily => 365,
        }
    }

    fn index(self, month: u32, day: u32) -> Option<usize> {
        match self {
            Self::Single => Some(0),
            Self::Pentad => Some(units::which_pentad(month, day)? as usize - 1),
            Self::Daily => {
                units::which_pentad(month, day)?; // validates the calendar day
                let day = if month == 2 && day == 29 { 28 } else { day };
                Some(units::day_in_year(2001, month, day)? as usize - 1)
            },
        }
    }
}

/// 1°x1° gridded field with nearest-neighbour spatial lookup.
/// Cells default to missing.
#[derive(Debug, Clone)]
pub struct GriddedField {
    axis: TimeAxis,
    data: Vec<f64>,
}

impl GriddedField {
    pub fn new(axis: TimeAxis) -> Self {
        Self {
            axis,
            data: vec![f64::NAN; axis.len() * Grid::N_LAT * Grid::N_LON],
        }
    }

    /// A field holding the same value everywhere.
    pub fn filled(axis: TimeAxis, value: f64) -> Self {
        Self {
            axis,
            data: vec![value; axis.len() * Grid::N_LAT * Grid::N_LON],
        }
    }

    fn index(&self, lat: f64, lon: f64, month: u32, day: u32) -> Option<usize> {
        if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat) || !(-180.0..=360.0).contains(&lon) {
            return None;
        }
        let t = self.axis.index(month, day)?;
        let y = lat_to_yindex(lat);
        let x = lon_to_xindex(lon);
        Some((t * Grid::N_LAT + y) * Grid::N_LON + x)
    }

    /// Stores a value in the cell containing the given position and day.
    pub fn set(&mut self, lat: f64, lon: f64, month: u32, day: u32, value: f64) {
        if let Some(i) = self.index(lat, lon, month, day) {
            self.data[i] = value;
        }
    }
}

impl ClimatologyField for GriddedField {
    fn value(&self, lat: f64, lon: f64, month: u32, day: u32) -> Option<f64> {
        let v = self.data[self.index(lat, lon, month, day)?];
        if v.is_nan() {
            None
        } else {
            Some(v)
        }
    }
}

/// A field that is a single scalar, everywhere and always.
#[derive(Debug, Clone, Copy)]
pub struct ScalarField(pub f64);

impl ClimatologyField for ScalarField {
    fn value(&self, lat: f64, lon: f64, month: u32, day: u32) -> Option<f64> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=360.0).contains(&lon) {
            return None;
        }
        units::which_pentad(month, day)?;
        Some(self.0)
    }
}

/// Named collection of shared climatology fields.
#[derive(Default, Clone)]
pub struct ClimatologyLibrary {
    fields: BTreeMap<ClimField, Arc<dyn ClimatologyField>>,
}

impl ClimatologyLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a field under the given name, replacing any previous one.
    pub fn bind(&mut self, name: ClimField, field: Arc<dyn ClimatologyField>) {
        self.fields.insert(name, field);
    }

    pub fn get(&self, name: ClimField) -> Option<&Arc<dyn ClimatologyField>> {
        self.fields.get(&name)
    }

    /// Looks up a bound field, `None` when the field is unbound or has
    /// no data for the point.
    pub fn value(&self, name: ClimField, lat: f64, lon: f64, month: u32, day: u32) -> Option<f64> {
        self.fields.get(&name)?.value(lat, lon, month, day)
    }

    /// Climatological mean of a variable at a point.
    pub fn mean(&self, var: Observable, lat: f64, lon: f64, month: u32, day: u32) -> Option<f64> {
        self.value(ClimField::Mean(var), lat, lon, month, day)
    }

    /// Climatological standard deviation of a variable at a point.
    pub fn stdev(&self, var: Observable, lat: f64, lon: f64, month: u32, day: u32) -> Option<f64> {
        self.value(ClimField::Stdev(var), lat, lon, month, day)
    }

    pub fn is_bound(&self, name: ClimField) -> bool {
        self.fields.contains_key(&name)
    }
}

impl std::fmt::Debug for ClimatologyLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClimatologyLibrary")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lookup_is_nearest_neighbour() {
        let mut field = GriddedField::new(TimeAxis::Pentad);
        field.set(0.5, 0.5, 6, 10, 21.5);
        // anywhere within the same 1 degree cell and pentad
        assert_eq!(field.value(0.9, 0.1, 6, 11), Some(21.5));
        assert_eq!(field.value(1.5, 0.5, 6, 10), None);
    }

    #[test]
    fn out_of_range_is_missing_not_an_error() {
        let field = GriddedField::filled(TimeAxis::Single, 1.0);
        assert_eq!(field.value(91.0, 0.0, 1, 1), None);
        assert_eq!(field.value(0.0, 400.0, 1, 1), None);
        assert_eq!(field.value(0.0, 0.0, 13, 1), None);
        assert_eq!(field.value(0.0, 0.0, 2, 30), None);
        assert_eq!(field.value(0.0, 0.0, 1, 1), Some(1.0));
    }

    #[test]
    fn daily_axis_folds_leap_day() {
        let mut field = GriddedField::new(TimeAxis::Daily);
        field.set(10.5, 10.5, 2, 28, 3.25);
        assert_eq!(field.value(10.5, 10.5, 2, 29), Some(3.25));
        assert_eq!(field.value(10.5, 10.5, 3, 1), None);
    }

    #[test]
    fn library_binds_and_answers() {
        let mut lib = ClimatologyLibrary::new();
        assert!(!lib.is_bound(ClimField::Mean(Observable::Sst)));
        lib.bind(
            ClimField::Mean(Observable::Sst),
            Arc::new(ScalarField(18.0)),
        );
        assert_eq!(lib.value(ClimField::Mean(Observable::Sst), 0.0, 0.0, 1, 1), Some(18.0));
        assert_eq!(lib.value(ClimField::Stdev(Observable::Sst), 0.0, 0.0, 1, 1), None);
    }
}
