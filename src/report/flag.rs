//! QC flag bookkeeping.
//!
//! Flags are small integers keyed by (category, check name):
//! 0 = pass, 1 = fail, 2 = untestable, 3 = untested,
//! 4..=9 graded posterior from the Bayesian buddy check,
//! 9 doubles as "never set".

use std::collections::BTreeMap;
use strum_macros::{Display, EnumIter, EnumString};

/// Value returned for a flag that was never stored.
pub const FLAG_UNSET: u8 = 9;

/// The general QC area a flag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Display, EnumString, EnumIter)]
pub enum QcCategory {
    #[strum(serialize = "POS")]
    Position,
    #[strum(serialize = "SST")]
    Sst,
    #[strum(serialize = "AT")]
    At,
    #[strum(serialize = "AT2")]
    At2,
    #[strum(serialize = "DPT")]
    Dpt,
    #[strum(serialize = "SLP")]
    Slp,
    #[strum(serialize = "W")]
    Wind,
    #[strum(serialize = "D")]
    Direction,
}

/// Named QC checks. The text forms keep the historical flag names so
/// downstream consumers of flag tables keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Display, EnumString, EnumIter)]
pub enum QcCheck {
    #[strum(serialize = "day")]
    Day,
    #[strum(serialize = "date")]
    Date,
    #[strum(serialize = "time")]
    Time,
    #[strum(serialize = "pos")]
    Position,
    #[strum(serialize = "blklst")]
    Blacklist,
    #[strum(serialize = "trk")]
    Track,
    #[strum(serialize = "few")]
    FewObs,
    #[strum(serialize = "iquam_track")]
    IquamTrack,
    #[strum(serialize = "isship")]
    IsShip,
    #[strum(serialize = "isbuoy")]
    IsBuoy,
    #[strum(serialize = "isdrifter")]
    IsDrifter,
    #[strum(serialize = "is780")]
    IsDeck780,
    #[strum(serialize = "month_match")]
    MonthMatch,
    #[strum(serialize = "noval")]
    NoValue,
    #[strum(serialize = "clim")]
    Climatology,
    #[strum(serialize = "nonorm")]
    NoNormal,
    #[strum(serialize = "hardlimit")]
    HardLimit,
    #[strum(serialize = "freez")]
    Freeze,
    #[strum(serialize = "ssat")]
    Supersaturation,
    #[strum(serialize = "consistency")]
    WindConsistency,
    #[strum(serialize = "mat_blacklist")]
    MatBlacklist,
    #[strum(serialize = "hum_blacklist")]
    HumidityBlacklist,
    #[strum(serialize = "wind_blacklist")]
    WindBlacklist,
    #[strum(serialize = "spike")]
    Spike,
    #[strum(serialize = "rep")]
    RepeatedValue,
    #[strum(serialize = "repsat")]
    RepeatedSaturation,
    #[strum(serialize = "round")]
    RoundedValue,
    #[strum(serialize = "bud")]
    Buddy,
    #[strum(serialize = "bbud")]
    BayesianBuddy,
    #[strum(serialize = "drf_agr")]
    Aground,
    #[strum(serialize = "drf_spd")]
    DriftSpeed,
    #[strum(serialize = "drf_tail1")]
    TailStart,
    #[strum(serialize = "drf_tail2")]
    TailEnd,
    #[strum(serialize = "drf_bias")]
    DriftBias,
    #[strum(serialize = "drf_noise")]
    DriftNoise,
    #[strum(serialize = "drf_short")]
    DriftShort,
}

/// Outcome of a single QC predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QcOutcome {
    Pass,
    Fail,
    Untestable,
}

impl QcOutcome {
    /// Conventional flag code: 0 pass, 1 fail, 2 untestable.
    pub fn code(self) -> u8 {
        match self {
            Self::Pass => 0,
            Self::Fail => 1,
            Self::Untestable => 2,
        }
    }

    /// Fail when the condition holds, pass otherwise.
    pub fn fail_if(condition: bool) -> Self {
        if condition {
            Self::Fail
        } else {
            Self::Pass
        }
    }
}

/// Per-report flag storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagTable {
    flags: BTreeMap<(QcCategory, QcCheck), u8>,
}

impl FlagTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a flag value, saturating at 9.
    pub fn set(&mut self, category: QcCategory, check: QcCheck, value: u8) {
        self.flags.insert((category, check), value.min(FLAG_UNSET));
    }

    pub fn set_outcome(&mut self, category: QcCategory, check: QcCheck, outcome: QcOutcome) {
        self.set(category, check, outcome.code());
    }

    /// Returns the stored flag, or 9 when the check never ran.
    pub fn get(&self, category: QcCategory, check: QcCheck) -> u8 {
        self.flags.get(&(category, check)).copied().unwrap_or(FLAG_UNSET)
    }

    pub fn iter(&self) -> impl Iterator<Item = (QcCategory, QcCheck, u8)> + '_ {
        self.flags.iter().map(|(&(cat, chk), &v)| (cat, chk, v))
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn unset_flags_read_as_nine() {
        let table = FlagTable::new();
        assert_eq!(table.get(QcCategory::Sst, QcCheck::Buddy), FLAG_UNSET);
    }

    #[test]
    fn set_and_get() {
        let mut table = FlagTable::new();
        table.set_outcome(QcCategory::Position, QcCheck::Date, QcOutcome::Fail);
        assert_eq!(table.get(QcCategory::Position, QcCheck::Date), 1);
        table.set(QcCategory::Sst, QcCheck::BayesianBuddy, 7);
        assert_eq!(table.get(QcCategory::Sst, QcCheck::BayesianBuddy), 7);
        // out-of-range values saturate instead of corrupting the table
        table.set(QcCategory::Sst, QcCheck::BayesianBuddy, 42);
        assert_eq!(table.get(QcCategory::Sst, QcCheck::BayesianBuddy), 9);
    }

    #[test]
    fn historical_names_round_trip() {
        assert_eq!(QcCheck::Blacklist.to_string(), "blklst");
        assert_eq!(QcCheck::from_str("drf_agr"), Ok(QcCheck::Aground));
        assert_eq!(QcCategory::Position.to_string(), "POS");
        assert_eq!(QcCategory::from_str("W"), Ok(QcCategory::Wind));
    }

    #[test]
    fn outcome_codes() {
        assert_eq!(QcOutcome::Pass.code(), 0);
        assert_eq!(QcOutcome::Fail.code(), 1);
        assert_eq!(QcOutcome::Untestable.code(), 2);
        assert_eq!(QcOutcome::fail_if(true), QcOutcome::Fail);
        assert_eq!(QcOutcome::fail_if(false), QcOutcome::Pass);
    }
}
