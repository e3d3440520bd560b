//! Observed and derived physical variables carried by a report.

use crate::report::flag::QcCategory;
use strum_macros::{Display, EnumIter, EnumString};

/// A variable tag. Each report stores at most one optional value per tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Display, EnumString, EnumIter)]
pub enum Observable {
    /// Sea-surface temperature, °C
    #[strum(serialize = "sst")]
    Sst,
    /// Air temperature, °C
    #[strum(serialize = "at")]
    At,
    /// Air temperature copy used by the humidity processing, °C
    #[strum(serialize = "at2")]
    At2,
    /// Dew-point temperature, °C
    #[strum(serialize = "dpt")]
    Dpt,
    /// Sea-level pressure, hPa
    #[strum(serialize = "slp")]
    Slp,
    /// Wind speed, m/s
    #[strum(serialize = "wind_speed")]
    WindSpeed,
    /// Wind direction, degrees
    #[strum(serialize = "wind_direction")]
    WindDirection,
    /// Specific humidity, g/kg (derived)
    #[strum(serialize = "shu")]
    Shu,
    /// Vapour pressure, hPa (derived)
    #[strum(serialize = "vap")]
    Vap,
    /// Relative humidity, % (derived)
    #[strum(serialize = "crh")]
    Crh,
    /// Wet-bulb temperature, °C (derived)
    #[strum(serialize = "cwb")]
    Cwb,
    /// Dew-point depression, K (derived)
    #[strum(serialize = "dpd")]
    Dpd,
    /// Reported direction sector, degrees
    #[strum(serialize = "ds")]
    DirectionSector,
    /// Reported speed sector code
    #[strum(serialize = "vs")]
    SpeedSector,
}

impl Observable {
    /// The QC flag category this variable reports under, when it has one.
    pub fn category(self) -> Option<QcCategory> {
        match self {
            Self::Sst => Some(QcCategory::Sst),
            Self::At => Some(QcCategory::At),
            Self::At2 => Some(QcCategory::At2),
            Self::Dpt => Some(QcCategory::Dpt),
            Self::Slp => Some(QcCategory::Slp),
            Self::WindSpeed => Some(QcCategory::Wind),
            Self::WindDirection => Some(QcCategory::Direction),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn text_forms() {
        assert_eq!(Observable::Sst.to_string(), "sst");
        assert_eq!(Observable::WindSpeed.to_string(), "wind_speed");
        assert_eq!(Observable::from_str("dpt"), Ok(Observable::Dpt));
        assert!(Observable::from_str("xyz").is_err());
    }

    #[test]
    fn derived_variables_have_no_category() {
        assert_eq!(Observable::Shu.category(), None);
        assert_eq!(Observable::Sst.category(), Some(QcCategory::Sst));
    }
}
