//! Humidity variables derived from dew point, air temperature and
//! sea-level pressure.
//!
//! Vapour pressure follows the Buck (1981) Magnus-type fit, branching
//! between the water and ice curves on the sign of the dew point, with
//! the pressure ("enhancement") correction applied. The remaining
//! variables derive from it. All inputs in °C / hPa, outputs rounded to
//! one decimal as in the historical processing.

/// The five derived humidity variables, produced atomically: either the
/// whole set is available or none of it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedHumidity {
    /// Specific humidity, g/kg
    pub shu: f64,
    /// Vapour pressure, hPa
    pub vap: f64,
    /// Relative humidity, %
    pub crh: f64,
    /// Wet-bulb temperature, °C
    pub cwb: f64,
    /// Dew-point depression, K
    pub dpd: f64,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Pressure enhancement factor for moist air.
fn enhancement(pressure: f64) -> f64 {
    1.0 + 7.0e-4 + 3.46e-6 * pressure
}

/// Unrounded vapour pressure at the given dew point.
fn vapour_pressure(dewpoint: f64, pressure: f64) -> f64 {
    let f = enhancement(pressure);
    if dewpoint >= 0.0 {
        6.1121 * f * (((18.729 - dewpoint / 227.3) * dewpoint) / (257.87 + dewpoint)).exp()
    } else {
        6.1115 * f * (((23.036 - dewpoint / 333.7) * dewpoint) / (279.82 + dewpoint)).exp()
    }
}

/// Vapour pressure in hPa, rounded to 0.1.
pub fn vap(dewpoint: Option<f64>, air_temperature: Option<f64>, pressure: Option<f64>) -> Option<f64> {
    let (td, _t, p) = (dewpoint?, air_temperature?, pressure?);
    Some(round1(vapour_pressure(td, p)))
}

/// Specific humidity in g/kg.
pub fn sh(dewpoint: Option<f64>, air_temperature: Option<f64>, pressure: Option<f64>) -> Option<f64> {
    let (td, _t, p) = (dewpoint?, air_temperature?, pressure?);
    let e = vapour_pressure(td, p);
    Some(round1(622.0 * e / (p - 0.378 * e)))
}

/// Relative humidity in percent: vapour pressure at the dew point over
/// saturation vapour pressure at the air temperature.
pub fn rh(dewpoint: Option<f64>, air_temperature: Option<f64>, pressure: Option<f64>) -> Option<f64> {
    let (td, t, p) = (dewpoint?, air_temperature?, pressure?);
    let e = vapour_pressure(td, p);
    let e_sat = vapour_pressure(t, p);
    Some(round1(100.0 * e / e_sat))
}

/// Wet-bulb temperature in °C from the psychrometric balance.
pub fn wb(dewpoint: Option<f64>, air_temperature: Option<f64>, pressure: Option<f64>) -> Option<f64> {
    let (td, t, p) = (dewpoint?, air_temperature?, pressure?);
    let e = vapour_pressure(td, p);
    let a = 0.000066 * p;
    let b = 409.8 * e / ((td + 237.3) * (td + 237.3));
    Some(round1((a * t + b * td) / (a + b)))
}

/// Dew-point depression in K.
pub fn dpd(dewpoint: Option<f64>, air_temperature: Option<f64>) -> Option<f64> {
    let (td, t) = (dewpoint?, air_temperature?);
    Some(round1(t - td))
}

/// Derive the full humidity set from the observed dew point and air
/// temperature, using the climatological sea-level pressure.
///
/// Returns None, meaning every derived variable is missing, when any
/// input is missing or the derived relative humidity falls outside the
/// plausible [0, 150] % range.
pub fn derive(
    dewpoint: Option<f64>,
    air_temperature: Option<f64>,
    climatological_slp: Option<f64>,
) -> Option<DerivedHumidity> {
    let shu = sh(dewpoint, air_temperature, climatological_slp)?;
    let vap = vap(dewpoint, air_temperature, climatological_slp)?;
    let crh = rh(dewpoint, air_temperature, climatological_slp)?;
    let cwb = wb(dewpoint, air_temperature, climatological_slp)?;
    let dpd = dpd(dewpoint, air_temperature)?;

    if !(0.0..=150.0).contains(&crh) {
        return None;
    }

    Some(DerivedHumidity { shu, vap, crh, cwb, dpd })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn vapour_pressure_reference_values() {
        assert_eq!(vap(Some(10.0), Some(15.0), Some(1013.0)), Some(12.3));
        assert_eq!(vap(Some(-15.0), Some(-10.0), Some(1013.0)), Some(1.7));
        assert_eq!(vap(None, Some(15.0), Some(1013.0)), None);
    }

    #[test]
    fn specific_humidity_reference_values() {
        assert_eq!(sh(Some(10.0), Some(15.0), Some(1013.0)), Some(7.6));
        assert_eq!(sh(Some(-15.0), Some(-10.0), Some(1013.0)), Some(1.0));
        assert_eq!(sh(None, Some(15.0), Some(1013.0)), None);
    }

    #[test]
    fn relative_humidity_reference_values() {
        assert_eq!(rh(Some(10.0), Some(15.0), Some(1013.0)), Some(72.0));
        assert_eq!(rh(Some(-15.0), Some(-10.0), Some(1013.0)), Some(63.6));
        assert_eq!(rh(None, Some(15.0), Some(1013.0)), None);
    }

    #[test]
    fn wet_bulb_reference_values() {
        assert_eq!(wb(Some(10.0), Some(15.0), Some(1013.0)), Some(12.2));
        assert_eq!(wb(Some(-15.0), Some(-10.0), Some(1013.0)), Some(-10.9));
        assert_eq!(wb(None, Some(15.0), Some(1013.0)), None);
    }

    #[test]
    fn dew_point_depression() {
        assert_eq!(dpd(Some(10.0), Some(15.0)), Some(5.0));
        assert_eq!(dpd(None, Some(15.0)), None);
    }

    #[test]
    fn derivation_is_atomic() {
        let d = derive(Some(10.0), Some(15.0), Some(1013.0)).unwrap();
        assert_eq!(d.shu, 7.6);
        assert_eq!(d.vap, 12.3);
        assert_eq!(d.crh, 72.0);
        assert_eq!(d.cwb, 12.2);
        assert_eq!(d.dpd, 5.0);

        assert_eq!(derive(Some(10.0), Some(15.0), None), None);
        assert_eq!(derive(None, Some(15.0), Some(1013.0)), None);
    }

    #[test]
    fn saturated_air_is_at_100_percent() {
        let d = derive(Some(15.0), Some(15.0), Some(1013.0)).unwrap();
        assert_eq!(d.crh, 100.0);
        assert_eq!(d.dpd, 0.0);
    }
}
