//! Engine configuration.
//!
//! Every parameter group the historical processing kept in module-level
//! dictionaries lives here as an explicit struct with the historical
//! values as defaults. [Config::validate] rejects self-inconsistent
//! parameter sets before any report is touched.

use crate::errors::EngineError;
use crate::units::knots_to_kmh;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-variable single-report QC parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VariableConfig {
    /// Largest allowed (possibly standardised) anomaly
    pub maximum_anomaly: f64,
    /// Clamp range applied to the climatological stdev, when standardising
    pub stdev_limits: Option<(f64, f64)>,
    /// Anomalies at or below this always pass the climatology check
    pub lowbar: Option<f64>,
    /// Inclusive physical bounds
    pub hard_limits: (f64, f64),
    /// Standardise the anomaly with the climatological stdev
    pub standardised: bool,
}

/// SST-specific additions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SstConfig {
    /// Freezing point of sea water, °C
    pub freezing_point: f64,
    /// Observational uncertainty attributed to the SST, °C
    pub uncertainty: f64,
    /// Allowed number of uncertainties below the freezing point
    pub freeze_n_sigma: f64,
}

impl Default for SstConfig {
    fn default() -> Self {
        Self {
            freezing_point: -1.8,
            uncertainty: 0.0,
            freeze_n_sigma: 2.0,
        }
    }
}

/// MDS track-check thresholds, in natural units.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackConfig {
    /// Largest tolerated difference between reported heading and the
    /// course made good, degrees
    pub max_direction_change: f64,
    /// Largest tolerated difference between reported and derived speed, km/h
    pub max_speed_change: f64,
    /// Absolute speed ceiling, km/h
    pub max_absolute_speed: f64,
    /// Largest tolerated distance from the midpoint interpolation, km
    pub max_midpoint_discrepancy: f64,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            max_direction_change: 60.0,
            max_speed_change: knots_to_kmh(10.0),
            max_absolute_speed: knots_to_kmh(40.0),
            max_midpoint_discrepancy: 150.0,
        }
    }
}

/// IQUAM track-check parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IquamConfig {
    /// Speed limit for moored and drifting buoys, km/h
    pub buoy_speed_limit: f64,
    /// Speed limit for ships, km/h
    pub ship_speed_limit: f64,
    /// Distance slack absorbing position rounding, km
    pub delta_d: f64,
    /// Time slack absorbing time rounding, hours
    pub delta_t: f64,
    /// Window half-width in reports
    pub number_of_neighbours: usize,
}

impl Default for IquamConfig {
    fn default() -> Self {
        Self {
            buoy_speed_limit: 15.0,
            ship_speed_limit: 60.0,
            delta_d: 1.11,
            delta_t: 0.01,
            number_of_neighbours: 5,
        }
    }
}

/// IQUAM-style spike-check parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpikeConfig {
    /// K per km
    pub max_gradient_space: f64,
    /// K per hour
    pub max_gradient_time: f64,
    /// Base tolerance for ships, K
    pub ship_delta_t: f64,
    /// Base tolerance for buoys, K
    pub buoy_delta_t: f64,
    /// Window half-width in reports
    pub number_of_neighbours: usize,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            max_gradient_space: 0.5,
            max_gradient_time: 1.0,
            ship_delta_t: 2.0,
            buoy_delta_t: 1.0,
            number_of_neighbours: 5,
        }
    }
}

/// Saturated-run detection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SaturatedRunsConfig {
    /// Runs longer than this many reports are candidates
    pub shortest_run: usize,
    /// ... when they also span at least this many hours
    pub min_time_threshold: f64,
}

impl Default for SaturatedRunsConfig {
    fn default() -> Self {
        Self {
            shortest_run: 20,
            min_time_threshold: 48.0,
        }
    }
}

/// Repeated-value detection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RepeatedValuesConfig {
    /// Fraction of observations a single value may account for
    pub threshold: f64,
    /// Smallest voyage the check applies to
    pub min_count: usize,
}

impl Default for RepeatedValuesConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            min_count: 20,
        }
    }
}

/// Rounded-value detection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoundedValuesConfig {
    /// Fraction of whole-number observations above which rounding is assumed
    pub threshold: f64,
    /// Smallest voyage the check applies to
    pub min_count: usize,
}

impl Default for RoundedValuesConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            min_count: 20,
        }
    }
}

/// Drifter aground check.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AgroundConfig {
    /// Median smoothing window in reports, odd
    pub smooth_win: usize,
    /// Days of no movement before a drifter is deemed aground
    pub min_win_period: f64,
    /// Upper bound of the assessment window, days. `None` means the
    /// check compares against the final position instead (the revised
    /// variant).
    pub max_win_period: Option<f64>,
}

impl Default for AgroundConfig {
    fn default() -> Self {
        Self {
            smooth_win: 41,
            min_win_period: 8.0,
            max_win_period: Some(10.0),
        }
    }
}

impl AgroundConfig {
    /// The revised variant comparing against the final position.
    pub fn revised() -> Self {
        Self {
            max_win_period: None,
            ..Self::default()
        }
    }
}

/// Drifter picked-up-by-ship speed check.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DriftSpeedConfig {
    /// m/s
    pub speed_limit: f64,
    /// Days
    pub min_win_period: f64,
    /// Days; `None` selects the revised variant with its IQUAM-as-ship
    /// pre-filter and minimum-period-only window.
    pub max_win_period: Option<f64>,
}

impl Default for DriftSpeedConfig {
    fn default() -> Self {
        Self {
            speed_limit: 2.5,
            min_win_period: 0.8,
            max_win_period: Some(1.0),
        }
    }
}

impl DriftSpeedConfig {
    /// The revised variant with the IQUAM pre-filter.
    pub fn revised() -> Self {
        Self {
            speed_limit: 3.0,
            min_win_period: 0.375,
            max_win_period: None,
        }
    }
}

/// Drifter SST tail check.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TailConfig {
    /// Long-tail window length in reports, odd
    pub long_win_len: usize,
    /// Stdev multiple failing the long-tail bias test
    pub long_err_std_n: f64,
    /// Short-tail window length in reports
    pub short_win_len: usize,
    /// Stdev multiple marking a sample suspicious in the short tail
    pub short_err_std_n: f64,
    /// Suspicious samples required to fail a short-tail window
    pub short_win_n_bad: usize,
    /// Spread of biases expected between drifters, °C
    pub drif_inter: f64,
    /// Random measurement uncertainty expected of a drifter, °C
    pub drif_intra: f64,
    /// Background error variance beyond which the background is
    /// unreliable, °C²
    pub background_err_lim: f64,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            long_win_len: 121,
            long_err_std_n: 3.0,
            short_win_len: 30,
            short_err_std_n: 3.0,
            short_win_n_bad: 2,
            drif_inter: 0.29,
            drif_intra: 1.0,
            background_err_lim: 0.3,
        }
    }
}

/// Drifter whole-record bias and noise check.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BiasNoiseConfig {
    /// Observations needed for the long-record assessment
    pub n_eval: usize,
    /// Allowed drifter-background bias, °C
    pub bias_lim: f64,
    /// Random measurement uncertainty expected of a drifter, °C
    pub drif_intra: f64,
    /// Spread of biases expected between drifters, °C
    pub drif_inter: f64,
    /// Stdev multiple marking a short-record sample suspicious
    pub err_std_n: f64,
    /// Suspicious samples required to fail a short record
    pub n_bad: usize,
    /// Background error variance beyond which the background is
    /// unreliable, °C²
    pub background_err_lim: f64,
}

impl Default for BiasNoiseConfig {
    fn default() -> Self {
        Self {
            n_eval: 30,
            bias_lim: 1.10,
            drif_intra: 1.0,
            drif_inter: 0.29,
            err_std_n: 3.0,
            n_bad: 2,
            background_err_lim: 0.3,
        }
    }
}

/// One search box of the MDS buddy check with its observation-count
/// dependent multipliers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BuddyBox {
    /// (degrees lon, degrees lat, pentads)
    pub span: (u32, u32, u32),
    /// Ascending neighbour-count thresholds, first entry zero
    pub nobs_thresholds: Vec<u32>,
    /// Stdev multiplier for each threshold
    pub multipliers: Vec<f64>,
}

/// MDS buddy-check parameters: boxes are tried in order until one
/// yields neighbours.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MdsBuddyConfig {
    pub boxes: Vec<BuddyBox>,
}

impl Default for MdsBuddyConfig {
    fn default() -> Self {
        let graded = (vec![0, 5, 15, 100], vec![4.0, 3.5, 3.0, 2.5]);
        let flat = (vec![0], vec![4.0]);
        Self {
            boxes: vec![
                BuddyBox {
                    span: (1, 1, 2),
                    nobs_thresholds: graded.0.clone(),
                    multipliers: graded.1.clone(),
                },
                BuddyBox {
                    span: (2, 2, 2),
                    nobs_thresholds: flat.0.clone(),
                    multipliers: flat.1.clone(),
                },
                BuddyBox {
                    span: (1, 1, 4),
                    nobs_thresholds: graded.0,
                    multipliers: graded.1,
                },
                BuddyBox {
                    span: (2, 2, 4),
                    nobs_thresholds: flat.0,
                    multipliers: flat.1,
                },
            ],
        }
    }
}

/// Bayesian buddy-check parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BayesianBuddyConfig {
    /// Prior probability of gross error
    pub prior_probability: f64,
    /// Quantization interval of the reported values
    pub quantization: f64,
    /// Measurement error uncertainty, °C
    pub measurement_error: f64,
    /// Single search box (degrees lon, degrees lat, pentads)
    pub span: (u32, u32, u32),
    /// Scale factor matching modelled noise to observed variability
    pub noise_scaling: f64,
    /// Acceptance range half-width: anomalies beyond ±this were already
    /// removed by the climatology check
    pub maximum_anomaly: f64,
}

impl Default for BayesianBuddyConfig {
    fn default() -> Self {
        Self {
            prior_probability: 0.05,
            quantization: 0.1,
            measurement_error: 1.0,
            span: (2, 2, 4),
            noise_scaling: 3.0,
            maximum_anomaly: 8.0,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Hours the sun must have been below the horizon for "night"
    pub hours_since_sun_above_horizon: f64,
    /// Night delimiter used by the drifter checks, degrees of elevation
    pub drifter_night_elevation: f64,
    pub sst: SstConfig,
    pub sst_limits: VariableConfig,
    pub at_limits: VariableConfig,
    pub at2_limits: VariableConfig,
    pub dpt_limits: VariableConfig,
    pub slp_limits: VariableConfig,
    pub wind_hard_limits: (f64, f64),
    /// Plausibility bounds on derived specific humidity, g/kg
    pub shu_hard_limits: (f64, f64),
    /// Plausibility bounds on derived relative humidity, %
    pub crh_hard_limits: (f64, f64),
    pub track: TrackConfig,
    pub iquam: IquamConfig,
    pub spike: SpikeConfig,
    pub saturated_runs: SaturatedRunsConfig,
    pub repeated_values: RepeatedValuesConfig,
    pub rounded_values: RoundedValuesConfig,
    pub aground: AgroundConfig,
    pub drift_speed: DriftSpeedConfig,
    pub tail: TailConfig,
    pub bias_noise: BiasNoiseConfig,
    pub mds_buddy: MdsBuddyConfig,
    pub bayesian_buddy: BayesianBuddyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hours_since_sun_above_horizon: 1.0,
            drifter_night_elevation: -2.5,
            sst: SstConfig::default(),
            sst_limits: VariableConfig {
                maximum_anomaly: 8.0,
                stdev_limits: None,
                lowbar: None,
                hard_limits: (-5.0, 45.0),
                standardised: false,
            },
            at_limits: VariableConfig {
                maximum_anomaly: 10.0,
                stdev_limits: None,
                lowbar: None,
                hard_limits: (-80.0, 65.0),
                standardised: false,
            },
            at2_limits: VariableConfig {
                maximum_anomaly: 4.5,
                stdev_limits: Some((1.0, 4.0)),
                lowbar: None,
                hard_limits: (-80.0, 65.0),
                standardised: true,
            },
            dpt_limits: VariableConfig {
                maximum_anomaly: 4.5,
                stdev_limits: Some((1.0, 4.0)),
                lowbar: None,
                hard_limits: (-80.0, 65.0),
                standardised: true,
            },
            slp_limits: VariableConfig {
                maximum_anomaly: 4.5,
                stdev_limits: None,
                lowbar: Some(15.0),
                hard_limits: (870.0, 1090.0),
                standardised: true,
            },
            wind_hard_limits: (0.0, 99.9),
            shu_hard_limits: (0.0, 40.0),
            crh_hard_limits: (0.0, 150.0),
            track: TrackConfig::default(),
            iquam: IquamConfig::default(),
            spike: SpikeConfig::default(),
            saturated_runs: SaturatedRunsConfig::default(),
            repeated_values: RepeatedValuesConfig::default(),
            rounded_values: RoundedValuesConfig::default(),
            aground: AgroundConfig::default(),
            drift_speed: DriftSpeedConfig::default(),
            tail: TailConfig::default(),
            bias_noise: BiasNoiseConfig::default(),
            mds_buddy: MdsBuddyConfig::default(),
            bayesian_buddy: BayesianBuddyConfig::default(),
        }
    }
}

fn ensure(cond: bool, msg: &str) -> Result<(), EngineError> {
    if cond {
        Ok(())
    } else {
        Err(EngineError::InvalidConfig(msg.to_string()))
    }
}

fn validate_fraction(value: f64, name: &str) -> Result<(), EngineError> {
    ensure((0.0..=1.0).contains(&value), &format!("{name} must lie in [0, 1]"))
}

fn validate_buddy_box(b: &BuddyBox) -> Result<(), EngineError> {
    ensure(
        b.nobs_thresholds.len() == b.multipliers.len(),
        "buddy box thresholds and multipliers differ in length",
    )?;
    ensure(!b.nobs_thresholds.is_empty(), "buddy box has no thresholds")?;
    ensure(b.nobs_thresholds[0] == 0, "lowest buddy threshold must be zero")?;
    ensure(
        b.nobs_thresholds.windows(2).all(|w| w[1] > w[0]),
        "buddy thresholds must be ascending",
    )?;
    ensure(
        b.multipliers.iter().all(|&m| m > 0.0),
        "buddy multipliers must be positive",
    )
}

impl Config {
    /// Rejects self-inconsistent parameter sets.
    pub fn validate(&self) -> Result<(), EngineError> {
        for limits in [
            &self.sst_limits,
            &self.at_limits,
            &self.at2_limits,
            &self.dpt_limits,
            &self.slp_limits,
        ] {
            ensure(
                limits.hard_limits.1 > limits.hard_limits.0,
                "hard limits are inverted",
            )?;
            if let Some((lo, hi)) = limits.stdev_limits {
                ensure(hi > lo, "stdev limits are inverted")?;
            }
        }
        ensure(self.wind_hard_limits.1 > self.wind_hard_limits.0, "wind hard limits are inverted")?;
        ensure(self.shu_hard_limits.1 > self.shu_hard_limits.0, "humidity hard limits are inverted")?;
        ensure(self.crh_hard_limits.1 > self.crh_hard_limits.0, "humidity hard limits are inverted")?;
        ensure(self.iquam.number_of_neighbours > 0, "iquam needs at least one neighbour")?;
        ensure(self.spike.number_of_neighbours > 0, "spike check needs at least one neighbour")?;
        validate_fraction(self.repeated_values.threshold, "repeated-values threshold")?;
        validate_fraction(self.rounded_values.threshold, "rounded-values threshold")?;
        ensure(self.aground.smooth_win % 2 == 1, "aground smoothing window must be odd")?;
        ensure(self.aground.min_win_period > 0.0, "aground minimum window must be positive")?;
        if let Some(max) = self.aground.max_win_period {
            ensure(max >= self.aground.min_win_period, "aground window bounds are inverted")?;
        }
        ensure(self.drift_speed.speed_limit >= 0.0, "drifter speed limit must be non-negative")?;
        ensure(self.drift_speed.min_win_period > 0.0, "drifter speed minimum window must be positive")?;
        if let Some(max) = self.drift_speed.max_win_period {
            ensure(max >= self.drift_speed.min_win_period, "drifter speed window bounds are inverted")?;
        }
        ensure(self.tail.long_win_len % 2 == 1, "long tail window must be odd")?;
        ensure(self.tail.short_win_len >= 1, "short tail window must be at least 1")?;
        ensure(self.tail.short_win_n_bad >= 1, "short tail bad count must be at least 1")?;
        ensure(self.bias_noise.n_eval > 0, "bias/noise n_eval must be positive")?;
        ensure(self.bias_noise.n_bad >= 1, "bias/noise n_bad must be at least 1")?;
        ensure(!self.mds_buddy.boxes.is_empty(), "MDS buddy check needs at least one box")?;
        for b in &self.mds_buddy.boxes {
            validate_buddy_box(b)?;
        }
        ensure(
            (0.0..=1.0).contains(&self.bayesian_buddy.prior_probability),
            "prior probability must lie in [0, 1]",
        )?;
        ensure(self.bayesian_buddy.quantization > 0.0, "quantization must be positive")?;
        ensure(self.bayesian_buddy.maximum_anomaly > 0.0, "bayesian acceptance range must be positive")?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let mut cfg = Config::default();
        cfg.sst_limits.hard_limits = (45.0, -5.0);
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn even_smoothing_window_is_rejected() {
        let mut cfg = Config::default();
        cfg.aground.smooth_win = 40;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn buddy_boxes_are_checked() {
        let mut cfg = Config::default();
        cfg.mds_buddy.boxes[0].nobs_thresholds = vec![0, 5, 5];
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.mds_buddy.boxes[0].multipliers[0] = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_serdes() {
        let cfg = Config::default();
        let text = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&text).unwrap();
        assert_eq!(cfg, back);
    }
}
