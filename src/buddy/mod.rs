//! The gridded buddy checks.
//!
//! Contributing reports are collapsed into super-observations: mean
//! anomalies on a 1°x1°x pentad grid. Each occupied cell is then given
//! a neighbourhood mean and a tolerance, either from the fixed-box MDS
//! fallback sequence or from the Bayesian error budget, and every
//! contributing report is judged against the cell covering it.

use crate::climatology::ClimatologyField;
use crate::config::{BayesianBuddyConfig, BuddyBox, MdsBuddyConfig};
use crate::constants::{BuddySentinel, Grid};
use crate::errors::EngineError;
use crate::observable::Observable;
use crate::report::filter::QcFilter;
use crate::report::flag::QcCheck;
use crate::report::Report;
use crate::units;
use map_3d::deg2rad;

/// Longitude bin on the 1° grid, wrapping at the antimeridian.
pub fn lon_to_xindex(lon: f64) -> usize {
    let folded = if lon > 180.0 { lon - 360.0 } else { lon };
    let x = (folded + 180.0).floor() as i64;
    x.rem_euclid(Grid::N_LON as i64) as usize
}

/// Latitude bin on the 1° grid, poles clamped into the edge rows.
pub fn lat_to_yindex(lat: f64) -> usize {
    let y = (90.0 - lat).floor() as i64;
    y.clamp(0, Grid::N_LAT as i64 - 1) as usize
}

/// The three Bayesian stdev fields.
pub struct BayesianFields<'a> {
    /// Grid cell to complete neighbour average
    pub one_box_to_buddy_avg: &'a dyn ClimatologyField,
    /// Single observation to its grid cell average
    pub one_ob_to_box_avg: &'a dyn ClimatologyField,
    /// Uncertainty in the neighbour average itself
    pub avg_sampling: &'a dyn ClimatologyField,
}

/// Posterior probability that an observation is a gross error, under a
/// normal model for good data and a uniform model over the acceptance
/// range for gross errors, both quantized to interval `q`.
pub fn p_gross(p0: f64, q: f64, r_hi: f64, r_lo: f64, x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    let density = (-0.5 * z * z).exp() / (sigma * (2.0 * std::f64::consts::PI).sqrt());
    let likelihood_good = q * density;
    let likelihood_gross = q / (r_hi - r_lo);
    p0 * likelihood_gross / (p0 * likelihood_gross + (1.0 - p0) * likelihood_good)
}

/// Super-observation grid for one month of one variable: anomaly sums
/// and counts, and the buddy mean/stdev surfaces once computed.
pub struct SuperObGrid {
    anomaly: Vec<f64>,
    count: Vec<f64>,
    buddy_mean: Vec<f64>,
    buddy_stdev: Vec<f64>,
}

impl Default for SuperObGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl SuperObGrid {
    pub fn new() -> Self {
        Self {
            anomaly: vec![0.0; Grid::N_CELLS],
            count: vec![0.0; Grid::N_CELLS],
            buddy_mean: vec![0.0; Grid::N_CELLS],
            buddy_stdev: vec![0.0; Grid::N_CELLS],
        }
    }

    fn cell(x: usize, y: usize, p: usize) -> usize {
        (x * Grid::N_LAT + y) * Grid::N_PENTADS + p
    }

    fn bins(lat: f64, lon: f64, month: u32, day: u32) -> Result<(usize, usize, usize), EngineError> {
        if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat) || !(-180.0..=360.0).contains(&lon)
        {
            return Err(EngineError::GridOverflow);
        }
        let pentad = units::which_pentad(month, day).ok_or(EngineError::GridOverflow)?;
        Ok((lon_to_xindex(lon), lat_to_yindex(lat), pentad as usize - 1))
    }

    /// Adds one anomaly to the cell covering (lat, lon, pentad).
    /// A missing anomaly contributes nothing but still validates the
    /// coordinates.
    pub fn add(&mut self, lat: f64, lon: f64, month: u32, day: u32, anomaly: Option<f64>) -> Result<(), EngineError> {
        let (x, y, p) = Self::bins(lat, lon, month, day)?;
        if let Some(anomaly) = anomaly {
            let i = Self::cell(x, y, p);
            self.anomaly[i] += anomaly;
            self.count[i] += 1.0;
        }
        Ok(())
    }

    /// Converts accumulated sums to means.
    pub fn take_average(&mut self) {
        for (sum, count) in self.anomaly.iter_mut().zip(&self.count) {
            if *count > 0.0 {
                *sum /= count;
            }
        }
    }

    fn occupied(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        (0..Grid::N_LON).flat_map(move |x| {
            (0..Grid::N_LAT).flat_map(move |y| {
                (0..Grid::N_PENTADS)
                    .filter(move |&p| self.count[Self::cell(x, y, p)] > 0.0)
                    .map(move |p| (x, y, p))
            })
        })
    }

    /// Mean anomalies and observation counts of all occupied cells
    /// within the search box around a cell, skipping the cell itself.
    /// Longitude widens with latitude and wraps, pentads wrap, latitude
    /// rows outside the grid are dropped.
    fn neighbours(&self, span: (u32, u32, u32), x: usize, y: usize, p: usize) -> (Vec<f64>, Vec<f64>) {
        let latitude_approx = 89.5 - y as f64;
        let full_xspan = (span.0 as f64 / deg2rad(latitude_approx).cos()) as i64;
        let yspan = span.1 as i64;
        let pspan = span.2 as i64;

        let mut anomalies = Vec::new();
        let mut counts = Vec::new();

        for dx in -full_xspan..=full_xspan {
            for dy in -yspan..=yspan {
                for dp in -pspan..=pspan {
                    if dx == 0 && dy == 0 && dp == 0 {
                        continue;
                    }
                    let yy = y as i64 + dy;
                    if !(0..Grid::N_LAT as i64).contains(&yy) {
                        continue;
                    }
                    let xx = (x as i64 + dx).rem_euclid(Grid::N_LON as i64) as usize;
                    let pp = (p as i64 + dp).rem_euclid(Grid::N_PENTADS as i64) as usize;
                    let i = Self::cell(xx, yy as usize, pp);
                    if self.count[i] > 0.0 {
                        anomalies.push(self.anomaly[i]);
                        counts.push(self.count[i]);
                    }
                }
            }
        }
        (anomalies, counts)
    }

    /// Stdev multiplier for a neighbour total, from the box's
    /// threshold table. Configuration is validated up front, so the
    /// tables are well formed here.
    fn threshold_multiplier(total_nobs: f64, thresholds: &[u32], multipliers: &[f64]) -> f64 {
        let mut multiplier = 4.0;
        for (threshold, m) in thresholds.iter().zip(multipliers) {
            if total_nobs > *threshold as f64 {
                multiplier = *m;
            }
        }
        multiplier
    }

    /// Computes the MDS buddy mean and stdev of every occupied cell:
    /// boxes are tried in order, the first yielding any neighbour wins;
    /// cells with no neighbours anywhere get the pass-all sentinel.
    pub fn mds_buddy_limits(&mut self, stdev_field: &dyn ClimatologyField, boxes: &[BuddyBox]) {
        let cells: Vec<(usize, usize, usize)> = self.occupied().collect();
        for (x, y, p) in cells {
            let (month, day) = match units::pentad_to_month_day(p as u32 + 1) {
                Some(md) => md,
                None => continue,
            };
            let lat = 89.5 - y as f64;
            let lon = -179.5 + x as f64;
            let stdev = stdev_field
                .value(lat, lon, month, day)
                .filter(|&s| s >= 0.0)
                .unwrap_or(1.0);

            let i = Self::cell(x, y, p);
            let mut matched = false;
            for buddy_box in boxes {
                let (anomalies, counts) = self.neighbours(buddy_box.span, x, y, p);
                if !anomalies.is_empty() {
                    let total: f64 = counts.iter().sum();
                    self.buddy_mean[i] = anomalies.iter().sum::<f64>() / anomalies.len() as f64;
                    self.buddy_stdev[i] =
                        Self::threshold_multiplier(total, &buddy_box.nobs_thresholds, &buddy_box.multipliers) * stdev;
                    matched = true;
                    break;
                }
            }
            if !matched {
                self.buddy_mean[i] = BuddySentinel::MEAN;
                self.buddy_stdev[i] = BuddySentinel::STDEV;
            }
        }
    }

    /// Computes the Bayesian buddy mean and stdev of every occupied
    /// cell from the measurement error, the three stdev fields and the
    /// neighbour counts.
    pub fn bayesian_buddy_limits(&mut self, fields: &BayesianFields<'_>, cfg: &BayesianBuddyConfig) {
        let cells: Vec<(usize, usize, usize)> = self.occupied().collect();
        for (x, y, p) in cells {
            let (month, day) = match units::pentad_to_month_day(p as u32 + 1) {
                Some(md) => md,
                None => continue,
            };
            let lat = 89.5 - y as f64;
            let lon = -179.5 + x as f64;
            let positive = |v: Option<f64>| v.filter(|&s| s >= 0.0).unwrap_or(1.0);
            let stdev_box_to_avg = positive(fields.one_box_to_buddy_avg.value(lat, lon, month, day));
            let stdev_ob_to_box = positive(fields.one_ob_to_box_avg.value(lat, lon, month, day));
            let stdev_sampling = positive(fields.avg_sampling.value(lat, lon, month, day));

            let sigma_m_sq = cfg.measurement_error * cfg.measurement_error;
            let i = Self::cell(x, y, p);
            let (anomalies, counts) = self.neighbours(cfg.span, x, y, p);
            if anomalies.is_empty() {
                self.buddy_mean[i] = BuddySentinel::MEAN;
                self.buddy_stdev[i] = BuddySentinel::STDEV;
                continue;
            }

            self.buddy_mean[i] = anomalies.iter().sum::<f64>() / anomalies.len() as f64;

            // per-cell measurement and sampling error, then the
            // uncertainty of the neighbour average itself
            let n_cells = counts.len() as f64;
            let tot: f64 = counts
                .iter()
                .map(|n| sigma_m_sq / n + cfg.noise_scaling * stdev_ob_to_box * stdev_ob_to_box / n)
                .sum();
            let sigma_buddy = tot / (n_cells * n_cells) + stdev_sampling * stdev_sampling / n_cells;

            self.buddy_stdev[i] = (sigma_m_sq
                + stdev_box_to_avg * stdev_box_to_avg
                + cfg.noise_scaling * stdev_ob_to_box * stdev_ob_to_box
                + sigma_buddy)
                .sqrt();
        }
    }

    /// Buddy mean of the cell covering the given position and day.
    pub fn buddy_mean(&self, lat: f64, lon: f64, month: u32, day: u32) -> Option<f64> {
        let (x, y, p) = Self::bins(lat, lon, month, day).ok()?;
        Some(self.buddy_mean[Self::cell(x, y, p)])
    }

    /// Buddy stdev of the cell covering the given position and day.
    pub fn buddy_stdev(&self, lat: f64, lon: f64, month: u32, day: u32) -> Option<f64> {
        let (x, y, p) = Self::bins(lat, lon, month, day).ok()?;
        Some(self.buddy_stdev[Self::cell(x, y, p)])
    }

    /// Mean anomaly of a cell, for inspection.
    pub fn mean_anomaly(&self, lat: f64, lon: f64, month: u32, day: u32) -> Option<f64> {
        let (x, y, p) = Self::bins(lat, lon, month, day).ok()?;
        let i = Self::cell(x, y, p);
        if self.count[i] > 0.0 {
            Some(self.anomaly[i])
        } else {
            None
        }
    }
}

fn accumulate(
    reports: &[Report],
    var: Observable,
    filter: &QcFilter,
) -> Result<SuperObGrid, EngineError> {
    let mut grid = SuperObGrid::new();
    for rep in reports.iter().filter(|r| filter.passes(r)) {
        if let (Some(lat), Some(lon), Some(month), Some(day)) =
            (rep.latitude(), rep.longitude(), rep.month(), rep.day())
        {
            grid.add(lat, lon, month, day, rep.anomaly(var))?;
        }
    }
    grid.take_average();
    Ok(grid)
}

/// MDS buddy check: a contributing report fails when its anomaly sits
/// at least one buddy stdev away from the buddy mean. Non-contributing
/// reports are marked as passing, matching the historical output.
pub fn mds_buddy_check(
    reports: &mut [Report],
    var: Observable,
    stdev_field: &dyn ClimatologyField,
    filter: &QcFilter,
    cfg: &MdsBuddyConfig,
) -> Result<(), EngineError> {
    let category = match var.category() {
        Some(cat) => cat,
        None => return Ok(()),
    };
    let mut grid = accumulate(reports, var, filter)?;
    grid.mds_buddy_limits(stdev_field, &cfg.boxes);

    for rep in reports.iter_mut() {
        let mut failed = false;
        if filter.passes(rep) {
            if let (Some(lat), Some(lon), Some(month), Some(day), Some(anom)) = (
                rep.latitude(),
                rep.longitude(),
                rep.month(),
                rep.day(),
                rep.anomaly(var),
            ) {
                if let (Some(mean), Some(stdev)) = (
                    grid.buddy_mean(lat, lon, month, day),
                    grid.buddy_stdev(lat, lon, month, day),
                ) {
                    failed = (anom - mean).abs() >= stdev;
                }
            }
        }
        rep.set_flag(category, QcCheck::Buddy, u8::from(failed));
    }
    Ok(())
}

/// Bayesian buddy check: the posterior probability of gross error is
/// scaled into a 0..=9 flag.
pub fn bayesian_buddy_check(
    reports: &mut [Report],
    var: Observable,
    fields: &BayesianFields<'_>,
    filter: &QcFilter,
    cfg: &BayesianBuddyConfig,
) -> Result<(), EngineError> {
    let category = match var.category() {
        Some(cat) => cat,
        None => return Ok(()),
    };
    let mut grid = accumulate(reports, var, filter)?;
    grid.bayesian_buddy_limits(fields, cfg);

    let r_hi = cfg.maximum_anomaly;
    let r_lo = -cfg.maximum_anomaly;

    for rep in reports.iter_mut() {
        let mut flag = 0u8;
        if filter.passes(rep) {
            if let (Some(lat), Some(lon), Some(month), Some(day), Some(anom)) = (
                rep.latitude(),
                rep.longitude(),
                rep.month(),
                rep.day(),
                rep.anomaly(var),
            ) {
                if let (Some(mean), Some(stdev)) = (
                    grid.buddy_mean(lat, lon, month, day),
                    grid.buddy_stdev(lat, lon, month, day),
                ) {
                    let p = p_gross(cfg.prior_probability, cfg.quantization, r_hi, r_lo, anom, mean, stdev);
                    if p > 0.0 {
                        flag = ((p * 10.0).floor() as u8).min(9);
                    }
                }
            }
        }
        rep.set_flag(category, QcCheck::BayesianBuddy, flag);
    }
    Ok(())
}
