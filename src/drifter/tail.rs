//! Drifter SST assessment against a background field: bad data at the
//! start or end of a record (tails), and records that are biased or
//! noisy as a whole.
//!
//! Only night-time reports with a usable background match and little
//! sea ice take part. Background error variance beyond its limit marks
//! the background unreliable; the windowed scans stop there.

use crate::config::{BiasNoiseConfig, TailConfig};
use crate::observable::Observable;
use crate::report::flag::{QcCategory, QcCheck};
use crate::report::Report;
use crate::units::{self, solar};
use crate::voyage::Voyage;
use std::cmp::Ordering;

/// True when the sun sits above `elevation_limit` degrees at the time
/// and place of the report. `None` when the report cannot be located in
/// time or space.
pub(crate) fn is_daytime(rep: &Report, elevation_limit: f64) -> Option<bool> {
    let (y, m, d, h) = (rep.year()?, rep.month()?, rep.day()?, rep.hour()?);
    let lat = rep.latitude()?;
    let lon = rep.longitude()?;
    if !(0.0..24.0).contains(&h) || !(-90.0..=90.0).contains(&lat) {
        return None;
    }
    let doy = units::day_in_year(y, m, d)?;
    let lat = if lat == 0.0 { 0.0001 } else { lat };
    let lon = if lon == 0.0 { 0.0001 } else { lon };
    let elevation = solar::sun_elevation(y, doy, h.floor(), (h - h.floor()) * 60.0, lat, lon);
    Some(elevation > elevation_limit)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64).sqrt()
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut buf = values.to_vec();
    buf.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    buf
}

/// Resistant mean: a trim of 100 drops one percent of the sorted
/// values from each end.
pub(crate) fn trim_mean(values: &[f64], trim: usize) -> f64 {
    if trim == 0 {
        return mean(values);
    }
    let buf = sorted(values);
    let cut = buf.len() / trim;
    mean(&buf[cut..buf.len() - cut])
}

/// Resistant standard deviation, trimmed the same way.
pub(crate) fn trim_std(values: &[f64], trim: usize) -> f64 {
    if trim == 0 {
        return population_std(values);
    }
    let buf = sorted(values);
    let cut = buf.len() / trim;
    population_std(&buf[cut..buf.len() - cut])
}

/// The observations of a voyage suitable for background comparison:
/// original report index, observation-minus-background anomaly, and the
/// background error standard deviation.
struct AnomalySeries {
    reps_ind: Vec<usize>,
    anom: Vec<f64>,
    bgerr: Vec<f64>,
    /// Whether any report's background variance exceeded the limit
    bgvar_masked: bool,
}

fn anomaly_series(
    voyage: &Voyage,
    night_elevation: f64,
    background_err_lim: f64,
    exclude_high_bgvar: bool,
) -> AnomalySeries {
    let mut series = AnomalySeries {
        reps_ind: Vec::new(),
        anom: Vec::new(),
        bgerr: Vec::new(),
        bgvar_masked: false,
    };

    for (ind, rep) in voyage.reports().iter().enumerate() {
        let background = rep.background().copied().unwrap_or_default();
        let ice = background.ice.unwrap_or(0.0);
        let daytime = is_daytime(rep, night_elevation).unwrap_or(true);

        let bgvar_over_limit = matches!(background.error_variance, Some(v) if v > background_err_lim);
        if bgvar_over_limit {
            series.bgvar_masked = true;
        }

        let usable = !daytime
            && ice <= 0.15
            && matches!(background.sst, Some(b) if (-5.0..=45.0).contains(&b))
            && matches!(background.error_variance, Some(v) if (0.0..=10.0).contains(&v))
            && rep.value(Observable::Sst).is_some()
            && !(exclude_high_bgvar && bgvar_over_limit);

        if usable {
            let sst = rep.value(Observable::Sst).unwrap_or(0.0);
            let bg = background.sst.unwrap_or(0.0);
            let bgvar = background.error_variance.unwrap_or(0.0);
            series.reps_ind.push(ind);
            series.anom.push(sst - bg);
            series.bgerr.push(bgvar.sqrt());
        }
    }
    series
}

fn flipped(values: &[f64], forward: bool) -> Vec<f64> {
    if forward {
        values.to_vec()
    } else {
        values.iter().rev().copied().collect()
    }
}

/// Long tail check: windows whose trimmed mean or trimmed stdev exceeds
/// the combined drifter and background allowance push the tail marker
/// inwards; the first clean (or unreliable-background) window stops the
/// scan.
fn long_tail_scan(
    anom: &[f64],
    bgerr: &[f64],
    cfg: &TailConfig,
    forward: bool,
    start_tail: &mut isize,
    end_tail: &mut isize,
) {
    let nrep = anom.len();
    let mid_win = (cfg.long_win_len - 1) / 2;
    let a = flipped(anom, forward);
    let b = flipped(bgerr, forward);
    let bgerr_limit = cfg.background_err_lim.sqrt();

    for ix in 0..=(nrep - cfg.long_win_len) {
        let aw = &a[ix..ix + cfg.long_win_len];
        let bw = &b[ix..ix + cfg.long_win_len];
        if bw.iter().any(|&e| e > bgerr_limit) {
            break;
        }
        let anom_avg = trim_mean(aw, 100);
        let anom_std = trim_std(aw, 100);
        let bgerr_avg = mean(bw);
        let bgerr_rms = (bw.iter().map(|e| e * e).sum::<f64>() / bw.len() as f64).sqrt();

        let biased = anom_avg.abs()
            > cfg.long_err_std_n * (cfg.drif_inter * cfg.drif_inter + bgerr_avg * bgerr_avg).sqrt();
        let noisy = anom_std > (cfg.drif_intra * cfg.drif_intra + bgerr_rms * bgerr_rms).sqrt();
        if biased || noisy {
            if forward {
                *start_tail = (ix + mid_win) as isize;
            } else {
                *end_tail = (nrep - 1 - ix - mid_win) as isize;
            }
        } else {
            break;
        }
    }
}

/// Short tail check over the stretch that survived the long check:
/// a window with enough individually-suspicious samples extends the
/// tail by one report (or swallows the stretch when every window
/// failed).
fn short_tail_scan(
    anom: &[f64],
    bgerr: &[f64],
    cfg: &TailConfig,
    first_pass: usize,
    last_pass: usize,
    forward: bool,
    start_tail: &mut isize,
    end_tail: &mut isize,
) {
    let npass = last_pass + 1 - first_pass;
    if npass < cfg.short_win_len {
        return;
    }
    let a = flipped(&anom[first_pass..=last_pass], forward);
    let b = flipped(&bgerr[first_pass..=last_pass], forward);
    let bgerr_limit = cfg.background_err_lim.sqrt();

    for ix in 0..=(npass - cfg.short_win_len) {
        let aw = &a[ix..ix + cfg.short_win_len];
        let bw = &b[ix..ix + cfg.short_win_len];
        if bw.iter().any(|&e| e > bgerr_limit) {
            break;
        }
        let bad = aw
            .iter()
            .zip(bw)
            .filter(|(an, e)| {
                let limit = cfg.short_err_std_n
                    * (**e * **e + cfg.drif_inter * cfg.drif_inter + cfg.drif_intra * cfg.drif_intra).sqrt();
                an.abs() > limit
            })
            .count();
        if bad >= cfg.short_win_n_bad {
            let step = if ix == npass - cfg.short_win_len {
                // every window failed: the whole stretch goes
                cfg.short_win_len as isize
            } else {
                1
            };
            if forward {
                *start_tail += step;
            } else {
                *end_tail -= step;
            }
        } else {
            break;
        }
    }
}

/// Tail check on a drifter voyage. Flags `drf_tail1` over a bad start
/// and `drf_tail2` over a bad end. When the two tails would meet the
/// whole record is suspect and neither is applied; whole-record
/// problems are left to the bias and noise check.
pub fn sst_tail_check(voyage: &mut Voyage, cfg: &TailConfig, night_elevation: f64) {
    if voyage.is_empty() || !voyage.is_drifter() {
        return;
    }
    voyage.set_flag_all(QcCategory::Sst, QcCheck::TailStart, 0);
    voyage.set_flag_all(QcCategory::Sst, QcCheck::TailEnd, 0);

    let series = anomaly_series(voyage, night_elevation, cfg.background_err_lim, false);
    let nrep = series.anom.len();
    if nrep == 0 {
        return;
    }

    let mut start_tail: isize = -1;
    let mut end_tail: isize = nrep as isize;

    if nrep >= cfg.long_win_len {
        long_tail_scan(&series.anom, &series.bgerr, cfg, true, &mut start_tail, &mut end_tail);
        long_tail_scan(&series.anom, &series.bgerr, cfg, false, &mut start_tail, &mut end_tail);
    }

    if start_tail < end_tail {
        let first_pass = (start_tail + 1) as usize;
        let last_pass = (end_tail - 1) as usize;
        if last_pass >= first_pass {
            short_tail_scan(
                &series.anom,
                &series.bgerr,
                cfg,
                first_pass,
                last_pass,
                true,
                &mut start_tail,
                &mut end_tail,
            );
            short_tail_scan(
                &series.anom,
                &series.bgerr,
                cfg,
                first_pass,
                last_pass,
                false,
                &mut start_tail,
                &mut end_tail,
            );
        }
    }

    // both tails met: the whole record is bad, not a tail
    if start_tail >= end_tail {
        start_tail = -1;
        end_tail = nrep as isize;
    }

    if start_tail != -1 {
        let cutoff = series.reps_ind[start_tail as usize];
        for (ind, rep) in voyage.reports_mut().iter_mut().enumerate() {
            if ind <= cutoff {
                rep.set_flag(QcCategory::Sst, QcCheck::TailStart, 1);
            }
        }
    }
    if end_tail != nrep as isize {
        let cutoff = series.reps_ind[end_tail as usize];
        for (ind, rep) in voyage.reports_mut().iter_mut().enumerate() {
            if ind >= cutoff {
                rep.set_flag(QcCategory::Sst, QcCheck::TailEnd, 1);
            }
        }
    }
}

/// Whole-record bias and noise check. Long records (at least `n_eval`
/// usable anomalies) are tested for overall bias and noise; short
/// records fall back to counting individually-suspicious anomalies,
/// but only when the background was reliable throughout.
pub fn sst_biased_noisy_check(voyage: &mut Voyage, cfg: &BiasNoiseConfig, night_elevation: f64) {
    if voyage.is_empty() || !voyage.is_drifter() {
        return;
    }
    voyage.set_flag_all(QcCategory::Sst, QcCheck::DriftBias, 0);
    voyage.set_flag_all(QcCategory::Sst, QcCheck::DriftNoise, 0);
    voyage.set_flag_all(QcCategory::Sst, QcCheck::DriftShort, 0);

    let series = anomaly_series(voyage, night_elevation, cfg.background_err_lim, true);
    let n = series.anom.len();

    if n >= cfg.n_eval {
        let anom_avg = mean(&series.anom);
        let anom_std = population_std(&series.anom);
        let bgerr_rms = (series.bgerr.iter().map(|e| e * e).sum::<f64>() / n as f64).sqrt();

        if anom_avg.abs() > cfg.bias_lim {
            voyage.set_flag_all(QcCategory::Sst, QcCheck::DriftBias, 1);
        }
        if anom_std > (cfg.drif_intra * cfg.drif_intra + bgerr_rms * bgerr_rms).sqrt() {
            voyage.set_flag_all(QcCategory::Sst, QcCheck::DriftNoise, 1);
        }
    } else if !series.bgvar_masked && n > 0 {
        let bad = series
            .anom
            .iter()
            .zip(&series.bgerr)
            .filter(|(an, e)| {
                let limit = cfg.err_std_n
                    * (**e * **e + cfg.drif_inter * cfg.drif_inter + cfg.drif_intra * cfg.drif_intra).sqrt();
                an.abs() > limit
            })
            .count();
        if bad >= cfg.n_bad {
            voyage.set_flag_all(QcCategory::Sst, QcCheck::DriftShort, 1);
        }
    }
}
