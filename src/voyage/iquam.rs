//! IQUAM-style track and spike checks (Xu and Ignatov 2013).
//!
//! Both checks count pairwise violations inside a sliding window and
//! resolve them iteratively: the report with the most violations is
//! flagged and removed from its neighbours' tallies, until none remain.
//! Ties break towards the lowest index, which keeps the outcome
//! deterministic.

use crate::checks::blacklist;
use crate::config::{IquamConfig, SpikeConfig};
use crate::observable::Observable;
use crate::report::flag::{QcCategory, QcCheck};
use crate::voyage::Voyage;

/// Worst-first resolution of pairwise violations. Returns which
/// indices end up flagged.
pub(crate) fn resolve_violations(mut violations: Vec<Vec<usize>>) -> Vec<bool> {
    let n = violations.len();
    let mut counts: Vec<usize> = violations.iter().map(Vec::len).collect();
    let mut flagged = vec![false; n];

    while counts.iter().sum::<usize>() > 0 {
        let worst = counts
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
            .map(|(i, _)| i)
            .unwrap_or(0);
        flagged[worst] = true;

        let neighbours = violations[worst].clone();
        for neighbour in neighbours {
            if let Some(pos) = violations[neighbour].iter().position(|&v| v == worst) {
                violations[neighbour].remove(pos);
                counts[neighbour] -= 1;
            }
        }
        counts[worst] = 0;
    }
    flagged
}

/// Speed-limit violations of every report against its window, using
/// the IQUAM speed estimate with distance and time slack.
pub(crate) fn iquam_violation_flags(voyage: &Voyage, cfg: &IquamConfig, speed_limit: f64) -> Vec<bool> {
    let n = voyage.len();
    let mut violations: Vec<Vec<usize>> = Vec::with_capacity(n);

    for t1 in 0..n {
        let lo = t1.saturating_sub(cfg.number_of_neighbours);
        let hi = (t1 + cfg.number_of_neighbours + 1).min(n);
        let mut for_this_report = Vec::new();

        for t2 in lo..hi {
            let motion = match voyage.pair_motion(t1, t2) {
                Ok(m) => m,
                Err(_) => continue,
            };
            let iquam_speed =
                (motion.distance.abs() - cfg.delta_d).max(0.0) / (motion.time_diff.abs() + cfg.delta_t);
            if iquam_speed > speed_limit {
                for_this_report.push(t2);
            }
        }
        violations.push(for_this_report);
    }

    resolve_violations(violations)
}

impl Voyage {
    /// IQUAM track check. Generic platform ids are exempt.
    pub fn iquam_track_check(&mut self, cfg: &IquamConfig) {
        if self.is_empty() {
            return;
        }
        if blacklist::id_is_generic(self.get(0).id(), self.get(0).year()) {
            self.set_flag_all(QcCategory::Position, QcCheck::IquamTrack, 0);
            return;
        }

        let speed_limit = if self.is_buoy() {
            cfg.buoy_speed_limit
        } else {
            cfg.ship_speed_limit
        };

        let flags = iquam_violation_flags(self, cfg, speed_limit);
        for (rep, flagged) in self.reps.iter_mut().zip(flags) {
            rep.set_flag(QcCategory::Position, QcCheck::IquamTrack, u8::from(flagged));
        }
    }

    /// IQUAM-style spike check on the given variable.
    ///
    /// A neighbour pair violates when its value change exceeds the
    /// platform tolerance widened by the spatial and temporal gradient
    /// allowances.
    pub fn spike_check(&mut self, cfg: &SpikeConfig, var: Observable) {
        let n = self.len();
        if n == 0 {
            return;
        }
        let category = match var.category() {
            Some(cat) => cat,
            None => return,
        };
        let delta_t = if self.is_buoy() { cfg.buoy_delta_t } else { cfg.ship_delta_t };

        let mut violations: Vec<Vec<usize>> = Vec::with_capacity(n);
        for t1 in 0..n {
            let lo = t1.saturating_sub(cfg.number_of_neighbours);
            let hi = (t1 + cfg.number_of_neighbours + 1).min(n);
            let mut for_this_report = Vec::new();

            if let Some(v1) = self.get(t1).value(var) {
                for t2 in lo..hi {
                    let v2 = match self.get(t2).value(var) {
                        Some(v) => v,
                        None => continue,
                    };
                    let motion = match self.pair_motion(t1, t2) {
                        Ok(m) => m,
                        Err(_) => continue,
                    };
                    let tolerance = delta_t
                        .max(motion.distance.abs() * cfg.max_gradient_space)
                        .max(motion.time_diff.abs() * cfg.max_gradient_time);
                    if (v2 - v1).abs() > tolerance {
                        for_this_report.push(t2);
                    }
                }
            }
            violations.push(for_this_report);
        }

        let flags = resolve_violations(violations);
        for (rep, flagged) in self.reps.iter_mut().zip(flags) {
            rep.set_flag(category, QcCheck::Spike, u8::from(flagged));
        }
    }
}
