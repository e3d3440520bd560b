//! Run- and distribution-based voyage checks: persistent saturation,
//! over-represented values and rounded values.

use crate::config::{RepeatedValuesConfig, RoundedValuesConfig, SaturatedRunsConfig};
use crate::observable::Observable;
use crate::report::flag::{QcCategory, QcCheck};
use crate::voyage::Voyage;
use itertools::Itertools;
use std::collections::HashMap;

impl Voyage {
    /// Flags runs of saturated reports (dew point equal to air
    /// temperature) that are both longer than `shortest_run` reports
    /// and span at least `min_time_threshold` hours.
    pub fn find_saturated_runs(&mut self, cfg: &SaturatedRunsConfig) {
        self.set_flag_all(QcCategory::Dpt, QcCheck::RepeatedSaturation, 0);

        // collect the maximal runs of saturated reports long enough to
        // be candidates
        let mut candidates: Vec<Vec<usize>> = Vec::new();
        let mut run: Vec<usize> = Vec::new();
        for i in 0..self.len() {
            if self.get(i).saturated() {
                run.push(i);
            } else if run.len() > cfg.shortest_run {
                candidates.push(std::mem::take(&mut run));
            } else {
                run.clear();
            }
        }
        if run.len() > cfg.shortest_run {
            candidates.push(run);
        }

        // a candidate fails only when it also spans enough time
        let mut to_flag: Vec<usize> = Vec::new();
        for run in candidates {
            let (first, last) = (run[0], run[run.len() - 1]);
            if let Ok(motion) = self.pair_motion(first, last) {
                if motion.time_diff >= cfg.min_time_threshold {
                    to_flag.extend(run);
                }
            }
        }
        for i in to_flag {
            self.reps[i].set_flag(QcCategory::Dpt, QcCheck::RepeatedSaturation, 1);
        }
    }

    fn value_groups(&self, var: Observable) -> (usize, HashMap<u64, Vec<usize>>) {
        let groups: HashMap<u64, Vec<usize>> = self
            .reps
            .iter()
            .enumerate()
            .filter_map(|(i, rep)| rep.value(var).map(|v| (v.to_bits(), i)))
            .into_group_map();
        let count = groups.values().map(Vec::len).sum();
        (count, groups)
    }

    /// Flags every occurrence of a value that accounts for more than
    /// `threshold` of the non-missing observations, on voyages with
    /// more than `min_count` of them.
    pub fn find_repeated_values(&mut self, cfg: &RepeatedValuesConfig, var: Observable) {
        let category = match var.category() {
            Some(cat) => cat,
            None => return,
        };
        for rep in &mut self.reps {
            rep.set_flag(category, QcCheck::RepeatedValue, 0);
        }

        let (count, groups) = self.value_groups(var);
        if count <= cfg.min_count {
            return;
        }
        for indices in groups.values() {
            if indices.len() as f64 / count as f64 > cfg.threshold {
                for &i in indices {
                    self.reps[i].set_flag(category, QcCheck::RepeatedValue, 1);
                }
            }
        }
    }

    /// Flags whole-number observations when they make up at least
    /// `threshold` of the non-missing values, a signature of rounding
    /// in the humidity record.
    pub fn find_rounded_values(&mut self, cfg: &RoundedValuesConfig, var: Observable) {
        let category = match var.category() {
            Some(cat) => cat,
            None => return,
        };
        for rep in &mut self.reps {
            rep.set_flag(category, QcCheck::RoundedValue, 0);
        }

        let (count, groups) = self.value_groups(var);
        if count <= cfg.min_count {
            return;
        }
        let whole: Vec<&Vec<usize>> = groups
            .iter()
            .filter(|(bits, _)| f64::from_bits(**bits).fract() == 0.0)
            .map(|(_, indices)| indices)
            .collect();
        let wholes: usize = whole.iter().map(|v| v.len()).sum();
        if wholes as f64 / count as f64 >= cfg.threshold {
            for indices in whole {
                for &i in indices {
                    self.reps[i].set_flag(category, QcCheck::RoundedValue, 1);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::report::Report;

    fn rep(i: usize, dpt: f64, at: f64) -> Report {
        Report::new("SHIP1    ", format!("u{i}"))
            .with_date(1985, 6, 1 + (i / 8) as u32)
            .with_hour((i % 8) as f64 * 3.0)
            .with_position(0.0, 0.0)
            .with_value(Observable::Dpt, dpt)
            .with_value(Observable::At, at)
    }

    #[test]
    fn long_saturated_run_is_flagged() {
        let mut v = Voyage::new();
        // 25 saturated reports spread over > 48 hours, then a break
        for i in 0..25 {
            v.push(rep(i, 15.0, 15.0));
        }
        v.push(rep(25, 10.0, 15.0));
        v.sort();
        v.find_saturated_runs(&SaturatedRunsConfig::default());

        for (i, r) in v.reports().iter().enumerate() {
            let expected = u8::from(i < 25);
            assert_eq!(r.flag(QcCategory::Dpt, QcCheck::RepeatedSaturation), expected, "report {i}");
        }
    }

    #[test]
    fn short_saturated_run_passes() {
        let mut v = Voyage::new();
        for i in 0..10 {
            v.push(rep(i, 15.0, 15.0));
        }
        v.sort();
        v.find_saturated_runs(&SaturatedRunsConfig::default());
        for r in v.reports() {
            assert_eq!(r.flag(QcCategory::Dpt, QcCheck::RepeatedSaturation), 0);
        }
    }

    #[test]
    fn fast_saturated_run_passes() {
        // a long run squeezed into too little time
        let mut v = Voyage::new();
        for i in 0..25 {
            v.push(
                Report::new("SHIP1    ", format!("u{i}"))
                    .with_date(1985, 6, 1)
                    .with_hour(i as f64 / 2.0)
                    .with_position(0.0, 0.0)
                    .with_value(Observable::Dpt, 15.0)
                    .with_value(Observable::At, 15.0),
            );
        }
        v.sort();
        v.find_saturated_runs(&SaturatedRunsConfig::default());
        for r in v.reports() {
            assert_eq!(r.flag(QcCategory::Dpt, QcCheck::RepeatedSaturation), 0);
        }
    }

    #[test]
    fn repeated_values_above_threshold() {
        let mut v = Voyage::new();
        for i in 0..30 {
            let sst = if i < 24 { 20.0 } else { 15.0 + i as f64 };
            v.push(
                rep(i, 10.0, 15.0).with_value(Observable::Sst, sst),
            );
        }
        v.sort();
        v.find_repeated_values(&RepeatedValuesConfig::default(), Observable::Sst);
        for (i, r) in v.reports().iter().enumerate() {
            let expected = u8::from(r.value(Observable::Sst) == Some(20.0));
            assert_eq!(r.flag(QcCategory::Sst, QcCheck::RepeatedValue), expected, "report {i}");
        }
    }

    #[test]
    fn repeated_values_needs_enough_reports() {
        let mut v = Voyage::new();
        for i in 0..10 {
            v.push(rep(i, 10.0, 15.0).with_value(Observable::Sst, 20.0));
        }
        v.sort();
        v.find_repeated_values(&RepeatedValuesConfig::default(), Observable::Sst);
        for r in v.reports() {
            assert_eq!(r.flag(QcCategory::Sst, QcCheck::RepeatedValue), 0);
        }
    }

    #[test]
    fn rounded_values_flag_whole_numbers_only() {
        let mut v = Voyage::new();
        for i in 0..30 {
            let dpt = if i < 20 { 12.0 } else { 12.3 };
            v.push(rep(i, dpt, 15.0));
        }
        v.sort();
        v.find_rounded_values(&RoundedValuesConfig::default(), Observable::Dpt);
        for r in v.reports() {
            let expected = u8::from(r.value(Observable::Dpt) == Some(12.0));
            assert_eq!(r.flag(QcCategory::Dpt, QcCheck::RoundedValue), expected);
        }
    }

    #[test]
    fn unrounded_record_passes() {
        let mut v = Voyage::new();
        for i in 0..30 {
            v.push(rep(i, 12.3 + i as f64 * 0.1, 25.0));
        }
        v.sort();
        v.find_rounded_values(&RoundedValuesConfig::default(), Observable::Dpt);
        for r in v.reports() {
            assert_eq!(r.flag(QcCategory::Dpt, QcCheck::RoundedValue), 0);
        }
    }
}
