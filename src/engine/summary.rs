//! Per-batch statistics.

use crate::observable::Observable;
use crate::report::flag::{QcCategory, QcCheck};
use crate::report::Report;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::Serialize;

/// How many distinct failing values are kept per check.
const TOP_VALUES: usize = 10;

/// Counters accumulated over one processed batch.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct BatchSummary {
    /// Reports offered to the engine
    pub read: u64,
    /// Reports that passed the base positional filter
    pub selected: u64,
    /// Reports on a blacklist
    pub excluded: u64,
    /// Reports with a failed position, date or time
    pub invalid: u64,
    /// Voyages skipped because their preprocess failed
    pub unprocessable_voyages: u64,
    /// Number of failing reports per check, keyed "CATEGORY.check"
    pub check_fails: BTreeMap<String, u64>,
    /// Most frequent distinct failing values per check, with counts
    pub top_failing_values: BTreeMap<String, Vec<(String, u64)>>,
}

fn failing_value(rep: &Report, category: QcCategory) -> Option<String> {
    let var = match category {
        QcCategory::Sst => Observable::Sst,
        QcCategory::At => Observable::At,
        QcCategory::At2 => Observable::At2,
        QcCategory::Dpt => Observable::Dpt,
        QcCategory::Slp => Observable::Slp,
        QcCategory::Wind => Observable::WindSpeed,
        QcCategory::Direction => Observable::WindDirection,
        QcCategory::Position => {
            return match (rep.latitude(), rep.longitude_raw()) {
                (Some(lat), Some(lon)) => Some(format!("{lat:.2},{lon:.2}")),
                _ => None,
            }
        },
    };
    rep.value(var).map(|v| format!("{v:.1}"))
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one report's flags into the counters.
    pub fn record(&mut self, rep: &Report) {
        self.read += 1;

        if rep.flag(QcCategory::Position, QcCheck::Blacklist) == 1 {
            self.excluded += 1;
        }
        let positional = [QcCheck::Position, QcCheck::Date, QcCheck::Time];
        if positional
            .iter()
            .any(|&chk| rep.flag(QcCategory::Position, chk) == 1)
        {
            self.invalid += 1;
        }

        for (category, check, value) in rep.flags().iter() {
            if value != 1 {
                continue;
            }
            let key = format!("{category}.{check}");
            *self.check_fails.entry(key.clone()).or_insert(0) += 1;

            if let Some(text) = failing_value(rep, category) {
                let values = self.top_failing_values.entry(key).or_default();
                if let Some(entry) = values.iter_mut().find(|(v, _)| *v == text) {
                    entry.1 += 1;
                } else if values.len() < TOP_VALUES {
                    values.push((text, 1));
                }
            }
        }
    }

    pub fn mark_selected(&mut self) {
        self.selected += 1;
    }

    /// Sorts each value list by descending count.
    pub fn finalise(&mut self) {
        for values in self.top_failing_values.values_mut() {
            values.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::report::flag::QcOutcome;

    #[test]
    fn counters_accumulate() {
        let mut summary = BatchSummary::new();

        let mut good = Report::new("SHIP1", "u1").with_value(Observable::Sst, 20.0);
        good.set_outcome(QcCategory::Position, QcCheck::Date, QcOutcome::Pass);
        summary.record(&good);

        let mut bad = Report::new("SHIP2", "u2").with_value(Observable::Sst, 45.0);
        bad.set_outcome(QcCategory::Position, QcCheck::Date, QcOutcome::Fail);
        bad.set_outcome(QcCategory::Sst, QcCheck::Climatology, QcOutcome::Fail);
        summary.record(&bad);

        let mut listed = Report::new("SHIP3", "u3");
        listed.set_flag(QcCategory::Position, QcCheck::Blacklist, 1);
        summary.record(&listed);

        summary.finalise();

        assert_eq!(summary.read, 3);
        assert_eq!(summary.invalid, 1);
        assert_eq!(summary.excluded, 1);
        assert_eq!(summary.check_fails.get("POS.date"), Some(&1));
        assert_eq!(summary.check_fails.get("SST.clim"), Some(&1));
        let top = summary.top_failing_values.get("SST.clim").unwrap();
        assert_eq!(top[0], ("45.0".to_string(), 1));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn summary_serialises() {
        let mut summary = BatchSummary::new();
        summary.record(&Report::new("SHIP1", "u1"));
        let text = serde_json::to_string(&summary).unwrap();
        assert!(text.contains("\"read\":1"));
    }
}
