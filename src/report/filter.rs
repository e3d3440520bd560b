//! Rule-list filters over report flags.
//!
//! A filter is a conjunction of (category, check, required value)
//! conditions. The buddy checks use filters to decide which reports
//! contribute to, and are judged by, the super-observation grid.

use crate::report::flag::{QcCategory, QcCheck};
use crate::report::Report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterRule {
    pub category: QcCategory,
    pub check: QcCheck,
    pub required: u8,
}

/// Conjunction of flag conditions. An empty filter passes everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QcFilter {
    rules: Vec<FilterRule>,
}

impl QcFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition: the given flag must hold exactly `required`.
    pub fn require(mut self, category: QcCategory, check: QcCheck, required: u8) -> Self {
        self.rules.push(FilterRule { category, check, required });
        self
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// True when every condition holds for the report.
    pub fn passes(&self, report: &Report) -> bool {
        self.rules
            .iter()
            .all(|rule| report.flag(rule.category, rule.check) == rule.required)
    }

    /// Splits reports into those passing and those failing the filter,
    /// preserving order.
    pub fn split(&self, reports: Vec<Report>) -> (Vec<Report>, Vec<Report>) {
        reports.into_iter().partition(|rep| self.passes(rep))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::report::flag::QcOutcome;

    #[test]
    fn empty_filter_passes() {
        let rep = Report::new("SHIP1", "uid00001");
        assert!(QcFilter::new().passes(&rep));
    }

    #[test]
    fn conditions_are_conjunctive() {
        let mut rep = Report::new("SHIP1", "uid00001");
        rep.set_outcome(QcCategory::Position, QcCheck::Date, QcOutcome::Pass);
        rep.set_outcome(QcCategory::Position, QcCheck::Time, QcOutcome::Fail);

        let date_only = QcFilter::new().require(QcCategory::Position, QcCheck::Date, 0);
        assert!(date_only.passes(&rep));

        let both = date_only.require(QcCategory::Position, QcCheck::Time, 0);
        assert!(!both.passes(&rep));
    }

    #[test]
    fn unset_flags_do_not_pass_zero_conditions() {
        let rep = Report::new("SHIP1", "uid00001");
        let filt = QcFilter::new().require(QcCategory::Position, QcCheck::Date, 0);
        assert!(!filt.passes(&rep));
    }
}
