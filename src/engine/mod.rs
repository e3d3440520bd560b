//! The QC engine: binds a configuration, a climatology library and an
//! optional background field, and drives a batch of reports through the
//! single-report, track-level and buddy phases in order.

pub mod summary;

pub use summary::BatchSummary;

use crate::buddy::{self, BayesianFields};
use crate::checks::{self, blacklist};
use crate::climatology::{ClimField, ClimatologyLibrary};
use crate::config::{Config, VariableConfig};
use crate::drifter::{self, background::BackgroundField, tail};
use crate::errors::EngineError;
use crate::observable::Observable;
use crate::report::flag::{QcCategory, QcCheck, QcOutcome};
use crate::report::{filter::QcFilter, Report};
use crate::voyage::Deck;
use log::{debug, warn};
use std::sync::Arc;

/// Variables whose climatological normals are attached to each report.
const NORMAL_VARS: [Observable; 10] = [
    Observable::Sst,
    Observable::At,
    Observable::At2,
    Observable::Dpt,
    Observable::Slp,
    Observable::Shu,
    Observable::Vap,
    Observable::Crh,
    Observable::Cwb,
    Observable::Dpd,
];

pub struct QcEngine {
    cfg: Config,
    climatology: ClimatologyLibrary,
    background: Option<Arc<dyn BackgroundField>>,
}

impl QcEngine {
    /// Builds an engine, rejecting a self-inconsistent configuration.
    pub fn new(cfg: Config, climatology: ClimatologyLibrary) -> Result<Self, EngineError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            climatology,
            background: None,
        })
    }

    /// Adds a background field, enabling the drifter checks.
    pub fn with_background(mut self, background: Arc<dyn BackgroundField>) -> Self {
        self.background = Some(background);
        self
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The positional filter a report must pass to take part in the
    /// track-level checks.
    pub fn base_filter() -> QcFilter {
        QcFilter::new()
            .require(QcCategory::Position, QcCheck::Date, 0)
            .require(QcCategory::Position, QcCheck::Time, 0)
            .require(QcCategory::Position, QcCheck::Position, 0)
            .require(QcCategory::Position, QcCheck::Blacklist, 0)
    }

    fn sst_buddy_filter() -> QcFilter {
        Self::base_filter()
            .require(QcCategory::Position, QcCheck::IsDeck780, 0)
            .require(QcCategory::Position, QcCheck::Track, 0)
            .require(QcCategory::Sst, QcCheck::NoValue, 0)
            .require(QcCategory::Sst, QcCheck::Freeze, 0)
            .require(QcCategory::Sst, QcCheck::Climatology, 0)
            .require(QcCategory::Sst, QcCheck::NoNormal, 0)
    }

    fn mat_buddy_filter() -> QcFilter {
        Self::base_filter()
            .require(QcCategory::Position, QcCheck::IsShip, 1)
            .require(QcCategory::At, QcCheck::MatBlacklist, 0)
            .require(QcCategory::Position, QcCheck::Track, 0)
            .require(QcCategory::Position, QcCheck::Day, 0)
            .require(QcCategory::At, QcCheck::NoValue, 0)
            .require(QcCategory::At, QcCheck::Climatology, 0)
            .require(QcCategory::At, QcCheck::NoNormal, 0)
    }

    fn dpt_buddy_filter() -> QcFilter {
        Self::base_filter()
            .require(QcCategory::Dpt, QcCheck::HumidityBlacklist, 0)
            .require(QcCategory::Position, QcCheck::Track, 0)
            .require(QcCategory::Dpt, QcCheck::NoValue, 0)
            .require(QcCategory::Dpt, QcCheck::Climatology, 0)
            .require(QcCategory::Dpt, QcCheck::NoNormal, 0)
    }

    fn slp_buddy_filter() -> QcFilter {
        Self::base_filter()
            .require(QcCategory::Position, QcCheck::Track, 0)
            .require(QcCategory::Slp, QcCheck::NoValue, 0)
            .require(QcCategory::Slp, QcCheck::Climatology, 0)
            .require(QcCategory::Slp, QcCheck::NoNormal, 0)
    }

    /// Attaches climatology, derived variables and background matches.
    pub fn prepare_report(&self, rep: &mut Report) {
        // deck 701 carries otherwise good early reports with missing
        // hours; set them to midnight
        if rep.deck() == Some(701)
            && matches!(rep.year(), Some(y) if y < 1860)
            && rep.hour().is_none()
        {
            rep.set_hour(Some(0.0));
        }

        // the humidity QC keeps its own air temperature copy
        if rep.value(Observable::At2).is_none() {
            rep.set_value(Observable::At2, rep.value(Observable::At));
        }

        if let (Some(lat), Some(lon), Some(month), Some(day)) =
            (rep.latitude(), rep.longitude(), rep.month(), rep.day())
        {
            for var in NORMAL_VARS {
                let mean = self.climatology.mean(var, lat, lon, month, day);
                let stdev = self.climatology.stdev(var, lat, lon, month, day);
                rep.attach_normal(var, mean, stdev);
            }
        }

        rep.calculate_humidity();

        if let Some(background) = &self.background {
            drifter::background::attach_background(rep, background.as_ref());
        }
    }

    fn climatology_qc(&self, rep: &mut Report, var: Observable, vcfg: &VariableConfig) {
        let category = match var.category() {
            Some(cat) => cat,
            None => return,
        };
        let value = rep.value(var);
        let mean = rep.norm(var);

        rep.set_outcome(category, QcCheck::NoValue, checks::value_check(value));
        let clim = if vcfg.standardised {
            checks::climatology_check(
                value,
                mean,
                vcfg.maximum_anomaly,
                rep.norm_stdev(var),
                vcfg.stdev_limits,
                vcfg.lowbar,
            )
        } else {
            checks::climatology_check(value, mean, vcfg.maximum_anomaly, None, None, vcfg.lowbar)
        };
        rep.set_outcome(category, QcCheck::Climatology, clim);
        rep.set_outcome(category, QcCheck::NoNormal, checks::no_normal_check(mean));
    }

    /// Runs every single-report check and stores the flags.
    pub fn single_report_qc(&self, rep: &mut Report) {
        let cfg = &self.cfg;

        // platform classifiers
        let pt = rep.platform_type();
        let is_ship = matches!(pt, Some(0..=5) | Some(10..=12) | Some(17));
        let is_buoy = matches!(pt, Some(6) | Some(7));
        rep.set_flag(QcCategory::Position, QcCheck::IsShip, u8::from(is_ship));
        rep.set_flag(QcCategory::Position, QcCheck::IsBuoy, u8::from(is_buoy));
        rep.set_flag(QcCategory::Position, QcCheck::IsDrifter, u8::from(pt == Some(7)));
        rep.set_flag(QcCategory::Position, QcCheck::IsDeck780, u8::from(rep.deck() == Some(780)));

        // position, date, time, day
        rep.set_outcome(
            QcCategory::Position,
            QcCheck::Position,
            checks::position_check(rep.latitude(), rep.longitude_raw()),
        );
        rep.set_outcome(
            QcCategory::Position,
            QcCheck::Date,
            checks::date_check(rep.year(), rep.month(), rep.day()),
        );
        rep.set_outcome(QcCategory::Position, QcCheck::Time, checks::time_check(rep.hour()));
        rep.set_outcome(
            QcCategory::Position,
            QcCheck::Day,
            checks::day_check(
                rep.year(),
                rep.month(),
                rep.day(),
                rep.hour(),
                rep.latitude(),
                rep.longitude(),
                cfg.hours_since_sun_above_horizon,
            ),
        );

        // blacklists
        let listed = blacklist::blacklist(
            rep.id(),
            rep.deck(),
            rep.year(),
            rep.month(),
            rep.latitude(),
            rep.longitude(),
            rep.platform_type(),
        );
        rep.set_flag(QcCategory::Position, QcCheck::Blacklist, u8::from(listed));
        rep.set_flag(
            QcCategory::Dpt,
            QcCheck::HumidityBlacklist,
            u8::from(blacklist::humidity_blacklist(rep.platform_type())),
        );
        rep.set_flag(
            QcCategory::At,
            QcCheck::MatBlacklist,
            u8::from(blacklist::mat_blacklist(
                rep.platform_type(),
                rep.deck(),
                rep.latitude(),
                rep.longitude(),
                rep.year(),
            )),
        );
        rep.set_flag(
            QcCategory::Wind,
            QcCheck::WindBlacklist,
            u8::from(blacklist::wind_blacklist(rep.deck())),
        );

        // sea-surface temperature
        self.climatology_qc(rep, Observable::Sst, &cfg.sst_limits);
        rep.set_outcome(
            QcCategory::Sst,
            QcCheck::Freeze,
            checks::sst_freeze_check(
                rep.value(Observable::Sst),
                Some(cfg.sst.uncertainty),
                Some(cfg.sst.freezing_point),
                Some(cfg.sst.freeze_n_sigma),
            ),
        );
        rep.set_outcome(
            QcCategory::Sst,
            QcCheck::HardLimit,
            checks::hard_limit_check(rep.value(Observable::Sst), cfg.sst_limits.hard_limits),
        );

        // air temperature, twice: plain and standardised for humidity
        self.climatology_qc(rep, Observable::At, &cfg.at_limits);
        rep.set_outcome(
            QcCategory::At,
            QcCheck::HardLimit,
            checks::hard_limit_check(rep.value(Observable::At), cfg.at_limits.hard_limits),
        );
        self.climatology_qc(rep, Observable::At2, &cfg.at2_limits);
        rep.set_outcome(
            QcCategory::At2,
            QcCheck::HardLimit,
            checks::hard_limit_check(rep.value(Observable::At2), cfg.at2_limits.hard_limits),
        );

        // dew point
        self.climatology_qc(rep, Observable::Dpt, &cfg.dpt_limits);
        rep.set_outcome(
            QcCategory::Dpt,
            QcCheck::Supersaturation,
            checks::supersaturation_check(rep.value(Observable::Dpt), rep.value(Observable::At2)),
        );
        // one combined plausibility flag across the humidity family
        let silly = [
            checks::hard_limit_check(rep.value(Observable::At), cfg.at_limits.hard_limits),
            checks::hard_limit_check(rep.value(Observable::Dpt), cfg.dpt_limits.hard_limits),
            checks::hard_limit_check(rep.value(Observable::Shu), cfg.shu_hard_limits),
            checks::hard_limit_check(rep.value(Observable::Crh), cfg.crh_hard_limits),
        ]
        .into_iter()
        .any(|o| o == QcOutcome::Fail);
        rep.set_flag(QcCategory::Dpt, QcCheck::HardLimit, u8::from(silly));

        // sea-level pressure
        self.climatology_qc(rep, Observable::Slp, &cfg.slp_limits);

        // wind
        rep.set_outcome(
            QcCategory::Wind,
            QcCheck::NoValue,
            checks::value_check(rep.value(Observable::WindSpeed)),
        );
        rep.set_outcome(
            QcCategory::Wind,
            QcCheck::HardLimit,
            checks::hard_limit_check(rep.value(Observable::WindSpeed), cfg.wind_hard_limits),
        );
        rep.set_outcome(
            QcCategory::Wind,
            QcCheck::WindConsistency,
            checks::wind_consistency_check(
                rep.value(Observable::WindSpeed),
                rep.value(Observable::WindDirection),
            ),
        );
    }

    fn track_phase(&self, deck: &mut Deck, summary: &mut BatchSummary) {
        let cfg = &self.cfg;
        let voyages = deck.extract_voyages(&Self::base_filter());
        let mut processed = Vec::with_capacity(voyages.len());

        for mut voyage in voyages {
            voyage.sort();
            match voyage.derive_kinematics() {
                Err(err) => {
                    summary.unprocessable_voyages += 1;
                    let failure = EngineError::UnprocessableVoyage {
                        id: voyage.id().to_string(),
                        reason: err.to_string(),
                    };
                    warn!("{failure}");
                },
                Ok(()) => {
                    voyage.track_check(&cfg.track);
                    voyage.iquam_track_check(&cfg.iquam);
                    voyage.spike_check(&cfg.spike, Observable::Sst);
                    voyage.find_saturated_runs(&cfg.saturated_runs);
                    voyage.find_rounded_values(&cfg.rounded_values, Observable::Dpt);
                    for var in [
                        Observable::Sst,
                        Observable::At,
                        Observable::At2,
                        Observable::Dpt,
                        Observable::Slp,
                    ] {
                        voyage.find_repeated_values(&cfg.repeated_values, var);
                    }

                    if voyage.is_drifter() && self.background.is_some() {
                        drifter::aground_check(&mut voyage, &cfg.aground);
                        drifter::speed_check(&mut voyage, &cfg.drift_speed, &cfg.iquam);
                        tail::sst_tail_check(&mut voyage, &cfg.tail, cfg.drifter_night_elevation);
                        tail::sst_biased_noisy_check(&mut voyage, &cfg.bias_noise, cfg.drifter_night_elevation);
                    }
                },
            }
            processed.push(voyage);
        }
        deck.absorb(processed);
    }

    fn stdev_field_for(&self, var: Observable) -> Option<&Arc<dyn crate::climatology::ClimatologyField>> {
        self.climatology
            .get(ClimField::Stdev(var))
            .or_else(|| self.climatology.get(ClimField::Stdev(Observable::Sst)))
    }

    fn buddy_phase(&self, deck: &mut Deck) -> Result<(), EngineError> {
        let cfg = &self.cfg;

        let bayesian_fields = match (
            self.climatology.get(ClimField::BuddyOneBoxToBuddyAvg),
            self.climatology.get(ClimField::BuddyOneObToBoxAvg),
            self.climatology.get(ClimField::BuddyAvgSampling),
        ) {
            (Some(a), Some(b), Some(c)) => Some((a.clone(), b.clone(), c.clone())),
            _ => None,
        };

        for (var, filter) in [
            (Observable::Sst, Self::sst_buddy_filter()),
            (Observable::At, Self::mat_buddy_filter()),
        ] {
            if let Some((a, b, c)) = &bayesian_fields {
                let fields = BayesianFields {
                    one_box_to_buddy_avg: a.as_ref(),
                    one_ob_to_box_avg: b.as_ref(),
                    avg_sampling: c.as_ref(),
                };
                buddy::bayesian_buddy_check(deck.reports_mut(), var, &fields, &filter, &cfg.bayesian_buddy)?;
            } else {
                debug!("bayesian stdev fields unbound, skipping bayesian buddy check for {var}");
            }
            match self.stdev_field_for(var) {
                Some(stdev) => {
                    buddy::mds_buddy_check(deck.reports_mut(), var, stdev.as_ref(), &filter, &cfg.mds_buddy)?
                },
                None => debug!("no stdev climatology bound, skipping MDS buddy check for {var}"),
            }
        }

        for (var, filter) in [
            (Observable::Dpt, Self::dpt_buddy_filter()),
            (Observable::Slp, Self::slp_buddy_filter()),
        ] {
            match self.climatology.get(ClimField::Stdev(var)) {
                Some(stdev) => {
                    buddy::mds_buddy_check(deck.reports_mut(), var, stdev.as_ref(), &filter, &cfg.mds_buddy)?
                },
                None => debug!("no stdev climatology bound, skipping MDS buddy check for {var}"),
            }
        }
        Ok(())
    }

    /// Runs the whole QC sequence over a deck: preparation and
    /// single-report checks, the per-platform track and drifter phases,
    /// then the buddy checks, in that order.
    ///
    /// `year` and `month` name the batch's target month; reports from
    /// the surrounding months take part in everything but are marked
    /// with a zero `month_match` flag.
    pub fn process(&self, deck: &mut Deck, year: i32, month: u32) -> Result<BatchSummary, EngineError> {
        debug!("processing {} reports for {year}-{month:02}", deck.len());
        let mut summary = BatchSummary::new();

        for rep in deck.reports_mut() {
            self.prepare_report(rep);
            self.single_report_qc(rep);
            let matches = rep.year() == Some(year) && rep.month() == Some(month);
            rep.set_flag(QcCategory::Position, QcCheck::MonthMatch, u8::from(matches));
        }

        self.track_phase(deck, &mut summary);
        self.buddy_phase(deck)?;

        deck.sort();
        let base = Self::base_filter();
        for rep in deck.reports() {
            summary.record(rep);
            if base.passes(rep) {
                summary.mark_selected();
            }
        }
        summary.finalise();
        Ok(summary)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::climatology::ScalarField;

    fn library() -> ClimatologyLibrary {
        let mut lib = ClimatologyLibrary::new();
        lib.bind(ClimField::Mean(Observable::Sst), Arc::new(ScalarField(15.0)));
        lib.bind(ClimField::Stdev(Observable::Sst), Arc::new(ScalarField(1.5)));
        lib.bind(ClimField::Mean(Observable::At), Arc::new(ScalarField(14.0)));
        lib.bind(ClimField::Mean(Observable::At2), Arc::new(ScalarField(14.0)));
        lib.bind(ClimField::Stdev(Observable::At2), Arc::new(ScalarField(2.0)));
        lib.bind(ClimField::Mean(Observable::Dpt), Arc::new(ScalarField(12.0)));
        lib.bind(ClimField::Stdev(Observable::Dpt), Arc::new(ScalarField(2.0)));
        lib.bind(ClimField::Mean(Observable::Slp), Arc::new(ScalarField(1013.0)));
        lib.bind(ClimField::Stdev(Observable::Slp), Arc::new(ScalarField(5.0)));
        lib
    }

    fn engine() -> QcEngine {
        QcEngine::new(Config::default(), library()).unwrap()
    }

    fn report() -> Report {
        Report::new("GOODSHIP1", "u1")
            .with_date(1985, 6, 15)
            .with_hour(12.0)
            .with_position(45.0, -30.0)
            .with_deck(900)
            .with_platform_type(1)
            .with_value(Observable::Sst, 16.0)
            .with_value(Observable::At, 15.0)
            .with_value(Observable::Dpt, 12.0)
            .with_value(Observable::Slp, 1015.0)
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = Config::default();
        cfg.aground.smooth_win = 2;
        assert!(matches!(
            QcEngine::new(cfg, library()),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn preparation_attaches_normals_and_humidity() {
        let eng = engine();
        let mut rep = report();
        eng.prepare_report(&mut rep);

        assert_eq!(rep.norm(Observable::Sst), Some(15.0));
        assert_eq!(rep.anomaly(Observable::Sst), Some(1.0));
        // AT2 mirrored from AT
        assert_eq!(rep.value(Observable::At2), Some(15.0));
        // humidity derived against climatological pressure
        assert!(rep.value(Observable::Shu).is_some());
        assert!(rep.value(Observable::Crh).is_some());
    }

    #[test]
    fn single_report_qc_sets_the_expected_flags() {
        let eng = engine();
        let mut rep = report();
        eng.prepare_report(&mut rep);
        eng.single_report_qc(&mut rep);

        assert_eq!(rep.flag(QcCategory::Position, QcCheck::Position), 0);
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::Date), 0);
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::Time), 0);
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::Blacklist), 0);
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::IsShip), 1);
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::IsBuoy), 0);
        assert_eq!(rep.flag(QcCategory::Sst, QcCheck::NoValue), 0);
        assert_eq!(rep.flag(QcCategory::Sst, QcCheck::Climatology), 0);
        assert_eq!(rep.flag(QcCategory::Sst, QcCheck::Freeze), 0);
        assert_eq!(rep.flag(QcCategory::Dpt, QcCheck::Supersaturation), 0);
        // wind was never reported: untestable consistency, failed noval
        assert_eq!(rep.flag(QcCategory::Wind, QcCheck::NoValue), 1);
        assert_eq!(rep.flag(QcCategory::Wind, QcCheck::WindConsistency), 2);
    }

    #[test]
    fn deck_701_missing_hour_is_fixed() {
        let eng = engine();
        let mut rep = Report::new("OLDSHIP", "u1")
            .with_date(1855, 6, 15)
            .with_position(45.0, -30.0)
            .with_deck(701);
        assert!(!rep.timestamp_is_valid());
        eng.prepare_report(&mut rep);
        assert_eq!(rep.hour(), Some(0.0));
        assert!(rep.timestamp_is_valid());
    }

    #[test]
    fn process_runs_end_to_end() {
        let eng = engine();
        let mut deck = Deck::new();
        for i in 0..24 {
            let mut rep = report();
            rep.set_date(Some(1985), Some(6), Some(1 + i / 12));
            rep.set_hour(Some((i % 12) as f64 * 2.0));
            rep.set_position(Some(45.0 + i as f64 * 0.05), Some(-30.0));
            deck.push(rep);
        }
        let summary = eng.process(&mut deck, 1985, 6).unwrap();

        assert_eq!(summary.read, 24);
        assert_eq!(summary.selected, 24);
        assert_eq!(summary.invalid, 0);
        assert_eq!(summary.unprocessable_voyages, 0);

        for rep in deck.reports() {
            assert_eq!(rep.flag(QcCategory::Position, QcCheck::Track), 0);
            assert_eq!(rep.flag(QcCategory::Position, QcCheck::IquamTrack), 0);
            assert_eq!(rep.flag(QcCategory::Position, QcCheck::MonthMatch), 1);
            // buddy checks ran (SST stdev field is bound)
            assert!(rep.flag(QcCategory::Sst, QcCheck::Buddy) <= 1);
        }
    }

    #[test]
    fn unparseable_voyage_is_reported_not_fatal() {
        let eng = engine();
        let mut deck = Deck::new();
        let mut rep = report();
        rep.set_position(Some(f64::NAN), Some(-30.0));
        deck.push(rep);
        let mut good = report();
        good.set_date(Some(1985), Some(6), Some(16));
        deck.push(good);

        let summary = eng.process(&mut deck, 1985, 6).unwrap();
        assert_eq!(summary.read, 2);
    }
}
