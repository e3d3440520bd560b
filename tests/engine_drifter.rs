//! End-to-end engine run over a drifting buoy with a background field.

use chrono::Datelike;
use marine_qc::climatology::ScalarField;
use marine_qc::drifter::background::UniformBackground;
use marine_qc::prelude::*;
use std::sync::Arc;

fn drifter_deck(n: usize) -> Deck {
    let start = chrono::NaiveDate::from_ymd_opt(1995, 1, 1).unwrap();
    let mut deck = Deck::new();
    for i in 0..n {
        let hours = i as f64 * 6.0;
        let date = start + chrono::Duration::days((hours / 24.0) as i64);
        deck.push(
            Report::new("44999    ", format!("u{i:04}"))
                .with_date(date.year(), date.month(), date.day())
                .with_hour(hours % 24.0)
                .with_position(10.0, 10.0)
                .with_platform_type(7)
                .with_value(Observable::Sst, 18.0),
        );
    }
    deck
}

fn engine() -> QcEngine {
    let mut library = ClimatologyLibrary::new();
    library.bind(ClimField::Mean(Observable::Sst), Arc::new(ScalarField(18.0)));
    library.bind(ClimField::Stdev(Observable::Sst), Arc::new(ScalarField(1.0)));

    QcEngine::new(Config::default(), library)
        .unwrap()
        .with_background(Arc::new(UniformBackground {
            sst: 18.0,
            error_variance: 0.01,
            ice: 0.0,
        }))
}

#[test]
fn stationary_drifter_runs_aground() {
    let mut deck = drifter_deck(200);
    let summary = engine().process(&mut deck, 1995, 1).unwrap();

    assert_eq!(summary.read, 200);
    assert_eq!(summary.selected, 200);
    assert_eq!(summary.unprocessable_voyages, 0);

    for rep in deck.reports() {
        // property: a stationary drifter is aground everywhere
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::Aground), 1);
        // but it is not moving too fast
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::DriftSpeed), 0);
        // and its SST agrees with the background
        assert_eq!(rep.flag(QcCategory::Sst, QcCheck::DriftBias), 0);
        assert_eq!(rep.flag(QcCategory::Sst, QcCheck::DriftNoise), 0);
        assert_eq!(rep.flag(QcCategory::Sst, QcCheck::TailStart), 0);
        assert_eq!(rep.flag(QcCategory::Sst, QcCheck::TailEnd), 0);
        // buoys bypass the MDS track check
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::Track), 0);
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::IsDrifter), 1);
    }

    // the aground tally made it into the summary
    assert_eq!(summary.check_fails.get("POS.drf_agr"), Some(&200));

    // reports from the following months carry a zero month flag
    let january = deck
        .reports()
        .iter()
        .filter(|r| r.flag(QcCategory::Position, QcCheck::MonthMatch) == 1)
        .count();
    assert!(january < 200);
    assert!(january > 0);
}

#[test]
fn drifter_without_background_skips_tracking_qc() {
    let mut library = ClimatologyLibrary::new();
    library.bind(ClimField::Mean(Observable::Sst), Arc::new(ScalarField(18.0)));
    let engine = QcEngine::new(Config::default(), library).unwrap();

    let mut deck = drifter_deck(100);
    engine.process(&mut deck, 1995, 1).unwrap();
    for rep in deck.reports() {
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::Aground), FLAG_UNSET);
    }
}
