//! Track-level checks over complete voyages.

use marine_qc::config::TrackConfig;
use marine_qc::prelude::*;

/// Hourly reports heading due north at 18 knots, with matching
/// reported heading and speed sector (4 reads as 18 knots from 1968).
fn northbound(id: &str, n: usize, displaced: Option<usize>) -> Voyage {
    let mut v = Voyage::new();
    for i in 0..n {
        let mut lat = 0.3 * i as f64;
        if displaced == Some(i) {
            lat += 5.0;
        }
        v.push(
            Report::new(id, format!("u{i:03}"))
                .with_date(2001, 1, 1 + (i / 24) as u32)
                .with_hour((i % 24) as f64)
                .with_position(lat, 0.0)
                .with_platform_type(1)
                .with_deck(900)
                .with_value(Observable::DirectionSector, 360.0)
                .with_value(Observable::SpeedSector, 4.0),
        );
    }
    v.sort();
    v.derive_kinematics().unwrap();
    v
}

#[test]
fn steady_voyage_passes_the_track_check() {
    let mut v = northbound("GOODSHIP1", 24, None);
    v.track_check(&TrackConfig::default());
    for (i, rep) in v.reports().iter().enumerate() {
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::Track), 0, "report {i}");
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::FewObs), 0, "report {i}");
    }
}

#[test]
fn displaced_report_fails_the_track_check() {
    let mut v = northbound("GOODSHIP1", 24, Some(12));
    v.track_check(&TrackConfig::default());
    for (i, rep) in v.reports().iter().enumerate() {
        let expected = u8::from(i == 12);
        assert_eq!(
            rep.flag(QcCategory::Position, QcCheck::Track),
            expected,
            "report {i}"
        );
    }
}

#[test]
fn short_voyages_get_the_few_flag() {
    let mut v = northbound("GOODSHIP1", 2, None);
    v.track_check(&TrackConfig::default());
    for rep in v.reports() {
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::Track), 0);
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::FewObs), 1);
    }
}

#[test]
fn early_deck_720_is_excused_from_the_few_flag() {
    let mut v = Voyage::new();
    for i in 0..2 {
        v.push(
            Report::new("OLDSHIP9", format!("u{i}"))
                .with_date(1880, 5, 1)
                .with_hour(i as f64 * 6.0)
                .with_position(10.0 + 0.1 * i as f64, 0.0)
                .with_platform_type(1)
                .with_deck(720),
        );
    }
    v.sort();
    v.derive_kinematics().unwrap();
    v.track_check(&TrackConfig::default());
    for rep in v.reports() {
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::Track), 0);
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::FewObs), 0);
    }
}

#[test]
fn generic_ids_are_never_track_flagged() {
    let mut v = northbound("SHIP     ", 24, Some(12));
    v.track_check(&TrackConfig::default());
    for rep in v.reports() {
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::Track), 0);
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::FewObs), 0);
    }
}

#[test]
fn buoys_bypass_the_track_check() {
    let mut v = Voyage::new();
    for i in 0..24 {
        let mut lat = 0.3 * i as f64;
        if i == 12 {
            lat += 5.0;
        }
        v.push(
            Report::new("47099    ", format!("u{i:03}"))
                .with_date(2001, 1, 1)
                .with_hour(i as f64)
                .with_position(lat, 0.0)
                .with_platform_type(6),
        );
    }
    v.sort();
    v.derive_kinematics().unwrap();
    v.track_check(&TrackConfig::default());
    for rep in v.reports() {
        assert_eq!(rep.flag(QcCategory::Position, QcCheck::Track), 0);
    }
}
