//! Neighbourhood checks over the super-observation grid.

use marine_qc::buddy::{bayesian_buddy_check, mds_buddy_check, BayesianFields};
use marine_qc::climatology::ScalarField;
use marine_qc::config::{BayesianBuddyConfig, MdsBuddyConfig};
use marine_qc::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn gridded_report(uid: &str, lat: f64, lon: f64, sst: f64) -> Report {
    let mut rep = Report::new("GRIDSHIP1", uid)
        .with_date(2000, 2, 16)
        .with_hour(12.0)
        .with_position(lat, lon)
        .with_platform_type(1)
        .with_value(Observable::Sst, sst);
    // anomalies measured against a zero-degree normal
    rep.attach_normal(Observable::Sst, Some(0.0), None);
    rep
}

#[test]
fn antimeridian_cells_are_neighbours() {
    // one degree of longitude apart, either side of the date line
    let mut reports = vec![
        gridded_report("u1", 0.5, 179.5, 1.0),
        gridded_report("u2", 0.5, -179.5, 10.0),
    ];
    mds_buddy_check(
        &mut reports,
        Observable::Sst,
        &ScalarField(1.0),
        &QcFilter::new(),
        &MdsBuddyConfig::default(),
    )
    .unwrap();
    // each is the other's only buddy, nine degrees apart: both fail.
    // had the longitude not wrapped, both cells would have fallen back
    // to the pass-all sentinel.
    assert_eq!(reports[0].flag(QcCategory::Sst, QcCheck::Buddy), 1);
    assert_eq!(reports[1].flag(QcCategory::Sst, QcCheck::Buddy), 1);
}

#[test]
fn agreeing_neighbours_pass() {
    let mut reports = vec![
        gridded_report("u1", 0.5, 179.5, 1.0),
        gridded_report("u2", 0.5, -179.5, 1.2),
    ];
    mds_buddy_check(
        &mut reports,
        Observable::Sst,
        &ScalarField(1.0),
        &QcFilter::new(),
        &MdsBuddyConfig::default(),
    )
    .unwrap();
    assert_eq!(reports[0].flag(QcCategory::Sst, QcCheck::Buddy), 0);
    assert_eq!(reports[1].flag(QcCategory::Sst, QcCheck::Buddy), 0);
}

#[test]
fn isolated_report_passes_by_sentinel() {
    let mut reports = vec![gridded_report("u1", 40.5, 10.5, 25.0)];
    mds_buddy_check(
        &mut reports,
        Observable::Sst,
        &ScalarField(1.0),
        &QcFilter::new(),
        &MdsBuddyConfig::default(),
    )
    .unwrap();
    assert_eq!(reports[0].flag(QcCategory::Sst, QcCheck::Buddy), 0);
}

/// A 3x3 block of occupied cells: the centre cell holds one wild
/// observation, every other cell three agreeing ones.
fn cluster() -> Vec<Report> {
    let mut reports = Vec::new();
    let mut uid = 0;
    for row in 0..3 {
        for col in 0..3 {
            let lat = 10.5 + row as f64;
            let lon = 10.5 + col as f64;
            if (row, col) == (1, 1) {
                uid += 1;
                reports.push(gridded_report(&format!("u{uid:03}"), lat, lon, 9.0));
            } else {
                for _ in 0..3 {
                    uid += 1;
                    reports.push(gridded_report(&format!("u{uid:03}"), lat, lon, 0.0));
                }
            }
        }
    }
    reports
}

#[test]
fn bayesian_buddy_grades_the_outlier() {
    let mut reports = cluster();
    let fields = BayesianFields {
        one_box_to_buddy_avg: &ScalarField(0.5),
        one_ob_to_box_avg: &ScalarField(0.5),
        avg_sampling: &ScalarField(0.5),
    };
    bayesian_buddy_check(
        &mut reports,
        Observable::Sst,
        &fields,
        &QcFilter::new(),
        &BayesianBuddyConfig::default(),
    )
    .unwrap();

    for rep in &reports {
        let flag = rep.flag(QcCategory::Sst, QcCheck::BayesianBuddy);
        if rep.value(Observable::Sst) == Some(9.0) {
            assert!(flag >= 8, "outlier flag was {flag}");
        } else {
            assert!(flag <= 2, "inlier flag was {flag}");
        }
    }
}

#[test]
fn accumulation_order_does_not_change_flags() {
    let baseline = {
        let mut reports = cluster();
        mds_buddy_check(
            &mut reports,
            Observable::Sst,
            &ScalarField(1.0),
            &QcFilter::new(),
            &MdsBuddyConfig::default(),
        )
        .unwrap();
        let mut flags: Vec<(String, u8)> = reports
            .iter()
            .map(|r| (r.uid().to_string(), r.flag(QcCategory::Sst, QcCheck::Buddy)))
            .collect();
        flags.sort();
        flags
    };

    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
    for _ in 0..5 {
        let mut reports = cluster();
        reports.shuffle(&mut rng);
        mds_buddy_check(
            &mut reports,
            Observable::Sst,
            &ScalarField(1.0),
            &QcFilter::new(),
            &MdsBuddyConfig::default(),
        )
        .unwrap();
        let mut flags: Vec<(String, u8)> = reports
            .iter()
            .map(|r| (r.uid().to_string(), r.flag(QcCategory::Sst, QcCheck::Buddy)))
            .collect();
        flags.sort();
        assert_eq!(flags, baseline);
    }
}
