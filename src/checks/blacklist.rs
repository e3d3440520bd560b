//! Historical exclusion lists.
//!
//! These tables encode data-provider history, not physics; they are
//! preserved literally. See Rayner et al. 2006 and Kennedy et al. 2011
//! for Deck 732, and Kent et al. (HadNMAT2) for the MAT exclusions.

use lazy_static::lazy_static;
use std::collections::{BTreeMap, HashSet};

/// (lon_min, lat_min, lon_max, lat_max)
type Box4 = (f64, f64, f64, f64);

lazy_static! {
    /// Regions in which Deck 732 observations are known to be dubious.
    static ref DECK_732_REGIONS: BTreeMap<u8, Box4> = {
        let mut m = BTreeMap::new();
        m.insert(1, (-175.0, 40.0, -170.0, 55.0));
        m.insert(2, (-165.0, 40.0, -160.0, 60.0));
        m.insert(3, (-145.0, 40.0, -140.0, 50.0));
        m.insert(4, (-140.0, 30.0, -135.0, 40.0));
        m.insert(5, (-140.0, 50.0, -130.0, 55.0));
        m.insert(6, (-70.0, 35.0, -60.0, 40.0));
        m.insert(7, (-50.0, 45.0, -40.0, 50.0));
        m.insert(8, (5.0, 70.0, 10.0, 80.0));
        m.insert(9, (0.0, -10.0, 10.0, 0.0));
        m.insert(10, (-30.0, -25.0, -25.0, -20.0));
        m.insert(11, (-60.0, -50.0, -55.0, -45.0));
        m.insert(12, (75.0, -20.0, 80.0, -15.0));
        m.insert(13, (50.0, -30.0, 60.0, -20.0));
        m.insert(14, (30.0, -40.0, 40.0, -30.0));
        m.insert(15, (20.0, 60.0, 25.0, 65.0));
        m.insert(16, (0.0, -40.0, 10.0, -30.0));
        m.insert(17, (-135.0, 30.0, -130.0, 40.0));
        m
    };

    /// Which Deck 732 regions are excluded in which year.
    static ref DECK_732_YEARS: BTreeMap<i32, &'static [u8]> = {
        let mut m: BTreeMap<i32, &'static [u8]> = BTreeMap::new();
        m.insert(1958, &[1, 2, 3, 4, 5, 6, 14, 15]);
        m.insert(1959, &[1, 2, 3, 4, 5, 6, 14, 15]);
        m.insert(1960, &[1, 2, 3, 5, 6, 9, 14, 15]);
        m.insert(1961, &[1, 2, 3, 5, 6, 14, 15, 16]);
        m.insert(1962, &[1, 2, 3, 5, 12, 13, 14, 15, 16]);
        m.insert(1963, &[1, 2, 3, 5, 6, 12, 13, 14, 15, 16]);
        m.insert(1964, &[1, 2, 3, 5, 6, 12, 13, 14, 16]);
        m.insert(1965, &[1, 2, 6, 10, 12, 13, 14, 15, 16]);
        m.insert(1966, &[1, 2, 6, 9, 14, 15, 16]);
        m.insert(1967, &[1, 2, 5, 6, 9, 14, 15]);
        m.insert(1968, &[1, 2, 3, 5, 6, 9, 14, 15]);
        m.insert(1969, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 13, 14, 15, 16]);
        m.insert(1970, &[1, 2, 3, 4, 5, 6, 8, 9, 14, 15]);
        m.insert(1971, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 13, 14, 16]);
        m.insert(1972, &[4, 7, 8, 9, 10, 11, 13, 16, 17]);
        m.insert(1973, &[4, 7, 8, 10, 11, 13, 16, 17]);
        m.insert(1974, &[4, 7, 8, 10, 11, 16, 17]);
        m
    };

    /// Drifting buoys with grossly erroneous Tropical Pacific values,
    /// November 2005 to January 2006. Identified offline.
    static ref BAD_PACIFIC_DRIFTERS: HashSet<&'static str> = [
        "53521", "53522", "53566", "53567", "53568", "53571", "53578",
        "53580", "53582", "53591", "53592", "53593", "53594", "53595",
        "53596", "53599", "53600", "53601", "53602", "53603", "53604",
        "53605", "53606", "53607", "53608", "53609", "53901", "53902",
    ]
    .into_iter()
    .collect();

    /// North Atlantic, Suez and Indian Ocean boxes excluded from MAT
    /// processing for Deck 193 in 1880-1892.
    static ref MAT_EXCLUSION_BOXES: Vec<Box4> = vec![
        (-80.0, 40.0, 0.0, 55.0),
        (-10.0, 35.0, 30.0, 45.0),
        (15.0, -10.0, 45.0, 40.0),
        (15.0, -10.0, 95.0, 15.0),
        (95.0, -10.0, 105.0, 5.0),
    ];
}

fn in_box(lon: f64, lat: f64, b: &Box4) -> bool {
    b.0 <= lon && lon <= b.2 && b.1 <= lat && lat <= b.3
}

/// General blacklist: true when the report is known-bad and should not
/// reach the QC proper.
pub fn blacklist(
    id: &str,
    deck: Option<u16>,
    year: Option<i32>,
    month: Option<u32>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    platform_type: Option<u8>,
) -> bool {
    // fold longitude into [-180, 180]
    let longitude = longitude.map(|lon| if lon > 180.0 { lon - 360.0 } else { lon });

    // 0/0 is a common encoding error
    if latitude == Some(0.0) && longitude == Some(0.0) {
        return true;
    }

    // C-MAN coastal stations
    if platform_type == Some(13) {
        return true;
    }

    if id.trim() == "SUPERIGORINA" {
        return true;
    }

    if deck == Some(732) {
        if let (Some(year), Some(lat), Some(lon)) = (year, latitude, longitude) {
            if let Some(region_ids) = DECK_732_YEARS.get(&year) {
                for region_id in region_ids.iter() {
                    if in_box(lon, lat, &DECK_732_REGIONS[region_id]) {
                        return true;
                    }
                }
            }
        }
    }

    // SEAS data, SSTs often in excess of 50 degC
    if deck == Some(874) {
        return true;
    }

    let in_bad_window = matches!((year, month), (Some(2005), Some(11)) | (Some(2005), Some(12)) | (Some(2006), Some(1)));
    if in_bad_window && BAD_PACIFIC_DRIFTERS.contains(id.trim()) {
        return true;
    }

    false
}

/// True when the platform type is ineligible for humidity QC.
pub fn humidity_blacklist(platform_type: Option<u8>) -> bool {
    !matches!(platform_type, Some(0..=6) | Some(8..=10) | Some(15))
}

/// True when the report is ineligible for marine air temperature QC.
pub fn mat_blacklist(
    platform_type: Option<u8>,
    deck: Option<u16>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    year: Option<i32>,
) -> bool {
    // World Ocean Database data found erroneous in HadNMAT2
    if platform_type == Some(5) && deck == Some(780) {
        return true;
    }

    if deck == Some(193) && matches!(year, Some(y) if (1880..=1892).contains(&y)) {
        if let (Some(lat), Some(lon)) = (latitude, longitude) {
            let lon = if lon > 180.0 { lon - 360.0 } else { lon };
            if MAT_EXCLUSION_BOXES.iter().any(|b| in_box(lon, lat, b)) {
                return true;
            }
        }
    }

    false
}

/// True when the deck is ineligible for wind QC.
pub fn wind_blacklist(deck: Option<u16>) -> bool {
    matches!(deck, Some(708) | Some(780))
}

/// Generic platform identifiers that do not denote one physical ship.
///
/// Blank ids and the named placeholder pool are always generic; a few
/// short numeric ids were reused across fleets in specific eras.
pub fn id_is_generic(id: &str, year: Option<i32>) -> bool {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return true;
    }
    if matches!(
        trimmed,
        "SHIP" | "ship" | "PLAT" | "RIGG" | "MASK" | "MASKST" | "MASKSTID" | "XXXX" | "/////"
    ) {
        return true;
    }
    match trimmed {
        "1" | "58" => true,
        "2" | "3" => matches!(year, Some(y) if (1921..=1941).contains(&y)),
        "7" => matches!(year, Some(y) if (1930..=1956).contains(&y)),
        _ => false,
    }
}
