//! Physical constants shared across the engine

/// Mean Earth radius in kilometres (IUGG).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// One international knot expressed in km/h, exact by definition.
pub const KM_PER_HOUR_PER_KNOT: f64 = 1.852;

/// Grid extents of the 1°x1°x pentad super-observation space
pub struct Grid;

impl Grid {
    pub const N_LON: usize = 360;
    pub const N_LAT: usize = 180;
    pub const N_PENTADS: usize = 73;
    pub const N_CELLS: usize = Self::N_LON * Self::N_LAT * Self::N_PENTADS;
}

/// Sentinel values used by the buddy checks when a cell has no
/// neighbour at all: any anomaly will pass against them.
pub struct BuddySentinel;

impl BuddySentinel {
    pub const MEAN: f64 = 0.0;
    pub const STDEV: f64 = 500.0;
}
