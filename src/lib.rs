#![doc = include_str!("../README.md")]

pub mod buddy;
pub mod checks;
pub mod climatology;
pub mod config;
pub mod constants;
pub mod drifter;
pub mod engine;
pub mod humidity;
pub mod observable;
pub mod report;
pub mod sphere;
pub mod units;
pub mod voyage;

mod errors;

pub use errors::{EngineError, VoyageError};

/// Package to include all basic structures
pub mod prelude {
    pub use crate::climatology::{ClimField, ClimatologyField, ClimatologyLibrary};
    pub use crate::config::Config;
    pub use crate::drifter::background::BackgroundField;
    pub use crate::engine::{BatchSummary, QcEngine};
    pub use crate::errors::{EngineError, VoyageError};
    pub use crate::observable::Observable;
    pub use crate::report::filter::QcFilter;
    pub use crate::report::flag::{QcCategory, QcCheck, QcOutcome, FLAG_UNSET};
    pub use crate::report::{BackgroundMatch, Report};
    pub use crate::voyage::{Deck, Voyage};
}
