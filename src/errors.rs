use thiserror::Error;

/// Errors surfaced by the engine's public entry points.
/// Individual QC checks never error: a check that cannot run
/// stores the `untestable` flag value instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A parameter group is self-inconsistent (inverted limits,
    /// negative thresholds, even smoothing window...). Reported once,
    /// before any report is touched.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A voyage failed its preprocessing (missing position, invalid
    /// timestamp, non-monotonic time after sorting). Its flags are left
    /// at their defaults.
    #[error("voyage \"{id}\" cannot be processed: {reason}")]
    UnprocessableVoyage { id: String, reason: String },
    /// A report was offered to the super-observation grid with
    /// coordinates or a date that do not map to any cell.
    #[error("report does not map onto the super-observation grid")]
    GridOverflow,
}

/// Reasons a voyage preprocess can fail. Converted into
/// [EngineError::UnprocessableVoyage] at the engine boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoyageError {
    #[error("report {0} has no usable position")]
    MissingPosition(usize),
    #[error("report {0} has no valid timestamp")]
    MissingTimestamp(usize),
    #[error("time runs backwards at report {0}")]
    NonMonotonicTime(usize),
}
