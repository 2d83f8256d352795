//! Error types for the granula engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type AnonResult<T> = Result<T, AnonError>;

/// Error variants for the anonymization engine.
///
/// Configuration and precision errors are fatal: they are raised before or
/// during a search and abort it. Running out of candidates or hitting a
/// step/time limit is normal termination and never surfaces here.
#[derive(Debug, Error)]
pub enum AnonError {
    /// Wraps standard I/O errors raised while loading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    /// A configuration value is missing or out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A hierarchy row is shorter or longer than the declared height.
    #[error(
        "Malformed hierarchy for attribute {attribute}: value {value} has {actual} levels, expected {expected}"
    )]
    MalformedHierarchy {
        /// Attribute name.
        attribute: String,
        /// Value identifier of the offending row.
        value: usize,
        /// Declared height.
        expected: usize,
        /// Actual row length.
        actual: usize,
    },

    /// Two values that share a generalization at one level diverge at a higher level.
    #[error("Hierarchy for attribute {attribute} is not monotone at level {level}")]
    NonMonotonicHierarchy {
        /// Attribute name.
        attribute: String,
        /// Level at which the split happens.
        level: usize,
    },

    /// Input matrix, hierarchies or per-attribute settings disagree in shape.
    #[error("Dimension mismatch: {what} (expected {expected}, got {actual})")]
    DimensionMismatch {
        /// What was being compared.
        what: String,
        /// Expected size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },

    /// A coded value has no row in its attribute's hierarchy.
    #[error("Value {value} of attribute {attribute} is not covered by its hierarchy")]
    UnknownValue {
        /// Attribute name.
        attribute: String,
        /// The coded value.
        value: u32,
    },

    /// The differentially private search was configured without an expansion limit.
    #[error("You must specify an expansion limit for the differentially private search")]
    MissingExpansionLimit,

    /// The expansion limit does not define a per-step privacy budget.
    #[error("Invalid expansion limit {0}: the per-step privacy budget is undefined")]
    InvalidExpansionLimit(usize),

    /// The selected metric cannot produce a differential-privacy score.
    #[error("Metric {0} does not support differential-privacy scores")]
    ScoreNotSupported(String),

    /// A metric was asked for a value before its precomputation pass ran.
    #[error("Metric {0} has not been initialized")]
    MetricNotInitialized(String),

    /// A transformation identifier does not belong to the solution space.
    #[error("Unknown transformation {0}")]
    UnknownTransformation(u64),

    /// Interval arithmetic could not produce a certified bound.
    #[error("Interval arithmetic error: {0}")]
    IntervalArithmetic(String),

    /// An exact value cannot be converted to a double within one ulp.
    #[error("Encountered a value with insufficient precision: {0}")]
    PrecisionLoss(String),

    /// An exact value is infinite or NaN when converted to a double.
    #[error("Encountered a value which can not be represented as a double: {0}")]
    NotRepresentable(String),
}

impl From<toml::de::Error> for AnonError {
    fn from(err: toml::de::Error) -> Self {
        AnonError::ConfigParse(err.to_string())
    }
}

impl From<serde_json::Error> for AnonError {
    fn from(err: serde_json::Error) -> Self {
        AnonError::ConfigParse(err.to_string())
    }
}
