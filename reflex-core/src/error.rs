//! Error types for reflex-core.
//!
//! Engine bookkeeping (tracking, triggering, effect scheduling) never fails.
//! Errors only come from writes the data model itself rejects.

/// Errors raised by writes into observed or raw values.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReactiveError {
    /// A sequence `length` was assigned something other than a non-negative
    /// integer below 2^32.
    #[error("invalid sequence length: {0}")]
    InvalidLength(String),

    /// A sequence operation was invoked on a record.
    #[error("`{operation}` requires a sequence")]
    NotASequence { operation: &'static str },

    /// A prototype link was given a value that is not an object.
    #[error("prototype must be an object or null, got {0}")]
    InvalidPrototype(&'static str),

    /// Setting the prototype would make the delegation chain circular.
    #[error("cyclic prototype chain")]
    PrototypeCycle,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
