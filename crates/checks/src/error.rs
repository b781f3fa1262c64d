//! Check Evaluation Errors

use thiserror::Error;
use timeseries::TableError;

/// Failure inside a check. Bad row data never produces one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// Formula could not be parsed
    #[error("expression parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    /// Identifier is neither an input alias nor a parameter
    #[error("unknown identifier '{0}' in expression")]
    UnknownIdentifier(String),

    /// Function is not in the whitelist
    #[error("unknown function '{0}' in expression")]
    UnknownFunction(String),

    /// Function called with the wrong number of arguments
    #[error("function '{function}' takes {expected} argument(s), got {actual}")]
    Arity {
        function: String,
        expected: usize,
        actual: usize,
    },

    /// Check needs roles the rule does not provide
    #[error("{check} check needs input roles {roles:?}")]
    MissingRole {
        check: &'static str,
        roles: Vec<String>,
    },

    /// Too few operating-mode signals for a hunting check
    #[error("hunting check needs at least {required} mode signals, found {found}")]
    InsufficientSignals { required: usize, found: usize },

    /// Resolved column could not be read
    #[error(transparent)]
    Table(#[from] TableError),
}
