//! Rule Runner Error Types

use checks::EvaluationError;
use rule_model::{InvalidParameterError, RuleLoadError};
use thiserror::Error;
use timeseries::TableError;

/// Required inputs of a rule that map to no table column
#[derive(Debug, Clone, PartialEq, Error)]
#[error("rule '{rule}' has no data column for {roles:?}")]
pub struct MissingColumnError {
    pub rule: String,
    /// Every unresolved required role, in declaration order
    pub roles: Vec<String>,
}

/// Run failure. In strict mode the first failing rule aborts with one of these.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Load(#[from] RuleLoadError),

    #[error(transparent)]
    Missing(#[from] MissingColumnError),

    #[error(transparent)]
    InvalidParameter(#[from] InvalidParameterError),

    #[error("rule '{rule}' failed: {source}")]
    Evaluation {
        rule: String,
        #[source]
        source: EvaluationError,
    },

    #[error("cannot write flag column '{flag}': {source}")]
    Table {
        flag: String,
        #[source]
        source: TableError,
    },

    /// Cancelled before completion; no flags are returned
    #[error("run cancelled")]
    Cancelled,
}
