//! Rule Model Error Types

use crate::UnitSystem;
use std::path::PathBuf;
use thiserror::Error;

/// Parameter of the wrong type or outside its declared range
#[derive(Debug, Clone, PartialEq, Error)]
#[error("rule '{rule}' parameter '{param}': {reason}")]
pub struct InvalidParameterError {
    /// Rule name
    pub rule: String,
    /// Parameter name
    pub param: String,
    /// What is wrong with it
    pub reason: String,
}

impl InvalidParameterError {
    pub(crate) fn new(rule: &str, param: &str, reason: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors while loading a rule set. Loading stops at the first one.
#[derive(Debug, Error)]
pub enum RuleLoadError {
    /// Declaration file or directory could not be read
    #[error("failed to read rule declarations at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Declaration is not valid YAML/JSON for a rule
    #[error("failed to parse rule declaration {origin}: {message}")]
    Parse { origin: String, message: String },

    /// `type` is not one of the supported check types
    #[error("rule '{rule}' has unknown check type '{check_type}'")]
    UnknownCheckType { rule: String, check_type: String },

    /// Two rules share a name
    #[error("rule name '{0}' is declared more than once")]
    DuplicateName(String),

    /// Two rules write the same flag column
    #[error("flag '{flag}' of rule '{rule}' is already produced by rule '{first}'")]
    DuplicateFlag {
        flag: String,
        rule: String,
        first: String,
    },

    /// Bounds are split per unit system but lack the requested one
    #[error("rule '{rule}' input '{role}' declares no {units} bounds")]
    MissingUnitBounds {
        rule: String,
        role: String,
        units: UnitSystem,
    },

    /// Parameter validation failed
    #[error(transparent)]
    InvalidParameter(#[from] InvalidParameterError),
}
