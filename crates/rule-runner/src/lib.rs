//! Rule Runner
//!
//! Drives a loaded rule set over a sensor table: resolves each rule's inputs
//! through a column map, evaluates the checks, debounces them, and appends one
//! boolean flag column per rule.

mod config;
mod error;
mod resolver;
mod runner;

pub use config::{EngineConfig, ENV_PREFIX};
pub use error::{MissingColumnError, RunError};
pub use resolver::{bounds_for, candidate_column, resolve, resolve_required, Resolution};
pub use runner::{CancelToken, RuleOutcome, RuleReport, RuleRunner, RunOptions, RunReport, RunState};
