//! Fault Rule Model
//!
//! Typed description of config-driven fault rules:
//! - Rule, input roles and unit-aware bounds
//! - Typed, validated parameters per check type
//! - Column maps and resolved columns
//! - Rule set loading from in-memory lists or YAML declaration directories

mod column_map;
mod error;
mod loader;
mod ordered;
mod params;
mod rule;
mod units;

pub use column_map::{ColumnMap, ResolvedColumns, ResolvedInput};
pub use error::{InvalidParameterError, RuleLoadError};
pub use loader::{load_rules, LoadOptions, RuleDirWatcher, RuleSet, RuleSource};
pub use params::{
    CheckParams, ErvEfficiencyParams, ExpressionParams, FlatlineParams, HuntingParams,
    InputBounds, OaFractionParams, ParamValue, Params,
};
pub use rule::{CheckType, InputSpec, Rule, RuleBuilder};
pub use units::{Bounds, UnitScale, UnitSystem};

/// Parameter key for the per-rule debounce window
pub const ROLLING_WINDOW_PARAM: &str = "rolling_window_size";
