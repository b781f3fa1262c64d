//! Fault Check Library
//!
//! One pure function per check type. Every check returns a new boolean mask
//! aligned to the table rows; rows with missing or invalid data read as
//! "not faulted".

mod bounds;
mod erv;
mod error;
pub mod expression;
mod flatline;
mod hunting;
mod oa_fraction;
pub mod roles;

pub use bounds::check_bounds;
pub use erv::{check_erv_efficiency, erv_effectiveness};
pub use error::EvaluationError;
pub use expression::{check_expression, Expression};
pub use flatline::check_flatline;
pub use hunting::{check_hunting, operating_state, ModeSignals, MIN_MODE_SIGNALS};
pub use oa_fraction::{check_oa_fraction, oa_fraction, OaFractionInputs};

use rule_model::{CheckParams, ResolvedColumns};
use timeseries::Table;
use tracing::debug;

/// Boolean per-row check result
pub type Mask = Vec<bool>;

/// Run the check described by `params` over the resolved columns
pub fn evaluate(
    params: &CheckParams,
    table: &Table,
    columns: &ResolvedColumns,
) -> Result<Mask, EvaluationError> {
    let mask = match params {
        CheckParams::Bounds(bounds) => bounds::evaluate(bounds, table, columns)?,
        CheckParams::Flatline(p) => flatline::evaluate(p, table, columns)?,
        CheckParams::Expression(p) => expression::evaluate(p, table, columns)?,
        CheckParams::Hunting(p) => hunting::evaluate(p, table, columns)?,
        CheckParams::OaFraction(p) => oa_fraction::evaluate(p, table, columns)?,
        CheckParams::ErvEfficiency(p) => erv::evaluate(p, table, columns)?,
    };

    debug!(
        "Check flagged {} of {} rows",
        mask.iter().filter(|&&f| f).count(),
        mask.len()
    );
    Ok(mask)
}
