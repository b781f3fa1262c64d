//! Analytics Error Types

use thiserror::Error;
use timeseries::TableError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    #[error(transparent)]
    Table(#[from] TableError),

    /// Flatline windows are whole samples
    #[error("flatline window must be at least 1, got {0}")]
    InvalidWindow(usize),
}
