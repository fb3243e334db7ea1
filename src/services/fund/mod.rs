//! Dual-pool fund state machine.

mod manager;
pub mod state_file;

pub use manager::FundManager;

use thiserror::Error;

use crate::types::FundState;

/// Fund persistence errors.
#[derive(Debug, Error)]
pub enum FundError {
    #[error("fund state I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fund state encoding error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result of a mutation that has already been applied in memory.
///
/// `before` and `after` are snapshots taken under the same lock as the
/// mutation. `persist_error` is set when the write-through to disk failed.
/// The in-memory change is kept either way, so memory and disk disagree
/// until the next successful write.
#[derive(Debug)]
#[must_use]
pub struct Applied<T> {
    pub value: T,
    pub before: FundState,
    pub after: FundState,
    pub persist_error: Option<FundError>,
}

impl<T> Applied<T> {
    pub fn is_durable(&self) -> bool {
        self.persist_error.is_none()
    }

    /// Drop the persistence outcome, keeping only the business result.
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn into_result(self) -> Result<T, FundError> {
        match self.persist_error {
            None => Ok(self.value),
            Some(e) => Err(e),
        }
    }
}
