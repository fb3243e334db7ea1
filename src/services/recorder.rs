//! History sink.
//!
//! Every weekly evaluation, daily-check trigger and pool movement is handed
//! to a [`Recorder`]. Failures are reported to the caller, which logs them;
//! they never affect fund state.

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::services::sqlite_store::SqliteRecorder;
use crate::types::{DailyCheckEvent, FundEvent, MonthlyEvent, QuarterlyEvent, WeeklySnapshot};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub trait Recorder: Send + Sync {
    fn record_weekly(&self, snapshot: &WeeklySnapshot<'_>) -> Result<(), RecordError>;
    fn record_daily_check(&self, event: &DailyCheckEvent) -> Result<(), RecordError>;
    fn record_fund_event(&self, event: &FundEvent) -> Result<(), RecordError>;
    fn record_monthly(&self, event: &MonthlyEvent) -> Result<(), RecordError>;
    fn record_quarterly(&self, event: &QuarterlyEvent) -> Result<(), RecordError>;

    /// Most recent pool movements, newest first.
    fn recent_fund_events(&self, limit: usize) -> Result<Vec<FundEvent>, RecordError>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl Recorder for NoopRecorder {
    fn record_weekly(&self, _snapshot: &WeeklySnapshot<'_>) -> Result<(), RecordError> {
        Ok(())
    }

    fn record_daily_check(&self, _event: &DailyCheckEvent) -> Result<(), RecordError> {
        Ok(())
    }

    fn record_fund_event(&self, _event: &FundEvent) -> Result<(), RecordError> {
        Ok(())
    }

    fn record_monthly(&self, _event: &MonthlyEvent) -> Result<(), RecordError> {
        Ok(())
    }

    fn record_quarterly(&self, _event: &QuarterlyEvent) -> Result<(), RecordError> {
        Ok(())
    }

    fn recent_fund_events(&self, _limit: usize) -> Result<Vec<FundEvent>, RecordError> {
        Ok(Vec::new())
    }
}

/// SQLite recorder at `path`, or a no-op recorder when `path` is `None` or
/// the database cannot be opened.
pub fn open_recorder(path: Option<&Path>) -> Arc<dyn Recorder> {
    let Some(path) = path else {
        info!("History recording disabled");
        return Arc::new(NoopRecorder);
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Failed to create history directory {}: {}", dir.display(), e);
        }
    }

    match SqliteRecorder::new(path) {
        Ok(recorder) => Arc::new(recorder),
        Err(e) => {
            warn!("Failed to open history database {}: {}, recording disabled", path.display(), e);
            Arc::new(NoopRecorder)
        }
    }
}
