//! SQLite history store.
//!
//! Append-only tables, one per event kind, each indexed on its unix-seconds
//! timestamp. WAL mode so external readers (dashboards) can query while the
//! scheduler writes.

use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::services::recorder::{RecordError, Recorder};
use crate::types::{
    DailyCheckEvent, FundEvent, MonthlyEvent, QuarterlyEvent, TriggerType, WeeklySnapshot,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS weekly_snapshots (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp       INTEGER NOT NULL,
        current_price   REAL,
        ma200           REAL,
        ma20w           REAL,
        ma50w           REAL,
        weekly_rsi      REAL,
        daily_rsi       REAL,
        high_52w        REAL,
        low_52w         REAL,
        position_52w    REAL,
        factor1_score   REAL,
        factor2_score   REAL,
        factor3_score   REAL,
        factor4_score   REAL,
        factor5_score   REAL,
        total_score     REAL,
        tier_label      TEXT,
        tier_multiplier REAL,
        tier_reserve    REAL,
        trigger_type    TEXT,
        base_amount     REAL,
        final_amount    REAL,
        reserve_used    REAL,
        regular_balance REAL,
        reserve_balance REAL
    );
    CREATE INDEX IF NOT EXISTS idx_weekly_ts ON weekly_snapshots(timestamp);

    CREATE TABLE IF NOT EXISTS daily_checks (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp   INTEGER NOT NULL,
        daily_rsi   REAL,
        weekly_rsi  REAL,
        price       REAL,
        event_type  TEXT,
        amount      REAL,
        total_score REAL
    );
    CREATE INDEX IF NOT EXISTS idx_daily_ts ON daily_checks(timestamp);

    CREATE TABLE IF NOT EXISTS fund_history (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp      INTEGER NOT NULL,
        event_type     TEXT,
        regular_before REAL,
        regular_after  REAL,
        reserve_before REAL,
        reserve_after  REAL,
        amount         REAL,
        note           TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_fund_ts ON fund_history(timestamp);

    CREATE TABLE IF NOT EXISTS monthly_events (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp     INTEGER NOT NULL,
        regular_added REAL,
        reserve_added REAL,
        regular_after REAL,
        reserve_after REAL,
        avg_score     REAL
    );
    CREATE INDEX IF NOT EXISTS idx_monthly_ts ON monthly_events(timestamp);

    CREATE TABLE IF NOT EXISTS quarterly_events (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp     INTEGER NOT NULL,
        action        TEXT,
        amount        REAL,
        regular_after REAL,
        reserve_after REAL,
        note          TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_quarterly_ts ON quarterly_events(timestamp);
";

/// Tables readable through [`SqliteRecorder::count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryTable {
    WeeklySnapshots,
    DailyChecks,
    FundHistory,
    MonthlyEvents,
    QuarterlyEvents,
}

impl HistoryTable {
    fn name(&self) -> &'static str {
        match self {
            Self::WeeklySnapshots => "weekly_snapshots",
            Self::DailyChecks => "daily_checks",
            Self::FundHistory => "fund_history",
            Self::MonthlyEvents => "monthly_events",
            Self::QuarterlyEvents => "quarterly_events",
        }
    }
}

fn parse_trigger(s: &str) -> TriggerType {
    match s {
        "WEEKLY" => TriggerType::Weekly,
        "BOTTOM_FISH" => TriggerType::BottomFish,
        "TAKE_PROFIT" => TriggerType::TakeProfit,
        "MONTHLY" => TriggerType::Monthly,
        "QUARTERLY" => TriggerType::Quarterly,
        _ => TriggerType::Manual,
    }
}

/// SQLite-backed [`Recorder`].
pub struct SqliteRecorder {
    conn: Mutex<Connection>,
}

impl SqliteRecorder {
    /// Open (or create) the database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite history store opened: {}", path.as_ref().display());
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn new_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite history store initialized");
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), rusqlite::Error> {
        self.conn().execute_batch(SCHEMA)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Row count of one table.
    pub fn count(&self, table: HistoryTable) -> usize {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        self.conn()
            .query_row(&sql, [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .unwrap_or(0)
    }

    /// Quarterly actions recorded so far, oldest first.
    pub fn quarterly_actions(&self) -> Result<Vec<(String, f64)>, rusqlite::Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT action, amount FROM quarterly_events ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect()
    }
}

impl Recorder for SqliteRecorder {
    fn record_weekly(&self, snap: &WeeklySnapshot<'_>) -> Result<(), RecordError> {
        let ind = snap.indicators;
        let sig = snap.signal;
        let fund = snap.fund;

        let mut factors = [0.0f64; 5];
        for (slot, factor) in factors.iter_mut().zip(&sig.factors) {
            *slot = factor.weighted;
        }

        self.conn().execute(
            "INSERT INTO weekly_snapshots
                (timestamp, current_price, ma200, ma20w, ma50w, weekly_rsi, daily_rsi,
                 high_52w, low_52w, position_52w,
                 factor1_score, factor2_score, factor3_score, factor4_score, factor5_score,
                 total_score, tier_label, tier_multiplier, tier_reserve, trigger_type,
                 base_amount, final_amount, reserve_used,
                 regular_balance, reserve_balance)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
            params![
                Utc::now().timestamp(),
                ind.current_price,
                ind.ma200,
                ind.ma20w,
                ind.ma50w,
                ind.weekly_rsi,
                ind.daily_rsi,
                ind.high_52w,
                ind.low_52w,
                ind.position_52w,
                factors[0],
                factors[1],
                factors[2],
                factors[3],
                factors[4],
                sig.total_score,
                sig.tier.label(),
                sig.tier.multiplier,
                sig.tier.reserve_use,
                sig.trigger.as_str(),
                sig.base_amount,
                sig.final_amount,
                sig.reserve_used,
                fund.regular_balance,
                fund.reserve_balance,
            ],
        )?;
        Ok(())
    }

    fn record_daily_check(&self, event: &DailyCheckEvent) -> Result<(), RecordError> {
        self.conn().execute(
            "INSERT INTO daily_checks
                (timestamp, daily_rsi, weekly_rsi, price, event_type, amount, total_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Utc::now().timestamp(),
                event.daily_rsi,
                event.weekly_rsi,
                event.price,
                event.event_type.as_str(),
                event.amount,
                event.total_score,
            ],
        )?;
        Ok(())
    }

    fn record_fund_event(&self, event: &FundEvent) -> Result<(), RecordError> {
        self.conn().execute(
            "INSERT INTO fund_history
                (timestamp, event_type, regular_before, regular_after,
                 reserve_before, reserve_after, amount, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.timestamp,
                event.event_type.as_str(),
                event.regular_before,
                event.regular_after,
                event.reserve_before,
                event.reserve_after,
                event.amount,
                event.note,
            ],
        )?;
        Ok(())
    }

    fn record_monthly(&self, event: &MonthlyEvent) -> Result<(), RecordError> {
        self.conn().execute(
            "INSERT INTO monthly_events
                (timestamp, regular_added, reserve_added, regular_after, reserve_after, avg_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Utc::now().timestamp(),
                event.regular_added,
                event.reserve_added,
                event.regular_after,
                event.reserve_after,
                event.avg_score,
            ],
        )?;
        Ok(())
    }

    fn record_quarterly(&self, event: &QuarterlyEvent) -> Result<(), RecordError> {
        self.conn().execute(
            "INSERT INTO quarterly_events
                (timestamp, action, amount, regular_after, reserve_after, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Utc::now().timestamp(),
                event.action.as_str(),
                event.action.amount(),
                event.regular_after,
                event.reserve_after,
                event.note,
            ],
        )?;
        Ok(())
    }

    fn recent_fund_events(&self, limit: usize) -> Result<Vec<FundEvent>, RecordError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT timestamp, event_type, regular_before, regular_after,
                    reserve_before, reserve_after, amount, note
             FROM fund_history
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(FundEvent {
                timestamp: row.get(0)?,
                event_type: parse_trigger(&row.get::<_, String>(1)?),
                regular_before: row.get(2)?,
                regular_after: row.get(3)?,
                reserve_before: row.get(4)?,
                reserve_after: row.get(5)?,
                amount: row.get(6)?,
                note: row.get(7)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
