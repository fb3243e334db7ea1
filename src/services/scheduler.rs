//! Cron-driven task orchestration.
//!
//! Each task collects what it needs, calls into the fund manager (which
//! holds its lock only for the in-memory mutation and the disk write), then
//! notifies and records with the lock released.

use chrono::Utc;
use cron::Schedule;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{parse_schedule, ConfigError, ScheduleConfig};
use crate::services::collector::Collector;
use crate::services::fund::{Applied, FundManager};
use crate::services::notifier::{formatter, send_with_retry, CommandHandler, Notifier};
use crate::services::recorder::{RecordError, Recorder};
use crate::services::shutdown::{self, is_shutdown, sleep_or_shutdown, ShutdownReceiver};
use crate::services::strategy;
use crate::sources::FetchError;
use crate::types::{
    DailyCheckEvent, FundEvent, FundState, MarketIndicators, MonthlyEvent, QuarterlyEvent,
    RebalanceAction, TradeSignal, TriggerType, WeeklySnapshot,
};

/// Daily RSI below which the daily check attempts a bottom-fish.
pub const BOTTOM_FISH_RSI: f64 = 30.0;

/// Default retry budget for outbound notifications.
const DEFAULT_NOTIFY_RETRIES: u32 = 3;

/// Why a market-driven cycle stopped before touching the fund.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("cycle cancelled by shutdown")]
    Cancelled,
}

/// Work the scheduler can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledTask {
    Weekly,
    DailyCheck,
    Monthly,
    Quarterly,
    WeeklyReset,
}

impl ScheduledTask {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::DailyCheck => "daily_check",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::WeeklyReset => "weekly_reset",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "CRON_WEEKLY" => Some(Self::Weekly),
            "CRON_DAILY" => Some(Self::DailyCheck),
            "CRON_MONTHLY" => Some(Self::Monthly),
            "CRON_QUARTERLY" => Some(Self::Quarterly),
            "CRON_WEEKLY_RESET" => Some(Self::WeeklyReset),
            _ => None,
        }
    }
}

/// What a daily check did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DailyOutcome {
    /// Amount drawn from the reserve, when a bottom-fish fired.
    pub bottom_fish: Option<f64>,
    pub take_profit: bool,
}

pub struct Scheduler {
    collector: Collector,
    fund: Arc<FundManager>,
    notifier: Arc<dyn Notifier>,
    recorder: Arc<dyn Recorder>,
    schedule: ScheduleConfig,
    notify_max_retries: u32,
    shutdown: ShutdownReceiver,
}

impl Scheduler {
    pub fn new(
        collector: Collector,
        fund: Arc<FundManager>,
        notifier: Arc<dyn Notifier>,
        recorder: Arc<dyn Recorder>,
        shutdown: ShutdownReceiver,
    ) -> Self {
        Self {
            collector,
            fund,
            notifier,
            recorder,
            schedule: ScheduleConfig::default(),
            notify_max_retries: DEFAULT_NOTIFY_RETRIES,
            shutdown,
        }
    }

    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_notify_retries(mut self, max_retries: u32) -> Self {
        self.notify_max_retries = max_retries;
        self
    }

    pub fn fund(&self) -> &Arc<FundManager> {
        &self.fund
    }

    async fn notify(&self, text: &str) {
        let mut shutdown_rx = self.shutdown.clone();
        if let Err(e) =
            send_with_retry(self.notifier.as_ref(), text, self.notify_max_retries, &mut shutdown_rx).await
        {
            error!("Failed to deliver notification via {}: {}", self.notifier.name(), e);
        }
    }

    fn record(&self, what: &str, result: Result<(), RecordError>) {
        if let Err(e) = result {
            warn!("Failed to record {}: {}", what, e);
        }
    }

    fn record_fund_event<T>(&self, trigger: TriggerType, applied: &Applied<T>, amount: f64, note: String) {
        let event = FundEvent::between(trigger, &applied.before, &applied.after, amount, note);
        self.record("fund event", self.recorder.record_fund_event(&event));
    }

    async fn report_failure(&self, task: &str, err: &FetchError) {
        error!("{} aborted: {}", task, err);
        self.notify(&formatter::cycle_failed(task, &err.to_string(), Utc::now()))
            .await;
    }

    /// Collect indicators unless shutdown fires first. A fetch failure is
    /// reported through the notifier.
    async fn collect(&self, task: &str) -> Result<MarketIndicators, CycleError> {
        let mut shutdown_rx = self.shutdown.clone();

        let collected = tokio::select! {
            biased;
            _ = shutdown::wait(&mut shutdown_rx) => {
                info!("{} cancelled by shutdown", task);
                return Err(CycleError::Cancelled);
            }
            r = self.collector.collect() => r,
        };

        match collected {
            Ok(ind) => Ok(ind),
            Err(e) => {
                self.report_failure(task, &e).await;
                Err(e.into())
            }
        }
    }

    /// Last check before committing a withdrawal.
    fn ensure_running(&self, task: &str) -> Result<(), CycleError> {
        if is_shutdown(&self.shutdown) {
            info!("{} cancelled by shutdown before touching the fund", task);
            return Err(CycleError::Cancelled);
        }
        Ok(())
    }

    /// Collect, score, invest, report and record. A collection failure or a
    /// shutdown leaves the fund untouched.
    pub async fn run_weekly(&self, trigger: TriggerType) -> Result<TradeSignal, CycleError> {
        info!("Running weekly evaluation ({})", trigger);

        let ind = self.collect("Weekly evaluation").await?;

        let mut signal = strategy::evaluate_with_trigger(&ind, trigger);
        self.ensure_running("Weekly evaluation")?;
        let applied = self.fund.weekly_investment(&mut signal);
        let (final_amount, reserve_used) = applied.value;

        info!(
            "Weekly signal: score={:+.3} tier={} invest={:.2} (reserve {:.2})",
            signal.total_score,
            signal.tier.label(),
            final_amount,
            reserve_used
        );

        let report = format!(
            "{}\n{}",
            formatter::weekly_report(&ind, &signal),
            formatter::fund_status(&applied.after)
        );
        self.notify(&report).await;

        let snapshot = WeeklySnapshot {
            indicators: &ind,
            signal: &signal,
            fund: &applied.after,
        };
        self.record("weekly snapshot", self.recorder.record_weekly(&snapshot));
        self.record_fund_event(
            TriggerType::Weekly,
            &applied,
            final_amount,
            format!("{} tier, score {:+.3}", signal.tier.label(), signal.total_score),
        );

        Ok(signal)
    }

    /// Intra-week check for oversold and overbought conditions.
    pub async fn run_daily_check(&self) -> Result<DailyOutcome, CycleError> {
        let ind = self.collect("Daily check").await?;

        debug!(
            "Daily check: price={:.2} daily RSI={:.1} weekly RSI={:.1}",
            ind.current_price, ind.daily_rsi, ind.weekly_rsi
        );

        let mut outcome = DailyOutcome::default();

        if ind.daily_rsi < BOTTOM_FISH_RSI {
            let signal = strategy::evaluate(&ind);
            self.ensure_running("Daily check")?;
            let applied = self.fund.bottom_fish_investment(signal.total_score);

            match applied.value {
                Some(amount) => {
                    info!("Bottom-fish triggered: {:.2} from reserve", amount);
                    self.notify(&formatter::bottom_fish(&ind, signal.total_score, amount))
                        .await;

                    let event = DailyCheckEvent {
                        daily_rsi: ind.daily_rsi,
                        weekly_rsi: ind.weekly_rsi,
                        price: ind.current_price,
                        event_type: TriggerType::BottomFish,
                        amount,
                        total_score: signal.total_score,
                    };
                    self.record("daily check", self.recorder.record_daily_check(&event));
                    self.record_fund_event(
                        TriggerType::BottomFish,
                        &applied,
                        amount,
                        format!("daily RSI {:.1}", ind.daily_rsi),
                    );
                    outcome.bottom_fish = Some(amount);
                }
                None => debug!("Bottom-fish already used this week"),
            }
        }

        if let Some(warning) = strategy::take_profit_warning(&ind) {
            info!("Take-profit condition: {}", warning);
            self.notify(&formatter::take_profit(&ind, &warning)).await;

            let event = DailyCheckEvent {
                daily_rsi: ind.daily_rsi,
                weekly_rsi: ind.weekly_rsi,
                price: ind.current_price,
                event_type: TriggerType::TakeProfit,
                amount: 0.0,
                total_score: 0.0,
            };
            self.record("daily check", self.recorder.record_daily_check(&event));
            outcome.take_profit = true;
        }

        Ok(outcome)
    }

    pub async fn run_monthly(&self) -> FundState {
        let applied = self.fund.monthly_replenish();
        let (regular_added, reserve_added) = applied.value;
        info!(
            "Monthly replenish: regular +{:.2}, reserve +{:.2}",
            regular_added, reserve_added
        );

        self.notify(&formatter::monthly_summary(&applied.after)).await;

        let event = MonthlyEvent {
            regular_added,
            reserve_added,
            regular_after: applied.after.regular_balance,
            reserve_after: applied.after.reserve_balance,
            avg_score: applied.after.average_recent_score().unwrap_or(0.0),
        };
        self.record("monthly event", self.recorder.record_monthly(&event));
        self.record_fund_event(
            TriggerType::Monthly,
            &applied,
            regular_added + reserve_added,
            "monthly replenishment".to_string(),
        );

        applied.after
    }

    pub async fn run_quarterly(&self) -> RebalanceAction {
        let applied = self.fund.quarterly_rebalance();
        let action = applied.value;
        info!("Quarterly rebalance: {} {:.2}", action.as_str(), action.amount());

        self.notify(&formatter::quarterly(&action, &applied.after)).await;

        let event = QuarterlyEvent {
            action,
            regular_after: applied.after.regular_balance,
            reserve_after: applied.after.reserve_balance,
            note: action.describe().to_string(),
        };
        self.record("quarterly event", self.recorder.record_quarterly(&event));
        self.record_fund_event(
            TriggerType::Quarterly,
            &applied,
            action.amount(),
            action.as_str().to_string(),
        );

        action
    }

    pub fn run_weekly_reset(&self) {
        let applied = self.fund.reset_weekly_flags();
        if applied.is_durable() {
            info!("Weekly flags reset");
        }
    }

    /// Answer a chat or HTTP command. `/weekly` delivers its report through
    /// the notifier and returns an empty reply.
    pub async fn handle_command(&self, text: &str) -> String {
        let command = text
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match command.as_str() {
            "/weekly" => {
                // Failures are already reported through the notifier.
                let _ = self.run_weekly(TriggerType::Manual).await;
                String::new()
            }
            "/fund" => formatter::fund_status(&self.fund.snapshot()),
            "/monthly" => formatter::monthly_summary(&self.fund.snapshot()),
            _ => formatter::help(),
        }
    }

    async fn run_task(&self, task: ScheduledTask) {
        match task {
            ScheduledTask::Weekly => {
                let _ = self.run_weekly(TriggerType::Weekly).await;
            }
            ScheduledTask::DailyCheck => {
                let _ = self.run_daily_check().await;
            }
            ScheduledTask::Monthly => {
                self.run_monthly().await;
            }
            ScheduledTask::Quarterly => {
                self.run_quarterly().await;
            }
            ScheduledTask::WeeklyReset => self.run_weekly_reset(),
        }
    }

    /// Parse every schedule, then start one task per schedule. Nothing is
    /// spawned when any expression is invalid.
    pub fn spawn(self: &Arc<Self>) -> Result<Vec<JoinHandle<()>>, ConfigError> {
        let mut parsed = Vec::new();
        for (key, expr) in self.schedule.entries() {
            if let Some(task) = ScheduledTask::from_key(key) {
                parsed.push((task, parse_schedule(key, expr)?));
            }
        }

        Ok(parsed
            .into_iter()
            .map(|(task, schedule)| {
                let scheduler = Arc::clone(self);
                tokio::spawn(async move { scheduler.run_schedule(task, schedule).await })
            })
            .collect())
    }

    async fn run_schedule(self: Arc<Self>, task: ScheduledTask, schedule: Schedule) {
        let mut shutdown_rx = self.shutdown.clone();

        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                warn!("Schedule for {} has no upcoming runs", task.name());
                break;
            };
            let delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            debug!("Next {} run at {}", task.name(), next);

            if sleep_or_shutdown(delay, &mut shutdown_rx).await {
                break;
            }
            self.run_task(task).await;
        }

        info!("{} schedule stopped", task.name());
    }
}

impl CommandHandler for Scheduler {
    fn handle<'a>(&'a self, command: &'a str) -> Pin<Box<dyn Future<Output = String> + Send + 'a>> {
        Box::pin(self.handle_command(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notifier::NotifyFuture;
    use crate::services::shutdown;
    use crate::services::sqlite_store::{HistoryTable, SqliteRecorder};
    use crate::sources::mock::MockFetcher;
    use crate::types::Bar;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const BUDGET: f64 = 10_000.0;
    const DAY_MS: i64 = 86_400_000;

    #[derive(Default)]
    struct CapturingNotifier {
        sent: Mutex<Vec<String>>,
    }

    impl CapturingNotifier {
        fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for CapturingNotifier {
        fn name(&self) -> &'static str {
            "capture"
        }

        fn send<'a>(&'a self, text: &'a str) -> NotifyFuture<'a> {
            Box::pin(async move {
                self.sent.lock().unwrap().push(text.to_string());
                Ok(())
            })
        }
    }

    struct Harness {
        scheduler: Scheduler,
        notifier: Arc<CapturingNotifier>,
        recorder: Arc<SqliteRecorder>,
        _dir: TempDir,
        tx: shutdown::ShutdownSender,
    }

    fn harness(fetcher: MockFetcher) -> Harness {
        let dir = TempDir::new().unwrap();
        let fund = Arc::new(FundManager::open(dir.path().join("fund.json"), BUDGET).unwrap());
        let notifier = Arc::new(CapturingNotifier::default());
        let recorder = Arc::new(SqliteRecorder::new_in_memory().unwrap());
        let (tx, rx) = shutdown::channel();

        let scheduler = Scheduler::new(
            Collector::new(Arc::new(fetcher), "SPX500"),
            fund,
            notifier.clone(),
            recorder.clone(),
            rx,
        )
        .with_notify_retries(0);

        Harness {
            scheduler,
            notifier,
            recorder,
            _dir: dir,
            tx,
        }
    }

    fn trending_bars(start: f64, step: f64, count: usize) -> Vec<Bar> {
        let now = Utc::now().timestamp_millis();
        (0..count)
            .map(|i| Bar::flat(now - (count - i) as i64 * DAY_MS, start + step * i as f64))
            .collect()
    }

    // ===== Weekly =====

    #[tokio::test]
    async fn test_weekly_invests_and_records() {
        let h = harness(MockFetcher::new(5800.0));
        let before = h.scheduler.fund().snapshot();

        let signal = h.scheduler.run_weekly(TriggerType::Weekly).await.unwrap();
        let after = h.scheduler.fund().snapshot();

        assert!((signal.base_amount - before.weekly_base_n).abs() < 1e-9);
        let spent = before.total_balance() - after.total_balance();
        assert!((spent - signal.final_amount).abs() < 1e-6);
        assert_eq!(after.recent_scores.len(), 1);

        let messages = h.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Fund status"));
        assert_eq!(h.recorder.count(HistoryTable::WeeklySnapshots), 1);
        assert_eq!(h.recorder.count(HistoryTable::FundHistory), 1);
    }

    #[tokio::test]
    async fn test_weekly_collect_failure_leaves_fund_untouched() {
        let h = harness(MockFetcher::failing());
        let before = h.scheduler.fund().snapshot();

        assert!(h.scheduler.run_weekly(TriggerType::Weekly).await.is_err());

        let after = h.scheduler.fund().snapshot();
        assert_eq!(after.regular_balance, before.regular_balance);
        assert_eq!(after.reserve_balance, before.reserve_balance);

        let messages = h.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("failed"));
        assert_eq!(h.recorder.count(HistoryTable::FundHistory), 0);
    }

    #[tokio::test]
    async fn test_weekly_after_shutdown_leaves_fund_untouched() {
        let h = harness(MockFetcher::new(5800.0));
        let before = h.scheduler.fund().snapshot();
        h.tx.send(true).unwrap();

        let result = h.scheduler.run_weekly(TriggerType::Weekly).await;
        assert!(matches!(result, Err(CycleError::Cancelled)));

        let after = h.scheduler.fund().snapshot();
        assert!(after.recent_scores.is_empty());
        assert_eq!(after.regular_balance, before.regular_balance);
        assert_eq!(after.reserve_balance, before.reserve_balance);
        assert!(h.notifier.messages().is_empty());
        assert_eq!(h.recorder.count(HistoryTable::FundHistory), 0);
    }

    #[tokio::test]
    async fn test_daily_check_after_shutdown_skips_bottom_fish() {
        let fetcher = MockFetcher::new(5000.0).with_daily(trending_bars(6500.0, -5.0, 300));
        let h = harness(fetcher);
        let reserve_before = h.scheduler.fund().snapshot().reserve_balance;
        h.tx.send(true).unwrap();

        let result = h.scheduler.run_daily_check().await;
        assert!(matches!(result, Err(CycleError::Cancelled)));

        let state = h.scheduler.fund().snapshot();
        assert!(!state.bottom_fish_used_this_week);
        assert_eq!(state.reserve_balance, reserve_before);
    }

    // ===== Daily check =====

    #[tokio::test]
    async fn test_daily_bottom_fish_once_per_week() {
        let fetcher = MockFetcher::new(5000.0).with_daily(trending_bars(6500.0, -5.0, 300));
        let h = harness(fetcher);
        let reserve_before = h.scheduler.fund().snapshot().reserve_balance;

        let first = h.scheduler.run_daily_check().await.unwrap();
        let amount = first.bottom_fish.expect("oversold market should bottom-fish");
        assert!(amount > 0.0);
        assert!(!first.take_profit);

        let state = h.scheduler.fund().snapshot();
        assert!((reserve_before - state.reserve_balance - amount).abs() < 1e-6);
        assert!(state.bottom_fish_used_this_week);

        let second = h.scheduler.run_daily_check().await.unwrap();
        assert_eq!(second.bottom_fish, None);
        assert_eq!(h.recorder.count(HistoryTable::DailyChecks), 1);

        h.scheduler.run_weekly_reset();
        assert!(!h.scheduler.fund().snapshot().bottom_fish_used_this_week);
        let third = h.scheduler.run_daily_check().await.unwrap();
        assert!(third.bottom_fish.is_some());
    }

    #[tokio::test]
    async fn test_daily_take_profit_alert() {
        let fetcher = MockFetcher::new(7000.0).with_daily(trending_bars(5500.0, 5.0, 300));
        let h = harness(fetcher);
        let before = h.scheduler.fund().snapshot();

        let outcome = h.scheduler.run_daily_check().await.unwrap();
        assert!(outcome.take_profit);
        assert_eq!(outcome.bottom_fish, None);

        let after = h.scheduler.fund().snapshot();
        assert_eq!(after.reserve_balance, before.reserve_balance);
        assert_eq!(h.recorder.count(HistoryTable::DailyChecks), 1);
        assert!(h.notifier.messages()[0].contains("Take-profit"));
    }

    // ===== Monthly / quarterly =====

    #[tokio::test]
    async fn test_monthly_replenish_records() {
        let h = harness(MockFetcher::new(5800.0));
        let state = h.scheduler.run_monthly().await;

        assert!((state.regular_balance - 14_000.0).abs() < 1e-6);
        assert!((state.reserve_balance - 6_000.0).abs() < 1e-6);
        assert!(state.last_replenish_at.is_some());
        assert_eq!(h.recorder.count(HistoryTable::MonthlyEvents), 1);
        assert_eq!(h.recorder.count(HistoryTable::FundHistory), 1);
    }

    #[tokio::test]
    async fn test_quarterly_transfers_excess() {
        let h = harness(MockFetcher::new(5800.0));
        for _ in 0..3 {
            h.scheduler.run_monthly().await;
        }

        let action = h.scheduler.run_quarterly().await;
        assert!(matches!(action, RebalanceAction::TransferExcess(_)));

        let actions = h.recorder.quarterly_actions().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].0, "TRANSFER_EXCESS");
    }

    // ===== Commands =====

    #[tokio::test]
    async fn test_handle_command() {
        let h = harness(MockFetcher::new(5800.0));

        assert!(h.scheduler.handle_command("/fund").await.contains("Fund status"));
        assert!(h.scheduler.handle_command("/monthly").await.contains("Monthly summary"));
        assert!(h.scheduler.handle_command("/unknown").await.contains("/weekly"));
        assert!(h.scheduler.handle_command("/FUND@sentinel_bot").await.contains("Fund status"));

        let reply = h.scheduler.handle_command("/weekly").await;
        assert!(reply.is_empty());
        assert_eq!(h.recorder.count(HistoryTable::WeeklySnapshots), 1);
    }

    // ===== Schedules =====

    #[tokio::test]
    async fn test_spawn_rejects_invalid_cron() {
        let h = harness(MockFetcher::new(5800.0));
        let scheduler = Arc::new(h.scheduler.with_schedule(ScheduleConfig {
            daily: "not a cron".into(),
            ..ScheduleConfig::default()
        }));

        let err = scheduler.spawn().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCron { key: "CRON_DAILY", .. }));
    }

    #[tokio::test]
    async fn test_spawned_tasks_stop_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let fund = Arc::new(FundManager::open(dir.path().join("fund.json"), BUDGET).unwrap());
        let (tx, rx) = shutdown::channel();
        let scheduler = Arc::new(Scheduler::new(
            Collector::new(Arc::new(MockFetcher::new(5800.0)), "SPX500"),
            fund,
            Arc::new(CapturingNotifier::default()),
            Arc::new(crate::services::recorder::NoopRecorder),
            rx,
        ));

        let handles = scheduler.spawn().unwrap();
        assert_eq!(handles.len(), 5);

        tx.send(true).unwrap();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[test]
    fn test_task_names() {
        assert_eq!(ScheduledTask::DailyCheck.name(), "daily_check");
        assert_eq!(ScheduledTask::from_key("CRON_WEEKLY_RESET"), Some(ScheduledTask::WeeklyReset));
        assert_eq!(ScheduledTask::from_key("CRON_OTHER"), None);
    }
}
