pub mod collector;
pub mod fund;
pub mod indicators;
pub mod notifier;
pub mod recorder;
pub mod scheduler;
pub mod shutdown;
pub mod sqlite_store;
pub mod strategy;

pub use collector::Collector;
pub use fund::{Applied, FundError, FundManager};
pub use notifier::{LogNotifier, Notifier, NotifyError, TelegramNotifier};
pub use recorder::{open_recorder, NoopRecorder, RecordError, Recorder};
pub use scheduler::{CycleError, DailyOutcome, ScheduledTask, Scheduler};
pub use sqlite_store::SqliteRecorder;
