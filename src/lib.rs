//! exportd - recurring SQL-export scheduling service.
//!
//! Jobs and their weekly schedules live in a config store; the scheduler
//! expands them into a trigger table keyed by (weekday, time), dispatches
//! due triggers to a bounded worker pool, and each worker streams a
//! read-validated query from the source database into a `;`-delimited
//! export file.

pub mod config;
pub mod core;
pub mod dispatch;
pub mod export;
pub mod ledger;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod source;
pub mod store;

pub use config::{AppConfig, ConfigError, StoreConfig};
pub use core::slots::{expand_slots, SlotError};
pub use core::trigger::TriggerDescriptor;
pub use core::types::{JobId, ScheduleId, TimeOfDay, Weekday};
pub use dispatch::Dispatcher;
pub use export::is_read_only;
pub use ledger::{LogEntry, LogLevel, RunLedger};
pub use registry::JobRegistry;
pub use runner::{ExportOutcome, JobRunner};
pub use scheduler::{ExportService, RegisterOutcome, TriggerScheduler};
pub use source::{QuerySource, SqliteSource, StaticSource};
pub use store::{ConfigStore, InMemoryStore, JobRow, ScheduleRow, StoreError};

#[cfg(any(feature = "sqlite", test))]
pub use store::SqliteStore;
