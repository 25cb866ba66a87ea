//! Trigger scheduling: the in-memory table and the service loop driving it.

pub mod service;
pub mod table;

pub use service::ExportService;
pub use table::{RegisterOutcome, TriggerScheduler};
