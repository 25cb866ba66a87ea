//! Flattened trigger descriptors.
//!
//! A descriptor is one concrete (job, weekday, time) occurrence with the
//! full job payload inlined so workers can run statelessly. The set is
//! rebuilt wholesale on every reload and never persisted.

use crate::core::types::{JobId, ScheduleId, TimeOfDay};

/// One concrete firing occurrence of a job.
///
/// Payload fields are copied out of the job row once, at the registry
/// boundary, so nothing downstream has to look fields up again. The weekday
/// is kept as the stored text; it is resolved (and possibly rejected) when
/// the descriptor is registered in the trigger table.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerDescriptor {
    /// Owning job.
    pub job_id: JobId,
    /// Schedule entry this occurrence came from.
    pub schedule_id: ScheduleId,
    /// Human-readable job name, for logs.
    pub job_name: String,
    /// Directory the export file is written to.
    pub export_path: String,
    /// Base name of the export file (".csv" is appended).
    pub export_name: String,
    /// SQL text to execute.
    pub sql: String,
    /// Weekday as stored, e.g. "Mon".
    pub weekday: String,
    /// Concrete time of day this occurrence fires.
    pub time: TimeOfDay,
}

impl TriggerDescriptor {
    /// Full path of the output file for this job.
    pub fn output_file(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.export_path).join(format!("{}.csv", self.export_name))
    }
}
