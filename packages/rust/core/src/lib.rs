//! Sync orchestration and scheduling for LeadSync.
//!
//! This crate ties the CRM source, the lead store and the mailer together
//! into a synchronization pass, and runs that pass on a cron schedule.

pub mod pipeline;
pub mod scheduler;

pub use pipeline::{PassPermit, ProgressReporter, SilentProgress, SyncOrchestrator};
pub use scheduler::{JobInfo, SchedulerStatus, SyncScheduler, parse_cron};
