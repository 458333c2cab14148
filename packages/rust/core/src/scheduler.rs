//! Cron-driven daily pass.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use leadsync_shared::{LeadSyncError, Result, ScheduleConfig};

use crate::pipeline::{SilentProgress, SyncOrchestrator};

/// Identifier of the scheduled synchronization job.
pub const JOB_ID: &str = "sync_leads_daily";

/// Human-readable job name.
pub const JOB_NAME: &str = "Sync leads from Zoho CRM daily";

/// Parse a 5-field cron expression.
pub fn parse_cron(expr: &str) -> Result<Schedule> {
    // The cron crate wants a leading seconds field.
    let full_expr = format!("0 {expr}");
    Schedule::from_str(&full_expr)
        .map_err(|e| LeadSyncError::validation(format!("invalid cron expression '{expr}': {e}")))
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| LeadSyncError::validation(format!("invalid timezone: {name}")))
}

/// A scheduled job as shown by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    pub next_run_time: Option<DateTime<Utc>>,
    pub trigger: String,
}

/// Scheduler state snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub scheduler_running: bool,
    pub jobs: Vec<JobInfo>,
    pub current_time: DateTime<Utc>,
}

/// Fires [`SyncOrchestrator::run_pass`] on a cron schedule.
pub struct SyncScheduler {
    schedule: Schedule,
    timezone: Tz,
    expression: String,
    enabled: bool,
    running: AtomicBool,
}

impl SyncScheduler {
    /// Validate the schedule config.
    pub fn new(config: &ScheduleConfig) -> Result<Self> {
        Ok(Self {
            schedule: parse_cron(&config.cron)?,
            timezone: parse_timezone(&config.timezone)?,
            expression: config.cron.clone(),
            enabled: config.enabled,
            running: AtomicBool::new(false),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// First fire time strictly after `now`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&now.with_timezone(&self.timezone))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Current status, listing the job only when scheduling is enabled.
    pub fn status(&self) -> SchedulerStatus {
        let now = Utc::now();
        let jobs = if self.enabled {
            vec![JobInfo {
                id: JOB_ID.to_string(),
                name: JOB_NAME.to_string(),
                next_run_time: self.next_run_after(now),
                trigger: format!("cron[{}] ({})", self.expression, self.timezone),
            }]
        } else {
            Vec::new()
        };

        SchedulerStatus {
            scheduler_running: self.is_running(),
            jobs,
            current_time: now,
        }
    }

    /// Run passes at each fire time until `shutdown` flips to `true`.
    pub async fn run(
        self: Arc<Self>,
        orchestrator: Arc<SyncOrchestrator>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        if !self.enabled {
            info!("scheduled synchronization disabled");
            return;
        }

        self.running.store(true, Ordering::SeqCst);
        info!(
            job = JOB_ID,
            cron = %self.expression,
            timezone = %self.timezone,
            "scheduler started"
        );

        loop {
            let now = Utc::now();
            let Some(next) = self.next_run_after(now) else {
                warn!(cron = %self.expression, "cron expression has no upcoming fire time");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(job = JOB_ID, next_run_time = %next, "next synchronization scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    info!(job = JOB_ID, "running scheduled lead synchronization");
                    let report = orchestrator.run_pass(&SilentProgress).await;
                    if report.errors.is_empty() {
                        info!(
                            pass_id = %report.pass_id,
                            status = %report.status,
                            "scheduled pass finished"
                        );
                    } else {
                        error!(
                            pass_id = %report.pass_id,
                            status = %report.status,
                            errors = report.errors.len(),
                            "scheduled pass finished with errors"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config(cron: &str, timezone: &str) -> ScheduleConfig {
        ScheduleConfig {
            enabled: true,
            cron: cron.into(),
            timezone: timezone.into(),
        }
    }

    #[test]
    fn parse_cron_accepts_five_fields() {
        assert!(parse_cron("0 2 * * *").is_ok());
        assert!(parse_cron("0 8 * * 1-5").is_ok());
        assert!(parse_cron("not a cron").is_err());
    }

    #[test]
    fn invalid_timezone_rejected() {
        let err = SyncScheduler::new(&config("0 2 * * *", "Mars/Olympus")).err().unwrap();
        assert!(err.to_string().contains("invalid timezone"));
    }

    #[test]
    fn next_run_is_daily_at_two_utc() {
        let scheduler = SyncScheduler::new(&ScheduleConfig::default()).unwrap();

        let before = Utc.with_ymd_and_hms(2026, 3, 10, 1, 30, 0).unwrap();
        assert_eq!(
            scheduler.next_run_after(before),
            Some(Utc.with_ymd_and_hms(2026, 3, 10, 2, 0, 0).unwrap())
        );

        let after = Utc.with_ymd_and_hms(2026, 3, 10, 2, 0, 0).unwrap();
        assert_eq!(
            scheduler.next_run_after(after),
            Some(Utc.with_ymd_and_hms(2026, 3, 11, 2, 0, 0).unwrap())
        );
    }

    #[test]
    fn next_run_honours_timezone() {
        let scheduler = SyncScheduler::new(&config("0 2 * * *", "America/Toronto")).unwrap();
        // 02:00 EST is 07:00 UTC in January.
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        assert_eq!(
            scheduler.next_run_after(now),
            Some(Utc.with_ymd_and_hms(2026, 1, 15, 7, 0, 0).unwrap())
        );
    }

    #[test]
    fn status_lists_daily_job() {
        let scheduler = SyncScheduler::new(&ScheduleConfig::default()).unwrap();
        let status = scheduler.status();
        assert!(!status.scheduler_running);
        assert_eq!(status.jobs.len(), 1);
        assert_eq!(status.jobs[0].id, JOB_ID);
        assert!(status.jobs[0].next_run_time.unwrap() > status.current_time);
    }

    #[test]
    fn disabled_schedule_has_no_jobs() {
        let mut cfg = ScheduleConfig::default();
        cfg.enabled = false;
        let scheduler = SyncScheduler::new(&cfg).unwrap();
        assert!(scheduler.status().jobs.is_empty());
    }
}
