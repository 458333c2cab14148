//! One synchronization pass: fetch → reconcile → persist → classify → notify → summarize.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::{error, info, instrument, warn};

use leadsync_crm::RecordSource;
use leadsync_mailer::{
    COLD_EMAIL, LEAD_NOTIFICATION, MailService, SYNC_REPORT, cold_email_data,
    lead_notification_data, sync_report_data,
};
use leadsync_shared::{DeliveryCounts, Lead, PassId, PassReport, SyncConfig, SyncStats};
use leadsync_storage::LeadStore;

/// Page index requested from the CRM on every pass.
const FIRST_PAGE: u32 = 1;

/// Progress callback for reporting pass status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each fetched lead has been handled.
    fn lead_processed(&self, lead_id: &str, current: usize, total: usize);
    /// Called when the pass completes.
    fn done(&self, report: &PassReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn lead_processed(&self, _lead_id: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &PassReport) {}
}

/// Proof of holding the single-pass gate. Dropping it releases the gate.
pub struct PassPermit {
    _permit: OwnedSemaphorePermit,
}

/// Drives synchronization passes against the configured collaborators.
///
/// Passes never overlap: [`run_pass`](Self::run_pass) waits for the gate,
/// [`try_begin`](Self::try_begin) refuses when it is taken.
pub struct SyncOrchestrator {
    source: Arc<dyn RecordSource>,
    store: Arc<dyn LeadStore>,
    mail: Arc<MailService>,
    config: SyncConfig,
    gate: Arc<Semaphore>,
    last_report: RwLock<Option<PassReport>>,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn RecordSource>,
        store: Arc<dyn LeadStore>,
        mail: Arc<MailService>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            store,
            mail,
            config,
            gate: Arc::new(Semaphore::new(1)),
            last_report: RwLock::new(None),
        }
    }

    pub fn mail(&self) -> &Arc<MailService> {
        &self.mail
    }

    /// Whether a pass currently holds the gate. Does not touch the gate.
    pub fn is_running(&self) -> bool {
        self.gate.available_permits() == 0
    }

    /// Take the gate if it is free.
    pub fn try_begin(&self) -> Option<PassPermit> {
        self.gate
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| PassPermit { _permit: permit })
    }

    /// Report of the most recently completed pass.
    pub async fn last_report(&self) -> Option<PassReport> {
        self.last_report.read().await.clone()
    }

    /// Wait for the gate, then run one pass.
    pub async fn run_pass(&self, progress: &dyn ProgressReporter) -> PassReport {
        let permit = self
            .gate
            .clone()
            .acquire_owned()
            .await
            .expect("pass gate closed");
        self.run_with_permit(PassPermit { _permit: permit }, progress)
            .await
    }

    /// Run one pass with an already acquired permit.
    ///
    /// Never fails: collaborator errors are caught where they happen and end
    /// up in the report's error list or delivery counters.
    #[instrument(skip_all, fields(page_size = self.config.page_size))]
    pub async fn run_with_permit(
        &self,
        _permit: PassPermit,
        progress: &dyn ProgressReporter,
    ) -> PassReport {
        let start = Instant::now();
        let pass_id = PassId::new();
        let started_at = Utc::now();
        let mut stats = SyncStats::default();

        info!(%pass_id, "starting lead synchronization pass");

        // --- Fetch ---
        progress.phase("Fetching leads");
        let leads = match self.source.fetch_page(FIRST_PAGE, self.config.page_size).await {
            Ok(leads) => leads,
            Err(e) => {
                error!(error = %e, "failed to fetch leads from CRM");
                stats.push_error(format!("CRM API error: {e}"));
                Vec::new()
            }
        };

        // --- Reconcile & persist ---
        if leads.is_empty() {
            if stats.errors.is_empty() {
                warn!("no records to synchronize");
            }
        } else {
            progress.phase("Persisting leads");
            self.reconcile(&leads, started_at, &mut stats, progress).await;
        }

        // --- Notify ---
        progress.phase("Sending notifications");
        let lead_alerts = self.send_lead_alerts(&stats).await;
        let cold_emails = self.send_cold_emails(&stats).await;

        progress.phase("Sending summary");
        let summaries = self.send_summary(&stats, started_at).await;

        let report = PassReport {
            pass_id,
            started_at,
            finished_at: Utc::now(),
            status: stats.status(),
            total_leads: stats.total_leads,
            new_leads: stats.new_leads,
            updated_leads: stats.updated_leads,
            errors: stats.errors,
            new_leads_details: stats.new_leads_details,
            lead_alerts,
            cold_emails,
            summaries,
        };

        info!(
            pass_id = %report.pass_id,
            status = %report.status,
            total = report.total_leads,
            new = report.new_leads,
            updated = report.updated_leads,
            errors = report.errors.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "lead synchronization pass complete"
        );

        *self.last_report.write().await = Some(report.clone());
        progress.done(&report);
        report
    }

    /// Upsert each lead independently and classify it against the pre-pass id set.
    async fn reconcile(
        &self,
        leads: &[Lead],
        sync_time: DateTime<Utc>,
        stats: &mut SyncStats,
        progress: &dyn ProgressReporter,
    ) {
        let existing = match self.store.list_lead_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "failed to load existing lead ids");
                stats.push_error(format!("Database error: {e}"));
                return;
            }
        };

        for (i, lead) in leads.iter().enumerate() {
            match self.store.upsert_lead(lead).await {
                Ok(()) => stats.record(lead, !existing.contains(&lead.id), sync_time),
                Err(e) => {
                    let message = format!("Error processing lead {}: {e}", lead.id);
                    error!(lead_id = %lead.id, error = %e, "failed to persist lead");
                    stats.push_error(message);
                }
            }
            progress.lead_processed(&lead.id, i + 1, leads.len());
        }
    }

    async fn send_lead_alerts(&self, stats: &SyncStats) -> DeliveryCounts {
        let mut counts = DeliveryCounts::default();
        if !self.config.notify_new_leads || self.config.recipients.is_empty() {
            return counts;
        }

        for lead in &stats.new_leads_details {
            let data = lead_notification_data(lead);
            counts.merge(
                self.mail
                    .send_bulk(&self.config.recipients, LEAD_NOTIFICATION, &data)
                    .await,
            );
        }
        counts
    }

    async fn send_cold_emails(&self, stats: &SyncStats) -> DeliveryCounts {
        let mut counts = DeliveryCounts::default();
        let max_sends = self.config.cold_email.max_sends();
        let mut attempted = 0usize;

        for lead in &stats.new_leads_details {
            if max_sends.is_some_and(|max| attempted >= max) {
                break;
            }
            if !lead.has_email() {
                warn!(
                    lead_id = %lead.id,
                    name = %lead.full_name,
                    "no email address for new lead, skipping cold email"
                );
                continue;
            }

            attempted += 1;
            let delivered = match self
                .mail
                .send_template(&lead.email, COLD_EMAIL, &cold_email_data(lead))
                .await
            {
                Ok(()) => {
                    info!(lead_id = %lead.id, to = %lead.email, "cold email sent");
                    true
                }
                Err(e) => {
                    warn!(
                        lead_id = %lead.id,
                        to = %lead.email,
                        error = %e,
                        "failed to send cold email"
                    );
                    false
                }
            };
            counts.record(delivered);
        }
        counts
    }

    async fn send_summary(&self, stats: &SyncStats, sync_time: DateTime<Utc>) -> DeliveryCounts {
        if self.config.recipients.is_empty() {
            info!("no summary recipients configured, skipping sync report");
            return DeliveryCounts::default();
        }
        self.mail
            .send_bulk(
                &self.config.recipients,
                SYNC_REPORT,
                &sync_report_data(stats, sync_time),
            )
            .await
    }
}
