//! Core domain types for lead synchronization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder title used when the CRM record carries no designation.
pub const DEFAULT_TITLE: &str = "Engineer";

/// Number of error messages included verbatim in the summary email.
pub const SUMMARY_ERROR_LIMIT: usize = 5;

// ---------------------------------------------------------------------------
// PassId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one synchronization pass (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassId(pub Uuid);

impl PassId {
    /// Generate a new time-sortable pass identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for PassId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Lead
// ---------------------------------------------------------------------------

/// A lead record as pulled from the CRM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Stable CRM identifier, primary key in the local store.
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    /// Designation; [`DEFAULT_TITLE`] when the CRM has none.
    pub title: String,
    /// Local timestamp stamped when the record was fetched.
    pub synced_at: DateTime<Utc>,
}

impl Lead {
    /// Build a lead, substituting the placeholder title when absent or blank.
    pub fn new(
        id: impl Into<String>,
        full_name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        title: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            email: email.into(),
            phone: phone.into(),
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            synced_at: Utc::now(),
        }
    }

    /// Whether the lead can be contacted by email.
    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

/// Snapshot of a lead discovered for the first time during a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub title: String,
    pub sync_time: DateTime<Utc>,
}

impl NewLead {
    /// Capture a snapshot of `lead` at the pass timestamp.
    pub fn capture(lead: &Lead, sync_time: DateTime<Utc>) -> Self {
        Self {
            id: lead.id.clone(),
            full_name: lead.full_name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            title: lead.title.clone(),
            sync_time,
        }
    }

    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Statistics & report
// ---------------------------------------------------------------------------

/// Outcome classification of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl SyncStatus {
    /// Success without errors; partial if anything was processed; failed otherwise.
    pub fn derive(error_count: usize, total_leads: usize) -> Self {
        match (error_count, total_leads) {
            (0, _) => Self::Success,
            (_, 0) => Self::Failed,
            _ => Self::PartialSuccess,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialSuccess => "partial_success",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accumulator for one pass. Created fresh per pass and discarded afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStats {
    pub total_leads: usize,
    pub new_leads: usize,
    pub updated_leads: usize,
    pub errors: Vec<String>,
    pub new_leads_details: Vec<NewLead>,
}

impl SyncStats {
    /// Record a successfully persisted lead.
    pub fn record(&mut self, lead: &Lead, is_new: bool, sync_time: DateTime<Utc>) {
        if is_new {
            self.new_leads += 1;
            self.new_leads_details.push(NewLead::capture(lead, sync_time));
        } else {
            self.updated_leads += 1;
        }
        self.total_leads += 1;
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus::derive(self.errors.len(), self.total_leads)
    }

    /// The first [`SUMMARY_ERROR_LIMIT`] errors and how many were left out.
    pub fn summary_errors(&self) -> (&[String], usize) {
        let shown = self.errors.len().min(SUMMARY_ERROR_LIMIT);
        (&self.errors[..shown], self.errors.len() - shown)
    }
}

/// Counters for outbound mail attempted during a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryCounts {
    pub sent: usize,
    pub failed: usize,
}

impl DeliveryCounts {
    pub fn record(&mut self, delivered: bool) {
        if delivered {
            self.sent += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn merge(&mut self, other: DeliveryCounts) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

/// The result snapshot of one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub pass_id: PassId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: SyncStatus,
    pub total_leads: usize,
    pub new_leads: usize,
    pub updated_leads: usize,
    pub errors: Vec<String>,
    pub new_leads_details: Vec<NewLead>,
    pub lead_alerts: DeliveryCounts,
    pub cold_emails: DeliveryCounts,
    pub summaries: DeliveryCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(id: &str) -> Lead {
        Lead::new(id, "Ada Lovelace", "ada@example.com", "555-0100", None)
    }

    #[test]
    fn missing_title_defaults_to_placeholder() {
        assert_eq!(lead("1").title, DEFAULT_TITLE);
        let blank = Lead::new("2", "B", "", "", Some("  ".into()));
        assert_eq!(blank.title, DEFAULT_TITLE);
        let cto = Lead::new("3", "C", "", "", Some("CTO".into()));
        assert_eq!(cto.title, "CTO");
        assert!(!cto.has_email());
    }

    #[test]
    fn status_derivation() {
        assert_eq!(SyncStatus::derive(0, 0), SyncStatus::Success);
        assert_eq!(SyncStatus::derive(0, 10), SyncStatus::Success);
        assert_eq!(SyncStatus::derive(2, 3), SyncStatus::PartialSuccess);
        assert_eq!(SyncStatus::derive(1, 0), SyncStatus::Failed);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&SyncStatus::PartialSuccess).expect("serialize");
        assert_eq!(json, "\"partial_success\"");
    }

    #[test]
    fn stats_accumulate_and_capture_new_leads() {
        let now = Utc::now();
        let mut stats = SyncStats::default();
        stats.record(&lead("1"), true, now);
        stats.record(&lead("2"), false, now);
        stats.record(&lead("3"), true, now);

        assert_eq!(stats.total_leads, 3);
        assert_eq!(stats.new_leads, 2);
        assert_eq!(stats.updated_leads, 1);
        let ids: Vec<&str> = stats.new_leads_details.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(stats.new_leads_details[0].sync_time, now);
    }

    #[test]
    fn summary_errors_truncate_at_five() {
        let mut stats = SyncStats::default();
        for i in 0..7 {
            stats.push_error(format!("error {i}"));
        }
        let (shown, remaining) = stats.summary_errors();
        assert_eq!(shown.len(), 5);
        assert_eq!(shown[4], "error 4");
        assert_eq!(remaining, 2);
    }
}
