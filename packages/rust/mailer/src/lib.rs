//! Email rendering and delivery for LeadSync.
//!
//! This crate provides:
//! - [`TemplateCatalog`]: named Handlebars templates (subject, HTML, plain text)
//! - [`Notifier`]: the delivery contract, with a SendGrid implementation
//! - [`MailService`]: renders templates and sends them, singly or in bulk

pub mod sendgrid;
pub mod service;
pub mod templates;

use async_trait::async_trait;
use leadsync_shared::Result;
use serde::Serialize;

pub use sendgrid::{SendGridNotifier, UnconfiguredNotifier};
pub use service::{MailRequest, MailService};
pub use templates::{
    COLD_EMAIL, DEFAULT_TEMPLATE, LEAD_NOTIFICATION, RenderedEmail, SYNC_REPORT, TemplateCatalog,
    cold_email_data, format_sync_time, lead_notification_data, sync_report_data,
};

/// A rendered message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Delivers a rendered message. Success means the provider accepted it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}
