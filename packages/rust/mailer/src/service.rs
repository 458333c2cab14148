//! Template-aware mail facade used by the orchestrator and the HTTP layer.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use leadsync_shared::{AppConfig, DeliveryCounts, Result};

use crate::sendgrid::{SendGridNotifier, UnconfiguredNotifier};
use crate::templates::{DEFAULT_TEMPLATE, TemplateCatalog};
use crate::{Notifier, OutgoingEmail};

/// An ad-hoc message request. Explicit subject or bodies override the
/// rendered template parts.
#[derive(Debug, Clone, Default)]
pub struct MailRequest {
    pub to: String,
    pub template_name: Option<String>,
    pub template_data: Option<Value>,
    pub subject: Option<String>,
    pub html: Option<String>,
    pub text: Option<String>,
}

impl MailRequest {
    pub fn template(to: impl Into<String>, name: impl Into<String>, data: Value) -> Self {
        Self {
            to: to.into(),
            template_name: Some(name.into()),
            template_data: Some(data),
            ..Self::default()
        }
    }
}

/// Renders named templates and hands the result to a [`Notifier`].
pub struct MailService {
    catalog: TemplateCatalog,
    notifier: Arc<dyn Notifier>,
}

impl MailService {
    pub fn new(catalog: TemplateCatalog, notifier: Arc<dyn Notifier>) -> Self {
        Self { catalog, notifier }
    }

    /// Build from application config.
    ///
    /// A missing SendGrid key does not fail startup: the service is built
    /// with a notifier that rejects every send.
    pub fn from_config(config: &AppConfig) -> Self {
        let catalog = TemplateCatalog::load(Path::new(&config.templates.cold_email_html));
        let notifier: Arc<dyn Notifier> = match SendGridNotifier::from_config(&config.sendgrid) {
            Ok(notifier) => Arc::new(notifier),
            Err(e) => {
                warn!(error = %e, "SendGrid not configured, email delivery disabled");
                Arc::new(UnconfiguredNotifier::new(e.to_string()))
            }
        };
        Self::new(catalog, notifier)
    }

    /// Render `template` with `data` and send it to one recipient.
    pub async fn send_template(&self, to: &str, template: &str, data: &Value) -> Result<()> {
        self.send_mail(&MailRequest::template(to, template, data.clone()))
            .await
    }

    /// Send one message, rendering only the parts not supplied explicitly.
    #[instrument(
        skip_all,
        fields(
            to = %request.to,
            template = request.template_name.as_deref().unwrap_or(DEFAULT_TEMPLATE)
        )
    )]
    pub async fn send_mail(&self, request: &MailRequest) -> Result<()> {
        let complete =
            request.subject.is_some() && request.html.is_some() && request.text.is_some();

        let email = if complete {
            OutgoingEmail {
                to: request.to.clone(),
                subject: request.subject.clone().unwrap_or_default(),
                html: request.html.clone().unwrap_or_default(),
                text: request.text.clone().unwrap_or_default(),
            }
        } else {
            let name = request.template_name.as_deref().unwrap_or(DEFAULT_TEMPLATE);
            let empty = Value::Object(Default::default());
            let data = request.template_data.as_ref().unwrap_or(&empty);
            let rendered = self.catalog.render(name, data);
            OutgoingEmail {
                to: request.to.clone(),
                subject: request.subject.clone().unwrap_or(rendered.subject),
                html: request.html.clone().unwrap_or(rendered.html),
                text: request.text.clone().unwrap_or(rendered.text),
            }
        };

        self.notifier.send(&email).await?;
        info!("email sent");
        Ok(())
    }

    /// Send one template to every recipient in order, counting outcomes.
    pub async fn send_bulk(
        &self,
        recipients: &[String],
        template: &str,
        data: &Value,
    ) -> DeliveryCounts {
        let mut counts = DeliveryCounts::default();
        for to in recipients {
            let delivered = match self.send_template(to, template, data).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(to = %to, template, error = %e, "email delivery failed");
                    false
                }
            };
            counts.record(delivered);
        }
        info!(sent = counts.sent, failed = counts.failed, template, "bulk email results");
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{LEAD_NOTIFICATION, SYNC_REPORT};
    use async_trait::async_trait;
    use leadsync_shared::LeadSyncError;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every message; fails for addresses listed in `reject`.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<OutgoingEmail>>,
        reject: Vec<String>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, email: &OutgoingEmail) -> Result<()> {
            if self.reject.contains(&email.to) {
                return Err(LeadSyncError::Notification("rejected".into()));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn service(notifier: Arc<RecordingNotifier>) -> MailService {
        MailService::new(TemplateCatalog::builtin(), notifier)
    }

    #[tokio::test]
    async fn send_template_renders_and_delivers() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mail = service(notifier.clone());

        let data = json!({
            "lead_name": "Ada",
            "lead_email": "ada@example.com",
            "lead_phone": "555",
            "sync_time": "2026-01-01 02:00:00 UTC"
        });
        mail.send_template("ops@example.com", LEAD_NOTIFICATION, &data)
            .await
            .unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "New Lead Notification - Ada");
    }

    #[tokio::test]
    async fn overrides_replace_rendered_parts() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mail = service(notifier.clone());

        let request = MailRequest {
            to: "ops@example.com".into(),
            subject: Some("Custom subject".into()),
            template_data: Some(json!({ "message": "hello" })),
            ..MailRequest::default()
        };
        mail.send_mail(&request).await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent[0].subject, "Custom subject");
        assert!(sent[0].text.contains("Message: hello"));
    }

    #[tokio::test]
    async fn bulk_counts_sent_and_failed_in_order() {
        let notifier = Arc::new(RecordingNotifier {
            reject: vec!["bad@example.com".into()],
            ..RecordingNotifier::default()
        });
        let mail = service(notifier.clone());

        let recipients = vec![
            "a@example.com".to_string(),
            "bad@example.com".to_string(),
            "c@example.com".to_string(),
        ];
        let counts = mail.send_bulk(&recipients, SYNC_REPORT, &json!({})).await;

        assert_eq!(counts, DeliveryCounts { sent: 2, failed: 1 });
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent[0].to, "a@example.com");
        assert_eq!(sent[1].to, "c@example.com");
    }
}
