//! SendGrid v3 mail delivery.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, instrument};

use leadsync_shared::{LeadSyncError, Result, SendGridConfig, require_secret};

use crate::{Notifier, OutgoingEmail};

/// User-Agent string for SendGrid requests.
const USER_AGENT: &str = concat!("LeadSync/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MailSend<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: &'a str,
    content: [Content<'a>; 2],
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

// ---------------------------------------------------------------------------
// SendGridNotifier
// ---------------------------------------------------------------------------

/// Delivers mail through the SendGrid v3 `mail/send` endpoint.
pub struct SendGridNotifier {
    client: Client,
    endpoint: String,
    api_key: String,
    from_email: String,
    from_name: String,
}

impl SendGridNotifier {
    /// Build from config, reading the API key from the configured env var.
    pub fn from_config(config: &SendGridConfig) -> Result<Self> {
        let api_key = require_secret(&config.api_key_env)?;
        Self::new(config, api_key)
    }

    /// Build with an explicit API key.
    pub fn new(config: &SendGridConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LeadSyncError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v3/mail/send", config.api_base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    #[instrument(skip_all, fields(to = %email.to))]
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let payload = MailSend {
            personalizations: [Personalization {
                to: [Address {
                    email: &email.to,
                    name: None,
                }],
            }],
            from: Address {
                email: &self.from_email,
                name: Some(&self.from_name),
            },
            subject: &email.subject,
            content: [
                Content {
                    kind: "text/plain",
                    value: &email.text,
                },
                Content {
                    kind: "text/html",
                    value: &email.html,
                },
            ],
        };

        debug!(subject = %email.subject, "sending email via SendGrid");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LeadSyncError::Notification(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if status.as_u16() == 200 || status.as_u16() == 202 {
            info!(status = status.as_u16(), "email accepted by SendGrid");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(LeadSyncError::Notification(format!(
            "SendGrid rejected message to {}: HTTP {status}: {body}",
            email.to
        )))
    }
}

/// Stand-in used when no API key is configured; every send fails.
pub struct UnconfiguredNotifier {
    reason: String,
}

impl UnconfiguredNotifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Notifier for UnconfiguredNotifier {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        Err(LeadSyncError::Notification(format!(
            "mail delivery not configured, dropping message to {}: {}",
            email.to, self.reason
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> SendGridConfig {
        SendGridConfig {
            api_base_url: server.uri(),
            from_email: "sync@example.com".into(),
            from_name: "CRM Sync Service".into(),
            ..SendGridConfig::default()
        }
    }

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: "ops@example.com".into(),
            subject: "Daily Lead Sync Report".into(),
            html: "<p>ok</p>".into(),
            text: "ok".into(),
        }
    }

    #[tokio::test]
    async fn accepted_message_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .and(header("authorization", "Bearer SG.test"))
            .and(body_partial_json(serde_json::json!({
                "personalizations": [{ "to": [{ "email": "ops@example.com" }] }],
                "from": { "email": "sync@example.com", "name": "CRM Sync Service" },
                "subject": "Daily Lead Sync Report",
                "content": [
                    { "type": "text/plain", "value": "ok" },
                    { "type": "text/html", "value": "<p>ok</p>" }
                ]
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SendGridNotifier::new(&config_for(&server), "SG.test").unwrap();
        notifier.send(&email()).await.expect("delivered");
    }

    #[tokio::test]
    async fn rejected_message_is_notification_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let notifier = SendGridNotifier::new(&config_for(&server), "SG.bad").unwrap();
        let err = notifier.send(&email()).await.unwrap_err();
        assert!(matches!(err, LeadSyncError::Notification(_)));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn unconfigured_notifier_always_fails() {
        let notifier = UnconfiguredNotifier::new("SENDGRID_API_KEY is not set");
        assert!(notifier.send(&email()).await.is_err());
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let config = SendGridConfig {
            api_key_env: "LS_TEST_MISSING_SENDGRID_KEY_13579".into(),
            ..SendGridConfig::default()
        };
        let err = SendGridNotifier::from_config(&config).err().expect("config error");
        assert!(matches!(err, LeadSyncError::Config { .. }));
    }
}
