//! Named email templates rendered with Handlebars.
//!
//! Each template has three parts registered under `<name>.subject`,
//! `<name>.html` and `<name>.text`. Rich bodies live in an escaping registry;
//! subjects and plain bodies in a second registry with escaping turned off.
//! Both run in strict mode so a missing field is a render error rather than an
//! empty string.

use std::path::Path;

use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use leadsync_shared::{NewLead, SyncStats};

pub const DEFAULT_TEMPLATE: &str = "default";
pub const LEAD_NOTIFICATION: &str = "lead_notification";
pub const SYNC_REPORT: &str = "sync_report";
pub const COLD_EMAIL: &str = "cold_email";

/// Format used for `sync_time` in every template.
const SYNC_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// A fully rendered message, ready to hand to a notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl RenderedEmail {
    /// Last-resort message used when even the default template fails.
    fn terminal(message: &str) -> Self {
        Self {
            subject: "Default Email from CRM Sync Service".to_string(),
            html: format!(
                "<html><body><p>{}</p></body></html>",
                message.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
            ),
            text: message.to_string(),
        }
    }
}

struct TemplateSource {
    name: &'static str,
    subject: &'static str,
    html: &'static str,
    text: &'static str,
}

// ---------------------------------------------------------------------------
// Built-in templates
// ---------------------------------------------------------------------------

const BUILTIN: &[TemplateSource] = &[
    TemplateSource {
        name: DEFAULT_TEMPLATE,
        subject: "Default Email from CRM Sync Service",
        html: r#"<html>
<body>
  <h2>Hello from CRM Sync Service!</h2>
  <p>This is a default email template.</p>
  <p>Message: {{message}}</p>
  <p>Best regards,<br>CRM Sync Team</p>
</body>
</html>"#,
        text: "Hello from CRM Sync Service!

This is a default email template.
Message: {{message}}

Best regards,
CRM Sync Team",
    },
    TemplateSource {
        name: LEAD_NOTIFICATION,
        subject: "New Lead Notification - {{lead_name}}",
        html: r#"<html>
<body>
  <h2>New Lead Added</h2>
  <p>A new lead has been synchronized from Zoho CRM:</p>
  <ul>
    <li><strong>Name:</strong> {{lead_name}}</li>
    <li><strong>Email:</strong> {{lead_email}}</li>
    <li><strong>Phone:</strong> {{lead_phone}}</li>
    <li><strong>Sync Time:</strong> {{sync_time}}</li>
  </ul>
  <p>Please follow up with this lead as soon as possible.</p>
  <p>Best regards,<br>CRM Sync Team</p>
</body>
</html>"#,
        text: "New Lead Added

A new lead has been synchronized from Zoho CRM:

Name: {{lead_name}}
Email: {{lead_email}}
Phone: {{lead_phone}}
Sync Time: {{sync_time}}

Please follow up with this lead as soon as possible.

Best regards,
CRM Sync Team",
    },
    TemplateSource {
        name: SYNC_REPORT,
        subject: "Daily Lead Sync Report",
        html: r#"<html>
<body>
  <h2>Daily Lead Sync Report</h2>
  <p>The daily lead synchronization has been completed.</p>
  <ul>
    <li><strong>Total Leads Processed:</strong> {{total_leads}}</li>
    <li><strong>New Leads Added:</strong> {{new_leads}}</li>
    <li><strong>Updated Leads:</strong> {{updated_leads}}</li>
    <li><strong>Sync Time:</strong> {{sync_time}}</li>
    <li><strong>Status:</strong> {{status}}</li>
  </ul>
  {{#if errors}}
  <p><strong>Errors encountered:</strong></p>
  <ul>
    {{#each errors}}<li>{{this}}</li>{{/each}}
  </ul>
  {{#if remaining_errors}}<p>... and {{remaining_errors}} more errors</p>{{/if}}
  {{/if}}
  <p>Best regards,<br>CRM Sync Team</p>
</body>
</html>"#,
        text: "Daily Lead Sync Report

The daily lead synchronization has been completed.

Total Leads Processed: {{total_leads}}
New Leads Added: {{new_leads}}
Updated Leads: {{updated_leads}}
Sync Time: {{sync_time}}
Status: {{status}}
{{#if errors}}

Errors encountered:
{{#each errors}}
- {{this}}
{{/each}}
{{#if remaining_errors}}... and {{remaining_errors}} more errors
{{/if}}
{{/if}}

Best regards,
CRM Sync Team",
    },
    TemplateSource {
        name: COLD_EMAIL,
        subject: "Re: Your Post About Hiring Engineers",
        html: FALLBACK_COLD_HTML,
        text: "Re: Your Post About Hiring Engineers

Hi {{crm_fullname}},

Hope you're having a productive week!

We've all been there, drowning in resumes for key roles like {{crm_title}} while trying to find that perfect fit. It's a massive time sink, and sometimes the best candidates slip through the cracks.

What if there was a way to cut through that clutter quickly and effectively? That's exactly what Referrals AI is designed to do. It's an AI-powered tool that pre-vets resumes, turning that overwhelming pile into a manageable list of potential candidates with smart scoring and analysis.

Benefits:
- Significantly less time spent on initial resume screening
- A clearer picture of candidate fit before you even pick up the phone
- Faster identification of top talent for your {{crm_title}} openings

I'd love to show you firsthand how Referrals AI can integrate into your current process and deliver these results.

Would you be open to a brief chat next week? I can give you a quick overview and explore how it can specifically address your hiring challenges for roles like {{crm_title}}.

Thanks for your time, and I look forward to the possibility of connecting.

Best,
Jha",
    },
];

/// Built-in cold email body used when the HTML asset can't be loaded.
const FALLBACK_COLD_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Cold Email</title>
</head>
<body>
  <h2>Re: Your Post About Hiring Engineers</h2>
  <p>Hi <strong>{{crm_fullname}}</strong>,</p>
  <p>Hope you're having a productive week!</p>
  <p>We've all been there, drowning in resumes for key roles like <strong>{{crm_title}}</strong> while trying to find that perfect fit.</p>
  <p>What if there was a way to cut through that clutter quickly and effectively? That's exactly what <strong>Referrals AI</strong> is designed to do.</p>
  <p>Would you be open to a brief chat next week?</p>
  <p>Best,<br>Jha</p>
</body>
</html>"#;

// ---------------------------------------------------------------------------
// TemplateCatalog
// ---------------------------------------------------------------------------

/// Immutable set of named templates, built once at startup.
pub struct TemplateCatalog {
    html: Handlebars<'static>,
    plain: Handlebars<'static>,
}

impl TemplateCatalog {
    /// Catalog with the built-in cold email body.
    pub fn builtin() -> Self {
        Self::with_cold_html(None)
    }

    /// Catalog whose cold email body is read from `path`.
    ///
    /// A missing, unreadable or malformed asset is logged and replaced by the
    /// built-in body.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(body) => {
                debug!(path = %path.display(), "loaded cold email template");
                Self::with_cold_html(Some(body))
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "cold email template unavailable, using built-in body"
                );
                Self::builtin()
            }
        }
    }

    fn with_cold_html(cold_html: Option<String>) -> Self {
        let mut html = Handlebars::new();
        html.set_strict_mode(true);

        let mut plain = Handlebars::new();
        plain.set_strict_mode(true);
        plain.register_escape_fn(handlebars::no_escape);

        for source in BUILTIN {
            register(&mut plain, &format!("{}.subject", source.name), source.subject);
            register(&mut plain, &format!("{}.text", source.name), source.text);
            register(&mut html, &format!("{}.html", source.name), source.html);
        }

        if let Some(body) = cold_html {
            let key = format!("{COLD_EMAIL}.html");
            if let Err(e) = html.register_template_string(&key, body) {
                warn!(error = %e, "cold email template is invalid, using built-in body");
                register(&mut html, &key, FALLBACK_COLD_HTML);
            }
        }

        Self { html, plain }
    }

    /// Whether a template with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.plain.has_template(&format!("{name}.subject"))
    }

    /// Render a template, never failing.
    ///
    /// Unknown names render `default`. A render error (typically a missing
    /// field) renders `default` with an explanatory message; if that fails too
    /// a fixed message is returned.
    pub fn render(&self, name: &str, data: &Value) -> RenderedEmail {
        let resolved = if self.contains(name) {
            name
        } else {
            warn!(template = name, "unknown template, using default");
            DEFAULT_TEMPLATE
        };

        match self.try_render(resolved, data) {
            Ok(email) => email,
            Err(e) => {
                warn!(
                    template = resolved,
                    error = %e,
                    "template render failed, using default"
                );
                let message = format!("Template error: missing field in '{resolved}': {e}");
                self.try_render(DEFAULT_TEMPLATE, &json!({ "message": message }))
                    .unwrap_or_else(|_| RenderedEmail::terminal(&message))
            }
        }
    }

    fn try_render(
        &self,
        name: &str,
        data: &Value,
    ) -> Result<RenderedEmail, handlebars::RenderError> {
        Ok(RenderedEmail {
            subject: self.plain.render(&format!("{name}.subject"), data)?,
            html: self.html.render(&format!("{name}.html"), data)?,
            text: self.plain.render(&format!("{name}.text"), data)?,
        })
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn register(registry: &mut Handlebars<'static>, key: &str, source: &'static str) {
    if let Err(e) = registry.register_template_string(key, source) {
        tracing::error!(template = key, error = %e, "built-in template failed to parse");
    }
}

// ---------------------------------------------------------------------------
// Template data
// ---------------------------------------------------------------------------

pub fn format_sync_time(at: DateTime<Utc>) -> String {
    at.format(SYNC_TIME_FORMAT).to_string()
}

/// Fields for `lead_notification`.
pub fn lead_notification_data(lead: &NewLead) -> Value {
    json!({
        "lead_name": lead.full_name,
        "lead_email": lead.email,
        "lead_phone": lead.phone,
        "sync_time": format_sync_time(lead.sync_time),
    })
}

/// Fields for `cold_email`.
pub fn cold_email_data(lead: &NewLead) -> Value {
    json!({
        "crm_fullname": lead.full_name,
        "crm_title": lead.title,
        "crm_email": lead.email,
    })
}

/// Fields for `sync_report`: counts, status and the capped error list.
pub fn sync_report_data(stats: &SyncStats, sync_time: DateTime<Utc>) -> Value {
    let (errors, remaining) = stats.summary_errors();
    json!({
        "total_leads": stats.total_leads,
        "new_leads": stats.new_leads,
        "updated_leads": stats.updated_leads,
        "sync_time": format_sync_time(sync_time),
        "status": stats.status().as_str(),
        "errors": errors,
        "remaining_errors": remaining,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadsync_shared::Lead;
    use uuid::Uuid;

    fn new_lead() -> NewLead {
        let lead = Lead::new(
            "4876876000000333001",
            "Ada <Lovelace>",
            "ada@example.com",
            "555-0100",
            Some("CTO".into()),
        );
        NewLead::capture(&lead, Utc::now())
    }

    #[test]
    fn builtin_templates_all_register() {
        let catalog = TemplateCatalog::builtin();
        for name in [DEFAULT_TEMPLATE, LEAD_NOTIFICATION, SYNC_REPORT, COLD_EMAIL] {
            assert!(catalog.contains(name), "{name} missing");
        }
    }

    #[test]
    fn unknown_template_renders_default() {
        let catalog = TemplateCatalog::builtin();
        let email = catalog.render("welcome_pack", &json!({ "message": "hi there" }));
        assert_eq!(email.subject, "Default Email from CRM Sync Service");
        assert!(email.text.contains("Message: hi there"));
    }

    #[test]
    fn html_is_escaped_but_subject_and_text_are_not() {
        let catalog = TemplateCatalog::builtin();
        let email = catalog.render(LEAD_NOTIFICATION, &lead_notification_data(&new_lead()));
        assert_eq!(email.subject, "New Lead Notification - Ada <Lovelace>");
        assert!(email.text.contains("Name: Ada <Lovelace>"));
        assert!(email.html.contains("Ada &lt;Lovelace&gt;"));
    }

    #[test]
    fn missing_field_falls_back_to_default_with_message() {
        let catalog = TemplateCatalog::builtin();
        let email = catalog.render(LEAD_NOTIFICATION, &json!({ "lead_name": "Ada" }));
        assert_eq!(email.subject, "Default Email from CRM Sync Service");
        assert!(
            email
                .text
                .contains("Template error: missing field in 'lead_notification'")
        );
    }

    #[test]
    fn broken_default_returns_fixed_message() {
        let mut plain = Handlebars::new();
        plain.set_strict_mode(true);
        plain.register_escape_fn(handlebars::no_escape);
        register(&mut plain, "invoice.subject", "Invoice {{number}}");
        let catalog = TemplateCatalog {
            html: Handlebars::new(),
            plain,
        };

        let email = catalog.render("invoice", &json!({}));

        assert_eq!(email.subject, "Default Email from CRM Sync Service");
        assert!(
            email
                .text
                .starts_with("Template error: missing field in 'invoice':")
        );
        assert!(email.html.starts_with("<html><body><p>Template error:"));
    }

    #[test]
    fn terminal_message_escapes_html() {
        let email = RenderedEmail::terminal("a <b> & c");
        assert_eq!(email.text, "a <b> & c");
        assert_eq!(email.html, "<html><body><p>a &lt;b&gt; &amp; c</p></body></html>");
    }

    #[test]
    fn default_without_message_still_renders() {
        let catalog = TemplateCatalog::builtin();
        let email = catalog.render(DEFAULT_TEMPLATE, &json!({}));
        assert_eq!(email.subject, "Default Email from CRM Sync Service");
        assert!(!email.text.is_empty());
    }

    #[test]
    fn sync_report_caps_errors_at_five() {
        let mut stats = SyncStats::default();
        for i in 0..8 {
            stats.push_error(format!("Error processing lead {i}: boom"));
        }
        let email =
            TemplateCatalog::builtin().render(SYNC_REPORT, &sync_report_data(&stats, Utc::now()));

        assert_eq!(email.subject, "Daily Lead Sync Report");
        assert!(email.text.contains("Status: failed"));
        assert!(email.text.contains("Error processing lead 4: boom"));
        assert!(!email.text.contains("Error processing lead 5: boom"));
        assert!(email.text.contains("... and 3 more errors"));
        assert!(email.html.contains("... and 3 more errors"));
    }

    #[test]
    fn sync_report_without_errors_omits_error_section() {
        let stats = SyncStats::default();
        let email =
            TemplateCatalog::builtin().render(SYNC_REPORT, &sync_report_data(&stats, Utc::now()));
        assert!(email.text.contains("Status: success"));
        assert!(!email.text.contains("Errors encountered"));
    }

    #[test]
    fn cold_email_uses_lead_fields() {
        let email =
            TemplateCatalog::builtin().render(COLD_EMAIL, &cold_email_data(&new_lead()));
        assert_eq!(email.subject, "Re: Your Post About Hiring Engineers");
        assert!(email.text.contains("Hi Ada <Lovelace>,"));
        assert!(email.html.contains("<strong>CTO</strong>"));
    }

    #[test]
    fn cold_email_asset_is_loaded_from_disk() {
        let path = std::env::temp_dir().join(format!("ls_cold_{}.html", Uuid::now_v7()));
        std::fs::write(&path, "<p>Dear {{crm_fullname}} ({{crm_email}})</p>").unwrap();

        let email =
            TemplateCatalog::load(&path).render(COLD_EMAIL, &cold_email_data(&new_lead()));
        assert_eq!(email.html, "<p>Dear Ada &lt;Lovelace&gt; (ada@example.com)</p>");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_or_invalid_asset_uses_builtin_body() {
        let missing = std::env::temp_dir().join("ls_cold_does_not_exist.html");
        let email =
            TemplateCatalog::load(&missing).render(COLD_EMAIL, &cold_email_data(&new_lead()));
        assert!(email.html.contains("Referrals AI"));

        let path = std::env::temp_dir().join(format!("ls_cold_{}.html", Uuid::now_v7()));
        std::fs::write(&path, "<p>{{#if crm_fullname}}unterminated</p>").unwrap();
        let email =
            TemplateCatalog::load(&path).render(COLD_EMAIL, &cold_email_data(&new_lead()));
        assert!(email.html.contains("Referrals AI"));
        let _ = std::fs::remove_file(&path);
    }
}
