//! Application configuration for LeadSync.
//!
//! User config lives at `~/.leadsync/leadsync.toml`.
//! Environment overrides win over config file values, which win over defaults.
//! Secrets are never stored in the file: it only names the env vars holding them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LeadSyncError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "leadsync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".leadsync";

/// Env var holding the comma-separated notification recipient list.
pub const RECIPIENTS_ENV: &str = "NOTIFICATION_EMAILS";

/// Env var overriding the sender address.
pub const FROM_EMAIL_ENV: &str = "FROM_EMAIL";

/// Env var overriding the sender display name.
pub const FROM_NAME_ENV: &str = "FROM_NAME";

// ---------------------------------------------------------------------------
// Config structs (matching leadsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sync pass behaviour.
    #[serde(default)]
    pub sync: SyncSection,

    /// Local lead database.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Zoho CRM connection.
    #[serde(default)]
    pub zoho: ZohoConfig,

    /// SendGrid delivery settings.
    #[serde(default)]
    pub sendgrid: SendGridConfig,

    /// Template assets.
    #[serde(default)]
    pub templates: TemplatesConfig,

    /// Daily schedule.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// HTTP control surface.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[sync]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    /// Records requested from the CRM per pass.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Internal recipients of the summary (and new-lead alerts).
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Send a `lead_notification` to every recipient for each new lead.
    #[serde(default)]
    pub notify_new_leads: bool,

    /// Cold outreach policy for newly discovered leads.
    #[serde(default)]
    pub cold_email: ColdEmailPolicy,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            recipients: Vec::new(),
            notify_new_leads: false,
            cold_email: ColdEmailPolicy::default(),
        }
    }
}

fn default_page_size() -> u32 {
    200
}

/// How many newly discovered leads receive the cold outreach message in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ColdEmailPolicy {
    /// Never send cold email.
    Disabled,
    /// Only the first new lead with an email address.
    #[default]
    First,
    /// Every new lead with an email address.
    All,
    /// At most `limit` new leads.
    Limit { limit: usize },
}

impl ColdEmailPolicy {
    /// Maximum number of cold emails per pass, `None` meaning unbounded.
    pub fn max_sends(&self) -> Option<usize> {
        match self {
            Self::Disabled => Some(0),
            Self::First => Some(1),
            Self::All => None,
            Self::Limit { limit } => Some(*limit),
        }
    }
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the libSQL database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "var/leadsync.db".into()
}

/// `[zoho]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZohoConfig {
    /// Data center code: us, eu, in, au, ca, jp, cn.
    #[serde(default = "default_data_center")]
    pub data_center: String,

    /// Environment: production, sandbox, developer.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Explicit API base URL (overrides data center resolution).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    /// Explicit accounts (OAuth) URL (overrides data center resolution).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts_url: Option<String>,

    /// CRM module holding the leads.
    #[serde(default = "default_module")]
    pub module: String,

    /// Name of the env var holding the OAuth client id.
    #[serde(default = "default_client_id_env")]
    pub client_id_env: String,

    /// Name of the env var holding the OAuth client secret.
    #[serde(default = "default_client_secret_env")]
    pub client_secret_env: String,

    /// Name of the env var holding the OAuth refresh token.
    #[serde(default = "default_refresh_token_env")]
    pub refresh_token_env: String,

    /// Request timeout in seconds.
    #[serde(default = "default_zoho_timeout")]
    pub timeout_secs: u64,
}

impl Default for ZohoConfig {
    fn default() -> Self {
        Self {
            data_center: default_data_center(),
            environment: default_environment(),
            api_base_url: None,
            accounts_url: None,
            module: default_module(),
            client_id_env: default_client_id_env(),
            client_secret_env: default_client_secret_env(),
            refresh_token_env: default_refresh_token_env(),
            timeout_secs: default_zoho_timeout(),
        }
    }
}

fn default_data_center() -> String {
    "us".into()
}
fn default_environment() -> String {
    "production".into()
}
fn default_module() -> String {
    "Leads".into()
}
fn default_client_id_env() -> String {
    "ZOHO_CLIENT_ID".into()
}
fn default_client_secret_env() -> String {
    "ZOHO_CLIENT_SECRET".into()
}
fn default_refresh_token_env() -> String {
    "ZOHO_REFRESH_TOKEN".into()
}
fn default_zoho_timeout() -> u64 {
    30
}

/// `[sendgrid]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendGridConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_sendgrid_key_env")]
    pub api_key_env: String,

    /// API base URL.
    #[serde(default = "default_sendgrid_base")]
    pub api_base_url: String,

    /// Sender address.
    #[serde(default = "default_from_email")]
    pub from_email: String,

    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Request timeout in seconds.
    #[serde(default = "default_sendgrid_timeout")]
    pub timeout_secs: u64,
}

impl Default for SendGridConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_sendgrid_key_env(),
            api_base_url: default_sendgrid_base(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            timeout_secs: default_sendgrid_timeout(),
        }
    }
}

fn default_sendgrid_key_env() -> String {
    "SENDGRID_API_KEY".into()
}
fn default_sendgrid_base() -> String {
    "https://api.sendgrid.com".into()
}
fn default_from_email() -> String {
    "noreply@example.com".into()
}
fn default_from_name() -> String {
    "CRM Sync Service".into()
}
fn default_sendgrid_timeout() -> u64 {
    20
}

/// `[templates]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// HTML asset for the cold outreach body.
    #[serde(default = "default_cold_email_html")]
    pub cold_email_html: String,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            cold_email_html: default_cold_email_html(),
        }
    }
}

fn default_cold_email_html() -> String {
    "templates/coldmain.html".into()
}

/// `[schedule]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Whether the daily pass is scheduled at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Five-field cron expression.
    #[serde(default = "default_cron")]
    pub cron: String,

    /// IANA timezone the cron expression is evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: default_cron(),
            timezone: default_timezone(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_cron() -> String {
    "0 2 * * *".into()
}
fn default_timezone() -> String {
    "UTC".into()
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the control surface listens on.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".into()
}

// ---------------------------------------------------------------------------
// Sync config (runtime, merged from config + env)
// ---------------------------------------------------------------------------

/// Runtime configuration held by the orchestrator for the process lifetime.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Records requested per pass.
    pub page_size: u32,
    /// Summary recipients.
    pub recipients: Vec<String>,
    /// Whether to alert recipients about each new lead.
    pub notify_new_leads: bool,
    /// Cold outreach policy.
    pub cold_email: ColdEmailPolicy,
}

impl From<&AppConfig> for SyncConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            page_size: config.sync.page_size,
            recipients: config.sync.recipients.clone(),
            notify_new_leads: config.sync.notify_new_leads,
            cold_email: config.sync.cold_email,
        }
    }
}

impl AppConfig {
    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(list) = lookup(RECIPIENTS_ENV) {
            let recipients = parse_recipients(&list);
            if !recipients.is_empty() {
                self.sync.recipients = recipients;
            }
        }
        if let Some(from) = lookup(FROM_EMAIL_ENV).filter(|v| !v.trim().is_empty()) {
            self.sendgrid.from_email = from.trim().to_string();
        }
        if let Some(name) = lookup(FROM_NAME_ENV).filter(|v| !v.trim().is_empty()) {
            self.sendgrid.from_name = name.trim().to_string();
        }
    }
}

/// Split a comma-separated address list, dropping blanks.
pub fn parse_recipients(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.leadsync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LeadSyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.leadsync/leadsync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LeadSyncError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| LeadSyncError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LeadSyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LeadSyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LeadSyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a required credential from the env var named by the config.
pub fn require_secret(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(LeadSyncError::config(format!(
            "credential not found. Set the {var_name} environment variable."
        ))),
    }
}
