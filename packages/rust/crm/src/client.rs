//! Zoho CRM REST client.
//!
//! Authenticates with a long-lived OAuth refresh token, caches the short-lived
//! access token, and reads lead records one page at a time.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use leadsync_shared::{Lead, LeadSyncError, Result, ZohoConfig, require_secret};

use crate::RecordSource;
use crate::datacenter::ZohoEndpoints;

/// User-Agent string for CRM requests.
const USER_AGENT: &str = concat!("LeadSync/", env!("CARGO_PKG_VERSION"));

/// Refresh the access token this long before Zoho says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// OAuth client credentials.
#[derive(Clone)]
pub struct ZohoCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for ZohoCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZohoCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl ZohoCredentials {
    /// Read credentials from the env vars named in the config.
    pub fn from_env(config: &ZohoConfig) -> Result<Self> {
        Ok(Self {
            client_id: require_secret(&config.client_id_env)?,
            client_secret: require_secret(&config.client_secret_env)?,
            refresh_token: require_secret(&config.refresh_token_env)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    data: Vec<ZohoLead>,
}

#[derive(Debug, Deserialize)]
struct ZohoLead {
    id: String,
    #[serde(rename = "Full_Name", default)]
    full_name: Option<String>,
    #[serde(rename = "Email", default)]
    email: Option<String>,
    #[serde(rename = "Phone", default)]
    phone: Option<String>,
    #[serde(rename = "Designation", default)]
    designation: Option<String>,
}

impl From<ZohoLead> for Lead {
    fn from(raw: ZohoLead) -> Self {
        Lead::new(
            raw.id,
            raw.full_name.unwrap_or_default(),
            raw.email.unwrap_or_default(),
            raw.phone.unwrap_or_default(),
            raw.designation,
        )
    }
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

// ---------------------------------------------------------------------------
// ZohoClient
// ---------------------------------------------------------------------------

/// Record source backed by the Zoho CRM v2 REST API.
pub struct ZohoClient {
    client: Client,
    endpoints: ZohoEndpoints,
    credentials: ZohoCredentials,
    module: String,
    token: Mutex<Option<CachedToken>>,
}

impl ZohoClient {
    /// Build a client from explicit parts.
    pub fn new(
        endpoints: ZohoEndpoints,
        credentials: ZohoCredentials,
        module: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LeadSyncError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoints,
            credentials,
            module: module.into(),
            token: Mutex::new(None),
        })
    }

    /// Build a client from config, reading credentials from the environment.
    ///
    /// Fails with a config error when any credential is missing.
    pub fn from_config(config: &ZohoConfig) -> Result<Self> {
        let endpoints = ZohoEndpoints::resolve(config)?;
        let credentials = ZohoCredentials::from_env(config)?;
        Self::new(
            endpoints,
            credentials,
            config.module.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Return a valid access token, refreshing it when absent or near expiry.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let url = join(&self.endpoints.accounts, "oauth/v2/token");
        debug!(%url, "refreshing Zoho access token");

        let response = self
            .client
            .post(&url)
            .form(&[
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| LeadSyncError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LeadSyncError::Network(format!(
                "token refresh failed: HTTP {status}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| LeadSyncError::Network(format!("invalid token response: {e}")))?;

        let Some(value) = body.access_token else {
            return Err(LeadSyncError::Network(format!(
                "token refresh rejected: {}",
                body.error.as_deref().unwrap_or("no access_token in response")
            )));
        };

        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });

        Ok(value)
    }
}

#[async_trait]
impl RecordSource for ZohoClient {
    #[instrument(skip(self), fields(module = %self.module))]
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<Lead>> {
        let token = self.access_token().await?;
        let url = join(
            &self.endpoints.api_base,
            &format!("crm/v2/{}", self.module),
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Zoho-oauthtoken {token}"))
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await
            .map_err(|e| LeadSyncError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        info!(status = status.as_u16(), "response received from Zoho CRM");

        // Zoho answers an empty module with 204 and no body.
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(LeadSyncError::Network(format!(
                "failed to fetch leads: HTTP {status}"
            )));
        }

        let body: RecordsResponse = response
            .json()
            .await
            .map_err(|e| LeadSyncError::Network(format!("invalid records response: {e}")))?;

        let leads: Vec<Lead> = body.data.into_iter().map(Lead::from).collect();
        info!(count = leads.len(), "fetched leads from Zoho CRM");
        Ok(leads)
    }
}

fn join(base: &url::Url, path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), path)
}
