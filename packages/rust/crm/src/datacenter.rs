//! Zoho data center and environment resolution.
//!
//! Each Zoho data center has its own API and accounts (OAuth) domains. The CA
//! region is the odd one out: its accounts server lives under `zohocloud.ca`.

use std::str::FromStr;

use leadsync_shared::{LeadSyncError, Result, ZohoConfig};
use url::Url;

/// Zoho data center region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCenter {
    Us,
    Eu,
    In,
    Au,
    Ca,
    Jp,
    Cn,
}

/// Zoho CRM environment within a data center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Sandbox,
    Developer,
}

impl DataCenter {
    fn domain_suffix(&self) -> &'static str {
        match self {
            Self::Us => "com",
            Self::Eu => "eu",
            Self::In => "in",
            Self::Au => "com.au",
            Self::Ca => "ca",
            Self::Jp => "jp",
            Self::Cn => "com.cn",
        }
    }

    /// OAuth accounts server for this region.
    pub fn accounts_url(&self) -> String {
        match self {
            Self::Ca => "https://accounts.zohocloud.ca".to_string(),
            other => format!("https://accounts.zoho.{}", other.domain_suffix()),
        }
    }

    /// CRM API base for this region and environment.
    pub fn api_base_url(&self, env: Environment) -> String {
        let host = match env {
            Environment::Production => "www",
            Environment::Sandbox => "sandbox",
            Environment::Developer => "developer",
        };
        format!("https://{host}.zohoapis.{}", self.domain_suffix())
    }
}

impl FromStr for DataCenter {
    type Err = LeadSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us" | "com" => Ok(Self::Us),
            "eu" => Ok(Self::Eu),
            "in" => Ok(Self::In),
            "au" => Ok(Self::Au),
            "ca" => Ok(Self::Ca),
            "jp" => Ok(Self::Jp),
            "cn" => Ok(Self::Cn),
            other => Err(LeadSyncError::config(format!(
                "unknown Zoho data center '{other}': expected us, eu, in, au, ca, jp or cn"
            ))),
        }
    }
}

impl FromStr for Environment {
    type Err = LeadSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "sandbox" => Ok(Self::Sandbox),
            "developer" | "dev" => Ok(Self::Developer),
            other => Err(LeadSyncError::config(format!(
                "unknown Zoho environment '{other}': expected production, sandbox or developer"
            ))),
        }
    }
}

/// Resolved API and accounts endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZohoEndpoints {
    pub api_base: Url,
    pub accounts: Url,
}

impl ZohoEndpoints {
    /// Resolve endpoints from config; explicit URLs override the data center.
    pub fn resolve(config: &ZohoConfig) -> Result<Self> {
        let dc: DataCenter = config.data_center.parse()?;
        let env: Environment = config.environment.parse()?;

        let api = config
            .api_base_url
            .clone()
            .unwrap_or_else(|| dc.api_base_url(env));
        let accounts = config
            .accounts_url
            .clone()
            .unwrap_or_else(|| dc.accounts_url());

        Ok(Self {
            api_base: parse_url(&api)?,
            accounts: parse_url(&accounts)?,
        })
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| LeadSyncError::config(format!("invalid URL '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn us_production_defaults() {
        let endpoints = ZohoEndpoints::resolve(&ZohoConfig::default()).unwrap();
        assert_eq!(endpoints.api_base.as_str(), "https://www.zohoapis.com/");
        assert_eq!(endpoints.accounts.as_str(), "https://accounts.zoho.com/");
    }

    #[test]
    fn canada_uses_zohocloud_accounts() {
        assert_eq!(DataCenter::Ca.accounts_url(), "https://accounts.zohocloud.ca");
        assert_eq!(
            DataCenter::Ca.api_base_url(Environment::Sandbox),
            "https://sandbox.zohoapis.ca"
        );
        assert_eq!(
            DataCenter::Ca.api_base_url(Environment::Developer),
            "https://developer.zohoapis.ca"
        );
    }

    #[test]
    fn explicit_urls_override_region() {
        let config = ZohoConfig {
            data_center: "eu".into(),
            api_base_url: Some("http://127.0.0.1:9000".into()),
            ..ZohoConfig::default()
        };
        let endpoints = ZohoEndpoints::resolve(&config).unwrap();
        assert_eq!(endpoints.api_base.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(endpoints.accounts.as_str(), "https://accounts.zoho.eu/");
    }

    #[test]
    fn unknown_region_is_config_error() {
        let err = "mars".parse::<DataCenter>().unwrap_err();
        assert!(err.to_string().contains("unknown Zoho data center"));
        assert!("staging".parse::<Environment>().is_err());
    }
}
