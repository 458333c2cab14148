//! CRM record source for LeadSync.
//!
//! This crate provides:
//! - [`RecordSource`]: the contract the sync orchestrator reads leads through
//! - [`ZohoClient`]: Zoho CRM v2 implementation with OAuth token refresh
//! - [`datacenter`]: region/environment endpoint resolution

pub mod client;
pub mod datacenter;

use async_trait::async_trait;
use leadsync_shared::{Lead, Result};

pub use client::{ZohoClient, ZohoCredentials};
pub use datacenter::{DataCenter, Environment, ZohoEndpoints};

/// A bounded, paged source of lead records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch page `page` (1-based) holding at most `per_page` records.
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<Lead>>;
}
