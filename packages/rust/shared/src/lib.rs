//! Shared types, error model, and configuration for LeadSync.
//!
//! This crate is the foundation depended on by all other LeadSync crates.
//! It provides:
//! - [`LeadSyncError`]: the unified error type
//! - Domain types ([`Lead`], [`NewLead`], [`SyncStats`], [`PassReport`])
//! - Configuration ([`AppConfig`], [`SyncConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ColdEmailPolicy, DatabaseConfig, ScheduleConfig, SendGridConfig, ServerConfig,
    SyncConfig, SyncSection, TemplatesConfig, ZohoConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, parse_recipients, require_secret,
};
pub use error::{LeadSyncError, Result};
pub use types::{
    DEFAULT_TITLE, DeliveryCounts, Lead, NewLead, PassId, PassReport, SUMMARY_ERROR_LIMIT,
    SyncStats, SyncStatus,
};
