//! Turso Embedded / libSQL storage layer for mirrored leads.
//!
//! The [`Storage`] struct wraps a local libSQL database holding one row per
//! CRM lead. Rows are written with idempotent upserts keyed by the CRM id, so
//! repeated passes never duplicate a lead.
//!
//! The orchestrator only sees the [`LeadStore`] trait.

mod migrations;

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadsync_shared::{Lead, LeadSyncError, Result};
use libsql::{Connection, Database, params};

/// Durable store contract used by the sync orchestrator.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Insert the lead, or update its mutable fields if the id already exists.
    async fn upsert_lead(&self, lead: &Lead) -> Result<()>;

    /// All lead identifiers currently persisted.
    async fn list_lead_ids(&self) -> Result<HashSet<String>>;
}

/// A persisted lead row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredLead {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LeadSyncError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LeadSyncError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| LeadSyncError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        LeadSyncError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Lead operations
    // -----------------------------------------------------------------------

    /// Get a lead by CRM id.
    pub async fn get_lead(&self, id: &str) -> Result<Option<StoredLead>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, full_name, email, phone, title, created_at, updated_at
                 FROM leads WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| LeadSyncError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_stored_lead(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(LeadSyncError::Storage(e.to_string())),
        }
    }

    /// Number of leads persisted.
    pub async fn count_leads(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM leads", params![])
            .await
            .map_err(|e| LeadSyncError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map(|n| n as u64)
                .map_err(|e| LeadSyncError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(LeadSyncError::Storage(e.to_string())),
        }
    }
}

#[async_trait]
impl LeadStore for Storage {
    async fn upsert_lead(&self, lead: &Lead) -> Result<()> {
        let now = lead.synced_at.to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO leads (id, full_name, email, phone, title, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                   full_name = excluded.full_name,
                   email = excluded.email,
                   phone = excluded.phone,
                   title = excluded.title,
                   updated_at = excluded.updated_at",
                params![
                    lead.id.as_str(),
                    lead.full_name.as_str(),
                    lead.email.as_str(),
                    lead.phone.as_str(),
                    lead.title.as_str(),
                    now.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| LeadSyncError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn list_lead_ids(&self) -> Result<HashSet<String>> {
        let mut rows = self
            .conn
            .query("SELECT id FROM leads", params![])
            .await
            .map_err(|e| LeadSyncError::Storage(e.to_string()))?;

        let mut ids = HashSet::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| LeadSyncError::Storage(e.to_string()))?
        {
            ids.insert(
                row.get::<String>(0)
                    .map_err(|e| LeadSyncError::Storage(e.to_string()))?,
            );
        }
        Ok(ids)
    }
}

/// Convert a database row to a [`StoredLead`].
fn row_to_stored_lead(row: &libsql::Row) -> Result<StoredLead> {
    let text = |idx: i32| {
        row.get::<String>(idx)
            .map_err(|e| LeadSyncError::Storage(e.to_string()))
    };
    Ok(StoredLead {
        id: text(0)?,
        full_name: text(1)?,
        email: text(2)?,
        phone: text(3)?,
        title: text(4)?,
        created_at: parse_timestamp(&text(5)?)?,
        updated_at: parse_timestamp(&text(6)?)?,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LeadSyncError::Storage(format!("invalid date: {e}")))
}
