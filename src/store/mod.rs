//! Storage seams the call core talks through.
//!
//! The overlay controller and the phone matcher only ever see these traits,
//! so a host can back them with SQLite ([`crate::db::Database`]), the
//! in-process [`memory::MemoryStore`], or its own key-value blob.

pub mod memory;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::db::{CallLogEntry, Database, Lead, LeadPatch};

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Lead>>;
    async fn get_by_id(&self, id: &str) -> Result<Option<Lead>>;
    async fn update(&self, id: &str, patch: LeadPatch) -> Result<()>;
    async fn create(&self, lead: Lead) -> Result<Lead>;
}

/// Append-only call history.
#[async_trait]
pub trait CallLogStore: Send + Sync {
    async fn append(&self, entry: CallLogEntry) -> Result<String>;
}

#[async_trait]
impl LeadStore for Database {
    async fn get_all(&self) -> Result<Vec<Lead>> {
        self.list_leads().await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Lead>> {
        self.get_lead(id).await
    }

    async fn update(&self, id: &str, patch: LeadPatch) -> Result<()> {
        self.update_lead(id, &patch)
            .await
            .with_context(|| format!("failed to update lead {id}"))
    }

    async fn create(&self, lead: Lead) -> Result<Lead> {
        self.insert_lead(&lead)
            .await
            .with_context(|| format!("failed to insert lead {}", lead.id))?;
        Ok(lead)
    }
}

#[async_trait]
impl CallLogStore for Database {
    async fn append(&self, entry: CallLogEntry) -> Result<String> {
        self.insert_call_log(&entry)
            .await
            .context("failed to append call log")?;
        Ok(entry.id)
    }
}
