use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{CallLogStore, LeadStore};
use crate::db::{CallLogEntry, Lead, LeadPatch};

/// Process-local store. Reads and writes can be made to fail on demand so
/// callers' degradation paths can be exercised.
#[derive(Default)]
pub struct MemoryStore {
    leads: RwLock<Vec<Lead>>,
    call_logs: RwLock<Vec<CallLogEntry>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leads(leads: Vec<Lead>) -> Self {
        Self {
            leads: RwLock::new(leads),
            ..Self::default()
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn call_logs(&self) -> Vec<CallLogEntry> {
        self.call_logs.read().await.clone()
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("lead store read failed");
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("lead store write failed");
        }
        Ok(())
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn get_all(&self) -> Result<Vec<Lead>> {
        self.check_read()?;
        let mut leads = self.leads.read().await.clone();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leads)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Lead>> {
        self.check_read()?;
        Ok(self.leads.read().await.iter().find(|l| l.id == id).cloned())
    }

    async fn update(&self, id: &str, patch: LeadPatch) -> Result<()> {
        self.check_write()?;
        let mut leads = self.leads.write().await;
        let lead = leads
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| anyhow!("Lead not found"))?;
        lead.apply(&patch, Utc::now());
        Ok(())
    }

    async fn create(&self, lead: Lead) -> Result<Lead> {
        self.check_write()?;
        self.leads.write().await.push(lead.clone());
        Ok(lead)
    }
}

#[async_trait]
impl CallLogStore for MemoryStore {
    async fn append(&self, entry: CallLogEntry) -> Result<String> {
        self.check_write()?;
        let id = entry.id.clone();
        self.call_logs.write().await.push(entry);
        Ok(id)
    }
}
