//! Lead records as the CRM stores them.
//!
//! Enum spellings match the JSON the mobile app already persists
//! (`closed_won`, `phone_call`, ...), so exports stay readable by it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Proposal,
    ClosedWon,
    ClosedLost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Proposal => "proposal",
            LeadStatus::ClosedWon => "closed_won",
            LeadStatus::ClosedLost => "closed_lost",
        }
    }
}

impl Default for LeadStatus {
    fn default() -> Self {
        LeadStatus::New
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LeadPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl LeadPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadPriority::Low => "low",
            LeadPriority::Medium => "medium",
            LeadPriority::High => "high",
            LeadPriority::Urgent => "urgent",
        }
    }

    /// Ordering weight used when several leads share a number.
    pub fn rank(&self) -> u8 {
        match self {
            LeadPriority::Low => 1,
            LeadPriority::Medium => 2,
            LeadPriority::High => 3,
            LeadPriority::Urgent => 4,
        }
    }
}

impl Default for LeadPriority {
    fn default() -> Self {
        LeadPriority::Medium
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Website,
    SocialMedia,
    Referral,
    ColdCall,
    EmailCampaign,
    TradeShow,
    Advertising,
    PhoneCall,
    Other,
}

impl LeadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::Website => "website",
            LeadSource::SocialMedia => "social_media",
            LeadSource::Referral => "referral",
            LeadSource::ColdCall => "cold_call",
            LeadSource::EmailCampaign => "email_campaign",
            LeadSource::TradeShow => "trade_show",
            LeadSource::Advertising => "advertising",
            LeadSource::PhoneCall => "phone_call",
            LeadSource::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub source: LeadSource,
    pub status: LeadStatus,
    pub priority: LeadPriority,
    pub value: f64,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub next_follow_up_at: Option<DateTime<Utc>>,
}

impl Lead {
    /// Applies a patch in place and bumps `updated_at`.
    pub fn apply(&mut self, patch: &LeadPatch, now: DateTime<Utc>) {
        if let Some(at) = patch.last_contacted_at {
            self.last_contacted_at = Some(at);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        self.updated_at = now;
    }
}

/// Fields the call core may change on an existing lead. Each one is
/// updated independently; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadPatch {
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub status: Option<LeadStatus>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl LeadPatch {
    pub fn last_contacted(at: DateTime<Utc>) -> Self {
        Self {
            last_contacted_at: Some(at),
            ..Self::default()
        }
    }

    pub fn status(status: LeadStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.last_contacted_at.is_none()
            && self.status.is_none()
            && self.notes.is_none()
            && self.tags.is_none()
    }
}

/// Caller-supplied fields that win over the defaults when a lead is created
/// from an unknown number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadOverrides {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub status: Option<LeadStatus>,
    pub priority: Option<LeadPriority>,
    pub value: Option<f64>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl LeadOverrides {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}
