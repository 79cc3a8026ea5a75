use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::normalize::PhoneNormalizer;
use crate::{
    db::{Lead, LeadOverrides, LeadPriority, LeadSource, LeadStatus},
    log_debug, log_error, log_info,
    store::LeadStore,
};

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "leadzen::matcher";

const DEFAULT_CONTACT_NAME: &str = "Unknown Contact";
const PHONE_CALL_TAG: &str = "Phone Call";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MatchConfidence {
    None,
    Exact,
    /// Several leads share the number.
    Partial,
}

impl MatchConfidence {
    fn from_count(count: usize) -> Self {
        match count {
            0 => MatchConfidence::None,
            1 => MatchConfidence::Exact,
            _ => MatchConfidence::Partial,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub input_phone_number: String,
    pub normalized_phone_number: String,
    pub matched_leads: Vec<Lead>,
    pub confidence: MatchConfidence,
    /// Set when the lead store could not be read; the result then reports no match.
    pub error: Option<String>,
}

impl MatchResult {
    pub fn has_match(&self) -> bool {
        !self.matched_leads.is_empty()
    }

    pub fn multiple_matches(&self) -> bool {
        self.matched_leads.len() > 1
    }
}

/// Resolves caller ids against the lead collection.
#[derive(Clone)]
pub struct PhoneMatcher {
    leads: Arc<dyn LeadStore>,
    normalizer: PhoneNormalizer,
    unknown_contact_name: String,
}

impl PhoneMatcher {
    pub fn new(leads: Arc<dyn LeadStore>, normalizer: PhoneNormalizer) -> Self {
        Self {
            leads,
            normalizer,
            unknown_contact_name: DEFAULT_CONTACT_NAME.to_string(),
        }
    }

    pub fn with_unknown_contact_name(mut self, name: impl Into<String>) -> Self {
        self.unknown_contact_name = name.into();
        self
    }

    pub fn normalizer(&self) -> &PhoneNormalizer {
        &self.normalizer
    }

    pub fn normalize(&self, raw: &str) -> String {
        self.normalizer.normalize(raw)
    }

    /// Linear scan for leads whose normalized phone equals the normalized
    /// query. Never fails: a store error yields an empty result carrying
    /// the error message.
    pub async fn match_phone_to_lead(&self, raw: &str) -> MatchResult {
        let normalized = self.normalizer.normalize(raw);
        log_debug!("matching {raw:?} as {normalized:?}");

        let leads = match self.leads.get_all().await {
            Ok(leads) => leads,
            Err(err) => {
                log_error!("lead lookup failed for {normalized}: {err:#}");
                return MatchResult {
                    input_phone_number: raw.to_string(),
                    normalized_phone_number: normalized,
                    matched_leads: Vec::new(),
                    confidence: MatchConfidence::None,
                    error: Some(format!("{err:#}")),
                };
            }
        };

        let matched_leads: Vec<Lead> = if normalized.is_empty() {
            Vec::new()
        } else {
            leads
                .into_iter()
                .filter(|lead| {
                    lead.phone
                        .as_deref()
                        .map(|phone| self.normalizer.normalize(phone) == normalized)
                        .unwrap_or(false)
                })
                .collect()
        };

        let confidence = MatchConfidence::from_count(matched_leads.len());
        log_info!(
            "phone {normalized}: {} match(es), confidence {confidence:?}",
            matched_leads.len()
        );

        MatchResult {
            input_phone_number: raw.to_string(),
            normalized_phone_number: normalized,
            matched_leads,
            confidence,
            error: None,
        }
    }

    /// The single lead the overlay should show for `raw`, if any.
    pub async fn find_best_lead(&self, raw: &str) -> Option<Lead> {
        let result = self.match_phone_to_lead(raw).await;
        select_best_match(&result.matched_leads).cloned()
    }

    /// Creates and persists a lead for a number nobody recognised. Not
    /// idempotent: two calls create two leads.
    pub async fn create_lead_for_unknown_number(
        &self,
        raw: &str,
        overrides: LeadOverrides,
    ) -> Result<Lead> {
        let normalized = self.normalizer.normalize(raw);
        let now = Utc::now();

        let lead = Lead {
            id: Uuid::new_v4().to_string(),
            name: overrides
                .name
                .unwrap_or_else(|| self.unknown_contact_name.clone()),
            email: overrides.email,
            phone: Some(normalized),
            company: overrides.company,
            position: overrides.position,
            source: LeadSource::PhoneCall,
            status: overrides.status.unwrap_or(LeadStatus::New),
            priority: overrides.priority.unwrap_or(LeadPriority::Medium),
            value: overrides.value.unwrap_or(0.0),
            notes: Some(
                overrides
                    .notes
                    .unwrap_or_else(|| format!("Created from phone call: {raw}")),
            ),
            tags: overrides
                .tags
                .unwrap_or_else(|| vec![PHONE_CALL_TAG.to_string()]),
            created_at: now,
            updated_at: now,
            last_contacted_at: None,
            next_follow_up_at: None,
        };

        let created = self
            .leads
            .create(lead)
            .await
            .with_context(|| format!("failed to create lead for {raw}"))?;
        log_info!("created lead {} for unknown number", created.id);

        Ok(created)
    }
}

/// Collapses several candidates to one: most recently updated first, then
/// higher priority.
pub fn select_best_match(candidates: &[Lead]) -> Option<&Lead> {
    candidates.iter().min_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| b.priority.rank().cmp(&a.priority.rank()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::{DateTime, Duration};

    fn lead(id: &str, phone: Option<&str>, updated_at: DateTime<Utc>, priority: LeadPriority) -> Lead {
        Lead {
            id: id.into(),
            name: format!("Lead {id}"),
            email: None,
            phone: phone.map(str::to_string),
            company: None,
            position: None,
            source: LeadSource::Website,
            status: LeadStatus::New,
            priority,
            value: 0.0,
            notes: None,
            tags: Vec::new(),
            created_at: updated_at,
            updated_at,
            last_contacted_at: None,
            next_follow_up_at: None,
        }
    }

    fn matcher_with(leads: Vec<Lead>) -> (PhoneMatcher, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_leads(leads));
        let matcher = PhoneMatcher::new(store.clone(), PhoneNormalizer::default());
        (matcher, store)
    }

    #[tokio::test]
    async fn single_match_is_exact() {
        let now = Utc::now();
        let (matcher, _) = matcher_with(vec![
            lead("a", Some("+919876543210"), now, LeadPriority::Low),
            lead("b", Some("+911111111111"), now, LeadPriority::Low),
        ]);

        let result = matcher.match_phone_to_lead("98765 43210").await;
        assert_eq!(result.confidence, MatchConfidence::Exact);
        assert_eq!(result.matched_leads.len(), 1);
        assert_eq!(result.matched_leads[0].id, "a");
        assert_eq!(result.normalized_phone_number, "+919876543210");
        assert!(result.has_match());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn no_match_and_duplicate_match() {
        let now = Utc::now();
        let (matcher, _) = matcher_with(vec![
            lead("a", Some("919876543210"), now, LeadPriority::Low),
            lead("b", Some("9876543210"), now, LeadPriority::High),
            lead("c", None, now, LeadPriority::High),
        ]);

        let none = matcher.match_phone_to_lead("5550000000").await;
        assert_eq!(none.confidence, MatchConfidence::None);
        assert!(!none.has_match());

        let partial = matcher.match_phone_to_lead("+919876543210").await;
        assert_eq!(partial.confidence, MatchConfidence::Partial);
        assert_eq!(partial.matched_leads.len(), 2);
        assert!(partial.multiple_matches());
    }

    #[tokio::test]
    async fn empty_query_never_matches_phoneless_leads() {
        let now = Utc::now();
        let (matcher, _) = matcher_with(vec![
            lead("a", None, now, LeadPriority::Low),
            lead("b", Some(""), now, LeadPriority::Low),
        ]);
        let result = matcher.match_phone_to_lead("").await;
        assert_eq!(result.confidence, MatchConfidence::None);
    }

    #[tokio::test]
    async fn store_failure_degrades_to_no_match() {
        let now = Utc::now();
        let (matcher, store) =
            matcher_with(vec![lead("a", Some("+919876543210"), now, LeadPriority::Low)]);
        store.fail_reads(true);

        let result = matcher.match_phone_to_lead("9876543210").await;
        assert_eq!(result.confidence, MatchConfidence::None);
        assert!(!result.has_match());
        assert!(result.error.is_some());
        assert!(matcher.find_best_lead("9876543210").await.is_none());
    }

    #[test]
    fn best_match_prefers_recent_then_priority() {
        let now = Utc::now();
        let older = now - Duration::hours(1);
        let candidates = vec![
            lead("old-urgent", None, older, LeadPriority::Urgent),
            lead("new-low", None, now, LeadPriority::Low),
            lead("new-high", None, now, LeadPriority::High),
        ];
        assert_eq!(select_best_match(&candidates).unwrap().id, "new-high");
        assert!(select_best_match(&[]).is_none());
    }

    #[tokio::test]
    async fn created_lead_carries_defaults_and_overrides() {
        let (matcher, store) = matcher_with(Vec::new());

        let created = matcher
            .create_lead_for_unknown_number("0000000000", LeadOverrides::named("X"))
            .await
            .unwrap();

        assert_eq!(created.name, "X");
        assert_eq!(created.phone.as_deref(), Some("+910000000000"));
        assert_eq!(created.source, LeadSource::PhoneCall);
        assert_eq!(created.status, LeadStatus::New);
        assert_eq!(created.priority, LeadPriority::Medium);
        assert_eq!(created.tags, vec!["Phone Call".to_string()]);
        assert_eq!(
            created.notes.as_deref(),
            Some("Created from phone call: 0000000000")
        );

        // Not idempotent.
        matcher
            .create_lead_for_unknown_number("0000000000", LeadOverrides::default())
            .await
            .unwrap();
        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|l| l.name == "Unknown Contact"));
    }

    #[tokio::test]
    async fn create_surfaces_storage_failure() {
        let (matcher, store) = matcher_with(Vec::new());
        store.fail_writes(true);
        assert!(matcher
            .create_lead_for_unknown_number("9876543210", LeadOverrides::default())
            .await
            .is_err());
    }
}
