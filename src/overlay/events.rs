//! Maps telephony call-state events onto overlay operations.

use std::{str::FromStr, sync::Arc, time::Instant};

use anyhow::{anyhow, Error};
use tokio::sync::Mutex;

use super::{
    controller::{CallLogOutcome, OverlayController},
    state::OverlayState,
};
use crate::{db::CallType, log_debug, log_warn, phone::extract_from_caller_id};

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "leadzen::events";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEventKind {
    Incoming,
    Outgoing,
    Answered,
    Disconnected,
    Missed,
}

impl FromStr for CallEventKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "incoming" => Ok(CallEventKind::Incoming),
            "outgoing" => Ok(CallEventKind::Outgoing),
            "offhook" | "answered" => Ok(CallEventKind::Answered),
            "disconnected" => Ok(CallEventKind::Disconnected),
            "missed" => Ok(CallEventKind::Missed),
            other => Err(anyhow!("unknown call event '{other}'")),
        }
    }
}

/// Tracks when the current call was picked up so a hang-up can report how
/// long the conversation lasted.
#[derive(Clone)]
pub struct CallEventRouter {
    overlay: OverlayController,
    answered_at: Arc<Mutex<Option<Instant>>>,
}

impl CallEventRouter {
    pub fn new(overlay: OverlayController) -> Self {
        Self {
            overlay,
            answered_at: Arc::new(Mutex::new(None)),
        }
    }

    pub fn overlay(&self) -> &OverlayController {
        &self.overlay
    }

    /// Entry point for string-typed events. Unknown kinds are dropped.
    pub async fn handle_raw(&self, event: &str, raw_caller_id: &str) -> Option<CallLogOutcome> {
        match event.parse::<CallEventKind>() {
            Ok(kind) => self.handle(kind, raw_caller_id).await,
            Err(err) => {
                log_warn!("ignoring call event: {err}");
                None
            }
        }
    }

    /// Returns the logging outcome for events that end a call.
    pub async fn handle(&self, kind: CallEventKind, raw_caller_id: &str) -> Option<CallLogOutcome> {
        let number = extract_from_caller_id(raw_caller_id);
        log_debug!("call event {kind:?}");

        match kind {
            CallEventKind::Incoming => {
                *self.answered_at.lock().await = None;
                self.overlay
                    .show_call_overlay(&number, CallType::Incoming)
                    .await;
                None
            }
            CallEventKind::Outgoing => {
                *self.answered_at.lock().await = None;
                self.overlay
                    .show_call_overlay(&number, CallType::Outgoing)
                    .await;
                None
            }
            CallEventKind::Answered => {
                if !self.is_current_call(&number).await {
                    self.overlay
                        .show_call_overlay(&number, CallType::Incoming)
                        .await;
                }
                *self.answered_at.lock().await = Some(Instant::now());
                None
            }
            CallEventKind::Disconnected => {
                let duration = self
                    .answered_at
                    .lock()
                    .await
                    .take()
                    .map(|at| at.elapsed().as_secs())
                    .unwrap_or(0);
                Some(self.overlay.show_post_call_tray(duration).await)
            }
            CallEventKind::Missed => {
                *self.answered_at.lock().await = None;
                if !self.is_current_call(&number).await {
                    self.overlay
                        .show_call_overlay(&number, CallType::Missed)
                        .await;
                }
                Some(self.overlay.show_missed_call_tray().await)
            }
        }
    }

    /// Whether an event for `number` belongs to the call still in progress.
    /// A finished call (post-call tray) never does. An empty number means the
    /// telephony layer did not repeat it, so it counts as the same call.
    async fn is_current_call(&self, number: &str) -> bool {
        let in_call = matches!(
            self.overlay.state().await,
            OverlayState::Compact | OverlayState::Minimized | OverlayState::AddingLead
        );
        if !in_call {
            return false;
        }
        if number.is_empty() {
            return true;
        }

        let normalizer = self.overlay.matcher().normalizer();
        match self.overlay.current_phone_number().await {
            Some(current) => normalizer.normalize(&current) == normalizer.normalize(number),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{CallStatus, Lead, LeadPriority, LeadSource, LeadStatus},
        phone::{PhoneMatcher, PhoneNormalizer},
        store::memory::MemoryStore,
    };
    use chrono::Utc;

    fn router_with_lead() -> (CallEventRouter, Arc<MemoryStore>) {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::with_leads(vec![Lead {
            id: "lead-1".into(),
            name: "Ravi".into(),
            email: None,
            phone: Some("9876543210".into()),
            company: None,
            position: None,
            source: LeadSource::ColdCall,
            status: LeadStatus::Contacted,
            priority: LeadPriority::Medium,
            value: 0.0,
            notes: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            last_contacted_at: None,
            next_follow_up_at: None,
        }]));
        let matcher = PhoneMatcher::new(store.clone(), PhoneNormalizer::default());
        let overlay = OverlayController::new(matcher, store.clone(), store.clone());
        (CallEventRouter::new(overlay), store)
    }

    #[test]
    fn parses_telephony_event_names() {
        assert_eq!("INCOMING".parse::<CallEventKind>().unwrap(), CallEventKind::Incoming);
        assert_eq!("Offhook".parse::<CallEventKind>().unwrap(), CallEventKind::Answered);
        assert_eq!(" answered ".parse::<CallEventKind>().unwrap(), CallEventKind::Answered);
        assert_eq!("missed".parse::<CallEventKind>().unwrap(), CallEventKind::Missed);
        assert!("ringing".parse::<CallEventKind>().is_err());
    }

    #[tokio::test]
    async fn incoming_then_unanswered_hangup_logs_zero_seconds() {
        let (router, store) = router_with_lead();

        router.handle_raw("Incoming", "Ravi <+91 98765 43210>").await;
        let snapshot = router.overlay().snapshot().await;
        assert_eq!(snapshot.state, OverlayState::Compact);
        assert_eq!(snapshot.phone_number.as_deref(), Some("+919876543210"));
        assert!(snapshot.lead.is_some());

        let outcome = router.handle_raw("Disconnected", "").await;
        assert!(matches!(outcome, Some(CallLogOutcome::Logged(_))));
        assert_eq!(router.overlay().state().await, OverlayState::PostCall);

        let logs = store.call_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].duration_secs, 0);
    }

    #[tokio::test]
    async fn answer_while_hidden_opens_incoming_session() {
        let (router, _) = router_with_lead();
        router.handle(CallEventKind::Answered, "9876543210").await;

        let snapshot = router.overlay().snapshot().await;
        assert_eq!(snapshot.state, OverlayState::Compact);
        assert_eq!(snapshot.call_type, Some(CallType::Incoming));
    }

    #[tokio::test]
    async fn missed_call_is_logged_as_no_answer() {
        let (router, store) = router_with_lead();

        router.handle_raw("Incoming", "9876543210").await;
        let outcome = router.handle_raw("Missed", "9876543210").await;
        assert!(matches!(outcome, Some(CallLogOutcome::Logged(_))));

        let logs = store.call_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].call_status, CallStatus::NoAnswer);
        assert_eq!(logs[0].duration_secs, 0);
        assert_eq!(router.overlay().state().await, OverlayState::PostCall);
    }

    #[tokio::test]
    async fn answer_after_previous_call_ended_starts_a_new_session() {
        let (router, store) = router_with_lead();

        router.handle_raw("Incoming", "9876543210").await;
        router.handle_raw("Disconnected", "").await;
        assert_eq!(router.overlay().state().await, OverlayState::PostCall);

        router.handle_raw("Offhook", "5550001111").await;
        let snapshot = router.overlay().snapshot().await;
        assert_eq!(snapshot.state, OverlayState::Compact);
        assert_eq!(snapshot.phone_number.as_deref(), Some("5550001111"));
        assert!(snapshot.lead.is_none());

        let outcome = router.handle_raw("Disconnected", "").await;
        assert_eq!(outcome, Some(CallLogOutcome::Skipped));

        let logs = store.call_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].lead_id.as_deref(), Some("lead-1"));
        assert_eq!(logs[0].phone_number, "9876543210");
    }

    #[tokio::test]
    async fn answer_for_another_number_replaces_the_live_session() {
        let (router, _) = router_with_lead();

        router.handle_raw("Incoming", "5550001111").await;
        router.handle_raw("Offhook", "+91 98765 43210").await;

        let snapshot = router.overlay().snapshot().await;
        assert_eq!(snapshot.state, OverlayState::Compact);
        assert_eq!(snapshot.lead.map(|l| l.id), Some("lead-1".to_string()));
    }

    #[tokio::test]
    async fn answer_for_same_number_keeps_the_session() {
        let (router, _) = router_with_lead();
        let seen = Arc::new(std::sync::Mutex::new(0usize));
        let sink = seen.clone();
        router
            .overlay()
            .subscribe(move |_| *sink.lock().unwrap() += 1);

        router.handle_raw("Incoming", "9876543210").await;
        router.overlay().minimize().await;
        router.handle_raw("Offhook", "+919876543210").await;

        assert_eq!(router.overlay().state().await, OverlayState::Minimized);
        assert_eq!(*seen.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn missed_call_after_post_call_tray_logs_its_own_entry() {
        let (router, store) = router_with_lead();

        router.handle_raw("Incoming", "9876543210").await;
        router.handle_raw("Disconnected", "").await;
        router.handle_raw("Missed", "9876543210").await;

        let logs = store.call_logs().await;
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].call_status, CallStatus::Completed);
        assert_eq!(logs[1].call_type, CallType::Missed);
        assert_eq!(logs[1].call_status, CallStatus::NoAnswer);
    }

    #[tokio::test]
    async fn missed_call_while_hidden_opens_missed_session() {
        let (router, store) = router_with_lead();
        router.handle(CallEventKind::Missed, "9876543210").await;

        let snapshot = router.overlay().snapshot().await;
        assert_eq!(snapshot.state, OverlayState::PostCall);
        assert_eq!(snapshot.call_type, Some(CallType::Missed));
        assert_eq!(store.call_logs().await[0].call_type, CallType::Missed);
    }

    #[tokio::test]
    async fn hangup_without_overlay_is_ignored_and_unknown_events_dropped() {
        let (router, store) = router_with_lead();
        assert_eq!(
            router.handle(CallEventKind::Disconnected, "").await,
            Some(CallLogOutcome::Ignored)
        );
        assert_eq!(router.handle_raw("ringing", "9876543210").await, None);
        assert!(!router.overlay().is_visible().await);
        assert!(store.call_logs().await.is_empty());
    }
}
