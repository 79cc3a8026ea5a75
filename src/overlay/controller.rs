use std::{sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    state::{OverlayMachine, OverlaySnapshot, OverlayState},
    subscribers::{Subscribers, Subscription},
};
use crate::{
    db::{CallLogEntry, CallStatus, CallType, Lead, LeadPatch, LeadStatus},
    log_debug, log_error, log_info, log_warn,
    phone::{PhoneMatcher, UNKNOWN_NUMBER},
    store::{CallLogStore, LeadStore},
};

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "leadzen::overlay";

/// Result of ending a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallLogOutcome {
    /// Overlay was hidden; nothing happened.
    Ignored,
    /// No lead is associated, so there is nothing to log against.
    Skipped,
    Logged(String),
    /// The tray still opened; only the write failed.
    Failed(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum CallerInfo {
    #[serde(rename_all = "camelCase")]
    Known {
        lead_id: String,
        display_name: String,
        display_subtitle: String,
        phone_number: String,
    },
    #[serde(rename_all = "camelCase")]
    Unknown {
        display_name: String,
        display_subtitle: String,
        phone_number: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayDebugInfo {
    pub state: OverlayState,
    pub visible: bool,
    pub has_lead: bool,
    pub phone_number: Option<String>,
    pub call_type: Option<CallType>,
    pub duration_secs: u64,
    pub subscriber_count: usize,
}

/// Owns the single active call session and broadcasts a full
/// [`OverlaySnapshot`] to subscribers after every change.
#[derive(Clone)]
pub struct OverlayController {
    machine: Arc<Mutex<OverlayMachine>>,
    matcher: PhoneMatcher,
    leads: Arc<dyn LeadStore>,
    call_logs: Arc<dyn CallLogStore>,
    subscribers: Subscribers<OverlaySnapshot>,
    unknown_number_label: String,
}

impl OverlayController {
    pub fn new(
        matcher: PhoneMatcher,
        leads: Arc<dyn LeadStore>,
        call_logs: Arc<dyn CallLogStore>,
    ) -> Self {
        Self {
            machine: Arc::new(Mutex::new(OverlayMachine::new())),
            matcher,
            leads,
            call_logs,
            subscribers: Subscribers::new(),
            unknown_number_label: UNKNOWN_NUMBER.to_string(),
        }
    }

    pub fn with_unknown_number_label(mut self, label: impl Into<String>) -> Self {
        self.unknown_number_label = label.into();
        self
    }

    pub fn matcher(&self) -> &PhoneMatcher {
        &self.matcher
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription<OverlaySnapshot>
    where
        F: Fn(&OverlaySnapshot) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(listener)
    }

    pub async fn snapshot(&self) -> OverlaySnapshot {
        self.machine.lock().await.snapshot()
    }

    pub async fn state(&self) -> OverlayState {
        self.machine.lock().await.state()
    }

    pub async fn is_visible(&self) -> bool {
        self.state().await != OverlayState::Hidden
    }

    pub async fn current_lead(&self) -> Option<Lead> {
        self.machine.lock().await.lead().cloned()
    }

    pub async fn current_phone_number(&self) -> Option<String> {
        self.machine
            .lock()
            .await
            .session()
            .map(|s| s.phone_number.clone())
    }

    /// Live while the call is up, frozen once the post-call tray opens.
    pub async fn call_duration_secs(&self) -> u64 {
        self.machine
            .lock()
            .await
            .session()
            .map(|s| s.duration_secs())
            .unwrap_or(0)
    }

    /// Opens (or replaces) the session for a call. Never fails: a missing
    /// number becomes the unknown-number label and a failed lookup leaves
    /// the session without a lead.
    pub async fn show_call_overlay(&self, phone_number: &str, call_type: CallType) {
        let started_at = Utc::now();
        let anchor = Instant::now();

        let (phone_number, lead) = if phone_number.trim().is_empty() {
            (self.unknown_number_label.clone(), None)
        } else {
            let lead = self.matcher.find_best_lead(phone_number).await;
            (phone_number.to_string(), lead)
        };

        let lead = match lead {
            Some(mut lead) => {
                log_info!("call {} matched lead {}", call_type.as_str(), lead.id);
                self.touch_last_contacted(&mut lead, started_at).await;
                Some(lead)
            }
            None => {
                log_info!("call {} from unknown number", call_type.as_str());
                None
            }
        };

        let snapshot = {
            let mut machine = self.machine.lock().await;
            let from = machine.state();
            machine.begin(phone_number, call_type, lead, started_at, anchor);
            log_transition(from, machine.state());
            machine.snapshot()
        };
        self.subscribers.emit(&snapshot);
    }

    pub async fn minimize(&self) -> bool {
        self.transition(OverlayMachine::minimize).await
    }

    pub async fn maximize(&self) -> bool {
        self.transition(OverlayMachine::maximize).await
    }

    pub async fn show_add_lead_flow(&self) -> bool {
        self.transition(OverlayMachine::start_add_lead).await
    }

    /// Clears the session. Accepted from every state; subscribers only hear
    /// about it when something was showing.
    pub async fn hide_call_overlay(&self) {
        let snapshot = {
            let mut machine = self.machine.lock().await;
            let from = machine.state();
            if !machine.hide() {
                return;
            }
            log_transition(from, OverlayState::Hidden);
            machine.snapshot()
        };
        self.subscribers.emit(&snapshot);
    }

    /// Freezes the duration, opens the post-call tray and, when a lead is
    /// associated, appends the call to the log.
    pub async fn show_post_call_tray(&self, duration_secs: u64) -> CallLogOutcome {
        self.finish_call(duration_secs, None).await
    }

    /// Post-call tray for a call that rang out. Logged as `NoAnswer`
    /// whatever the session's call type.
    pub async fn show_missed_call_tray(&self) -> CallLogOutcome {
        self.finish_call(0, Some(CallStatus::NoAnswer)).await
    }

    async fn finish_call(&self, duration_secs: u64, status: Option<CallStatus>) -> CallLogOutcome {
        let ended_at = Utc::now();

        let (entry, snapshot) = {
            let mut machine = self.machine.lock().await;
            let from = machine.state();
            let entry = match machine.end_call(duration_secs) {
                Some(session) => session.lead.as_ref().map(|lead| CallLogEntry {
                    id: Uuid::new_v4().to_string(),
                    lead_id: Some(lead.id.clone()),
                    phone_number: session.phone_number.clone(),
                    call_type: session.call_type,
                    call_status: status.unwrap_or(match session.call_type {
                        CallType::Missed => CallStatus::NoAnswer,
                        CallType::Incoming | CallType::Outgoing => CallStatus::Completed,
                    }),
                    duration_secs,
                    started_at: session.started_at,
                    ended_at: ended_at.max(session.started_at),
                    notes: None,
                }),
                None => {
                    log_debug!("post-call tray requested while hidden");
                    return CallLogOutcome::Ignored;
                }
            };
            log_transition(from, machine.state());
            (entry, machine.snapshot())
        };
        self.subscribers.emit(&snapshot);

        let Some(entry) = entry else {
            return CallLogOutcome::Skipped;
        };

        match self.call_logs.append(entry).await {
            Ok(id) => {
                log_info!("logged call {id} ({duration_secs}s)");
                CallLogOutcome::Logged(id)
            }
            Err(err) => {
                log_error!("failed to log call: {err:#}");
                CallLogOutcome::Failed(format!("{err:#}"))
            }
        }
    }

    /// Appends a dated note to the associated lead. The UI sees the note
    /// before it is written; a failed write returns false without undoing it.
    pub async fn add_quick_note(&self, text: &str) -> bool {
        let Some(lead_id) = self.current_lead_id().await else {
            log_warn!("no lead available for quick note");
            return false;
        };

        let existing = match self.leads.get_by_id(&lead_id).await {
            Ok(Some(lead)) => lead.notes,
            Ok(None) => {
                log_warn!("lead {lead_id} vanished before quick note");
                return false;
            }
            Err(err) => {
                log_error!("failed to load lead {lead_id} for quick note: {err:#}");
                return false;
            }
        };
        let notes = append_quick_note(existing.as_deref(), text, Utc::now());

        let applied = self
            .mutate_lead(&lead_id, |lead| lead.notes = Some(notes.clone()))
            .await;
        if !applied {
            return false;
        }

        match self.leads.update(&lead_id, LeadPatch::notes(notes)).await {
            Ok(()) => {
                log_info!("quick note added to lead {lead_id}");
                true
            }
            Err(err) => {
                log_error!("failed to save quick note for {lead_id}: {err:#}");
                false
            }
        }
    }

    /// Changes the associated lead's pipeline status, optimistically.
    pub async fn update_lead_status(&self, status: LeadStatus) -> bool {
        let Some(lead_id) = self.current_lead_id().await else {
            log_warn!("no lead available for status update");
            return false;
        };

        if !self.mutate_lead(&lead_id, |lead| lead.status = status).await {
            return false;
        }

        match self.leads.update(&lead_id, LeadPatch::status(status)).await {
            Ok(()) => {
                log_info!("lead {lead_id} status -> {}", status.as_str());
                true
            }
            Err(err) => {
                log_error!("failed to save status for {lead_id}: {err:#}");
                false
            }
        }
    }

    pub async fn caller_info(&self) -> Option<CallerInfo> {
        let machine = self.machine.lock().await;
        let session = machine.session()?;
        let formatted = if session.phone_number == self.unknown_number_label {
            self.unknown_number_label.clone()
        } else {
            self.matcher
                .normalizer()
                .display_name_for_unknown(&session.phone_number)
        };

        Some(match &session.lead {
            Some(lead) => CallerInfo::Known {
                lead_id: lead.id.clone(),
                display_name: lead.name.clone(),
                display_subtitle: lead
                    .company
                    .clone()
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| formatted.clone()),
                phone_number: formatted,
            },
            None => CallerInfo::Unknown {
                display_name: "Unknown Caller".into(),
                display_subtitle: formatted.clone(),
                phone_number: formatted,
            },
        })
    }

    pub async fn debug_info(&self) -> OverlayDebugInfo {
        let machine = self.machine.lock().await;
        let session = machine.session();
        OverlayDebugInfo {
            state: machine.state(),
            visible: machine.state() != OverlayState::Hidden,
            has_lead: machine.lead().is_some(),
            phone_number: session.map(|s| s.phone_number.clone()),
            call_type: session.map(|s| s.call_type),
            duration_secs: session.map(|s| s.duration_secs()).unwrap_or(0),
            subscriber_count: self.subscribers.len(),
        }
    }

    async fn transition(&self, apply: fn(&mut OverlayMachine) -> bool) -> bool {
        let snapshot = {
            let mut machine = self.machine.lock().await;
            let from = machine.state();
            if !apply(&mut *machine) {
                log_debug!("ignored transition request in {}", from.as_str());
                return false;
            }
            log_transition(from, machine.state());
            machine.snapshot()
        };
        self.subscribers.emit(&snapshot);
        true
    }

    async fn current_lead_id(&self) -> Option<String> {
        self.machine.lock().await.lead().map(|l| l.id.clone())
    }

    /// Edits the in-memory copy of the session's lead and broadcasts. False
    /// when the session moved on or lost its lead meanwhile.
    async fn mutate_lead(&self, lead_id: &str, edit: impl FnOnce(&mut Lead)) -> bool {
        let snapshot = {
            let mut machine = self.machine.lock().await;
            let Some(lead) = machine
                .session_mut()
                .and_then(|s| s.lead.as_mut())
                .filter(|l| l.id == lead_id)
            else {
                return false;
            };
            edit(lead);
            machine.snapshot()
        };
        self.subscribers.emit(&snapshot);
        true
    }

    async fn touch_last_contacted(&self, lead: &mut Lead, at: DateTime<Utc>) {
        match self.leads.update(&lead.id, LeadPatch::last_contacted(at)).await {
            Ok(()) => {
                lead.last_contacted_at = Some(at);
                lead.updated_at = at;
            }
            Err(err) => log_warn!("could not update last contact for {}: {err:#}", lead.id),
        }
    }
}

fn log_transition(from: OverlayState, to: OverlayState) {
    if from != to {
        log_info!("overlay state: {} -> {}", from.as_str(), to.as_str());
    }
}

fn append_quick_note(existing: Option<&str>, text: &str, at: DateTime<Utc>) -> String {
    let entry = format!("Quick Note ({}): {text}", at.format("%-m/%-d/%Y"));
    match existing {
        Some(notes) if !notes.is_empty() => format!("{notes}\n\n{entry}"),
        _ => entry,
    }
}
