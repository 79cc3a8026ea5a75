use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

use crate::db::{CallType, Lead};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverlayState {
    Hidden,
    /// Call in progress, brief info.
    Compact,
    Minimized,
    PostCall,
    AddingLead,
}

impl OverlayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayState::Hidden => "hidden",
            OverlayState::Compact => "compact",
            OverlayState::Minimized => "minimized",
            OverlayState::PostCall => "post_call",
            OverlayState::AddingLead => "adding_lead",
        }
    }
}

impl Default for OverlayState {
    fn default() -> Self {
        OverlayState::Hidden
    }
}

#[derive(Debug, Clone)]
pub struct CallSession {
    pub phone_number: String,
    pub call_type: CallType,
    /// Resolved once when the session opens. Field updates (status, notes)
    /// are mirrored here, but it never switches to another lead.
    pub lead: Option<Lead>,
    pub started_at: DateTime<Utc>,
    running_anchor: Instant,
    frozen_duration_secs: Option<u64>,
}

impl CallSession {
    pub fn duration_secs(&self) -> u64 {
        self.frozen_duration_secs
            .unwrap_or_else(|| self.running_anchor.elapsed().as_secs())
    }

    pub fn is_duration_frozen(&self) -> bool {
        self.frozen_duration_secs.is_some()
    }
}

/// What the UI receives on every change.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySnapshot {
    pub state: OverlayState,
    pub visible: bool,
    pub lead: Option<Lead>,
    pub phone_number: Option<String>,
    pub call_started_at: Option<DateTime<Utc>>,
    pub duration_secs: u64,
    pub call_type: Option<CallType>,
}

impl OverlaySnapshot {
    pub fn hidden() -> Self {
        Self {
            state: OverlayState::Hidden,
            visible: false,
            lead: None,
            phone_number: None,
            call_started_at: None,
            duration_secs: 0,
            call_type: None,
        }
    }
}

/// The overlay transition table. Holds a session exactly when the state is
/// not `Hidden`; each method reports whether it applied.
#[derive(Debug, Default)]
pub struct OverlayMachine {
    state: OverlayState,
    session: Option<CallSession>,
}

impl OverlayMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn session(&self) -> Option<&CallSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut CallSession> {
        self.session.as_mut()
    }

    pub fn lead(&self) -> Option<&Lead> {
        self.session.as_ref().and_then(|s| s.lead.as_ref())
    }

    /// Opens a session from any state, replacing whatever was showing.
    pub fn begin(
        &mut self,
        phone_number: String,
        call_type: CallType,
        lead: Option<Lead>,
        started_at: DateTime<Utc>,
        now: Instant,
    ) {
        self.session = Some(CallSession {
            phone_number,
            call_type,
            lead,
            started_at,
            running_anchor: now,
            frozen_duration_secs: None,
        });
        self.state = OverlayState::Compact;
    }

    pub fn minimize(&mut self) -> bool {
        self.move_from(&[OverlayState::Compact], OverlayState::Minimized)
    }

    pub fn maximize(&mut self) -> bool {
        self.move_from(&[OverlayState::Minimized], OverlayState::Compact)
    }

    /// Only offered while the call is up and nobody matched the number.
    pub fn start_add_lead(&mut self) -> bool {
        if self.lead().is_some() {
            return false;
        }
        self.move_from(&[OverlayState::Compact], OverlayState::AddingLead)
    }

    /// Enters `PostCall` from any visible state and freezes the duration.
    /// Returns the session as it stood at that moment.
    pub fn end_call(&mut self, duration_secs: u64) -> Option<&CallSession> {
        if self.state == OverlayState::Hidden {
            return None;
        }
        let session = self.session.as_mut()?;
        session.frozen_duration_secs = Some(duration_secs);
        self.state = OverlayState::PostCall;
        self.session.as_ref()
    }

    /// Always accepted; returns false when nothing was showing.
    pub fn hide(&mut self) -> bool {
        let was_visible = self.state != OverlayState::Hidden;
        self.state = OverlayState::Hidden;
        self.session = None;
        was_visible
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        match &self.session {
            Some(session) if self.state != OverlayState::Hidden => OverlaySnapshot {
                state: self.state,
                visible: true,
                lead: session.lead.clone(),
                phone_number: Some(session.phone_number.clone()),
                call_started_at: Some(session.started_at),
                duration_secs: session.duration_secs(),
                call_type: Some(session.call_type),
            },
            _ => OverlaySnapshot::hidden(),
        }
    }

    fn move_from(&mut self, from: &[OverlayState], to: OverlayState) -> bool {
        if from.contains(&self.state) && self.session.is_some() {
            self.state = to;
            true
        } else {
            false
        }
    }
}

/// `45s`, `2:05`, `1:02:05`.
pub fn format_call_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}:{:02}", secs / 60, secs % 60)
    } else {
        format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(machine: &mut OverlayMachine, lead: Option<Lead>) {
        machine.begin(
            "+919876543210".into(),
            CallType::Incoming,
            lead,
            Utc::now(),
            Instant::now(),
        );
    }

    #[test]
    fn hidden_ignores_everything_but_begin() {
        let mut machine = OverlayMachine::new();
        assert!(!machine.minimize());
        assert!(!machine.maximize());
        assert!(!machine.start_add_lead());
        assert!(machine.end_call(10).is_none());
        assert!(!machine.hide());
        assert_eq!(machine.state(), OverlayState::Hidden);
        assert_eq!(machine.snapshot(), OverlaySnapshot::hidden());
    }

    #[test]
    fn compact_minimized_round_trip() {
        let mut machine = OverlayMachine::new();
        open(&mut machine, None);
        assert_eq!(machine.state(), OverlayState::Compact);

        assert!(!machine.maximize());
        assert!(machine.minimize());
        assert_eq!(machine.state(), OverlayState::Minimized);
        assert!(!machine.minimize());
        assert!(!machine.start_add_lead());
        assert!(machine.maximize());
        assert_eq!(machine.state(), OverlayState::Compact);
    }

    #[test]
    fn end_call_freezes_duration_from_any_visible_state() {
        for setup in [OverlayState::Compact, OverlayState::Minimized, OverlayState::AddingLead] {
            let mut machine = OverlayMachine::new();
            open(&mut machine, None);
            match setup {
                OverlayState::Minimized => assert!(machine.minimize()),
                OverlayState::AddingLead => assert!(machine.start_add_lead()),
                _ => {}
            }

            let session = machine.end_call(125).expect("visible session");
            assert!(session.is_duration_frozen());
            assert_eq!(machine.state(), OverlayState::PostCall);
            assert_eq!(machine.snapshot().duration_secs, 125);
        }
    }

    #[test]
    fn hide_clears_session_from_every_state() {
        let mut machine = OverlayMachine::new();
        open(&mut machine, None);
        machine.end_call(3);
        assert!(machine.hide());
        assert!(machine.session().is_none());
        assert_eq!(machine.snapshot(), OverlaySnapshot::hidden());
    }

    #[test]
    fn begin_replaces_a_stale_session() {
        let mut machine = OverlayMachine::new();
        open(&mut machine, None);
        machine.minimize();
        machine.begin(
            "+15551234567".into(),
            CallType::Outgoing,
            None,
            Utc::now(),
            Instant::now(),
        );
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.state, OverlayState::Compact);
        assert_eq!(snapshot.phone_number.as_deref(), Some("+15551234567"));
        assert_eq!(snapshot.call_type, Some(CallType::Outgoing));
    }

    #[test]
    fn state_serializes_like_as_str() {
        for state in [
            OverlayState::Hidden,
            OverlayState::Compact,
            OverlayState::Minimized,
            OverlayState::PostCall,
            OverlayState::AddingLead,
        ] {
            assert_eq!(serde_json::to_value(state).unwrap(), state.as_str());
        }
    }

    #[test]
    fn durations_render_like_the_call_log() {
        assert_eq!(format_call_duration(45), "45s");
        assert_eq!(format_call_duration(125), "2:05");
        assert_eq!(format_call_duration(3725), "1:02:05");
    }
}
