pub mod controller;
pub mod events;
pub mod state;
pub mod subscribers;

pub use controller::{CallLogOutcome, CallerInfo, OverlayController, OverlayDebugInfo};
pub use events::{CallEventKind, CallEventRouter};
pub use state::{format_call_duration, CallSession, OverlayMachine, OverlaySnapshot, OverlayState};
pub use subscribers::{Subscribers, Subscription};
