pub mod call_log;
pub mod lead;

pub use call_log::{CallLogEntry, CallStatus, CallType};
pub use lead::{Lead, LeadOverrides, LeadPatch, LeadPriority, LeadSource, LeadStatus};
