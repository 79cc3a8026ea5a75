mod connection;
pub mod helpers;
mod migrations;
pub mod models;
pub mod repositories;

pub use connection::Database;
pub use models::{
    CallLogEntry, CallStatus, CallType, Lead, LeadOverrides, LeadPatch, LeadPriority, LeadSource,
    LeadStatus,
};
pub use repositories::DataExport;
