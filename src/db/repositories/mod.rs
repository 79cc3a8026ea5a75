pub mod call_logs;
pub mod leads;

pub use call_logs::DataExport;
