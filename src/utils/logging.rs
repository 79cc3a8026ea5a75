//! Conditional logging macros keyed on two module-level constants.
//!
//! Usage:
//! ```ignore
//! // In your module, define both constants first:
//! const ENABLE_LOGS: bool = true;
//! const LOG_TARGET: &str = "leadzen::overlay";
//!
//! // Then use the macros (they're exported at the crate root):
//! use crate::{log_info, log_warn};
//!
//! log_info!("overlay state: {} -> {}", from, to);
//! ```
//!
//! `LOG_TARGET` lets hosts filter one subsystem with `RUST_LOG`, e.g.
//! `RUST_LOG=leadzen::matcher=debug`.

/// Debug-level log, skipped when the calling module sets `ENABLE_LOGS = false`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!(target: LOG_TARGET, $($arg)*);
        }
    };
}

/// Info-level log, skipped when the calling module sets `ENABLE_LOGS = false`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!(target: LOG_TARGET, $($arg)*);
        }
    };
}

/// Warn-level log, skipped when the calling module sets `ENABLE_LOGS = false`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!(target: LOG_TARGET, $($arg)*);
        }
    };
}

/// Errors are always emitted; `ENABLE_LOGS` only silences the chatty levels.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        log::error!(target: LOG_TARGET, $($arg)*);
    };
}
