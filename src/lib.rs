pub mod db;
pub mod overlay;
pub mod phone;
pub mod settings;
pub mod store;
mod utils;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};

pub use db::{
    CallLogEntry, CallStatus, CallType, DataExport, Database, Lead, LeadOverrides, LeadPatch,
    LeadPriority, LeadSource, LeadStatus,
};
pub use overlay::{
    CallEventKind, CallEventRouter, CallLogOutcome, CallerInfo, OverlayController,
    OverlayDebugInfo, OverlaySnapshot, OverlayState, Subscription,
};
pub use phone::{MatchConfidence, MatchResult, PhoneMatcher, PhoneNormalizer};
pub use settings::{CoreSettings, RegionSettings, SettingsStore};
pub use store::{memory::MemoryStore, CallLogStore, LeadStore};

pub const DEBUG_ENV: &str = "LEADZEN_DEBUG";

const DATABASE_FILE: &str = "leadzen.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

/// Installs the `env_logger` backend. `RUST_LOG` wins when set; otherwise
/// the level is Info, or Debug when `LEADZEN_DEBUG` is `1`/`true`. Safe to
/// call more than once.
pub fn init_logging() {
    let debug = std::env::var(DEBUG_ENV)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"))
        .unwrap_or(false);
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    let _ = builder.try_init();
}

/// Everything a host needs for the call flow, wired over one data directory.
pub struct LeadZenCore {
    pub db: Database,
    pub settings: SettingsStore,
    pub matcher: PhoneMatcher,
    pub overlay: OverlayController,
    pub events: CallEventRouter,
}

impl LeadZenCore {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

        let db = Database::new(data_dir.join(DATABASE_FILE))?;
        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
        let core_settings = settings.get();

        let store = Arc::new(db.clone());
        let normalizer = PhoneNormalizer::new(core_settings.region.clone());
        let matcher = PhoneMatcher::new(store.clone(), normalizer)
            .with_unknown_contact_name(core_settings.unknown_contact_name.clone());
        let overlay = OverlayController::new(matcher.clone(), store.clone(), store)
            .with_unknown_number_label(core_settings.unknown_number_label);
        let events = CallEventRouter::new(overlay.clone());

        log::info!(
            "LeadZen core ready at {} (region +{})",
            data_dir.display(),
            core_settings.region.country_code
        );

        Ok(Self {
            db,
            settings,
            matcher,
            overlay,
            events,
        })
    }
}
