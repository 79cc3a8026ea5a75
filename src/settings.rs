use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

pub const REGION_CODE_ENV: &str = "LEADZEN_REGION_CODE";

/// Country the normalizer assumes for numbers dialled without a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSettings {
    /// Digits only, no `+`.
    pub country_code: String,
    pub national_number_length: usize,
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            country_code: "91".into(),
            national_number_length: 10,
        }
    }
}

impl RegionSettings {
    pub fn new(country_code: &str, national_number_length: usize) -> Result<Self> {
        let country_code = country_code.trim().trim_start_matches('+');
        if country_code.is_empty() || !country_code.chars().all(|c| c.is_ascii_digit()) {
            bail!("country code must be digits, got '{country_code}'");
        }
        if national_number_length == 0 {
            bail!("national number length must be positive");
        }
        Ok(Self {
            country_code: country_code.to_string(),
            national_number_length,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreSettings {
    pub region: RegionSettings,
    pub unknown_number_label: String,
    pub unknown_contact_name: String,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            region: RegionSettings::default(),
            unknown_number_label: "Unknown Number".into(),
            unknown_contact_name: "Unknown Contact".into(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<CoreSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data: CoreSettings = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings at {}: {err}", path.display());
                CoreSettings::default()
            })
        } else {
            CoreSettings::default()
        };

        if let Ok(code) = std::env::var(REGION_CODE_ENV) {
            match RegionSettings::new(&code, data.region.national_number_length) {
                Ok(region) => data.region = region,
                Err(err) => warn!("Ignoring {REGION_CODE_ENV}: {err}"),
            }
        }

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> CoreSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn region(&self) -> RegionSettings {
        self.get().region
    }

    pub fn update_region(&self, region: RegionSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.region = region;
        self.persist(&guard)
    }

    fn persist(&self, data: &CoreSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
