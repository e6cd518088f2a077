use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Agent configuration, read once at startup from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    /// Base URL of the appliance. The default is the device's AP-mode
    /// address before it joins the home network.
    pub device_url: String,
    pub poll_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    /// Whole-hour offset the device was provisioned with; slot times are
    /// interpreted in this timezone.
    pub timezone_offset_hours: i32,
    /// Medicine name per compartment, in slot order. Missing or empty
    /// entries fall back to "Medicine {n}".
    pub medicine_names: Vec<String>,
    pub database_path: Option<PathBuf>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            device_url: "http://192.168.4.1".into(),
            poll_interval_secs: 30,
            fetch_timeout_secs: 5,
            timezone_offset_hours: 0,
            medicine_names: Vec::new(),
            database_path: None,
        }
    }
}

impl AgentSettings {
    /// Missing file means defaults; a malformed file is ignored the same
    /// way rather than blocking startup.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Ok(serde_json::from_str(&contents).unwrap_or_default())
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.timezone_offset_hours.clamp(-23, 23) * 3600)
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn db_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("dispenser-agent.db"))
    }
}
