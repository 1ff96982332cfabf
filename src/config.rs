//! Runtime settings for the trading core
//!
//! Loaded from `<data_dir>/config.json` when present, with environment
//! overrides. Missing file means defaults; a malformed file is an error
//! rather than a silent fallback.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::data_paths::DataPaths;

/// Environment override for the starting cash baseline
pub const STARTING_CASH_ENV: &str = "LEDGERBOT_STARTING_CASH";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Cash baseline every reconstruction starts from
    pub starting_cash: Decimal,
    /// Per-ticker deadline for live mark fetches, in milliseconds.
    /// A timeout degrades that ticker to "mark unavailable".
    pub mark_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            starting_cash: Decimal::from(100_000),
            mark_timeout_ms: 2_000,
        }
    }
}

impl Settings {
    /// Load settings from the data directory, applying env overrides
    pub fn load(data_paths: &DataPaths) -> Result<Self> {
        let path = data_paths.config_file();
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings: {:?}", path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Malformed settings file: {:?}", path))?
        } else {
            Self::default()
        };

        if let Ok(raw) = std::env::var(STARTING_CASH_ENV) {
            settings.starting_cash = Decimal::from_str(raw.trim())
                .with_context(|| format!("{} is not a valid amount: {}", STARTING_CASH_ENV, raw))?;
        }

        debug!(
            starting_cash = %settings.starting_cash,
            mark_timeout_ms = settings.mark_timeout_ms,
            "Settings loaded"
        );
        Ok(settings)
    }

    pub fn mark_timeout(&self) -> Duration {
        Duration::from_millis(self.mark_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let settings = Settings::load(&paths).unwrap();
        assert_eq!(settings.starting_cash, dec!(100000));
        assert_eq!(settings.mark_timeout_ms, 2_000);
    }

    #[test]
    fn reads_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        std::fs::write(
            paths.config_file(),
            r#"{"starting_cash": 25000.0, "mark_timeout_ms": 500}"#,
        )
        .unwrap();

        let settings = Settings::load(&paths).unwrap();
        assert_eq!(settings.starting_cash, dec!(25000));
        assert_eq!(settings.mark_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        std::fs::write(paths.config_file(), "{not json").unwrap();
        assert!(Settings::load(&paths).is_err());
    }
}
