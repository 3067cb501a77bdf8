// ⚙️ Configuration - where the ledger lives and how the detectors are tuned
//
// Values come from the environment (a `.env` file is loaded by the binaries).
// Every setting has a default, so an empty environment is a valid config.

use std::env;
use std::path::PathBuf;

use crate::error::{LedgerError, Result};

pub const ENV_DB_PATH: &str = "LEDGER_DB_PATH";
pub const ENV_SEED_DEFAULTS: &str = "LEDGER_SEED_DEFAULTS";
pub const ENV_ANOMALY_THRESHOLD: &str = "LEDGER_ANOMALY_THRESHOLD_CENTS";

/// Tuning for the pattern detectors and the forecast
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    /// Debit legs strictly above this are flagged ($200.00)
    pub anomaly_threshold_cents: i64,
    pub anomaly_lookback_months: u32,
    pub recurring_lookback_months: u32,
    pub recurring_min_occurrences: u32,
    /// Months of history averaged into the savings rate
    pub forecast_trailing_months: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        DetectionSettings {
            anomaly_threshold_cents: 20_000,
            anomaly_lookback_months: 1,
            recurring_lookback_months: 3,
            recurring_min_occurrences: 2,
            forecast_trailing_months: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub db_path: PathBuf,
    /// Insert default accounts/categories into an empty store
    pub seed_defaults: bool,
    pub detection: DetectionSettings,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            db_path: PathBuf::from("ledger.db"),
            seed_defaults: true,
            detection: DetectionSettings::default(),
        }
    }
}

impl LedgerConfig {
    /// Build from process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup (used by tests to avoid touching the real env)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LedgerConfig::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(ENV_SEED_DEFAULTS) {
            config.seed_defaults = parse_bool(&raw).ok_or_else(|| {
                LedgerError::Validation(format!("{ENV_SEED_DEFAULTS} must be true/false, got '{raw}'"))
            })?;
        }

        if let Some(raw) = lookup(ENV_ANOMALY_THRESHOLD) {
            let threshold: i64 = raw.trim().parse().map_err(|_| {
                LedgerError::Validation(format!("{ENV_ANOMALY_THRESHOLD} must be an integer, got '{raw}'"))
            })?;
            if threshold < 0 {
                return Err(LedgerError::Validation(format!(
                    "{ENV_ANOMALY_THRESHOLD} cannot be negative"
                )));
            }
            config.detection.anomaly_threshold_cents = threshold;
        }

        Ok(config)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
