// 🔍 Pattern Detectors - recurring charges and unusually large postings
//
// Both detectors are read-only projections over the splits table. Only debit
// legs (amount > 0) are considered. Windows are lower-bounded only: a posting
// counts when its date is strictly after `as_of - lookback`.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::{self, months_after, months_before};
use crate::config::DetectionSettings;
use crate::db::Ledger;
use crate::entities::text_enum;
use crate::error::Result;
use crate::money::{format_major, real_to_major};

// ============================================================================
// READ MODELS
// ============================================================================

/// A payee that was charged repeatedly in the lookback window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub name: String,
    /// Mean charge in major units
    pub average_amount: f64,
    pub occurrences: u32,
    pub last_date: NaiveDate,
    /// Best-effort label, never a verified cadence
    pub frequency: String,
    /// Last charge + 1 calendar month
    pub next_due: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

text_enum!(Severity, "severity", {
    Low => "Low",
    Medium => "Medium",
    High => "High",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyKind {
    #[serde(rename = "Large Transaction")]
    LargeTransaction,
}

text_enum!(AnomalyKind, "anomaly kind", {
    LargeTransaction => "Large Transaction",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    /// "<payee>: $<amount>"
    pub description: String,
    pub severity: Severity,
    pub date: NaiveDate,
    pub transaction_id: i64,
}

// ============================================================================
// RECURRING DETECTOR
// ============================================================================

/// Groups debit legs by payee; a payee seen often enough is reported as a
/// probable monthly subscription.
#[derive(Debug, Clone)]
pub struct RecurringDetector {
    pub lookback_months: u32,
    pub min_occurrences: u32,
}

impl RecurringDetector {
    pub const FREQUENCY_LABEL: &'static str = "Monthly?";

    pub fn from_settings(settings: &DetectionSettings) -> Self {
        RecurringDetector {
            lookback_months: settings.recurring_lookback_months,
            min_occurrences: settings.recurring_min_occurrences,
        }
    }

    pub fn detect(&self, conn: &Connection, as_of: NaiveDate) -> Result<Vec<Subscription>> {
        let since = months_before(as_of, self.lookback_months);

        let mut stmt = conn.prepare(
            "SELECT t.description, COUNT(*) AS cnt, AVG(s.amount), MAX(t.date)
             FROM transactions t
             JOIN splits s ON s.transaction_id = t.id
             WHERE s.amount > 0 AND t.date > ?1
             GROUP BY t.description
             HAVING cnt >= ?2
             ORDER BY t.description ASC",
        )?;

        let subscriptions = stmt
            .query_map(params![since, self.min_occurrences], |row| {
                let last_date: NaiveDate = row.get(3)?;
                Ok(Subscription {
                    name: row.get(0)?,
                    occurrences: row.get(1)?,
                    average_amount: real_to_major(row.get(2)?),
                    last_date,
                    frequency: Self::FREQUENCY_LABEL.to_string(),
                    next_due: months_after(last_date, 1),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(found = subscriptions.len(), %since, "recurring pattern scan");
        Ok(subscriptions)
    }
}

impl Default for RecurringDetector {
    fn default() -> Self {
        Self::from_settings(&DetectionSettings::default())
    }
}

// ============================================================================
// ANOMALY DETECTOR
// ============================================================================

/// Static threshold: every recent debit leg strictly above the threshold is
/// flagged. It does not adapt to the user's own spending history.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    pub threshold_cents: i64,
    pub lookback_months: u32,
}

impl AnomalyDetector {
    pub fn from_settings(settings: &DetectionSettings) -> Self {
        AnomalyDetector {
            threshold_cents: settings.anomaly_threshold_cents,
            lookback_months: settings.anomaly_lookback_months,
        }
    }

    /// Most recent first
    pub fn detect(&self, conn: &Connection, as_of: NaiveDate) -> Result<Vec<Anomaly>> {
        let since = months_before(as_of, self.lookback_months);

        let mut stmt = conn.prepare(
            "SELECT t.id, t.date, t.description, s.amount
             FROM transactions t
             JOIN splits s ON s.transaction_id = t.id
             WHERE s.amount > ?1 AND t.date > ?2
             ORDER BY t.date DESC, t.id DESC, s.id ASC",
        )?;

        let anomalies = stmt
            .query_map(params![self.threshold_cents.max(0), since], |row| {
                let description: String = row.get(2)?;
                let amount: i64 = row.get(3)?;
                Ok(Anomaly {
                    kind: AnomalyKind::LargeTransaction,
                    description: format!("{}: {}", description, format_major(amount)),
                    severity: Severity::Medium,
                    date: row.get(1)?,
                    transaction_id: row.get(0)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(found = anomalies.len(), threshold = self.threshold_cents, "anomaly scan");
        Ok(anomalies)
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::from_settings(&DetectionSettings::default())
    }
}

// ============================================================================
// LEDGER OPERATIONS
// ============================================================================

impl Ledger {
    pub fn detect_recurring_patterns(&self) -> Result<Vec<Subscription>> {
        self.detect_recurring_patterns_as_of(calendar::today())
    }

    pub fn detect_recurring_patterns_as_of(&self, as_of: NaiveDate) -> Result<Vec<Subscription>> {
        RecurringDetector::from_settings(self.settings()).detect(self.conn(), as_of)
    }

    pub fn detect_anomalies(&self) -> Result<Vec<Anomaly>> {
        self.detect_anomalies_as_of(calendar::today())
    }

    pub fn detect_anomalies_as_of(&self, as_of: NaiveDate) -> Result<Vec<Anomaly>> {
        AnomalyDetector::from_settings(self.settings()).detect(self.conn(), as_of)
    }
}
