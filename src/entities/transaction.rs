// 🧾 Transaction Entity - one economic event, recorded as balanced splits
//
// Sign convention for split amounts (minor units):
//   positive = debit  (increases Asset / Expense)
//   negative = credit (increases Liability / Income / Equity)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::account::default_currency;
use super::BASE_CURRENCY;

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransactionStatus {
    #[default]
    Pending,
    Cleared,
    Reconciled,
}

text_enum!(TransactionStatus, "transaction status", {
    Pending => "Pending",
    Cleared => "Cleared",
    Reconciled => "Reconciled",
});

// ============================================================================
// SPLIT (LEG)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub id: Option<i64>,

    /// Owning transaction, set by the posting engine
    pub transaction_id: Option<i64>,

    pub account_id: i64,

    #[serde(default)]
    pub category_id: Option<i64>,

    /// Signed amount in minor units
    pub amount: i64,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Multiplier into the base currency, applied only when aggregating
    #[serde(default = "default_exchange_rate")]
    pub exchange_rate: f64,
}

fn default_exchange_rate() -> f64 {
    1.0
}

impl Split {
    pub fn new(account_id: i64, amount: i64) -> Self {
        Split {
            id: None,
            transaction_id: None,
            account_id,
            category_id: None,
            amount,
            currency: BASE_CURRENCY.to_string(),
            exchange_rate: 1.0,
        }
    }

    /// Builder pattern: tag the leg with a category
    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Builder pattern: foreign-currency leg
    pub fn with_currency(mut self, currency: impl Into<String>, exchange_rate: f64) -> Self {
        self.currency = currency.into();
        self.exchange_rate = exchange_rate;
        self
    }

    pub fn is_debit(&self) -> bool {
        self.amount > 0
    }
}

// ============================================================================
// TRANSACTION HEADER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<i64>,

    pub date: NaiveDate,

    /// Payee as shown to the user
    pub description: String,

    #[serde(default)]
    pub note: String,

    #[serde(default)]
    pub status: TransactionStatus,

    /// Ordered legs; must sum to zero to be posted
    pub splits: Vec<Split>,
}

impl Transaction {
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Transaction {
            id: None,
            date,
            description: description.into(),
            note: String::new(),
            status: TransactionStatus::Pending,
            splits: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_split(mut self, split: Split) -> Self {
        self.splits.push(split);
        self
    }

    /// Exact integer sum of all legs (0 for a balanced transaction).
    /// Widened so that hostile input cannot wrap around to zero.
    pub fn splits_total(&self) -> i128 {
        self.splits.iter().map(|s| s.amount as i128).sum()
    }

    pub fn is_balanced(&self) -> bool {
        !self.splits.is_empty() && self.splits_total() == 0
    }

    /// Displayed amount: the sum of the debit legs, in minor units
    pub fn amount_cents(&self) -> i64 {
        self.splits
            .iter()
            .filter(|s| s.is_debit())
            .fold(0i64, |total, s| total.saturating_add(s.amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_balanced_transaction() {
        let tx = Transaction::new(date(2024, 1, 5), "Grocery Store")
            .with_split(Split::new(1, -4567))
            .with_split(Split::new(2, 4567).with_category(3));

        assert!(tx.is_balanced());
        assert_eq!(tx.splits_total(), 0);
        assert_eq!(tx.amount_cents(), 4567);
        assert_eq!(tx.status, TransactionStatus::Pending);
    }

    #[test]
    fn test_unbalanced_and_empty_transactions() {
        let tx = Transaction::new(date(2024, 1, 5), "Broken")
            .with_split(Split::new(1, -10000))
            .with_split(Split::new(2, 5000));
        assert!(!tx.is_balanced());
        assert_eq!(tx.splits_total(), -5000);

        let empty = Transaction::new(date(2024, 1, 5), "Empty");
        assert!(!empty.is_balanced());
    }

    #[test]
    fn test_split_total_does_not_wrap() {
        let tx = Transaction::new(date(2024, 1, 5), "Overflow")
            .with_split(Split::new(1, i64::MAX))
            .with_split(Split::new(2, i64::MAX))
            .with_split(Split::new(3, 2));
        assert!(!tx.is_balanced());
    }

    #[test]
    fn test_status_text() {
        assert_eq!(TransactionStatus::Reconciled.to_string(), "Reconciled");
        assert_eq!(
            "Cleared".parse::<TransactionStatus>().unwrap(),
            TransactionStatus::Cleared
        );
        assert!("Void".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_transaction_serializes_date_as_iso() {
        let tx = Transaction::new(date(2024, 1, 5), "Coffee");
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["date"], "2024-01-05");
        assert_eq!(json["status"], "Pending");
    }
}
