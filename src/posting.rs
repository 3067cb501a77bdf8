// 📮 Transaction Engine - validate, post, update and delete balanced transactions
//
// Header and splits are always written inside one atomic unit, so no reader
// can observe a header without its legs. Validation runs before the unit is
// opened; an invalid transaction never touches storage.

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::{first_account_of, Ledger};
use crate::entities::{AccountType, Split, Transaction};
use crate::error::{LedgerError, Result};

// ============================================================================
// VALIDATION
// ============================================================================

/// Zero-sum check in exact integer arithmetic, plus per-leg sanity
pub fn validate_transaction(tx: &Transaction) -> Result<()> {
    if tx.splits.is_empty() {
        return Err(LedgerError::EmptyTransaction);
    }

    let total = tx.splits_total();
    if total != 0 {
        let sum = total.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        return Err(LedgerError::Unbalanced { sum });
    }

    for split in &tx.splits {
        if !split.exchange_rate.is_finite() || split.exchange_rate <= 0.0 {
            return Err(LedgerError::Validation(format!(
                "exchange rate must be positive, got {}",
                split.exchange_rate
            )));
        }
        if split.currency.trim().is_empty() {
            return Err(LedgerError::Validation("split currency is required".to_string()));
        }
    }

    Ok(())
}

// ============================================================================
// WRITE HELPERS (run inside an atomic unit)
// ============================================================================

/// Insert header and legs; returns the header id and the split ids in order
pub(crate) fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<(i64, Vec<i64>)> {
    conn.execute(
        "INSERT INTO transactions (date, description, note, status) VALUES (?1, ?2, ?3, ?4)",
        params![tx.date, tx.description, tx.note, tx.status],
    )?;
    let id = conn.last_insert_rowid();
    let split_ids = insert_splits(conn, id, &tx.splits)?;
    Ok((id, split_ids))
}

fn insert_splits(conn: &Connection, transaction_id: i64, splits: &[Split]) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "INSERT INTO splits (transaction_id, account_id, category_id, amount, currency, exchange_rate)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    let mut ids = Vec::with_capacity(splits.len());
    for split in splits {
        stmt.execute(params![
            transaction_id,
            split.account_id,
            split.category_id,
            split.amount,
            split.currency,
            split.exchange_rate,
        ])?;
        ids.push(conn.last_insert_rowid());
    }
    Ok(ids)
}

/// Write assigned identities back onto the caller's objects (after commit)
fn assign_ids(tx: &mut Transaction, id: i64, split_ids: Vec<i64>) {
    tx.id = Some(id);
    for (split, split_id) in tx.splits.iter_mut().zip(split_ids) {
        split.id = Some(split_id);
        split.transaction_id = Some(id);
    }
}

// ============================================================================
// QUERIES
// ============================================================================

/// Conjunctive search criteria; every bound is optional and inclusive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Case-insensitive substring of the description
    pub text: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Bounds on the transaction amount (sum of debit legs), minor units
    pub min_amount: Option<i64>,
    pub max_amount: Option<i64>,
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn text(text: impl Into<String>) -> Self {
        TransactionFilter {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn amount_between(mut self, min: i64, max: i64) -> Self {
        self.min_amount = Some(min);
        self.max_amount = Some(max);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            conditions.push("contains_ignore_case(description, ?)");
            values.push(Value::Text(text.to_string()));
        }
        if let Some(start) = self.start {
            conditions.push("date >= ?");
            values.push(Value::Text(start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = self.end {
            conditions.push("date <= ?");
            values.push(Value::Text(end.format("%Y-%m-%d").to_string()));
        }
        if let Some(min) = self.min_amount {
            conditions.push(DEBIT_TOTAL_GE);
            values.push(Value::Integer(min));
        }
        if let Some(max) = self.max_amount {
            conditions.push(DEBIT_TOTAL_LE);
            values.push(Value::Integer(max));
        }

        if conditions.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", conditions.join(" AND ")), values)
        }
    }
}

const DEBIT_TOTAL_GE: &str = "(SELECT COALESCE(SUM(amount), 0) FROM splits
     WHERE splits.transaction_id = transactions.id AND amount > 0) >= ?";
const DEBIT_TOTAL_LE: &str = "(SELECT COALESCE(SUM(amount), 0) FROM splits
     WHERE splits.transaction_id = transactions.id AND amount > 0) <= ?";

/// Load headers matching `where_sql` (newest first, at most `limit`) with
/// all of their splits in one joined query.
pub(crate) fn load_transactions(
    conn: &Connection,
    where_sql: &str,
    mut values: Vec<Value>,
    limit: Option<usize>,
) -> Result<Vec<Transaction>> {
    // LIMIT -1 means "no limit" to SQLite
    let limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)).unwrap_or(-1);
    values.push(Value::Integer(limit));

    let sql = format!(
        "SELECT t.id, t.date, t.description, t.note, t.status,
                s.id, s.account_id, s.category_id, s.amount, s.currency, s.exchange_rate
         FROM (SELECT id, date, description, note, status FROM transactions
               {where_sql}
               ORDER BY date DESC, id DESC
               LIMIT ?) t
         LEFT JOIN splits s ON s.transaction_id = t.id
         ORDER BY t.date DESC, t.id DESC, s.id ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(values))?;

    let mut transactions: Vec<Transaction> = Vec::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        if transactions.last().and_then(|tx| tx.id) != Some(id) {
            transactions.push(Transaction {
                id: Some(id),
                date: row.get(1)?,
                description: row.get(2)?,
                note: row.get(3)?,
                status: row.get(4)?,
                splits: Vec::new(),
            });
        }

        let split_id: Option<i64> = row.get(5)?;
        if let (Some(split_id), Some(tx)) = (split_id, transactions.last_mut()) {
            tx.splits.push(Split {
                id: Some(split_id),
                transaction_id: Some(id),
                account_id: row.get(6)?,
                category_id: row.get(7)?,
                amount: row.get(8)?,
                currency: row.get(9)?,
                exchange_rate: row.get(10)?,
            });
        }
    }

    Ok(transactions)
}

// ============================================================================
// SIMPLE ENTRY (two-leg income/expense form)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Expense,
    Income,
}

/// One-amount entry against a funding account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleEntry {
    pub date: NaiveDate,
    pub description: String,
    #[serde(default)]
    pub note: String,
    /// Positive amount in minor units
    pub amount_cents: i64,
    /// Asset account paid from (expense) or into (income)
    pub account_id: i64,
    #[serde(default)]
    pub category_id: Option<i64>,
    pub kind: EntryKind,
}

// ============================================================================
// LEDGER OPERATIONS
// ============================================================================

impl Ledger {
    /// Post a balanced transaction as one atomic unit. On success the header
    /// id and every split's ids are written back into `tx`.
    pub fn post_transaction(&mut self, tx: &mut Transaction) -> Result<i64> {
        validate_transaction(tx)?;

        let (id, split_ids) = self.atomic(|conn| insert_transaction(conn, tx))?;
        assign_ids(tx, id, split_ids);

        info!(id, legs = tx.splits.len(), description = %tx.description, "posted transaction");
        Ok(id)
    }

    /// Replace header fields and the whole split set of an existing
    /// transaction. The new split set is re-validated first.
    pub fn update_transaction(&mut self, tx: &mut Transaction) -> Result<()> {
        let id = tx
            .id
            .ok_or_else(|| LedgerError::Validation("transaction has no id".to_string()))?;
        validate_transaction(tx)?;

        let split_ids = self.atomic(|conn| {
            let changed = conn.execute(
                "UPDATE transactions SET date = ?1, description = ?2, note = ?3, status = ?4
                 WHERE id = ?5",
                params![tx.date, tx.description, tx.note, tx.status, id],
            )?;
            if changed == 0 {
                return Err(LedgerError::not_found("transaction", id));
            }

            conn.execute("DELETE FROM splits WHERE transaction_id = ?1", [id])?;
            insert_splits(conn, id, &tx.splits)
        })?;
        assign_ids(tx, id, split_ids);

        info!(id, "updated transaction");
        Ok(())
    }

    /// Remove a transaction; its splits go with it (ON DELETE CASCADE)
    pub fn delete_transaction(&mut self, id: i64) -> Result<()> {
        self.atomic(|conn| {
            let removed = conn.execute("DELETE FROM transactions WHERE id = ?1", [id])?;
            if removed == 0 {
                return Err(LedgerError::not_found("transaction", id));
            }
            Ok(())
        })?;

        info!(id, "deleted transaction");
        Ok(())
    }

    /// Newest first (date, then id), each with its full split set
    pub fn get_recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>> {
        load_transactions(self.conn(), "", Vec::new(), Some(limit))
    }

    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let mut found = load_transactions(
            self.conn(),
            "WHERE id = ?",
            vec![Value::Integer(id)],
            Some(1),
        )?;
        Ok(found.pop())
    }

    pub fn search_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let (where_sql, values) = filter.where_clause();
        let found = load_transactions(self.conn(), &where_sql, values, filter.limit)?;
        debug!(matches = found.len(), "searched transactions");
        Ok(found)
    }

    /// Every transaction, newest first
    pub fn all_transactions(&self) -> Result<Vec<Transaction>> {
        load_transactions(self.conn(), "", Vec::new(), None)
    }

    /// Build and post the two-leg transaction for a simple income/expense
    /// entry. Matching rules may replace the payee, note and category.
    pub fn record_simple_entry(&mut self, entry: &SimpleEntry) -> Result<Transaction> {
        if entry.amount_cents <= 0 {
            return Err(LedgerError::Validation(
                "entry amount must be positive".to_string(),
            ));
        }
        if entry.description.trim().is_empty() {
            return Err(LedgerError::Validation("description is required".to_string()));
        }

        let counter_type = match entry.kind {
            EntryKind::Expense => AccountType::Expense,
            EntryKind::Income => AccountType::Income,
        };
        let counter = first_account_of(self.conn(), &[counter_type])?.ok_or_else(|| {
            LedgerError::Validation(format!("no {counter_type} account to post against"))
        })?;
        let counter_id = counter
            .id
            .ok_or_else(|| LedgerError::not_found("account", counter.name.clone()))?;

        let enrichment = self.enrich_transaction(&entry.description)?;
        let category_id = enrichment.category_id.or(entry.category_id);
        let note = enrichment.note.unwrap_or_else(|| entry.note.clone());

        let (asset_leg, counter_leg) = match entry.kind {
            EntryKind::Expense => (-entry.amount_cents, entry.amount_cents),
            EntryKind::Income => (entry.amount_cents, -entry.amount_cents),
        };

        let mut counter_split = Split::new(counter_id, counter_leg);
        counter_split.category_id = category_id;

        let mut tx = Transaction::new(entry.date, enrichment.payee)
            .with_note(note)
            .with_split(Split::new(entry.account_id, asset_leg))
            .with_split(counter_split);

        self.post_transaction(&mut tx)?;
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Account, Category, TransactionStatus};
    use crate::rules::Rule;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        ledger: Ledger,
        checking: i64,
        expenses: i64,
        salary: i64,
        food: i64,
    }

    fn fixture() -> Fixture {
        let ledger = Ledger::open_in_memory_empty().unwrap();
        let checking = ledger
            .create_account(&mut Account::new("Checking", AccountType::Bank))
            .unwrap();
        let expenses = ledger
            .create_account(&mut Account::new("Expenses", AccountType::Expense))
            .unwrap();
        let salary = ledger
            .create_account(&mut Account::new("Salary", AccountType::Income))
            .unwrap();
        let food = ledger.create_category(&mut Category::new("Food")).unwrap();
        Fixture {
            ledger,
            checking,
            expenses,
            salary,
            food,
        }
    }

    fn purchase(f: &Fixture, on: NaiveDate, payee: &str, cents: i64) -> Transaction {
        Transaction::new(on, payee)
            .with_split(Split::new(f.checking, -cents))
            .with_split(Split::new(f.expenses, cents).with_category(f.food))
    }

    #[test]
    fn test_post_assigns_ids_to_header_and_splits() {
        let mut f = fixture();
        let mut tx = purchase(&f, date(2024, 1, 5), "Grocery Store", 4567);

        let id = f.ledger.post_transaction(&mut tx).unwrap();

        assert_eq!(tx.id, Some(id));
        assert!(tx.splits.iter().all(|s| s.id.is_some()));
        assert!(tx.splits.iter().all(|s| s.transaction_id == Some(id)));

        let stored = f.ledger.get_transaction(id).unwrap().unwrap();
        assert_eq!(stored, tx);
        assert_eq!(stored.splits_total(), 0);
    }

    #[test]
    fn test_unbalanced_transaction_writes_nothing() {
        let mut f = fixture();
        let mut tx = Transaction::new(date(2024, 1, 5), "Broken")
            .with_split(Split::new(f.checking, -10000))
            .with_split(Split::new(f.expenses, 5000));

        let err = f.ledger.post_transaction(&mut tx).unwrap_err();
        assert!(matches!(err, LedgerError::Unbalanced { sum: -5000 }));
        assert_eq!(tx.id, None);
        assert!(f.ledger.all_transactions().unwrap().is_empty());

        let splits: i64 = f
            .ledger
            .conn()
            .query_row("SELECT COUNT(*) FROM splits", [], |r| r.get(0))
            .unwrap();
        assert_eq!(splits, 0);
    }

    #[test]
    fn test_empty_and_bad_rate_are_rejected() {
        let mut f = fixture();
        let mut empty = Transaction::new(date(2024, 1, 5), "Nothing");
        assert!(matches!(
            f.ledger.post_transaction(&mut empty),
            Err(LedgerError::EmptyTransaction)
        ));

        let mut bad_rate = Transaction::new(date(2024, 1, 5), "FX")
            .with_split(Split::new(f.checking, -100).with_currency("EUR", 0.0))
            .with_split(Split::new(f.expenses, 100));
        assert!(f.ledger.post_transaction(&mut bad_rate).unwrap_err().is_validation());
    }

    #[test]
    fn test_failed_insert_rolls_back_header() {
        let mut f = fixture();
        // Account 999 does not exist: the second leg violates the foreign key
        let mut tx = Transaction::new(date(2024, 1, 5), "Ghost")
            .with_split(Split::new(f.checking, -100))
            .with_split(Split::new(999, 100));

        let err = f.ledger.post_transaction(&mut tx).unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));
        assert!(f.ledger.all_transactions().unwrap().is_empty());
    }

    #[test]
    fn test_update_replaces_splits_atomically() {
        let mut f = fixture();
        let mut tx = purchase(&f, date(2024, 1, 5), "Grocery Store", 4567);
        f.ledger.post_transaction(&mut tx).unwrap();

        tx.description = "Grocery Store #2".to_string();
        tx.status = TransactionStatus::Cleared;
        tx.splits = vec![
            Split::new(f.checking, -5000),
            Split::new(f.expenses, 5000).with_category(f.food),
        ];
        f.ledger.update_transaction(&mut tx).unwrap();

        let stored = f.ledger.get_transaction(tx.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.description, "Grocery Store #2");
        assert_eq!(stored.status, TransactionStatus::Cleared);
        assert_eq!(stored.amount_cents(), 5000);
        assert_eq!(stored.splits.len(), 2);

        // An unbalanced edit leaves the stored version untouched
        tx.splits[0].amount = -1;
        assert!(f.ledger.update_transaction(&mut tx).is_err());
        let unchanged = f.ledger.get_transaction(tx.id.unwrap()).unwrap().unwrap();
        assert_eq!(unchanged.amount_cents(), 5000);
    }

    #[test]
    fn test_update_and_delete_missing_transaction() {
        let mut f = fixture();
        let mut tx = purchase(&f, date(2024, 1, 5), "Nobody", 100);
        tx.id = Some(77);
        assert!(matches!(
            f.ledger.update_transaction(&mut tx),
            Err(LedgerError::NotFound { .. })
        ));
        assert!(matches!(
            f.ledger.delete_transaction(77),
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_cascades_to_splits() {
        let mut f = fixture();
        let mut tx = purchase(&f, date(2024, 1, 5), "Cinema", 1500);
        let id = f.ledger.post_transaction(&mut tx).unwrap();

        f.ledger.delete_transaction(id).unwrap();

        assert!(f.ledger.get_transaction(id).unwrap().is_none());
        let splits: i64 = f
            .ledger
            .conn()
            .query_row("SELECT COUNT(*) FROM splits", [], |r| r.get(0))
            .unwrap();
        assert_eq!(splits, 0);
    }

    #[test]
    fn test_recent_transactions_order_and_idempotence() {
        let mut f = fixture();
        for (day, payee) in [(3, "B"), (1, "A"), (3, "C"), (2, "D")] {
            let mut tx = purchase(&f, date(2024, 2, day), payee, 100);
            f.ledger.post_transaction(&mut tx).unwrap();
        }

        let recent = f.ledger.get_recent_transactions(3).unwrap();
        let payees: Vec<&str> = recent.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(payees, vec!["C", "B", "D"]);
        assert!(recent.iter().all(|t| t.splits.len() == 2));

        assert_eq!(recent, f.ledger.get_recent_transactions(3).unwrap());
    }

    #[test]
    fn test_search_filters_are_conjunctive() {
        let mut f = fixture();
        for (day, payee, cents) in [
            (5, "Grocery Store", 4567),
            (10, "GROCERY outlet", 12000),
            (20, "Gas Station", 3000),
        ] {
            let mut tx = purchase(&f, date(2024, 3, day), payee, cents);
            f.ledger.post_transaction(&mut tx).unwrap();
        }

        let by_text = f
            .ledger
            .search_transactions(&TransactionFilter::text("grocery"))
            .unwrap();
        assert_eq!(by_text.len(), 2);

        let mut cafe = purchase(&f, date(2024, 3, 12), "CAFÉ ÉCLAIR", 450);
        f.ledger.post_transaction(&mut cafe).unwrap();
        let accented = f
            .ledger
            .search_transactions(&TransactionFilter::text("café"))
            .unwrap();
        assert_eq!(accented.len(), 1);
        assert_eq!(accented[0].description, "CAFÉ ÉCLAIR");

        let narrowed = f
            .ledger
            .search_transactions(
                &TransactionFilter::text("grocery")
                    .between(date(2024, 3, 1), date(2024, 3, 31))
                    .amount_between(4567, 10000),
            )
            .unwrap();
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].description, "Grocery Store");

        // Inclusive date bounds
        let on_day = f
            .ledger
            .search_transactions(
                &TransactionFilter::default().between(date(2024, 3, 20), date(2024, 3, 20)),
            )
            .unwrap();
        assert_eq!(on_day.len(), 1);

        let limited = f
            .ledger
            .search_transactions(&TransactionFilter::default().limit(2))
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_simple_expense_entry_uses_rules() {
        let mut f = fixture();
        let mut rule = Rule::new("netflix")
            .with_payee("Netflix")
            .with_note("subscription");
        rule.target_category_id = Some(f.food);
        f.ledger.create_rule(&mut rule).unwrap();

        let tx = f
            .ledger
            .record_simple_entry(&SimpleEntry {
                date: date(2024, 4, 1),
                description: "NETFLIX.COM 1234".to_string(),
                note: String::new(),
                amount_cents: 1599,
                account_id: f.checking,
                category_id: None,
                kind: EntryKind::Expense,
            })
            .unwrap();

        assert_eq!(tx.description, "Netflix");
        assert_eq!(tx.note, "subscription");
        assert_eq!(tx.splits[0].account_id, f.checking);
        assert_eq!(tx.splits[0].amount, -1599);
        assert_eq!(tx.splits[1].account_id, f.expenses);
        assert_eq!(tx.splits[1].category_id, Some(f.food));
    }

    #[test]
    fn test_simple_income_entry() {
        let mut f = fixture();
        let tx = f
            .ledger
            .record_simple_entry(&SimpleEntry {
                date: date(2024, 4, 1),
                description: "Paycheck".to_string(),
                note: "April".to_string(),
                amount_cents: 300000,
                account_id: f.checking,
                category_id: None,
                kind: EntryKind::Income,
            })
            .unwrap();

        assert_eq!(tx.description, "Paycheck");
        assert_eq!(tx.note, "April");
        assert_eq!(tx.splits[0].amount, 300000);
        assert_eq!(tx.splits[1].account_id, f.salary);
        assert_eq!(tx.splits[1].amount, -300000);
    }

    #[test]
    fn test_simple_entry_rejects_non_positive_amount() {
        let mut f = fixture();
        let err = f
            .ledger
            .record_simple_entry(&SimpleEntry {
                date: date(2024, 4, 1),
                description: "Refund".to_string(),
                note: String::new(),
                amount_cents: 0,
                account_id: f.checking,
                category_id: None,
                kind: EntryKind::Expense,
            })
            .unwrap_err();
        assert!(err.is_validation());
    }
}
