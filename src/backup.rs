// 💾 JSON Backup - full export and all-or-nothing restore
//
// Format: { "accounts": [...], "categories": [...], "transactions": [...] }
// with splits embedded in each transaction. Restoring merges into the target
// store: accounts and categories are matched by name, and every identity in
// the file is remapped to the identity it has in the target store.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{
    find_account_by_name, find_category_by_name, insert_account, insert_category, Ledger,
};
use crate::entities::{Account, Category, Transaction};
use crate::error::{LedgerError, Result};
use crate::posting::{insert_transaction, validate_transaction};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupData {
    pub accounts: Vec<Account>,
    pub categories: Vec<Category>,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestoreSummary {
    pub accounts_created: usize,
    pub categories_created: usize,
    pub transactions_imported: usize,
}

/// Backup id → target store id
type IdMap = HashMap<i64, i64>;

fn remap(map: &IdMap, entity: &'static str, id: i64) -> Result<i64> {
    map.get(&id).copied().ok_or_else(|| {
        LedgerError::Validation(format!("backup references unknown {entity} {id}"))
    })
}

fn restore_accounts(
    conn: &Connection,
    accounts: &[Account],
    summary: &mut RestoreSummary,
) -> Result<IdMap> {
    let mut ids = IdMap::new();
    for account in accounts {
        let target = match find_account_by_name(conn, &account.name)?.and_then(|a| a.id) {
            Some(existing) => existing,
            None => {
                summary.accounts_created += 1;
                insert_account(conn, &mut Account { id: None, ..account.clone() })?
            }
        };
        if let Some(old) = account.id {
            ids.insert(old, target);
        }
    }
    Ok(ids)
}

fn restore_categories(
    conn: &Connection,
    categories: &[Category],
    summary: &mut RestoreSummary,
) -> Result<IdMap> {
    let mut ids = IdMap::new();
    let mut created: Vec<(i64, Option<i64>)> = Vec::new();

    // Parents are linked in a second pass, once every category has its new id
    for category in categories {
        let target = match find_category_by_name(conn, &category.name)?.and_then(|c| c.id) {
            Some(existing) => existing,
            None => {
                let mut fresh = Category {
                    id: None,
                    parent_id: None,
                    ..category.clone()
                };
                let id = insert_category(conn, &mut fresh)?;
                created.push((id, category.parent_id));
                summary.categories_created += 1;
                id
            }
        };
        if let Some(old) = category.id {
            ids.insert(old, target);
        }
    }

    for (id, old_parent) in created {
        if let Some(old_parent) = old_parent {
            let parent = remap(&ids, "category", old_parent)?;
            conn.execute(
                "UPDATE categories SET parent_id = ?1 WHERE id = ?2",
                params![parent, id],
            )?;
        }
    }

    Ok(ids)
}

impl Ledger {
    /// Snapshot of the full current state
    pub fn export_backup(&self) -> Result<BackupData> {
        let mut transactions = self.all_transactions()?;
        // Oldest first, so a restore assigns ids in posting order
        transactions.reverse();

        Ok(BackupData {
            accounts: self.list_accounts()?,
            categories: self.list_categories()?,
            transactions,
        })
    }

    pub fn export_json(&self, path: &Path) -> Result<()> {
        let data = self.export_backup()?;
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &data)?;
        writer.flush()?;

        info!(
            file = %path.display(),
            accounts = data.accounts.len(),
            transactions = data.transactions.len(),
            "exported backup"
        );
        Ok(())
    }

    /// Merge a backup into this store. Every write happens inside one atomic
    /// unit: if any transaction is invalid or any insert fails, nothing from
    /// the backup is kept.
    pub fn restore_backup(&mut self, data: &BackupData) -> Result<RestoreSummary> {
        self.atomic(|conn| {
            let mut summary = RestoreSummary::default();
            let account_ids = restore_accounts(conn, &data.accounts, &mut summary)?;
            let category_ids = restore_categories(conn, &data.categories, &mut summary)?;

            for original in &data.transactions {
                validate_transaction(original)?;

                let mut tx = original.clone();
                tx.id = None;
                for split in &mut tx.splits {
                    split.id = None;
                    split.transaction_id = None;
                    split.account_id = remap(&account_ids, "account", split.account_id)?;
                    split.category_id = split
                        .category_id
                        .map(|id| remap(&category_ids, "category", id))
                        .transpose()?;
                }

                insert_transaction(conn, &tx)?;
                summary.transactions_imported += 1;
            }

            Ok(summary)
        })
    }

    pub fn import_json(&mut self, path: &Path) -> Result<RestoreSummary> {
        let data: BackupData = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        let summary = self.restore_backup(&data)?;

        info!(
            file = %path.display(),
            accounts = summary.accounts_created,
            categories = summary.categories_created,
            transactions = summary.transactions_imported,
            "restored backup"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AccountType, Split};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn populated() -> Ledger {
        let mut ledger = Ledger::open_in_memory_empty().unwrap();
        let checking = ledger
            .create_account(&mut Account::new("Checking", AccountType::Bank))
            .unwrap();
        let expenses = ledger
            .create_account(&mut Account::new("Expenses", AccountType::Expense))
            .unwrap();
        let food = ledger.create_category(&mut Category::new("Food")).unwrap();
        ledger
            .create_category(&mut Category::new("Groceries").with_parent(food))
            .unwrap();

        for (day, payee, cents) in [(1, "Market", 4567), (2, "Deli", 1250)] {
            let mut tx = Transaction::new(date(2024, 1, day), payee)
                .with_note("weekly")
                .with_split(Split::new(checking, -cents))
                .with_split(Split::new(expenses, cents).with_category(food));
            ledger.post_transaction(&mut tx).unwrap();
        }
        ledger
    }

    type Leg = (String, i64, Option<String>);

    /// Transactions with identities replaced by names, for comparing stores
    fn shape(ledger: &Ledger) -> Vec<(String, NaiveDate, Vec<Leg>)> {
        let accounts = ledger.list_accounts().unwrap();
        let categories = ledger.list_categories().unwrap();
        let account_name = |id: i64| {
            let account = accounts.iter().find(|a| a.id == Some(id)).unwrap();
            account.name.clone()
        };
        let category_name = |id: i64| {
            let category = categories.iter().find(|c| c.id == Some(id)).unwrap();
            category.name.clone()
        };

        ledger
            .all_transactions()
            .unwrap()
            .into_iter()
            .map(|tx| {
                let legs = tx
                    .splits
                    .iter()
                    .map(|s| {
                        let category = s.category_id.map(&category_name);
                        (account_name(s.account_id), s.amount, category)
                    })
                    .collect();
                (tx.description, tx.date, legs)
            })
            .collect()
    }

    #[test]
    fn test_round_trip_into_empty_store() {
        let source = populated();
        let data = source.export_backup().unwrap();

        let mut target = Ledger::open_in_memory_empty().unwrap();
        let summary = target.restore_backup(&data).unwrap();

        assert_eq!(summary.accounts_created, 2);
        assert_eq!(summary.categories_created, 2);
        assert_eq!(summary.transactions_imported, 2);
        assert_eq!(shape(&target), shape(&source));

        let groceries = target.get_category_by_name("Groceries").unwrap().unwrap();
        let food = target.get_category_by_name("Food").unwrap().unwrap();
        assert_eq!(groceries.parent_id, food.id);
    }

    #[test]
    fn test_restore_remaps_to_existing_accounts() {
        let source = populated();
        let data = source.export_backup().unwrap();

        // Target already has different accounts, one sharing a name
        let mut target = Ledger::open_in_memory_empty().unwrap();
        target
            .create_account(&mut Account::new("Cash", AccountType::Cash))
            .unwrap();
        let existing = target
            .create_account(&mut Account::new("Checking", AccountType::Bank))
            .unwrap();

        let summary = target.restore_backup(&data).unwrap();
        assert_eq!(summary.accounts_created, 1);
        assert_eq!(target.list_accounts().unwrap().len(), 3);
        assert_eq!(target.account_balance_cents(existing).unwrap(), -(4567 + 1250));
    }

    #[test]
    fn test_invalid_transaction_aborts_whole_restore() {
        let source = populated();
        let mut data = source.export_backup().unwrap();
        data.transactions[1].splits[0].amount += 1;

        let mut target = Ledger::open_in_memory_empty().unwrap();
        let err = target.restore_backup(&data).unwrap_err();

        assert!(matches!(err, LedgerError::Unbalanced { .. }));
        assert!(target.list_accounts().unwrap().is_empty());
        assert!(target.list_categories().unwrap().is_empty());
        assert!(target.all_transactions().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_account_reference_is_rejected() {
        let source = populated();
        let mut data = source.export_backup().unwrap();
        data.accounts.clear();

        let mut target = Ledger::open_in_memory_empty().unwrap();
        let err = target.restore_backup(&data).unwrap_err();
        assert!(err.is_validation());
        assert!(target.all_transactions().unwrap().is_empty());
    }

    #[test]
    fn test_backup_json_shape() {
        let data = populated().export_backup().unwrap();
        let json = serde_json::to_value(&data).unwrap();

        assert_eq!(json["accounts"][0]["type"], "Bank");
        assert_eq!(json["transactions"][0]["description"], "Market");
        assert_eq!(json["transactions"][0]["splits"][0]["amount"], -4567);
    }
}
