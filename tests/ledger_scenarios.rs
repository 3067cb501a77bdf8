use chrono::NaiveDate;
use personal_ledger::{
    Budget, CsvImportOptions, Ledger, LedgerConfig, LedgerError, Severity, Split, Transaction,
};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn open_file_ledger(path: &Path) -> Ledger {
    let config = LedgerConfig {
        db_path: path.to_path_buf(),
        ..LedgerConfig::default()
    };
    Ledger::open(&config).expect("open ledger")
}

fn account_id(ledger: &Ledger, name: &str) -> i64 {
    ledger
        .get_account_by_name(name)
        .expect("lookup account")
        .and_then(|a| a.id)
        .expect("seeded account")
}

fn category_id(ledger: &Ledger, name: &str) -> i64 {
    ledger
        .get_category_by_name(name)
        .expect("lookup category")
        .and_then(|c| c.id)
        .expect("seeded category")
}

fn expense(ledger: &mut Ledger, on: NaiveDate, payee: &str, cents: i64) -> i64 {
    let checking = account_id(ledger, "Checking");
    let expenses = account_id(ledger, "Expenses");
    let food = category_id(ledger, "Food");
    let mut tx = Transaction::new(on, payee)
        .with_split(Split::new(checking, -cents))
        .with_split(Split::new(expenses, cents).with_category(food));
    ledger.post_transaction(&mut tx).expect("post expense")
}

#[test]
fn balanced_posting_moves_both_balances() {
    let mut ledger = Ledger::open_in_memory().expect("open ledger");
    let a = account_id(&ledger, "Checking");
    let b = account_id(&ledger, "Savings");

    let mut tx = Transaction::new(date(2024, 1, 5), "Transfer")
        .with_split(Split::new(a, -15000))
        .with_split(Split::new(b, 15000));
    ledger.post_transaction(&mut tx).expect("post transfer");

    assert_eq!(ledger.account_balance(a).expect("balance"), -150.00);
    assert_eq!(ledger.account_balance(b).expect("balance"), 150.00);
    assert_eq!(ledger.account_balance(account_id(&ledger, "Cash")).expect("balance"), 0.0);

    let stored = ledger
        .get_transaction(tx.id.expect("assigned id"))
        .expect("read back")
        .expect("transaction exists");
    assert_eq!(stored.splits_total(), 0);
}

#[test]
fn unbalanced_posting_persists_nothing() {
    let mut ledger = Ledger::open_in_memory().expect("open ledger");
    let a = account_id(&ledger, "Checking");
    let b = account_id(&ledger, "Savings");

    let mut tx = Transaction::new(date(2024, 1, 5), "Broken")
        .with_split(Split::new(a, -10000))
        .with_split(Split::new(b, 5000));
    let err = ledger.post_transaction(&mut tx).expect_err("must be rejected");

    assert!(matches!(err, LedgerError::Unbalanced { .. }));
    assert!(ledger.get_recent_transactions(10).expect("read").is_empty());
    assert_eq!(ledger.account_balance_cents(a).expect("balance"), 0);
    assert_eq!(ledger.account_balance_cents(b).expect("balance"), 0);
}

#[test]
fn budget_overrun_reports_negative_remaining() {
    let mut ledger = Ledger::open_in_memory().expect("open ledger");
    let food = category_id(&ledger, "Food");
    ledger
        .create_budget(&mut Budget::monthly(food, 50000))
        .expect("create budget");

    expense(&mut ledger, date(2024, 5, 2), "Market", 40000);
    expense(&mut ledger, date(2024, 5, 28), "Restaurant", 20000);

    let progress = ledger.budget_progress(5, 2024).expect("progress");
    let food_budget = progress
        .iter()
        .find(|p| p.category_id == food)
        .expect("food budget");
    assert_eq!(food_budget.spent, 600.00);
    assert_eq!(food_budget.remaining, -100.00);
    assert_eq!(food_budget.percent, 1.2);
}

#[test]
fn csv_row_imports_as_two_legs() {
    let dir = tempdir().expect("tempdir");
    let csv_path = dir.path().join("bank.csv");
    fs::write(
        &csv_path,
        "Date,Description,Amount,Category,Account,Note\n2024-01-05,Grocery Store,45.67,Food,Checking,\n",
    )
    .expect("write csv");

    let mut ledger = open_file_ledger(&dir.path().join("ledger.db"));
    let report = ledger
        .import_csv(&csv_path, &CsvImportOptions::default())
        .expect("import csv");
    assert_eq!(report.imported, 1);
    assert_eq!(report.skipped, 0);

    let checking = account_id(&ledger, "Checking");
    let expenses = account_id(&ledger, "Expenses");
    let food = category_id(&ledger, "Food");

    let all = ledger.all_transactions().expect("read");
    assert_eq!(all.len(), 1);
    let legs: Vec<(i64, i64, Option<i64>)> = all[0]
        .splits
        .iter()
        .map(|s| (s.account_id, s.amount, s.category_id))
        .collect();
    assert_eq!(legs, vec![(checking, -4567, None), (expenses, 4567, Some(food))]);
}

#[test]
fn large_recent_posting_is_flagged() {
    let mut ledger = Ledger::open_in_memory().expect("open ledger");
    expense(&mut ledger, date(2024, 6, 10), "Electronics Shop", 25000);

    let anomalies = ledger
        .detect_anomalies_as_of(date(2024, 6, 20))
        .expect("detect anomalies");
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].kind.as_str(), "Large Transaction");
    assert_eq!(anomalies[0].severity, Severity::Medium);
}

#[test]
fn monthly_payee_is_detected_as_subscription() {
    let mut ledger = Ledger::open_in_memory().expect("open ledger");
    for on in [
        date(2024, 1, 28),
        date(2024, 2, 28),
        date(2024, 3, 28),
        date(2024, 4, 12),
    ] {
        expense(&mut ledger, on, "Streaming Co", 1200);
    }

    let subs = ledger
        .detect_recurring_patterns_as_of(date(2024, 4, 20))
        .expect("detect recurring");
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].name, "Streaming Co");
    assert!((subs[0].average_amount - 12.00).abs() < 1e-9);
    assert_eq!(subs[0].next_due, date(2024, 5, 12));
}

#[test]
fn recent_transactions_are_stable_between_reads() {
    let mut ledger = Ledger::open_in_memory().expect("open ledger");
    expense(&mut ledger, date(2024, 2, 1), "A", 100);
    expense(&mut ledger, date(2024, 2, 1), "B", 200);
    expense(&mut ledger, date(2024, 1, 1), "C", 300);

    let first = ledger.get_recent_transactions(10).expect("first read");
    let second = ledger.get_recent_transactions(10).expect("second read");
    assert_eq!(first, second);
    assert_eq!(first[0].description, "B");
}

#[test]
fn json_backup_round_trips_into_empty_store() {
    let dir = tempdir().expect("tempdir");
    let backup_path = dir.path().join("backup.json");

    let mut source = open_file_ledger(&dir.path().join("source.db"));
    expense(&mut source, date(2024, 3, 1), "Market", 4567);
    expense(&mut source, date(2024, 3, 2), "Bakery", 320);
    source.export_json(&backup_path).expect("export");

    let mut target = Ledger::open_in_memory_empty().expect("open empty ledger");
    let summary = target.import_json(&backup_path).expect("import");
    assert_eq!(summary.transactions_imported, 2);

    let names = |ledger: &Ledger| -> Vec<String> {
        ledger
            .list_accounts()
            .expect("accounts")
            .into_iter()
            .map(|a| a.name)
            .collect()
    };
    assert_eq!(names(&target), names(&source));

    let strip = |ledger: &Ledger| -> Vec<(NaiveDate, String, i64)> {
        ledger
            .all_transactions()
            .expect("transactions")
            .into_iter()
            .map(|tx| (tx.date, tx.description.clone(), tx.amount_cents()))
            .collect()
    };
    assert_eq!(strip(&target), strip(&source));

    let checking = account_id(&target, "Checking");
    assert_eq!(target.account_balance_cents(checking).expect("balance"), -4887);
}

#[test]
fn reopening_a_file_store_keeps_data_and_does_not_reseed() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("ledger.db");

    {
        let mut ledger = open_file_ledger(&db_path);
        expense(&mut ledger, date(2024, 1, 1), "Market", 1000);
    }

    let ledger = open_file_ledger(&db_path);
    assert_eq!(ledger.list_accounts().expect("accounts").len(), 8);
    assert_eq!(ledger.list_categories().expect("categories").len(), 8);
    assert_eq!(ledger.all_transactions().expect("transactions").len(), 1);
}
