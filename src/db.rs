// 🗄️ Ledger Store - schema, atomic units and reference-data CRUD
//
// The store is the single shared mutable resource. Every multi-row write goes
// through `Ledger::atomic`, which commits on success and rolls back on any
// early return (a dropped rusqlite::Transaction rolls back).

use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::config::{DetectionSettings, LedgerConfig};
use crate::entities::{Account, AccountType, Budget, Category};
use crate::error::{LedgerError, Result};
use crate::rules::contains_ignore_case;

/// Handle to an initialised ledger database
pub struct Ledger {
    conn: Connection,
    settings: DetectionSettings,
}

impl Ledger {
    /// Open (or create) the database at `config.db_path`
    pub fn open(config: &LedgerConfig) -> Result<Self> {
        let conn = Connection::open(&config.db_path)?;
        // WAL for crash recovery; not every filesystem supports it
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        info!(path = %config.db_path.display(), "opened ledger database");

        let mut ledger = Self::from_connection(conn, config.seed_defaults)?;
        ledger.settings = config.detection.clone();
        Ok(ledger)
    }

    /// In-memory ledger with the default accounts and categories
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, true)
    }

    /// In-memory ledger with the schema only
    pub fn open_in_memory_empty() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, false)
    }

    /// Apply schema and (optionally) seed before handing the store out, so
    /// no caller can ever read a half-seeded database.
    pub fn from_connection(conn: Connection, seed: bool) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        register_functions(&conn)?;
        create_schema(&conn)?;

        let mut ledger = Ledger {
            conn,
            settings: DetectionSettings::default(),
        };
        if seed {
            ledger.seed_defaults()?;
        }
        Ok(ledger)
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: DetectionSettings) {
        self.settings = settings;
    }

    /// Read access for the query modules
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `work` inside one atomic unit: all of its writes are applied
    /// together or not at all.
    pub fn atomic<T, F>(&mut self, work: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let unit = self.conn.transaction()?;
        let value = work(&unit)?;
        unit.commit()?;
        Ok(value)
    }

    // ========================================================================
    // SEEDING
    // ========================================================================

    /// Insert default accounts/categories into empty tables. The emptiness
    /// check and the inserts share one atomic unit.
    fn seed_defaults(&mut self) -> Result<()> {
        self.atomic(|conn| {
            let accounts: i64 = conn.query_row("SELECT COUNT(*) FROM accounts", [], |r| r.get(0))?;
            if accounts == 0 {
                for (name, account_type) in DEFAULT_ACCOUNTS {
                    insert_account(conn, &mut Account::new(*name, *account_type))?;
                }
                info!(count = DEFAULT_ACCOUNTS.len(), "seeded default accounts");
            }

            let categories: i64 =
                conn.query_row("SELECT COUNT(*) FROM categories", [], |r| r.get(0))?;
            if categories == 0 {
                for (name, icon, color) in DEFAULT_CATEGORIES {
                    insert_category(conn, &mut Category::new(*name).with_display(*icon, *color))?;
                }
                info!(count = DEFAULT_CATEGORIES.len(), "seeded default categories");
            }
            Ok(())
        })
    }

    // ========================================================================
    // ACCOUNTS
    // ========================================================================

    /// Insert an account; its id is written back into `account`
    pub fn create_account(&self, account: &mut Account) -> Result<i64> {
        insert_account(&self.conn, account)
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        load_accounts(&self.conn)
    }

    pub fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let account = self
            .conn
            .query_row(
                "SELECT id, name, type, currency FROM accounts WHERE id = ?1",
                [id],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    /// Exact name lookup; `Ok(None)` means "no such account", not a fault
    pub fn get_account_by_name(&self, name: &str) -> Result<Option<Account>> {
        find_account_by_name(&self.conn, name)
    }

    /// Rejected with `InUse` while any split still references the account
    pub fn delete_account(&self, id: i64) -> Result<()> {
        delete_row(&self.conn, "accounts", "account", id)
    }

    // ========================================================================
    // CATEGORIES
    // ========================================================================

    pub fn create_category(&self, category: &mut Category) -> Result<i64> {
        insert_category(&self.conn, category)
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        load_categories(&self.conn)
    }

    pub fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        find_category_by_name(&self.conn, name)
    }

    /// Rejected with `InUse` while splits, budgets, rules or child
    /// categories reference it
    pub fn delete_category(&self, id: i64) -> Result<()> {
        delete_row(&self.conn, "categories", "category", id)
    }

    // ========================================================================
    // BUDGETS
    // ========================================================================

    pub fn create_budget(&self, budget: &mut Budget) -> Result<i64> {
        if budget.amount < 0 {
            return Err(LedgerError::Validation(
                "budget amount cannot be negative".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO budgets (category_id, amount, period) VALUES (?1, ?2, ?3)",
            params![budget.category_id, budget.amount, budget.period],
        )?;
        let id = self.conn.last_insert_rowid();
        budget.id = Some(id);
        debug!(id, category_id = budget.category_id, "created budget");
        Ok(id)
    }

    pub fn list_budgets(&self) -> Result<Vec<Budget>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, category_id, amount, period FROM budgets ORDER BY id")?;
        let budgets = stmt
            .query_map([], |row| {
                Ok(Budget {
                    id: Some(row.get(0)?),
                    category_id: row.get(1)?,
                    amount: row.get(2)?,
                    period: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(budgets)
    }
}

// ============================================================================
// DEFAULT DATA
// ============================================================================

const DEFAULT_ACCOUNTS: &[(&str, AccountType)] = &[
    ("Cash", AccountType::Cash),
    ("Checking", AccountType::Bank),
    ("Savings", AccountType::Bank),
    ("Credit Card", AccountType::Card),
    ("Loans", AccountType::Liability),
    ("Salary", AccountType::Income),
    ("Expenses", AccountType::Expense),
    ("Opening Balances", AccountType::Equity),
];

const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    ("Food", "🍽️", "#E74C3C"),
    ("Transport", "🚗", "#3498DB"),
    ("Housing", "🏠", "#9B59B6"),
    ("Utilities", "💡", "#F1C40F"),
    ("Entertainment", "🎬", "#1ABC9C"),
    ("Health", "🩺", "#2ECC71"),
    ("Shopping", "🛍️", "#E67E22"),
    ("Income", "💰", "#27AE60"),
];

// ============================================================================
// SCHEMA
// ============================================================================

/// SQL functions the queries rely on. SQLite's own `lower()` only folds ASCII.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "contains_ignore_case",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack: String = ctx.get(0)?;
            let needle: String = ctx.get(1)?;
            Ok(contains_ignore_case(&haystack, &needle))
        },
    )?;
    Ok(())
}

/// Idempotent DDL (create-if-absent); must run before anything else
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            currency TEXT NOT NULL DEFAULT 'USD'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            icon TEXT,
            color TEXT,
            parent_id INTEGER REFERENCES categories(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            note TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'Pending',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Amounts in minor units; conversion happens only when aggregating
    conn.execute(
        "CREATE TABLE IF NOT EXISTS splits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_id INTEGER NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
            account_id INTEGER NOT NULL REFERENCES accounts(id),
            category_id INTEGER REFERENCES categories(id),
            amount INTEGER NOT NULL,
            currency TEXT NOT NULL DEFAULT 'USD',
            exchange_rate REAL NOT NULL DEFAULT 1.0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS budgets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category_id INTEGER NOT NULL REFERENCES categories(id),
            amount INTEGER NOT NULL,
            period TEXT NOT NULL DEFAULT 'Monthly'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pattern TEXT NOT NULL,
            target_category_id INTEGER REFERENCES categories(id),
            target_payee TEXT,
            target_note TEXT,
            priority INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_splits_transaction ON splits(transaction_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_splits_account ON splits(account_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_splits_category ON splits(category_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW HELPERS (usable on a plain connection or inside an atomic unit)
// ============================================================================

pub(crate) fn insert_account(conn: &Connection, account: &mut Account) -> Result<i64> {
    if account.name.trim().is_empty() {
        return Err(LedgerError::Validation("account name is required".to_string()));
    }

    conn.execute(
        "INSERT INTO accounts (name, type, currency) VALUES (?1, ?2, ?3)",
        params![account.name, account.account_type, account.currency],
    )?;
    let id = conn.last_insert_rowid();
    account.id = Some(id);
    Ok(id)
}

pub(crate) fn insert_category(conn: &Connection, category: &mut Category) -> Result<i64> {
    if category.name.trim().is_empty() {
        return Err(LedgerError::Validation("category name is required".to_string()));
    }

    conn.execute(
        "INSERT INTO categories (name, icon, color, parent_id) VALUES (?1, ?2, ?3, ?4)",
        params![category.name, category.icon, category.color, category.parent_id],
    )?;
    let id = conn.last_insert_rowid();
    category.id = Some(id);
    Ok(id)
}

pub(crate) fn load_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare("SELECT id, name, type, currency FROM accounts ORDER BY id")?;
    let accounts = stmt
        .query_map([], account_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(accounts)
}

pub(crate) fn load_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt =
        conn.prepare("SELECT id, name, icon, color, parent_id FROM categories ORDER BY id")?;
    let categories = stmt
        .query_map([], category_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(categories)
}

/// Lowest-id account whose type is one of `types`
pub(crate) fn first_account_of(conn: &Connection, types: &[AccountType]) -> Result<Option<Account>> {
    Ok(load_accounts(conn)?
        .into_iter()
        .find(|account| types.contains(&account.account_type)))
}

pub(crate) fn find_account_by_name(conn: &Connection, name: &str) -> Result<Option<Account>> {
    let account = conn
        .query_row(
            "SELECT id, name, type, currency FROM accounts WHERE name = ?1 ORDER BY id LIMIT 1",
            [name],
            account_from_row,
        )
        .optional()?;
    Ok(account)
}

pub(crate) fn find_category_by_name(conn: &Connection, name: &str) -> Result<Option<Category>> {
    let category = conn
        .query_row(
            "SELECT id, name, icon, color, parent_id FROM categories
             WHERE name = ?1 ORDER BY id LIMIT 1",
            [name],
            category_from_row,
        )
        .optional()?;
    Ok(category)
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        account_type: row.get(2)?,
        currency: row.get(3)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    let icon: Option<String> = row.get(2)?;
    let color: Option<String> = row.get(3)?;
    Ok(Category {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        icon: icon.unwrap_or_default(),
        color: color.unwrap_or_default(),
        parent_id: row.get(4)?,
    })
}

/// DELETE by id, mapping a foreign-key violation to `InUse`
fn delete_row(conn: &Connection, table: &str, entity: &'static str, id: i64) -> Result<()> {
    let sql = format!("DELETE FROM {table} WHERE id = ?1");
    match conn.execute(&sql, [id]) {
        Ok(0) => Err(LedgerError::not_found(entity, id)),
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(LedgerError::InUse {
                entity,
                id: id.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}
