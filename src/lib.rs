// Personal Ledger - Core Library
// Double-entry books over SQLite: posting, derived reports, detectors, forecast

pub mod backup;
pub mod calendar;
pub mod config;
pub mod db;
pub mod detection;
pub mod entities;
pub mod error;
pub mod forecast;
pub mod import;
pub mod money;
pub mod posting;
pub mod reports;
pub mod rules;

// Re-export commonly used types
pub use backup::{BackupData, RestoreSummary};
pub use calendar::CalendarMonth;
pub use config::{DetectionSettings, LedgerConfig};
pub use db::{create_schema, Ledger};
pub use detection::{Anomaly, AnomalyDetector, AnomalyKind, RecurringDetector, Severity, Subscription};
pub use entities::{
    Account, AccountType, Budget, BudgetPeriod, Category, ParseEnumError, Split, Transaction,
    TransactionStatus,
};
pub use error::{LedgerError, Result};
pub use forecast::{NetWorthProjection, ProjectionPoint};
pub use import::{CsvImportOptions, ImportReport};
pub use posting::{validate_transaction, EntryKind, SimpleEntry, TransactionFilter};
pub use reports::{
    AccountSummary, BudgetProgress, CategoryBreakdown, DashboardStats, MonthlyStat, NetWorthPoint,
};
pub use rules::{Enrichment, Rule, RuleEngine};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
