// 💳 Account Entity - where money sits or flows
//
// Balance is never stored on the account: it is always derived from the
// splits that reference it (see reports.rs).

use serde::{Deserialize, Serialize};

use super::BASE_CURRENCY;

// ============================================================================
// ACCOUNT TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Physical cash
    Cash,

    /// Checking or savings account at a bank
    Bank,

    /// Credit or debit card
    Card,

    /// Brokerage, retirement, ...
    Investment,

    /// Opening balances and owner's equity
    Equity,

    /// Loans, mortgages and other debt
    Liability,

    /// Where earnings come from (credit-normal)
    Income,

    /// Where spending goes (debit-normal)
    Expense,
}

text_enum!(AccountType, "account type", {
    Cash => "Cash",
    Bank => "Bank",
    Card => "Card",
    Investment => "Investment",
    Equity => "Equity",
    Liability => "Liability",
    Income => "Income",
    Expense => "Expense",
});

impl AccountType {
    /// Types counted as assets on the dashboard
    pub const ASSETS: [AccountType; 3] =
        [AccountType::Cash, AccountType::Bank, AccountType::Investment];

    pub fn is_asset(&self) -> bool {
        Self::ASSETS.contains(self)
    }

    /// Accounts money is paid from when importing bank exports
    pub fn is_funding(&self) -> bool {
        matches!(self, AccountType::Cash | AccountType::Bank)
    }
}

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Assigned by the store on insert
    pub id: Option<i64>,

    pub name: String,

    #[serde(rename = "type")]
    pub account_type: AccountType,

    /// ISO 4217 code
    #[serde(default = "default_currency")]
    pub currency: String,
}

pub(crate) fn default_currency() -> String {
    BASE_CURRENCY.to_string()
}

impl Account {
    pub fn new(name: impl Into<String>, account_type: AccountType) -> Self {
        Account {
            id: None,
            name: name.into(),
            account_type,
            currency: BASE_CURRENCY.to_string(),
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}
