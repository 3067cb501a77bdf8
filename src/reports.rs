// 📊 Balance & Aggregation - every monetary view is derived from splits on demand
//
// Nothing here is cached: balances, dashboard totals, budget progress and the
// monthly series are recomputed from the splits table on every call. Amounts
// are summed in minor units and converted to major units at the end.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::{self, CalendarMonth};
use crate::db::Ledger;
use crate::entities::{Account, AccountType, BudgetPeriod};
use crate::error::{LedgerError, Result};
use crate::money::{real_to_major, to_major};

// ============================================================================
// READ MODELS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_income: f64,
    pub total_expense: f64,
    pub total_assets: f64,
    pub total_liability: f64,
    pub net_worth: f64,
}

impl DashboardStats {
    /// Fold per-type sums (minor units, already exchange-rate converted)
    fn from_type_totals(totals: &[(AccountType, f64)]) -> Self {
        let mut stats = DashboardStats::default();

        for (account_type, total) in totals {
            let major = real_to_major(*total);
            match account_type {
                AccountType::Income => stats.total_income += major,
                AccountType::Expense => stats.total_expense += major,
                AccountType::Cash | AccountType::Bank | AccountType::Investment => {
                    stats.total_assets += major
                }
                AccountType::Liability => stats.total_liability += major,
                // Not part of any dashboard total
                AccountType::Card | AccountType::Equity => {}
            }
        }

        // Credit-normal types are displayed positive
        stats.total_income = stats.total_income.abs();
        stats.total_liability = stats.total_liability.abs();
        stats.net_worth = stats.total_assets - stats.total_liability;
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account: Account,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetProgress {
    pub budget_id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub period: BudgetPeriod,
    pub budgeted: f64,
    pub spent: f64,
    pub remaining: f64,
    /// Spent / budgeted (1.0 = fully used); 0 when nothing is budgeted
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category_id: i64,
    pub name: String,
    pub color: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStat {
    /// "2024-01"
    pub key: String,
    pub year: i32,
    pub month: u32,
    /// "Jan 24"
    pub label: String,
    pub income: f64,
    pub expense: f64,
}

impl MonthlyStat {
    pub fn savings(&self) -> f64 {
        self.income - self.expense
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetWorthPoint {
    pub key: String,
    pub label: String,
    pub net_worth: f64,
}

// ============================================================================
// QUERY HELPERS
// ============================================================================

/// Exchange-rate converted sums per account type, optionally only for
/// transactions dated on or before `until`
fn type_totals(conn: &Connection, until: Option<NaiveDate>) -> Result<Vec<(AccountType, f64)>> {
    let mut stmt = conn.prepare(
        "SELECT a.type, COALESCE(SUM(s.amount * s.exchange_rate), 0.0)
         FROM splits s
         JOIN accounts a ON s.account_id = a.id
         JOIN transactions t ON s.transaction_id = t.id
         WHERE ?1 IS NULL OR t.date <= ?1
         GROUP BY a.type",
    )?;
    let totals = stmt
        .query_map([until], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(totals)
}

/// Trailing `months` calendar months ending with the month of `as_of`
fn trailing_window(as_of: NaiveDate, months: u32) -> Option<(CalendarMonth, CalendarMonth)> {
    if months == 0 {
        return None;
    }
    let last = CalendarMonth::containing(as_of);
    Some((last.minus(months - 1), last))
}

// ============================================================================
// LEDGER OPERATIONS
// ============================================================================

impl Ledger {
    /// Raw balance in minor units (0 for an account without postings)
    pub fn account_balance_cents(&self, account_id: i64) -> Result<i64> {
        let total: i64 = self.conn().query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM splits WHERE account_id = ?1",
            [account_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Balance in major units
    pub fn account_balance(&self, account_id: i64) -> Result<f64> {
        Ok(to_major(self.account_balance_cents(account_id)?))
    }

    /// Every account with its derived balance
    pub fn account_summaries(&self) -> Result<Vec<AccountSummary>> {
        let mut stmt = self.conn().prepare(
            "SELECT a.id, a.name, a.type, a.currency, COALESCE(SUM(s.amount), 0)
             FROM accounts a
             LEFT JOIN splits s ON s.account_id = a.id
             GROUP BY a.id
             ORDER BY a.id",
        )?;
        let summaries = stmt
            .query_map([], |row| {
                let cents: i64 = row.get(4)?;
                Ok(AccountSummary {
                    account: Account {
                        id: Some(row.get(0)?),
                        name: row.get(1)?,
                        account_type: row.get(2)?,
                        currency: row.get(3)?,
                    },
                    balance: to_major(cents),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(summaries)
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        let totals = type_totals(self.conn(), None)?;
        Ok(DashboardStats::from_type_totals(&totals))
    }

    /// Spending against every budget for one calendar month. Only debit
    /// legs (amount > 0) count as spending.
    pub fn budget_progress(&self, month: u32, year: i32) -> Result<Vec<BudgetProgress>> {
        let period = CalendarMonth::new(year, month).ok_or_else(|| {
            LedgerError::Validation(format!("month must be 1-12, got {month}"))
        })?;
        self.budget_progress_for(period)
    }

    pub fn budget_progress_for(&self, period: CalendarMonth) -> Result<Vec<BudgetProgress>> {
        let mut stmt = self.conn().prepare(
            "SELECT b.id, b.category_id, c.name, b.period, b.amount,
                    COALESCE((SELECT SUM(s.amount)
                              FROM splits s
                              JOIN transactions t ON s.transaction_id = t.id
                              WHERE s.category_id = b.category_id
                                AND s.amount > 0
                                AND t.date >= ?1 AND t.date <= ?2), 0)
             FROM budgets b
             JOIN categories c ON c.id = b.category_id
             ORDER BY b.id",
        )?;

        let progress = stmt
            .query_map(params![period.first_day(), period.last_day()], |row| {
                let budgeted: i64 = row.get(4)?;
                let spent: i64 = row.get(5)?;
                let percent = if budgeted > 0 {
                    spent as f64 / budgeted as f64
                } else {
                    0.0
                };

                Ok(BudgetProgress {
                    budget_id: row.get(0)?,
                    category_id: row.get(1)?,
                    category_name: row.get(2)?,
                    period: row.get(3)?,
                    budgeted: to_major(budgeted),
                    spent: to_major(spent),
                    remaining: to_major(budgeted.saturating_sub(spent)),
                    percent,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(month = %period.key(), budgets = progress.len(), "computed budget progress");
        Ok(progress)
    }

    /// Debit-leg spending per category between `start` and `end` inclusive,
    /// largest first
    pub fn category_breakdown(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CategoryBreakdown>> {
        let mut stmt = self.conn().prepare(
            "SELECT c.id, c.name, c.color, SUM(s.amount) AS total
             FROM splits s
             JOIN transactions t ON s.transaction_id = t.id
             JOIN categories c ON s.category_id = c.id
             WHERE s.amount > 0 AND t.date >= ?1 AND t.date <= ?2
             GROUP BY c.id
             ORDER BY total DESC, c.id ASC",
        )?;
        let breakdown = stmt
            .query_map(params![start, end], |row| {
                let color: Option<String> = row.get(2)?;
                let total: i64 = row.get(3)?;
                Ok(CategoryBreakdown {
                    category_id: row.get(0)?,
                    name: row.get(1)?,
                    color: color.unwrap_or_default(),
                    total: to_major(total),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(breakdown)
    }

    /// Income and expense per month over the last `months` calendar months
    /// (current month included), oldest first. Months without postings are
    /// not synthesized.
    pub fn monthly_stats(&self, months: u32) -> Result<Vec<MonthlyStat>> {
        self.monthly_stats_as_of(calendar::today(), months)
    }

    pub fn monthly_stats_as_of(&self, as_of: NaiveDate, months: u32) -> Result<Vec<MonthlyStat>> {
        let Some((first, last)) = trailing_window(as_of, months) else {
            return Ok(Vec::new());
        };

        let mut stmt = self.conn().prepare(
            "SELECT strftime('%Y-%m', t.date) AS ym,
                    COALESCE(SUM(CASE WHEN a.type = 'Income' THEN s.amount * s.exchange_rate END), 0.0),
                    COALESCE(SUM(CASE WHEN a.type = 'Expense' THEN s.amount * s.exchange_rate END), 0.0)
             FROM splits s
             JOIN transactions t ON s.transaction_id = t.id
             JOIN accounts a ON s.account_id = a.id
             WHERE a.type IN ('Income', 'Expense')
               AND t.date >= ?1 AND t.date <= ?2
             GROUP BY ym
             ORDER BY ym ASC",
        )?;

        let rows = stmt
            .query_map(params![first.first_day(), last.last_day()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stats = Vec::with_capacity(rows.len());
        for (key, income, expense) in rows {
            let month = CalendarMonth::parse_key(&key).ok_or_else(|| {
                LedgerError::Validation(format!("unreadable month key '{key}'"))
            })?;
            stats.push(MonthlyStat {
                label: month.short_label(),
                key,
                year: month.year,
                month: month.month,
                income: real_to_major(income).abs(),
                expense: real_to_major(expense),
            });
        }
        Ok(stats)
    }

    /// Net worth at the end of each of the last `months` calendar months,
    /// oldest first
    pub fn net_worth_history(&self, months: u32) -> Result<Vec<NetWorthPoint>> {
        self.net_worth_history_as_of(calendar::today(), months)
    }

    pub fn net_worth_history_as_of(
        &self,
        as_of: NaiveDate,
        months: u32,
    ) -> Result<Vec<NetWorthPoint>> {
        let Some((first, _)) = trailing_window(as_of, months) else {
            return Ok(Vec::new());
        };

        (0..months)
            .map(|offset| {
                let month = first.plus(offset);
                let totals = type_totals(self.conn(), Some(month.last_day()))?;
                Ok(NetWorthPoint {
                    key: month.key(),
                    label: month.short_label(),
                    net_worth: DashboardStats::from_type_totals(&totals).net_worth,
                })
            })
            .collect()
    }
}
