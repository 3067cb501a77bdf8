// 📥 CSV Import - bank/spreadsheet exports into two-leg transactions
//
// Expected columns (case-insensitive, any order):
//   Date, Description|Payee|Memo, Amount, [Category], [Account], [Note|Notes]
//
// Each data row becomes a credit on the funding account and a debit on the
// expense account. Bad rows are skipped and reported; they never abort the
// rest of the file.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::{first_account_of, load_accounts, load_categories, Ledger};
use crate::entities::{AccountType, Split, Transaction};
use crate::error::{LedgerError, Result};
use crate::money::parse_amount_to_cents;
use crate::rules::RuleEngine;

/// Date layouts tried in order
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvImportOptions {
    /// Account used when a row names none (else the first Cash/Bank account)
    pub default_account: Option<String>,
    /// Category used when neither the row nor a rule names one (else the
    /// first category)
    pub default_category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    /// One message per skipped row
    pub errors: Vec<String>,
}

impl ImportReport {
    fn skip(&mut self, line: u64, reason: String) {
        warn!(line, %reason, "skipping CSV row");
        self.skipped += 1;
        self.errors.push(format!("line {line}: {reason}"));
    }
}

/// Column positions resolved from the header row
#[derive(Debug, Clone, PartialEq)]
struct ColumnMap {
    date: usize,
    description: usize,
    amount: usize,
    category: Option<usize>,
    account: Option<usize>,
    note: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let (mut date, mut description, mut amount) = (None, None, None);
        let (mut category, mut account, mut note) = (None, None, None);

        for (i, column) in headers.iter().enumerate() {
            match column.trim().to_lowercase().as_str() {
                "date" => date = Some(i),
                "description" | "payee" | "memo" => description = Some(i),
                "amount" => amount = Some(i),
                "category" => category = Some(i),
                "account" => account = Some(i),
                "note" | "notes" => note = Some(i),
                _ => {}
            }
        }

        match (date, description, amount) {
            (Some(date), Some(description), Some(amount)) => Ok(ColumnMap {
                date,
                description,
                amount,
                category,
                account,
                note,
            }),
            _ => Err(LedgerError::Validation(
                "CSV must have Date, Description and Amount columns".to_string(),
            )),
        }
    }
}

fn field(record: &StringRecord, index: Option<usize>) -> &str {
    index.and_then(|i| record.get(i)).unwrap_or("").trim()
}

pub fn parse_csv_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw.trim(), format).ok())
}

impl Ledger {
    pub fn import_csv(&mut self, path: &Path, options: &CsvImportOptions) -> Result<ImportReport> {
        let file = File::open(path)?;
        let report = self.import_csv_reader(file, options)?;
        info!(
            file = %path.display(),
            imported = report.imported,
            skipped = report.skipped,
            "CSV import finished"
        );
        Ok(report)
    }

    pub fn import_csv_reader<R: Read>(
        &mut self,
        source: R,
        options: &CsvImportOptions,
    ) -> Result<ImportReport> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(source);

        let columns = ColumnMap::from_headers(reader.headers()?)?;
        let rows: Vec<csv::Result<StringRecord>> = reader.records().collect();
        if rows.is_empty() {
            return Err(LedgerError::Validation(
                "CSV file must have a header and at least one data row".to_string(),
            ));
        }

        // Reference data is resolved once, up front
        let accounts = load_accounts(self.conn())?;
        let categories = load_categories(self.conn())?;
        let rules = RuleEngine::load(self.conn())?;

        let default_account = match options.default_account.as_deref() {
            Some(name) => accounts.iter().find(|a| a.name == name).and_then(|a| a.id),
            None => None,
        }
        .or_else(|| accounts.iter().find(|a| a.account_type.is_funding()).and_then(|a| a.id))
        .ok_or_else(|| {
            LedgerError::Validation("no Cash or Bank account to import into".to_string())
        })?;

        let expense_account = first_account_of(self.conn(), &[AccountType::Expense])?
            .and_then(|a| a.id)
            .ok_or_else(|| LedgerError::Validation("no Expense account to post to".to_string()))?;

        let default_category = match options.default_category.as_deref() {
            Some(name) => categories.iter().find(|c| c.name == name).and_then(|c| c.id),
            None => None,
        }
        .or_else(|| categories.first().and_then(|c| c.id));

        let account_id = |name: &str| accounts.iter().find(|a| a.name == name).and_then(|a| a.id);
        let category_id = |name: &str| categories.iter().find(|c| c.name == name).and_then(|c| c.id);

        let mut report = ImportReport::default();
        for (index, row) in rows.into_iter().enumerate() {
            // Header is line 1
            let line = index as u64 + 2;
            let record = match row {
                Ok(record) => record,
                Err(e) => {
                    report.skip(line, e.to_string());
                    continue;
                }
            };

            let Some(date) = parse_csv_date(field(&record, Some(columns.date))) else {
                report.skip(line, format!("invalid date '{}'", field(&record, Some(columns.date))));
                continue;
            };
            let raw_amount = field(&record, Some(columns.amount));
            let Some((amount, credit)) =
                parse_amount_to_cents(raw_amount).and_then(|a| Some((a, a.checked_neg()?)))
            else {
                report.skip(line, format!("invalid amount '{raw_amount}'"));
                continue;
            };
            let description = field(&record, Some(columns.description));
            if description.is_empty() {
                report.skip(line, "missing description".to_string());
                continue;
            }

            let enrichment = rules.enrich(description);

            let row_account = field(&record, columns.account);
            let from_account = if row_account.is_empty() {
                default_account
            } else {
                account_id(row_account).unwrap_or(default_account)
            };

            let row_category = field(&record, columns.category);
            let category = if row_category.is_empty() {
                enrichment.category_id.or(default_category)
            } else {
                category_id(row_category).or(default_category)
            };

            let row_note = field(&record, columns.note);
            let note = match (&enrichment.note, row_note.is_empty()) {
                (Some(rule_note), true) => rule_note.clone(),
                _ => row_note.to_string(),
            };

            let mut expense_leg = Split::new(expense_account, amount);
            expense_leg.category_id = category;

            let mut tx = Transaction::new(date, enrichment.payee)
                .with_note(note)
                .with_split(Split::new(from_account, credit))
                .with_split(expense_leg);

            match self.post_transaction(&mut tx) {
                Ok(_) => report.imported += 1,
                Err(e) if e.is_validation() => report.skip(line, e.to_string()),
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}
