use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use personal_ledger::money::format_major;
use personal_ledger::{CsvImportOptions, Ledger, LedgerConfig};

const USAGE: &str = "usage: ledger <command>

commands:
  init                                   create the database and default data
  import-csv <file> [account] [category] import a CSV export
  export <file>                          write a JSON backup
  restore <file>                         merge a JSON backup
  dashboard                              totals, budgets and recent activity
  forecast [months]                      net worth projection (default 6)
  alerts                                 recurring charges and anomalies";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{USAGE}");
        return Ok(());
    };

    let config = LedgerConfig::from_env().context("Invalid ledger configuration")?;
    let mut ledger = Ledger::open(&config)
        .with_context(|| format!("Failed to open ledger at {}", config.db_path.display()))?;

    match command.as_str() {
        "init" => run_init(&ledger, &config),
        "import-csv" => run_import_csv(&mut ledger, &args[1..]),
        "export" => {
            let file = required_arg(&args, 1, "export <file>")?;
            ledger
                .export_json(Path::new(file))
                .with_context(|| format!("Failed to export to {file}"))?;
            println!("✓ Backup written to {file}");
            Ok(())
        }
        "restore" => {
            let file = required_arg(&args, 1, "restore <file>")?;
            let summary = ledger
                .import_json(Path::new(file))
                .with_context(|| format!("Failed to restore {file}"))?;
            println!(
                "✓ Restored {} transactions ({} new accounts, {} new categories)",
                summary.transactions_imported, summary.accounts_created, summary.categories_created
            );
            Ok(())
        }
        "dashboard" => run_dashboard(&ledger),
        "forecast" => {
            let months = match args.get(1) {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("months must be a number, got '{raw}'"))?,
                None => 6,
            };
            run_forecast(&ledger, months)
        }
        "alerts" => run_alerts(&ledger),
        other => bail!("unknown command '{other}'\n\n{USAGE}"),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn required_arg<'a>(args: &'a [String], index: usize, usage: &str) -> Result<&'a str> {
    match args.get(index) {
        Some(value) => Ok(value.as_str()),
        None => bail!("usage: ledger {usage}"),
    }
}

fn run_init(ledger: &Ledger, config: &LedgerConfig) -> Result<()> {
    println!("🗄️  Ledger ready at {}", config.db_path.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ {} accounts", ledger.list_accounts()?.len());
    println!("✓ {} categories", ledger.list_categories()?.len());
    Ok(())
}

fn run_import_csv(ledger: &mut Ledger, args: &[String]) -> Result<()> {
    let file = required_arg(args, 0, "import-csv <file> [account] [category]")?;
    let options = CsvImportOptions {
        default_account: args.get(1).cloned(),
        default_category: args.get(2).cloned(),
    };

    println!("📂 Importing {file}...");
    let report = ledger
        .import_csv(Path::new(file), &options)
        .with_context(|| format!("Failed to import {file}"))?;

    println!("✓ Imported {} transactions", report.imported);
    if report.skipped > 0 {
        println!("⚠️  Skipped {} rows:", report.skipped);
        for error in &report.errors {
            println!("   {error}");
        }
    }
    Ok(())
}

fn run_dashboard(ledger: &Ledger) -> Result<()> {
    let stats = ledger.dashboard_stats()?;

    println!("📊 Dashboard");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Income:      {:>12.2}", stats.total_income);
    println!("Expenses:    {:>12.2}", stats.total_expense);
    println!("Assets:      {:>12.2}", stats.total_assets);
    println!("Liabilities: {:>12.2}", stats.total_liability);
    println!("Net worth:   {:>12.2}", stats.net_worth);

    let today = personal_ledger::calendar::today();
    let month = personal_ledger::CalendarMonth::containing(today);
    let budgets = ledger.budget_progress_for(month)?;
    if !budgets.is_empty() {
        println!("\n🎯 Budgets ({})", month.key());
        for budget in budgets {
            println!(
                "  {:<16} {:>10.2} / {:>10.2}  ({:.0}%)",
                budget.category_name,
                budget.spent,
                budget.budgeted,
                budget.percent * 100.0
            );
        }
    }

    println!("\n🧾 Recent transactions");
    for tx in ledger.get_recent_transactions(10)? {
        println!(
            "  {}  {:<30} {:>12}",
            tx.date,
            tx.description,
            format_major(tx.amount_cents())
        );
    }
    Ok(())
}

fn run_forecast(ledger: &Ledger, months: u32) -> Result<()> {
    let projection = ledger.project_net_worth(months)?;

    println!("🔮 Net worth forecast");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Current:          {:>12.2}", projection.current_net_worth);
    println!("Monthly savings:  {:>12.2}", projection.average_monthly_savings);
    for point in projection.points {
        println!("  {:<8} {:>12.2}", point.month, point.value);
    }
    Ok(())
}

fn run_alerts(ledger: &Ledger) -> Result<()> {
    println!("🔁 Possible subscriptions");
    for sub in ledger.detect_recurring_patterns()? {
        println!(
            "  {:<30} {:>10.2}  x{}  next ~{} ({})",
            sub.name, sub.average_amount, sub.occurrences, sub.next_due, sub.frequency
        );
    }

    println!("\n🚨 Anomalies");
    for anomaly in ledger.detect_anomalies()? {
        println!(
            "  {}  [{}] {}: {}",
            anomaly.date, anomaly.severity, anomaly.kind, anomaly.description
        );
    }
    Ok(())
}
