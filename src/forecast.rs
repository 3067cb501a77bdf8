// 🔮 Forecast - linear net-worth projection from the trailing savings rate
//
// No seasonality or compounding: every future month adds the same average
// monthly savings to the running net worth.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::{self, CalendarMonth};
use crate::db::Ledger;
use crate::error::Result;
use crate::reports::MonthlyStat;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPoint {
    /// "Feb 25"
    pub month: String,
    /// First day of the projected month
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetWorthProjection {
    pub current_net_worth: f64,
    pub average_monthly_savings: f64,
    pub points: Vec<ProjectionPoint>,
}

/// Mean of income - expense over the given months; 0 for an empty slice
pub fn average_savings(stats: &[MonthlyStat]) -> f64 {
    if stats.is_empty() {
        return 0.0;
    }
    stats.iter().map(MonthlyStat::savings).sum::<f64>() / stats.len() as f64
}

/// `months_ahead` points, one per calendar month after `start`
pub fn project(
    start: CalendarMonth,
    current_net_worth: f64,
    monthly_savings: f64,
    months_ahead: u32,
) -> Vec<ProjectionPoint> {
    let mut running = current_net_worth;
    (1..=months_ahead)
        .map(|i| {
            running += monthly_savings;
            let month = start.plus(i);
            ProjectionPoint {
                month: month.short_label(),
                date: month.first_day(),
                value: running,
            }
        })
        .collect()
}

impl Ledger {
    pub fn project_net_worth(&self, months_ahead: u32) -> Result<NetWorthProjection> {
        self.project_net_worth_as_of(calendar::today(), months_ahead)
    }

    pub fn project_net_worth_as_of(
        &self,
        as_of: NaiveDate,
        months_ahead: u32,
    ) -> Result<NetWorthProjection> {
        let current_net_worth = self.dashboard_stats()?.net_worth;
        let trailing = self.monthly_stats_as_of(as_of, self.settings().forecast_trailing_months)?;
        let average_monthly_savings = average_savings(&trailing);

        debug!(
            current_net_worth,
            average_monthly_savings,
            months_ahead,
            "projecting net worth"
        );

        Ok(NetWorthProjection {
            current_net_worth,
            average_monthly_savings,
            points: project(
                CalendarMonth::containing(as_of),
                current_net_worth,
                average_monthly_savings,
                months_ahead,
            ),
        })
    }
}
