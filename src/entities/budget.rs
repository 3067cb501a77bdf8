// 🎯 Budget Entity - spending target for one category

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BudgetPeriod {
    #[default]
    Monthly,
    Yearly,
}

text_enum!(BudgetPeriod, "budget period", {
    Monthly => "Monthly",
    Yearly => "Yearly",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Option<i64>,
    pub category_id: i64,
    /// Target in minor units
    pub amount: i64,
    #[serde(default)]
    pub period: BudgetPeriod,
}

impl Budget {
    pub fn monthly(category_id: i64, amount: i64) -> Self {
        Budget {
            id: None,
            category_id,
            amount,
            period: BudgetPeriod::Monthly,
        }
    }
}
