// 🏷️ Category Entity - classification tree for expense/income legs and budgets

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Option<i64>,

    /// Category name (e.g., "Food", "Transport")
    pub name: String,

    /// Icon for UI (e.g., "🍽️")
    #[serde(default)]
    pub icon: String,

    /// Color for UI (e.g., "#FF5733")
    #[serde(default)]
    pub color: String,

    /// Root categories have no parent
    #[serde(default)]
    pub parent_id: Option<i64>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Category {
            id: None,
            name: name.into(),
            icon: String::new(),
            color: String::new(),
            parent_id: None,
        }
    }

    /// Builder: icon and color used by charts
    pub fn with_display(mut self, icon: impl Into<String>, color: impl Into<String>) -> Self {
        self.icon = icon.into();
        self.color = color.into();
        self
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
