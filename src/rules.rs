// 🏷️ Enrichment Rules - Rules as Data
// Substring rules that rewrite an incoming description into a payee, a
// category and a note before the transaction is posted.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::Ledger;
use crate::error::{LedgerError, Result};

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: Option<i64>,

    /// Case-insensitive substring to look for in the description
    pub pattern: String,

    /// Category to assign
    #[serde(default)]
    pub target_category_id: Option<i64>,

    /// Normalized payee name
    #[serde(default)]
    pub target_payee: Option<String>,

    #[serde(default)]
    pub target_note: Option<String>,

    /// Priority (higher = applied first); ties go to the older rule
    #[serde(default)]
    pub priority: i32,
}

impl Rule {
    pub fn new(pattern: impl Into<String>) -> Self {
        Rule {
            id: None,
            pattern: pattern.into(),
            target_category_id: None,
            target_payee: None,
            target_note: None,
            priority: 0,
        }
    }

    pub fn with_payee(mut self, payee: impl Into<String>) -> Self {
        self.target_payee = Some(payee.into());
        self
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.target_category_id = Some(category_id);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.target_note = Some(note.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Check if the pattern occurs in `text`, ignoring case
    pub fn matches(&self, text: &str) -> bool {
        contains_ignore_case(text, &self.pattern)
    }
}

/// Unicode-aware case-insensitive substring test, shared with SQL search
pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

// ============================================================================
// ENRICHMENT RESULT
// ============================================================================

/// Outcome of running a description through the rules. Fields the matching
/// rule leaves unset stay absent so the caller keeps its own value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrichment {
    /// Replacement payee, or the original description
    pub payee: String,
    pub category_id: Option<i64>,
    pub note: Option<String>,
    pub rule_id: Option<i64>,
}

impl Enrichment {
    fn unchanged(description: &str) -> Self {
        Enrichment {
            payee: description.to_string(),
            category_id: None,
            note: None,
            rule_id: None,
        }
    }

    pub fn matched(&self) -> bool {
        self.rule_id.is_some()
    }
}

// ============================================================================
// RULE ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    /// Create engine from a list of rules, highest priority first. The sort
    /// is stable, so equal priorities keep their creation order.
    pub fn from_rules(mut rules: Vec<Rule>) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        RuleEngine { rules }
    }

    /// Snapshot of the rules stored in `conn`
    pub fn load(conn: &Connection) -> Result<Self> {
        Ok(Self::from_rules(load_rules(conn)?))
    }

    /// First matching rule wins
    pub fn enrich(&self, description: &str) -> Enrichment {
        for rule in &self.rules {
            if rule.matches(description) {
                let payee = rule
                    .target_payee
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .unwrap_or(description);
                return Enrichment {
                    payee: payee.to_string(),
                    category_id: rule.target_category_id,
                    note: rule.target_note.clone().filter(|n| !n.is_empty()),
                    rule_id: rule.id,
                };
            }
        }

        Enrichment::unchanged(description)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

// ============================================================================
// STORAGE
// ============================================================================

/// Rules in matching order: priority descending, then creation order
pub(crate) fn load_rules(conn: &Connection) -> Result<Vec<Rule>> {
    let mut stmt = conn.prepare(
        "SELECT id, pattern, target_category_id, target_payee, target_note, priority
         FROM rules ORDER BY priority DESC, id ASC",
    )?;
    let rules = stmt
        .query_map([], |row| {
            Ok(Rule {
                id: Some(row.get(0)?),
                pattern: row.get(1)?,
                target_category_id: row.get(2)?,
                target_payee: row.get(3)?,
                target_note: row.get(4)?,
                priority: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rules)
}

impl Ledger {
    pub fn create_rule(&self, rule: &mut Rule) -> Result<i64> {
        if rule.pattern.trim().is_empty() {
            return Err(LedgerError::Validation("rule pattern is required".to_string()));
        }

        self.conn().execute(
            "INSERT INTO rules (pattern, target_category_id, target_payee, target_note, priority)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                rule.pattern,
                rule.target_category_id,
                rule.target_payee,
                rule.target_note,
                rule.priority,
            ],
        )?;
        let id = self.conn().last_insert_rowid();
        rule.id = Some(id);
        debug!(id, pattern = %rule.pattern, "created rule");
        Ok(id)
    }

    pub fn list_rules(&self) -> Result<Vec<Rule>> {
        load_rules(self.conn())
    }

    /// Run `description` through the stored rules
    pub fn enrich_transaction(&self, description: &str) -> Result<Enrichment> {
        Ok(RuleEngine::load(self.conn())?.enrich(description))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Category;

    #[test]
    fn test_pattern_match_ignores_case() {
        let rule = Rule::new("STARBUCKS").with_payee("Starbucks");

        assert!(rule.matches("STARBUCKS COFFEE"));
        assert!(rule.matches("paid at starbucks #4521"));
        assert!(!rule.matches("AMAZON"));
    }

    #[test]
    fn test_enrich_fills_only_what_the_rule_sets() {
        let mut rule = Rule::new("uber").with_payee("Uber");
        rule.id = Some(1);
        let engine = RuleEngine::from_rules(vec![rule]);

        let result = engine.enrich("UBER *TRIP 8841");
        assert_eq!(result.payee, "Uber");
        assert_eq!(result.category_id, None);
        assert_eq!(result.note, None);
        assert_eq!(result.rule_id, Some(1));
        assert!(result.matched());
    }

    #[test]
    fn test_rule_priority() {
        let mut general = Rule::new("AMAZON").with_payee("Amazon").with_priority(1);
        general.id = Some(1);
        let mut specific = Rule::new("AMAZON.COM MARKETPLACE")
            .with_payee("Amazon Marketplace")
            .with_priority(100);
        specific.id = Some(2);

        let engine = RuleEngine::from_rules(vec![general, specific]);

        // Should match high-priority specific rule
        let result = engine.enrich("AMAZON.COM MARKETPLACE");
        assert_eq!(result.payee, "Amazon Marketplace");
        assert_eq!(engine.enrich("amazon prime").payee, "Amazon");
    }

    #[test]
    fn test_no_match() {
        let engine = RuleEngine::default();
        let result = engine.enrich("UNKNOWN MERCHANT");

        assert_eq!(result.payee, "UNKNOWN MERCHANT");
        assert_eq!(result.category_id, None);
        assert_eq!(result.rule_id, None);
        assert_eq!(engine.rule_count(), 0);
    }

    #[test]
    fn test_stored_rules_keep_creation_order_on_ties() {
        let ledger = Ledger::open_in_memory_empty().unwrap();
        let mut transport = Category::new("Transport");
        let transport_id = ledger.create_category(&mut transport).unwrap();

        let mut first = Rule::new("shell").with_payee("Shell").with_category(transport_id);
        let mut second = Rule::new("shell").with_payee("Shell Gas Station");
        ledger.create_rule(&mut first).unwrap();
        ledger.create_rule(&mut second).unwrap();

        let result = ledger.enrich_transaction("SHELL OIL 123").unwrap();
        assert_eq!(result.payee, "Shell");
        assert_eq!(result.category_id, Some(transport_id));
        assert_eq!(result.rule_id, first.id);

        let mut urgent = Rule::new("oil").with_payee("Oil Change").with_priority(5);
        ledger.create_rule(&mut urgent).unwrap();
        assert_eq!(ledger.enrich_transaction("SHELL OIL 123").unwrap().payee, "Oil Change");

        let listed: Vec<Option<i64>> = ledger.list_rules().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(listed, vec![urgent.id, first.id, second.id]);
    }

    #[test]
    fn test_blank_pattern_is_rejected() {
        let ledger = Ledger::open_in_memory_empty().unwrap();
        let err = ledger.create_rule(&mut Rule::new(" ")).unwrap_err();
        assert!(err.is_validation());
    }
}
