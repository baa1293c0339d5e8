use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::DataPath;

/// The `condition` keyword of a schema node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    /// Clauses folded left to right.
    Chain(Vec<ConditionClause>),
    Single(ConditionClause),
    /// Any other shape; always holds.
    Other(Value),
}

/// Compares the value found at `element` with `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionClause {
    /// Slash-separated path into the reference data.
    pub element: String,
    #[serde(default)]
    pub value: Value,
    /// How this clause combines with the clauses before it. Clauses
    /// without one are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conjunction: Option<Conjunction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conjunction {
    And,
    Or,
}

impl ConditionClause {
    pub fn matches(&self, ref_data: &Value) -> bool {
        DataPath::parse(&self.element).lookup(ref_data) == Some(&self.value)
    }
}

impl Condition {
    /// Evaluate against the whole form data.
    pub fn evaluate(&self, ref_data: &Value) -> bool {
        match self {
            Condition::Single(clause) => clause.matches(ref_data),
            Condition::Chain(clauses) => fold_clauses(
                clauses
                    .iter()
                    .filter_map(|c| c.conjunction.map(|conj| (c.matches(ref_data), conj))),
            ),
            Condition::Other(raw) => {
                warn!("ignoring unsupported condition {raw}");
                true
            }
        }
    }
}

/// Strict left fold over the clauses that carry a conjunction. The first one
/// seeds the accumulator, and there is no precedence between `and` and `or`.
/// Nothing to fold holds.
fn fold_clauses(mut clauses: impl Iterator<Item = (bool, Conjunction)>) -> bool {
    let Some((first, _)) = clauses.next() else {
        return true;
    };
    clauses.fold(first, |acc, (holds, conjunction)| match conjunction {
        Conjunction::And => acc && holds,
        Conjunction::Or => acc || holds,
    })
}
