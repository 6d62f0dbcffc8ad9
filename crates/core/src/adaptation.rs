//! Types produced while tailoring a verified query to a question.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of change requested on a verified query.
///
/// Parsing is lenient: casing, spaces and dashes are ignored and anything
/// unrecognised maps to [`ModificationType::Other`] with its text preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModificationType {
    Filter,
    Column,
    Grouping,
    Sorting,
    Aggregation,
    TimePeriod,
    Limit,
    Join,
    Alias,
    Other(String),
}

impl ModificationType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Filter => "filter",
            Self::Column => "column",
            Self::Grouping => "grouping",
            Self::Sorting => "sorting",
            Self::Aggregation => "aggregation",
            Self::TimePeriod => "time_period",
            Self::Limit => "limit",
            Self::Join => "join",
            Self::Alias => "alias",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ModificationType {
    fn from(value: String) -> Self {
        let key: String = value
            .trim()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c.to_ascii_lowercase() })
            .collect();
        match key.as_str() {
            "filter" | "filters" | "where" => Self::Filter,
            "column" | "columns" | "select" => Self::Column,
            "grouping" | "group" | "group_by" => Self::Grouping,
            "sorting" | "sort" | "order" | "order_by" => Self::Sorting,
            "aggregation" | "aggregate" => Self::Aggregation,
            "time_period" | "time" | "date_range" | "period" => Self::TimePeriod,
            "limit" => Self::Limit,
            "join" => Self::Join,
            "alias" | "rename" => Self::Alias,
            _ => Self::Other(value.trim().to_owned()),
        }
    }
}

impl From<ModificationType> for String {
    fn from(value: ModificationType) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for ModificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single requested change. Immutable once produced for a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    #[serde(rename = "type")]
    pub kind: ModificationType,
    pub description: String,
    #[serde(default, alias = "impact")]
    pub sql_impact: String,
}

/// Output of the recommend step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub enhanced_question: String,
    #[serde(default)]
    pub modifications: Vec<Modification>,
    #[serde(default)]
    pub explanation: String,
}

impl Recommendation {
    /// No changes needed: the verified SQL answers the question as-is.
    #[must_use]
    pub fn is_unmodified(&self) -> bool {
        self.modifications.is_empty()
    }
}

/// Output of the modify step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedQuery {
    pub sql: String,
    pub explanation: String,
}

/// Findings of one review iteration. Never persisted beyond the turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    #[serde(default = "default_true")]
    pub is_valid: bool,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_sql: Option<String>,
}

const fn default_true() -> bool {
    true
}

impl ReviewResult {
    /// Corrected SQL, ignoring blank corrections.
    #[must_use]
    pub fn correction(&self) -> Option<&str> {
        self.corrected_sql.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Human-readable note summarising what the reviewer still objects to.
    #[must_use]
    pub fn residual_note(&self) -> String {
        if self.issues.is_empty() {
            return self.explanation.clone();
        }
        self.issues.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modification_type_lenient_parsing() {
        assert_eq!(ModificationType::from("Time Period".to_owned()), ModificationType::TimePeriod);
        assert_eq!(ModificationType::from("ORDER-BY".to_owned()), ModificationType::Sorting);
        assert_eq!(
            ModificationType::from(" pivot ".to_owned()),
            ModificationType::Other("pivot".to_owned())
        );
    }

    #[test]
    fn test_modification_wire_shape() {
        let json = r#"{"type": "filter", "description": "Only 2024", "impact": "WHERE year = 2024"}"#;
        let m: Modification = serde_json::from_str(json).unwrap();
        assert_eq!(m.kind, ModificationType::Filter);
        assert_eq!(m.sql_impact, "WHERE year = 2024");

        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["type"], "filter");
        assert_eq!(value["sql_impact"], "WHERE year = 2024");
    }

    #[test]
    fn test_review_result_defaults() {
        let r: ReviewResult = serde_json::from_str(r#"{"corrected_sql": "   "}"#).unwrap();
        assert!(r.is_valid);
        assert_eq!(r.correction(), None);
        assert!(r.issues.is_empty());
    }

    #[test]
    fn test_residual_note_prefers_issues() {
        let r = ReviewResult {
            is_valid: false,
            explanation: "Mostly fine".to_owned(),
            issues: vec!["missing GROUP BY".to_owned(), "ambiguous column".to_owned()],
            suggestions: vec![],
            corrected_sql: None,
        };
        assert_eq!(r.residual_note(), "missing GROUP BY; ambiguous column");

        let r = ReviewResult { issues: vec![], ..r };
        assert_eq!(r.residual_note(), "Mostly fine");
    }
}
