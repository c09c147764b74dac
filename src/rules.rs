//! Filter rule configuration.
//!
//! Rules are a small fixed vocabulary of field/operator/value triples plus
//! relative-duration rules, loaded fresh from a JSON file on every filtering
//! run. Validation happens here, at load time: a rule whose operator the
//! query grammar cannot express is rejected before any network call.
//!
//! # File format
//!
//! ```json
//! [
//!   {"type": "field_match", "field": "from", "operator": "=", "value": "a@b.com"},
//!   {"type": "field_match", "field": "subject", "operator": "not_in", "value": "sale"},
//!   {"type": "duration", "unit": "days", "operator": "<", "value": 7}
//! ]
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SweepError};

/// Comparison operator shared by both rule types.
///
/// Field-match rules accept `in`/`not_in`/`=`/`!=`; duration rules accept
/// `<`/`>`. [`validate_rules`] enforces the split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RuleOperator {
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
}

impl RuleOperator {
    /// The configuration-file spelling, used in error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
        }
    }
}

/// Calendar unit for duration rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Days,
    Months,
}

/// One filter rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    /// Match a message field against a value.
    FieldMatch {
        field: String,
        operator: RuleOperator,
        value: String,
    },
    /// Match on how long ago the message was received.
    Duration {
        unit: DurationUnit,
        operator: RuleOperator,
        value: u32,
    },
}

/// Whether all rules must match or any single rule suffices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Predicate {
    /// Every rule must match (logical AND).
    All,
    /// Any one rule suffices (logical OR).
    Any,
}

/// Load and validate the rule list from a JSON file.
pub fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| SweepError::io(path, e))?;
    let rules: Vec<Rule> = serde_json::from_str(&contents)
        .map_err(|e| SweepError::InvalidRule(format!("{}: {e}", path.display())))?;
    validate_rules(&rules)?;
    tracing::debug!(path = %path.display(), count = rules.len(), "Loaded rules");
    Ok(rules)
}

/// Reject operator/type combinations the query grammar cannot express.
pub fn validate_rules(rules: &[Rule]) -> Result<()> {
    for (i, rule) in rules.iter().enumerate() {
        match rule {
            Rule::FieldMatch {
                field, operator, ..
            } => {
                if matches!(operator, RuleOperator::Lt | RuleOperator::Gt) {
                    return Err(SweepError::InvalidRule(format!(
                        "rule {i}: operator '{}' is not valid for field-match on '{field}' \
                         (only in, not_in, =, != are)",
                        operator.as_str()
                    )));
                }
            }
            Rule::Duration { operator, .. } => {
                if !matches!(operator, RuleOperator::Lt | RuleOperator::Gt) {
                    return Err(SweepError::InvalidRule(format!(
                        "rule {i}: operator '{}' is not valid for a duration rule \
                         (only < and > are)",
                        operator.as_str()
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_list() {
        let json = r#"[
            {"type": "field_match", "field": "from", "operator": "=", "value": "a@b.com"},
            {"type": "duration", "unit": "days", "operator": "<", "value": 7}
        ]"#;
        let rules: Vec<Rule> = serde_json::from_str(json).expect("parse");
        assert_eq!(rules.len(), 2);
        assert!(matches!(
            rules[0],
            Rule::FieldMatch {
                operator: RuleOperator::Eq,
                ..
            }
        ));
        assert!(matches!(
            rules[1],
            Rule::Duration {
                unit: DurationUnit::Days,
                operator: RuleOperator::Lt,
                value: 7
            }
        ));
        assert!(validate_rules(&rules).is_ok());
    }

    #[test]
    fn test_unknown_operator_fails_to_parse() {
        let json = r#"[{"type": "field_match", "field": "from", "operator": "~", "value": "x"}]"#;
        assert!(serde_json::from_str::<Vec<Rule>>(json).is_err());
    }

    #[test]
    fn test_comparison_operator_rejected_on_field_match() {
        let rules = vec![Rule::FieldMatch {
            field: "subject".into(),
            operator: RuleOperator::Lt,
            value: "x".into(),
        }];
        assert!(matches!(
            validate_rules(&rules),
            Err(SweepError::InvalidRule(_))
        ));
    }

    #[test]
    fn test_membership_operator_rejected_on_duration() {
        for operator in [
            RuleOperator::In,
            RuleOperator::NotIn,
            RuleOperator::Eq,
            RuleOperator::Ne,
        ] {
            let rules = vec![Rule::Duration {
                unit: DurationUnit::Months,
                operator,
                value: 1,
            }];
            assert!(
                matches!(validate_rules(&rules), Err(SweepError::InvalidRule(_))),
                "operator {} should be rejected",
                operator.as_str()
            );
        }
    }

    #[test]
    fn test_load_rules_missing_file() {
        let err = load_rules(Path::new("/nonexistent/rules.json")).unwrap_err();
        assert!(matches!(err, SweepError::Io { .. }));
    }
}
