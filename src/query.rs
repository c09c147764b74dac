//! Rule-to-query compiler.
//!
//! Folds an ordered rule list into a single search expression in the
//! provider's query grammar. Adjacent terms are an implicit AND in that
//! grammar, so the `any` predicate mode wraps the rule terms (never the
//! folder term) in a `{ }` group to signal disjunction.
//!
//! Rules are validated at load time (`rules::validate_rules`); the compiler
//! still refuses an out-of-place operator instead of emitting a malformed
//! term, so a rule list that bypassed loading cannot degrade the query.

use chrono::{DateTime, Months, Utc};

use crate::error::{Result, SweepError};
use crate::rules::{DurationUnit, Predicate, Rule, RuleOperator};

/// Compile `rules` into one query string scoped to `folder`.
///
/// `now` is the reference instant for duration rules; callers pass
/// `Utc::now()` outside of tests. Output is deterministic: terms appear in
/// rule order, whitespace-joined.
pub fn compile_query(
    folder: &str,
    rules: &[Rule],
    predicate: Predicate,
    now: DateTime<Utc>,
) -> Result<String> {
    let terms = rules
        .iter()
        .map(|rule| compile_rule(rule, now))
        .collect::<Result<Vec<_>>>()?;

    let folder_term = format!("in:{folder}");
    if terms.is_empty() {
        return Ok(folder_term);
    }

    let joined = terms.join(" ");
    Ok(match predicate {
        Predicate::All => format!("{folder_term} {joined}"),
        Predicate::Any => format!("{folder_term} {{{joined}}}"),
    })
}

/// Compile a single rule into one query term.
fn compile_rule(rule: &Rule, now: DateTime<Utc>) -> Result<String> {
    match rule {
        Rule::FieldMatch {
            field,
            operator,
            value,
        } => {
            let prefix = match operator {
                RuleOperator::In => "",
                RuleOperator::Eq => "+",
                RuleOperator::NotIn | RuleOperator::Ne => "-",
                RuleOperator::Lt | RuleOperator::Gt => {
                    return Err(SweepError::InvalidRule(format!(
                        "operator '{}' cannot be compiled for field '{field}'",
                        operator.as_str()
                    )))
                }
            };
            Ok(format!("{prefix}{field}:{value}"))
        }
        Rule::Duration {
            unit,
            operator,
            value,
        } => {
            // "received less than N days ago" means after that past date.
            let symbol = match operator {
                RuleOperator::Lt => "after",
                RuleOperator::Gt => "before",
                other => {
                    return Err(SweepError::InvalidRule(format!(
                        "operator '{}' cannot be compiled for a duration rule",
                        other.as_str()
                    )))
                }
            };
            let reference = subtract_duration(now, *unit, *value)?;
            Ok(format!("{symbol}:{}", reference.format("%Y-%m-%d")))
        }
    }
}

/// Subtract a duration from `now`, calendar-aware.
///
/// Month arithmetic clamps to the last valid day of the target month
/// (e.g. Mar 31 minus one month is Feb 29 or Feb 28), it never skips or
/// overflows into an adjacent month.
fn subtract_duration(
    now: DateTime<Utc>,
    unit: DurationUnit,
    value: u32,
) -> Result<chrono::NaiveDate> {
    let reference = match unit {
        DurationUnit::Days => now.checked_sub_signed(chrono::Duration::days(i64::from(value))),
        DurationUnit::Months => now.checked_sub_months(Months::new(value)),
    };
    reference
        .map(|dt| dt.date_naive())
        .ok_or_else(|| SweepError::InvalidRule(format!("duration of {value} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 0).unwrap()
    }

    fn field(field: &str, operator: RuleOperator, value: &str) -> Rule {
        Rule::FieldMatch {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    #[test]
    fn test_exact_match_rule() {
        let rules = vec![field("from", RuleOperator::Eq, "a@b.com")];
        let q = compile_query("inbox", &rules, Predicate::All, fixed_now()).unwrap();
        assert_eq!(q, "in:inbox +from:a@b.com");
    }

    #[test]
    fn test_operator_prefixes() {
        let rules = vec![
            field("label", RuleOperator::In, "updates"),
            field("subject", RuleOperator::NotIn, "sale"),
            field("to", RuleOperator::Ne, "noreply@b.com"),
        ];
        let q = compile_query("inbox", &rules, Predicate::All, fixed_now()).unwrap();
        assert_eq!(q, "in:inbox label:updates -subject:sale -to:noreply@b.com");
    }

    #[test]
    fn test_compile_is_deterministic() {
        let rules = vec![
            field("from", RuleOperator::Eq, "a@b.com"),
            field("subject", RuleOperator::In, "report"),
            field("cc", RuleOperator::Ne, "c@d.com"),
        ];
        let a = compile_query("archive", &rules, Predicate::All, fixed_now()).unwrap();
        let b = compile_query("archive", &rules, Predicate::All, fixed_now()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_duration_days_emits_after() {
        let rules = vec![Rule::Duration {
            unit: DurationUnit::Days,
            operator: RuleOperator::Lt,
            value: 7,
        }];
        let q = compile_query("inbox", &rules, Predicate::All, fixed_now()).unwrap();
        assert_eq!(q, "in:inbox after:2024-03-08");
    }

    #[test]
    fn test_duration_greater_than_emits_before() {
        let rules = vec![Rule::Duration {
            unit: DurationUnit::Months,
            operator: RuleOperator::Gt,
            value: 2,
        }];
        let q = compile_query("inbox", &rules, Predicate::All, fixed_now()).unwrap();
        assert_eq!(q, "in:inbox before:2024-01-15");
    }

    #[test]
    fn test_month_subtraction_clamps_day() {
        // Mar 31 in a leap year: one month back lands on Feb 29.
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 8, 0, 0).unwrap();
        let rules = vec![Rule::Duration {
            unit: DurationUnit::Months,
            operator: RuleOperator::Lt,
            value: 1,
        }];
        let q = compile_query("inbox", &rules, Predicate::All, now).unwrap();
        assert_eq!(q, "in:inbox after:2024-02-29");

        // Non-leap year clamps to Feb 28.
        let now = Utc.with_ymd_and_hms(2023, 3, 31, 8, 0, 0).unwrap();
        let q = compile_query("inbox", &rules, Predicate::All, now).unwrap();
        assert_eq!(q, "in:inbox after:2023-02-28");
    }

    #[test]
    fn test_any_predicate_groups_rule_terms_only() {
        let rules = vec![
            field("from", RuleOperator::Eq, "a@b.com"),
            field("subject", RuleOperator::NotIn, "spam"),
        ];
        let q = compile_query("inbox", &rules, Predicate::Any, fixed_now()).unwrap();
        assert_eq!(q, "in:inbox {+from:a@b.com -subject:spam}");
    }

    #[test]
    fn test_empty_rule_list_is_folder_only() {
        let q = compile_query("inbox", &[], Predicate::Any, fixed_now()).unwrap();
        assert_eq!(q, "in:inbox");
    }

    #[test]
    fn test_comparison_on_field_match_fails_fast() {
        let rules = vec![field("from", RuleOperator::Gt, "a@b.com")];
        assert!(matches!(
            compile_query("inbox", &rules, Predicate::All, fixed_now()),
            Err(SweepError::InvalidRule(_))
        ));
    }

    #[test]
    fn test_membership_on_duration_fails_fast() {
        let rules = vec![Rule::Duration {
            unit: DurationUnit::Days,
            operator: RuleOperator::Eq,
            value: 3,
        }];
        assert!(matches!(
            compile_query("inbox", &rules, Predicate::All, fixed_now()),
            Err(SweepError::InvalidRule(_))
        ));
    }
}
