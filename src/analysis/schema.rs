use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use super::AnalysisResult;

const MAX_ATS_SCORE: u64 = 100;

/// One field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub problem: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// Provider content that parsed as JSON but is not a valid `AnalysisResult`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("analysis content failed schema validation: {}", describe(.violations))]
pub struct SchemaError {
    violations: Vec<Violation>,
}

impl SchemaError {
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn has_violation(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check every field and report all violations at once.
pub(super) fn validate(content: &Value) -> Result<AnalysisResult, SchemaError> {
    let Some(object) = content.as_object() else {
        return Err(SchemaError {
            violations: vec![Violation {
                field: "$".to_owned(),
                problem: format!("expected object, got {}", kind(content)),
            }],
        });
    };

    let mut violations = Vec::new();

    let qualified = match object.get("qualified") {
        Some(Value::Bool(b)) => Some(*b),
        other => {
            violations.push(type_violation("qualified", "boolean", other));
            None
        }
    };
    let gap_analysis = list_field(object, "gap_analysis", &mut violations);
    let improvement_plan = list_field(object, "improvement_plan", &mut violations);
    let ats_score = score_field(object, &mut violations);

    match (qualified, gap_analysis, improvement_plan, ats_score) {
        (Some(qualified), Some(gap_analysis), Some(improvement_plan), Some(ats_score))
            if violations.is_empty() =>
        {
            Ok(AnalysisResult {
                qualified,
                gap_analysis,
                improvement_plan,
                ats_score,
            })
        }
        _ => Err(SchemaError { violations }),
    }
}

/// Lists hold strings or objects, preserving order.
fn list_field(
    object: &Map<String, Value>,
    field: &str,
    violations: &mut Vec<Violation>,
) -> Option<Vec<Value>> {
    let items = match object.get(field) {
        Some(Value::Array(items)) => items,
        other => {
            violations.push(type_violation(field, "array", other));
            return None;
        }
    };

    let before = violations.len();
    for (i, item) in items.iter().enumerate() {
        if !(item.is_string() || item.is_object()) {
            violations.push(Violation {
                field: format!("{field}[{i}]"),
                problem: format!("expected string or object, got {}", kind(item)),
            });
        }
    }
    (violations.len() == before).then(|| items.clone())
}

fn score_field(object: &Map<String, Value>, violations: &mut Vec<Violation>) -> Option<u8> {
    let value = match object.get("ats_score") {
        Some(value) if value.is_number() => value,
        other => {
            violations.push(type_violation("ats_score", "integer", other));
            return None;
        }
    };

    match value.as_u64() {
        Some(score) if score <= MAX_ATS_SCORE => u8::try_from(score).ok(),
        _ => {
            violations.push(Violation {
                field: "ats_score".to_owned(),
                problem: format!("expected integer within 0..=100, got {value}"),
            });
            None
        }
    }
}

fn type_violation(field: &str, expected: &str, found: Option<&Value>) -> Violation {
    let problem = match found {
        None => "missing".to_owned(),
        Some(value) => format!("expected {expected}, got {}", kind(value)),
    };
    Violation {
        field: field.to_owned(),
        problem,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
