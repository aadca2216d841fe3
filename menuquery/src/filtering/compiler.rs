//! Operator compiler: [`FilterSpec`] in, [`Where`] out.
//!
//! Pure and side-effect free. Shape errors were already rejected when the spec was
//! built; what remains here are checks that need the operand itself (range order,
//! regex syntax).

use serde_json::Value;
use std::cmp::Ordering;

use super::condition::{FieldCondition, MatchMode, Quantifier, TextOp, Where};
use super::dsl::{FilterSpec, Operation};
use crate::validation::ValidationError;

/// Compile one specification, nesting it under its relation path.
///
/// # Errors
///
/// Returns a `ValidationError` for out-of-order `between` bounds or an invalid regex.
pub fn compile(spec: &FilterSpec) -> Result<Where, ValidationError> {
    let mode = MatchMode::from_case_sensitive(spec.is_case_sensitive());
    let field = spec.field();
    let condition = match spec.operation() {
        Operation::Eq(v) => FieldCondition::Equals(v.clone()),
        Operation::Ne(v) => FieldCondition::NotEquals(v.clone()),
        Operation::Gt(v) => FieldCondition::Gt(v.clone()),
        Operation::Gte(v) => FieldCondition::Gte(v.clone()),
        Operation::Lt(v) => FieldCondition::Lt(v.clone()),
        Operation::Lte(v) => FieldCondition::Lte(v.clone()),
        Operation::In(vs) => FieldCondition::In(vs.clone()),
        Operation::NotIn(vs) => FieldCondition::NotIn(vs.clone()),
        Operation::Contains(s) => text(TextOp::Contains, s, mode, false),
        Operation::NotContains(s) => text(TextOp::Contains, s, mode, true),
        Operation::StartsWith(s) => text(TextOp::StartsWith, s, mode, false),
        Operation::EndsWith(s) => text(TextOp::EndsWith, s, mode, false),
        Operation::IsNull => FieldCondition::IsNull,
        Operation::IsNotNull => FieldCondition::IsNotNull,
        Operation::Between(lo, hi) => {
            if compare_bounds(lo, hi) == Some(Ordering::Greater) {
                return Err(ValidationError::new(field, "between bounds are out of order"));
            }
            FieldCondition::Between(lo.clone(), hi.clone())
        }
        Operation::Regex(pattern) => {
            regex::RegexBuilder::new(pattern)
                .case_insensitive(mode.is_insensitive())
                .build()
                .map_err(|e| ValidationError::new(field, format!("invalid regex pattern: {e}")))?;
            FieldCondition::Regex {
                pattern: pattern.clone(),
                mode,
            }
        }
        Operation::Search(terms) => FieldCondition::Search {
            terms: terms.clone(),
            mode,
        },
        Operation::Has(v) => FieldCondition::Has(v.clone()),
        Operation::HasNot(v) => FieldCondition::HasNot(v.clone()),
        Operation::Some(inner) => return quantified(spec, Quantifier::Some, inner),
        Operation::Every(inner) => return quantified(spec, Quantifier::Every, inner),
        Operation::None(inner) => return quantified(spec, Quantifier::None, inner),
    };

    let compiled = Where::field(field, condition).nested_under(spec.relation_path());
    tracing::trace!(operation = %spec.operation().kind(), target = %spec.target(), "compiled filter");
    Ok(compiled)
}

/// Compile a list of specifications into one AND-combined condition.
///
/// # Errors
///
/// Returns the first `ValidationError` raised by [`compile`].
pub fn compile_all(specs: &[FilterSpec]) -> Result<Where, ValidationError> {
    let compiled = specs.iter().map(compile).collect::<Result<Vec<_>, _>>()?;
    Ok(Where::and(compiled))
}

fn text(op: TextOp, value: &str, mode: MatchMode, negated: bool) -> FieldCondition {
    FieldCondition::Text {
        op,
        value: value.to_string(),
        mode,
        negated,
    }
}

fn quantified(
    spec: &FilterSpec,
    quantifier: Quantifier,
    inner: &[FilterSpec],
) -> Result<Where, ValidationError> {
    let condition = compile_all(inner)?;
    Ok(Where::relation(spec.field(), quantifier, condition).nested_under(spec.relation_path()))
}

/// Bounds of different kinds are left for storage to reject
fn compare_bounds(lo: &Value, hi: &Value) -> Option<Ordering> {
    match (lo, hi) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
