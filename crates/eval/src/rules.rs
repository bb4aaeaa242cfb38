//! Processing rule interpreter.
//!
//! Rules run sequentially against a single variable store. Assignments are
//! applied as they happen, so a failing rule leaves the writes of earlier
//! rules in place. `exitResponse` / `exitTemplate` stop the whole list,
//! including from inside nested conditions and fragments, by returning a
//! non-`Completed` [`RuleOutcome`] up the recursion.

use qti_core::{
    Cardinality, Conditional, ExprId, ItemDefinition, Rule, RuleId, SingleValue, Value,
    VariableKind,
};
use rand::rngs::StdRng;

use crate::error::AuthoringError;
use crate::expr::{evaluate, EvalContext};
use crate::report::ReportCollector;
use crate::store::VariableStore;

/// How a rule list finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Every rule ran.
    Completed,
    ExitResponse,
    ExitTemplate,
    /// A `templateConstraint` evaluated to false or NULL.
    TemplateConstraintFailed,
}

impl RuleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleOutcome::Completed => "completed",
            RuleOutcome::ExitResponse => "exitResponse",
            RuleOutcome::ExitTemplate => "exitTemplate",
            RuleOutcome::TemplateConstraintFailed => "templateConstraintFailed",
        }
    }
}

/// Execute `rules` in order.
pub fn execute(
    rules: &[RuleId],
    item: &ItemDefinition,
    store: &mut VariableStore,
    rng: &mut StdRng,
    collector: &mut ReportCollector,
) -> Result<RuleOutcome, AuthoringError> {
    for &id in rules {
        let outcome = execute_rule(id, item, store, rng, collector)?;
        if outcome != RuleOutcome::Completed {
            return Ok(outcome);
        }
    }
    Ok(RuleOutcome::Completed)
}

fn execute_rule(
    id: RuleId,
    item: &ItemDefinition,
    store: &mut VariableStore,
    rng: &mut StdRng,
    collector: &mut ReportCollector,
) -> Result<RuleOutcome, AuthoringError> {
    let rule = item.rule(id).ok_or_else(|| AuthoringError::Processing {
        rule: "rule".to_string(),
        identifier: format!("{:?}", id),
        message: "rule does not exist".to_string(),
    })?;

    match rule {
        Rule::ResponseCondition(cond) | Rule::TemplateCondition(cond) => {
            execute_condition(rule.name(), cond, item, store, rng, collector)
        }

        Rule::SetOutcomeValue { identifier, expr }
        | Rule::SetTemplateValue { identifier, expr }
        | Rule::SetCorrectResponse { identifier, expr }
        | Rule::SetDefaultValue { identifier, expr } => {
            let value = eval(*expr, item, store, rng)?;
            check_target_kind(rule, identifier, store)?;
            let result = match rule {
                Rule::SetCorrectResponse { .. } => store.set_correct(identifier, value.clone()),
                Rule::SetDefaultValue { .. } => store.set_default(identifier, value.clone()),
                _ => store.set(identifier, value.clone()),
            };
            result.map_err(|e| AuthoringError::Processing {
                rule: rule.name().to_string(),
                identifier: identifier.clone(),
                message: e.to_string(),
            })?;
            tracing::trace!(rule = rule.name(), identifier = %identifier, value = %value, "assigned");
            collector.record(identifier, value, rule.name(), id);
            Ok(RuleOutcome::Completed)
        }

        Rule::LookupOutcomeValue { identifier, expr } => {
            let source = eval(*expr, item, store, rng)?;
            check_target_kind(rule, identifier, store)?;
            let value = lookup(rule, identifier, *expr, &source, item, store)?;
            store
                .set(identifier, value.clone())
                .map_err(|e| AuthoringError::Processing {
                    rule: rule.name().to_string(),
                    identifier: identifier.clone(),
                    message: e.to_string(),
                })?;
            collector.record(identifier, value, rule.name(), id);
            Ok(RuleOutcome::Completed)
        }

        Rule::ExitResponse => {
            tracing::debug!("exitResponse reached");
            Ok(RuleOutcome::ExitResponse)
        }
        Rule::ExitTemplate => {
            tracing::debug!("exitTemplate reached");
            Ok(RuleOutcome::ExitTemplate)
        }

        Rule::TemplateConstraint { expr } => {
            let value = eval(*expr, item, store, rng)?;
            if guard_holds(rule.name(), *expr, &value, item)? {
                Ok(RuleOutcome::Completed)
            } else {
                tracing::debug!("template constraint not satisfied");
                Ok(RuleOutcome::TemplateConstraintFailed)
            }
        }

        Rule::Fragment { rules } => execute(rules, item, store, rng, collector),
    }
}

fn execute_condition(
    name: &str,
    cond: &Conditional,
    item: &ItemDefinition,
    store: &mut VariableStore,
    rng: &mut StdRng,
    collector: &mut ReportCollector,
) -> Result<RuleOutcome, AuthoringError> {
    for branch in &cond.branches {
        let value = eval(branch.guard, item, store, rng)?;
        if guard_holds(name, branch.guard, &value, item)? {
            return execute(&branch.rules, item, store, rng, collector);
        }
    }
    execute(&cond.otherwise, item, store, rng, collector)
}

fn eval(
    expr: ExprId,
    item: &ItemDefinition,
    store: &VariableStore,
    rng: &mut StdRng,
) -> Result<Value, AuthoringError> {
    let ctx = EvalContext::new(item, store);
    evaluate(expr, &ctx, rng)
}

/// A guard must be a single boolean; NULL counts as false.
fn guard_holds(
    rule: &str,
    expr: ExprId,
    value: &Value,
    item: &ItemDefinition,
) -> Result<bool, AuthoringError> {
    match value {
        Value::Null => Ok(false),
        Value::Single(SingleValue::Boolean(b)) => Ok(*b),
        Value::Single(other) => Err(AuthoringError::BaseTypeViolation {
            operator: rule.to_string(),
            operand: 0,
            path: item.expressions.path(expr),
            expected: "boolean".to_string(),
            found: other.base_type().to_string(),
        }),
        other => Err(AuthoringError::CardinalityViolation {
            operator: rule.to_string(),
            operand: 0,
            path: item.expressions.path(expr),
            expected: "single".to_string(),
            found: other.cardinality().unwrap_or(Cardinality::Single),
        }),
    }
}

fn check_target_kind(
    rule: &Rule,
    identifier: &str,
    store: &VariableStore,
) -> Result<(), AuthoringError> {
    let decl = store
        .declaration(identifier)
        .ok_or_else(|| AuthoringError::Processing {
            rule: rule.name().to_string(),
            identifier: identifier.to_string(),
            message: "variable is not declared".to_string(),
        })?;
    let allowed: &[VariableKind] = match rule {
        Rule::SetOutcomeValue { .. } | Rule::LookupOutcomeValue { .. } => {
            &[VariableKind::Outcome]
        }
        Rule::SetTemplateValue { .. } => &[VariableKind::Template],
        Rule::SetCorrectResponse { .. } => &[VariableKind::Response],
        _ => &[VariableKind::Response, VariableKind::Outcome],
    };
    if allowed.contains(&decl.kind()) {
        return Ok(());
    }
    Err(AuthoringError::Processing {
        rule: rule.name().to_string(),
        identifier: identifier.to_string(),
        message: format!("cannot assign to a {} variable", decl.kind()),
    })
}

/// Map a numeric source through the outcome's lookup table.
fn lookup(
    rule: &Rule,
    identifier: &str,
    expr: ExprId,
    source: &Value,
    item: &ItemDefinition,
    store: &VariableStore,
) -> Result<Value, AuthoringError> {
    let table = store
        .declaration(identifier)
        .and_then(|d| d.lookup_table())
        .ok_or_else(|| AuthoringError::MissingLookupTable {
            identifier: identifier.to_string(),
        })?;
    let number = match source {
        Value::Null => return Ok(Value::Null),
        Value::Single(v) => v.as_f64().ok_or_else(|| AuthoringError::BaseTypeViolation {
            operator: rule.name().to_string(),
            operand: 0,
            path: item.expressions.path(expr),
            expected: "integer or float".to_string(),
            found: v.base_type().to_string(),
        })?,
        other => {
            return Err(AuthoringError::CardinalityViolation {
                operator: rule.name().to_string(),
                operand: 0,
                path: item.expressions.path(expr),
                expected: "single".to_string(),
                found: other.cardinality().unwrap_or(Cardinality::Single),
            })
        }
    };
    Ok(table.lookup(number).map(Value::Single).unwrap_or(Value::Null))
}
