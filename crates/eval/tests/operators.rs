//! Operator-level behaviour through the public evaluator API.
//!
//! Organized by category:
//!   A. NULL propagation for every NULL-propagating operator
//!   B. Base-type refusal (sum over every non-numeric base type)
//!   C. Cardinality refusal
//!   D. Numeric results and integer/float promotion
//!
//! Each test builds a small item in code, pushes an expression tree into
//! its arena and evaluates it against a fresh store.

use proptest::prelude::*;
use qti_core::{
    BaseType, Cardinality, Expr, ExprId, FloatOrVar, IntOrVar, ItemDefinition, MathOp,
    RoundingMode, Shape, SingleValue, StatsOp, ToleranceMode, Value,
};
use qti_eval::signature::{signature, Arity};
use qti_eval::{evaluate, AuthoringError, EvalContext, VariableStore};
use rand::rngs::StdRng;
use rand::SeedableRng;

// ──────────────────────────────────────────────
// Test helpers
// ──────────────────────────────────────────────

fn empty_item() -> ItemDefinition {
    ItemDefinition::new("operators", vec![]).unwrap()
}

fn eval(item: &ItemDefinition, root: ExprId) -> Result<Value, AuthoringError> {
    let store = VariableStore::new(item);
    let ctx = EvalContext::new(item, &store);
    evaluate(root, &ctx, &mut StdRng::seed_from_u64(0))
}

fn literal(item: &mut ItemDefinition, v: SingleValue) -> ExprId {
    item.expressions.push(Expr::BaseValue(v), vec![])
}

/// Every operator whose signature propagates NULL.
fn propagating_operators() -> Vec<Expr> {
    let mut ops = vec![
        Expr::Index(IntOrVar::Int(1)),
        Expr::FieldValue("f".into()),
        Expr::Random,
        Expr::Member,
        Expr::Delete,
        Expr::Contains,
        Expr::Not,
        Expr::Match,
        Expr::Substring {
            case_sensitive: true,
        },
        Expr::StringMatch {
            case_sensitive: true,
            substring: false,
        },
        Expr::PatternMatch("a+".into()),
        Expr::Equal {
            mode: ToleranceMode::Exact,
            tolerance: vec![],
            include_lower_bound: true,
            include_upper_bound: true,
        },
        Expr::EqualRounded {
            mode: RoundingMode::DecimalPlaces,
            figures: IntOrVar::Int(2),
        },
        Expr::Inside(Shape::Default),
        Expr::Lt,
        Expr::Gt,
        Expr::Lte,
        Expr::Gte,
        Expr::DurationLt,
        Expr::DurationGte,
        Expr::Sum,
        Expr::Product,
        Expr::Subtract,
        Expr::Divide,
        Expr::Power,
        Expr::IntegerDivide,
        Expr::IntegerModulus,
        Expr::Truncate,
        Expr::Round,
        Expr::IntegerToFloat,
        Expr::RoundTo {
            mode: RoundingMode::SignificantFigures,
            figures: IntOrVar::Int(3),
        },
        Expr::Max,
        Expr::Min,
        Expr::Gcd,
        Expr::Lcm,
        Expr::StatsOperator(StatsOp::Mean),
        Expr::StatsOperator(StatsOp::PopSd),
    ];
    ops.extend(
        [
            MathOp::Sin,
            MathOp::Atan2,
            MathOp::Log,
            MathOp::Abs,
            MathOp::Floor,
            MathOp::ToDegrees,
        ]
        .into_iter()
        .map(Expr::MathOperator),
    );
    ops
}

// ──────────────────────────────────────────────
// A. NULL propagation
// ──────────────────────────────────────────────

#[test]
fn a01_null_operand_yields_null_for_every_propagating_operator() {
    for op in propagating_operators() {
        let sig = signature(&op).unwrap();
        assert!(sig.null_propagates, "{} should propagate NULL", op.name());
        let arity = match sig.arity {
            Arity::Exactly(n) => n,
            Arity::AtLeast(n) => n.max(2),
        };
        let mut item = empty_item();
        let mut children = vec![item.expressions.push(Expr::Null, vec![])];
        for _ in 1..arity {
            // Deliberately the wrong type: NULL wins before type checks.
            children.push(literal(&mut item, SingleValue::Boolean(true)));
        }
        let name = op.name();
        let root = item.expressions.push(op, children);
        assert_eq!(eval(&item, root), Ok(Value::Null), "{}", name);
    }
}

#[test]
fn a02_sum_null_three() {
    let mut item = empty_item();
    let null = item.expressions.push(Expr::Null, vec![]);
    let three = literal(&mut item, SingleValue::Integer(3));
    let sum = item.expressions.push(Expr::Sum, vec![null, three]);
    assert_eq!(eval(&item, sum), Ok(Value::Null));
}

#[test]
fn a03_integer_to_float_null() {
    let mut item = empty_item();
    let null = item.expressions.push(Expr::Null, vec![]);
    let itf = item.expressions.push(Expr::IntegerToFloat, vec![null]);
    assert_eq!(eval(&item, itf), Ok(Value::Null));
}

#[test]
fn a04_null_tolerant_operators_do_not_propagate() {
    let mut item = empty_item();
    let null = item.expressions.push(Expr::Null, vec![]);
    let is_null = item.expressions.push(Expr::IsNull, vec![null]);
    assert_eq!(eval(&item, is_null), Ok(Value::boolean(true)));

    let null = item.expressions.push(Expr::Null, vec![]);
    let f = literal(&mut item, SingleValue::Boolean(false));
    let and = item.expressions.push(Expr::And, vec![null, f]);
    assert_eq!(eval(&item, and), Ok(Value::boolean(false)));
}

// ──────────────────────────────────────────────
// B. Base-type refusal
// ──────────────────────────────────────────────

fn sample(bt: BaseType) -> Option<SingleValue> {
    Some(match bt {
        BaseType::Identifier => SingleValue::Identifier("A".into()),
        BaseType::Boolean => SingleValue::Boolean(true),
        BaseType::Integer => SingleValue::Integer(1),
        BaseType::Float => SingleValue::Float(1.0),
        BaseType::String => SingleValue::String("s".into()),
        BaseType::Point => SingleValue::Point { x: 1, y: 2 },
        BaseType::Pair => SingleValue::Pair("A".into(), "B".into()),
        BaseType::DirectedPair => SingleValue::DirectedPair("A".into(), "B".into()),
        BaseType::Duration => SingleValue::Duration(1.0),
        BaseType::Uri => SingleValue::Uri("http://example.com".into()),
        BaseType::File => return None,
    })
}

#[test]
fn b01_sum_refuses_every_non_numeric_base_type() {
    for bt in BaseType::ALL {
        let Some(v) = sample(bt) else { continue };
        let mut item = empty_item();
        let one = literal(&mut item, SingleValue::Integer(1));
        let other = literal(&mut item, v);
        let sum = item.expressions.push(Expr::Sum, vec![one, other]);
        let result = eval(&item, sum);
        if bt.is_numeric() {
            assert!(result.is_ok(), "{} should be accepted", bt);
        } else {
            match result {
                Err(AuthoringError::BaseTypeViolation { operand, found, .. }) => {
                    assert_eq!(operand, 1);
                    assert_eq!(found, bt.as_str());
                }
                other => panic!("{}: expected BaseTypeViolation, got {:?}", bt, other),
            }
        }
    }
}

#[test]
fn b02_match_refuses_float() {
    let mut item = empty_item();
    let a = literal(&mut item, SingleValue::Float(1.0));
    let b = literal(&mut item, SingleValue::Float(1.0));
    let m = item.expressions.push(Expr::Match, vec![a, b]);
    assert!(matches!(
        eval(&item, m),
        Err(AuthoringError::BaseTypeViolation { .. })
    ));
}

// ──────────────────────────────────────────────
// C. Cardinality refusal
// ──────────────────────────────────────────────

#[test]
fn c01_sum_refuses_multiple() {
    let mut item = empty_item();
    let one = literal(&mut item, SingleValue::Integer(1));
    let two = literal(&mut item, SingleValue::Integer(2));
    let container = item.expressions.push(Expr::Multiple, vec![one, two]);
    let three = literal(&mut item, SingleValue::Integer(3));
    let sum = item.expressions.push(Expr::Sum, vec![three, container]);
    match eval(&item, sum) {
        Err(AuthoringError::CardinalityViolation {
            operand,
            found,
            path,
            ..
        }) => {
            assert_eq!(operand, 1);
            assert_eq!(found, Cardinality::Multiple);
            assert_eq!(path, "sum");
        }
        other => panic!("expected CardinalityViolation, got {:?}", other),
    }
}

#[test]
fn c02_cardinality_checked_before_base_type() {
    let mut item = empty_item();
    let s = literal(&mut item, SingleValue::String("x".into()));
    let container = item.expressions.push(Expr::Multiple, vec![s]);
    let not = item.expressions.push(Expr::Not, vec![container]);
    assert!(matches!(
        eval(&item, not),
        Err(AuthoringError::CardinalityViolation { .. })
    ));
}

// ──────────────────────────────────────────────
// D. Numeric results
// ──────────────────────────────────────────────

#[test]
fn d01_sum_promotes_to_float_only_when_needed() {
    let mut item = empty_item();
    let two = literal(&mut item, SingleValue::Integer(2));
    let half = literal(&mut item, SingleValue::Float(1.5));
    let mixed = item.expressions.push(Expr::Sum, vec![two, half]);
    assert_eq!(eval(&item, mixed), Ok(Value::float(3.5)));

    let two = literal(&mut item, SingleValue::Integer(2));
    let three = literal(&mut item, SingleValue::Integer(3));
    let ints = item.expressions.push(Expr::Sum, vec![two, three]);
    assert_eq!(eval(&item, ints), Ok(Value::integer(5)));
}

#[test]
fn d02_integer_to_float() {
    let mut item = empty_item();
    let four = literal(&mut item, SingleValue::Integer(4));
    let itf = item.expressions.push(Expr::IntegerToFloat, vec![four]);
    assert_eq!(eval(&item, itf), Ok(Value::float(4.0)));
}

#[test]
fn d03_equal_with_variable_tolerance_from_literal() {
    let mut item = empty_item();
    let a = literal(&mut item, SingleValue::Float(1.0));
    let b = literal(&mut item, SingleValue::Float(1.05));
    let eq = item.expressions.push(
        Expr::Equal {
            mode: ToleranceMode::Absolute,
            tolerance: vec![FloatOrVar::Float(0.1)],
            include_lower_bound: true,
            include_upper_bound: true,
        },
        vec![a, b],
    );
    assert_eq!(eval(&item, eq), Ok(Value::boolean(true)));
}

#[test]
fn d04_integer_overflow_is_null() {
    let mut item = empty_item();
    let max = literal(&mut item, SingleValue::Integer(i64::MAX));
    let one = literal(&mut item, SingleValue::Integer(1));
    let sum = item.expressions.push(Expr::Sum, vec![max, one]);
    assert_eq!(eval(&item, sum), Ok(Value::Null));
}

proptest! {
    #[test]
    fn d05_integer_sum_matches_checked_add(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
        let mut item = empty_item();
        let x = literal(&mut item, SingleValue::Integer(a));
        let y = literal(&mut item, SingleValue::Integer(b));
        let sum = item.expressions.push(Expr::Sum, vec![x, y]);
        prop_assert_eq!(eval(&item, sum), Ok(Value::integer(a + b)));
    }

    #[test]
    fn d06_evaluation_is_repeatable(a in -1000i64..1000, b in 1i64..1000) {
        let mut item = empty_item();
        let x = literal(&mut item, SingleValue::Integer(a));
        let y = literal(&mut item, SingleValue::Integer(b));
        let div = item.expressions.push(Expr::IntegerModulus, vec![x, y]);
        let first = eval(&item, div);
        prop_assert_eq!(first.clone(), eval(&item, div));
        prop_assert!(first.is_ok());
    }
}
