//! Expression evaluator.
//!
//! `evaluate` walks an expression tree bottom-up. For every operator it:
//!
//! 1. evaluates all children,
//! 2. returns NULL if any child is NULL and the operator propagates NULL
//!    (no type checks are made on NULL operands),
//! 3. checks every non-NULL operand against the operator's signature,
//! 4. combines the operands.
//!
//! Evaluation only reads the variable store. The random operators draw from
//! the session's seeded generator, so a session replays identically for a
//! given seed.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use qti_core::{
    BaseType, Cardinality, Expr, ExprId, ExprNode, FloatOrVar, IntOrVar, ItemDefinition,
    MathConstant, MathOp, SingleValue, StatsOp, ToleranceMode, Value, VariableKind,
};
use rand::rngs::StdRng;
use rand::Rng;
use regex::Regex;

use crate::error::AuthoringError;
use crate::numeric;
use crate::signature::{describe_cardinalities, signature, Signature};
use crate::store::VariableStore;


/// Read-only inputs of an evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub item: &'a ItemDefinition,
    pub store: &'a VariableStore,
}

impl<'a> EvalContext<'a> {
    pub fn new(item: &'a ItemDefinition, store: &'a VariableStore) -> Self {
        EvalContext { item, store }
    }

    fn node(&self, id: ExprId) -> Result<&'a ExprNode, AuthoringError> {
        self.item
            .expr(id)
            .ok_or_else(|| AuthoringError::InvalidOperand {
                operator: "expression".to_string(),
                path: format!("{:?}", id),
                message: "node does not exist".to_string(),
            })
    }
}

/// Evaluate the expression rooted at `id`.
pub fn evaluate(
    id: ExprId,
    ctx: &EvalContext<'_>,
    rng: &mut StdRng,
) -> Result<Value, AuthoringError> {
    let node = ctx.node(id)?;
    let site = Site {
        id,
        kind: &node.kind,
        ctx,
    };
    let Some(sig) = signature(&node.kind) else {
        return eval_leaf(&site, rng);
    };

    if !sig.arity.accepts(node.children.len()) {
        return Err(site.invalid(format!(
            "expects {}, found {}",
            sig.arity.describe(),
            node.children.len()
        )));
    }

    let mut operands = Vec::with_capacity(node.children.len());
    for &child in &node.children {
        operands.push(evaluate(child, ctx, rng)?);
    }

    if sig.null_propagates && operands.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    for (i, operand) in operands.iter().enumerate() {
        site.check_operand(&sig, i, operand)?;
    }

    combine(&site, &operands, rng)
}

// ──────────────────────────────────────────────
// Error site
// ──────────────────────────────────────────────

/// The node being evaluated, for building errors that name it.
struct Site<'a> {
    id: ExprId,
    kind: &'a Expr,
    ctx: &'a EvalContext<'a>,
}

impl Site<'_> {
    fn operator(&self) -> String {
        self.kind.name().to_string()
    }

    fn path(&self) -> String {
        self.ctx.item.expressions.path(self.id)
    }

    fn invalid(&self, message: impl Into<String>) -> AuthoringError {
        AuthoringError::InvalidOperand {
            operator: self.operator(),
            path: self.path(),
            message: message.into(),
        }
    }

    fn cardinality_violation(
        &self,
        operand: usize,
        expected: &[Cardinality],
        found: Cardinality,
    ) -> AuthoringError {
        AuthoringError::CardinalityViolation {
            operator: self.operator(),
            operand,
            path: self.path(),
            expected: describe_cardinalities(expected),
            found,
        }
    }

    fn base_type_violation(
        &self,
        operand: usize,
        expected: impl Into<String>,
        found: Option<BaseType>,
    ) -> AuthoringError {
        AuthoringError::BaseTypeViolation {
            operator: self.operator(),
            operand,
            path: self.path(),
            expected: expected.into(),
            found: AuthoringError::base_type_name(found),
        }
    }

    fn check_operand(
        &self,
        sig: &Signature,
        index: usize,
        value: &Value,
    ) -> Result<(), AuthoringError> {
        let Some(card) = value.cardinality() else {
            return Ok(());
        };
        if !sig.cardinalities.contains(&card) {
            return Err(self.cardinality_violation(index, sig.cardinalities, card));
        }
        if let Some(bt) = value.base_type() {
            if !sig.base_types.accepts(bt) {
                return Err(self.base_type_violation(index, sig.base_types.describe(), Some(bt)));
            }
        }
        Ok(())
    }

    fn unknown_variable(&self, identifier: &str) -> AuthoringError {
        AuthoringError::UnknownVariable {
            identifier: identifier.to_string(),
            path: self.path(),
        }
    }

    /// Resolve an integer operand, reading a template variable if named.
    fn resolve_int(&self, operand: &IntOrVar) -> Result<i64, AuthoringError> {
        match operand {
            IntOrVar::Int(i) => Ok(*i),
            IntOrVar::Var(name) => {
                let value = self
                    .ctx
                    .store
                    .get(name)
                    .ok_or_else(|| self.unknown_variable(name))?;
                value
                    .as_single()
                    .and_then(SingleValue::as_integer)
                    .ok_or_else(|| {
                        self.invalid(format!(
                            "variable '{}' must hold a single integer, found {}",
                            name, value
                        ))
                    })
            }
        }
    }

    fn resolve_float(&self, operand: &FloatOrVar) -> Result<f64, AuthoringError> {
        match operand {
            FloatOrVar::Float(f) => Ok(*f),
            FloatOrVar::Var(name) => {
                let value = self
                    .ctx
                    .store
                    .get(name)
                    .ok_or_else(|| self.unknown_variable(name))?;
                value
                    .as_single()
                    .and_then(SingleValue::as_f64)
                    .ok_or_else(|| {
                        self.invalid(format!(
                            "variable '{}' must hold a single number, found {}",
                            name, value
                        ))
                    })
            }
        }
    }
}

// ──────────────────────────────────────────────
// Leaves
// ──────────────────────────────────────────────

fn eval_leaf(site: &Site<'_>, rng: &mut StdRng) -> Result<Value, AuthoringError> {
    let store = site.ctx.store;
    match site.kind {
        Expr::BaseValue(v) => Ok(Value::Single(v.clone())),
        Expr::Null => Ok(Value::Null),
        Expr::Variable(name) => store
            .get(name)
            .cloned()
            .ok_or_else(|| site.unknown_variable(name)),
        Expr::Default(name) => store
            .default_value(name)
            .ok_or_else(|| site.unknown_variable(name)),
        Expr::Correct(name) => {
            let decl = store
                .declaration(name)
                .ok_or_else(|| site.unknown_variable(name))?;
            if decl.kind() != VariableKind::Response {
                return Err(site.invalid(format!(
                    "'{}' is a {} variable; only response variables have a correct response",
                    name,
                    decl.kind()
                )));
            }
            Ok(store.correct_response(name).unwrap_or_default())
        }
        Expr::MapResponse(name) => map_response(site, name),
        Expr::MapResponsePoint(name) => map_response_point(site, name),
        Expr::MathConstant(c) => Ok(Value::float(match c {
            MathConstant::Pi => std::f64::consts::PI,
            MathConstant::E => std::f64::consts::E,
        })),
        Expr::RandomInteger { min, max, step } => {
            let min = site.resolve_int(min)?;
            let max = site.resolve_int(max)?;
            let step = site.resolve_int(step)?;
            if step < 1 {
                return Err(site.invalid(format!("step must be positive, got {}", step)));
            }
            if max < min {
                return Err(site.invalid(format!("max {} is below min {}", max, min)));
            }
            let span = max
                .checked_sub(min)
                .ok_or_else(|| site.invalid("range does not fit in a 64-bit integer"))?;
            let k = rng.gen_range(0..=span / step);
            Ok(Value::integer(min + k * step))
        }
        Expr::RandomFloat { min, max } => {
            let min = site.resolve_float(min)?;
            let max = site.resolve_float(max)?;
            if !(min.is_finite() && max.is_finite()) || max < min {
                return Err(site.invalid(format!("invalid range [{}, {}]", min, max)));
            }
            if max == min {
                return Ok(Value::float(min));
            }
            Ok(Value::float(rng.gen_range(min..=max)))
        }
        other => Err(site.invalid(format!("'{}' is not a leaf expression", other.name()))),
    }
}

/// Sum of mapped values over the distinct members of a response.
fn map_response(site: &Site<'_>, name: &str) -> Result<Value, AuthoringError> {
    let store = site.ctx.store;
    let decl = store
        .declaration(name)
        .ok_or_else(|| site.unknown_variable(name))?;
    let mapping = decl
        .mapping()
        .ok_or_else(|| AuthoringError::MissingMapping {
            identifier: name.to_string(),
            operator: site.operator(),
            kind: "mapping".to_string(),
        })?;
    let value = store.get(name).cloned().unwrap_or_default();
    let total = match &value {
        Value::Null => mapping.default_value,
        Value::Single(v) => mapping.lookup(v).unwrap_or(mapping.default_value),
        Value::Multiple(c) | Value::Ordered(c) => {
            let mut seen: Vec<&SingleValue> = Vec::new();
            let mut total = 0.0;
            for item in c.items() {
                if seen.contains(&item) {
                    continue;
                }
                seen.push(item);
                total += mapping.lookup(item).unwrap_or(mapping.default_value);
            }
            total
        }
        Value::Record(_) => return Err(site.invalid("cannot map a record response")),
    };
    Ok(Value::float(mapping.clamp(total)))
}

/// Sum of area values hit by a point response; points outside every area
/// score the default.
fn map_response_point(site: &Site<'_>, name: &str) -> Result<Value, AuthoringError> {
    let store = site.ctx.store;
    let decl = store
        .declaration(name)
        .ok_or_else(|| site.unknown_variable(name))?;
    let area_mapping = decl
        .area_mapping()
        .ok_or_else(|| AuthoringError::MissingMapping {
            identifier: name.to_string(),
            operator: site.operator(),
            kind: "areaMapping".to_string(),
        })?;
    let value = store.get(name).cloned().unwrap_or_default();
    if value.is_null() {
        return Ok(Value::float(area_mapping.clamp(area_mapping.default_value)));
    }
    if matches!(value, Value::Record(_)) {
        return Err(site.invalid("cannot map a record response"));
    }
    let mut points = Vec::new();
    for item in value.members() {
        match item {
            SingleValue::Point { x, y } => points.push((*x, *y)),
            other => {
                return Err(site.invalid(format!(
                    "response '{}' holds {} values, expected point",
                    name,
                    other.base_type()
                )))
            }
        }
    }

    let mut hit_areas = BTreeSet::new();
    let mut total = 0.0;
    for &(x, y) in &points {
        let mut inside_any = false;
        for (i, entry) in area_mapping.entries.iter().enumerate() {
            if entry.shape.contains(x, y) {
                inside_any = true;
                if hit_areas.insert(i) {
                    total += entry.value;
                }
            }
        }
        if !inside_any {
            total += area_mapping.default_value;
        }
    }
    Ok(Value::float(area_mapping.clamp(total)))
}

// ──────────────────────────────────────────────
// Operators
// ──────────────────────────────────────────────

fn combine(site: &Site<'_>, ops: &[Value], rng: &mut StdRng) -> Result<Value, AuthoringError> {
    match site.kind {
        // Containers
        Expr::Multiple => build_container(site, ops, Cardinality::Multiple, 1),
        Expr::Ordered => build_container(site, ops, Cardinality::Ordered, 1),
        Expr::Repeat(n) => {
            let n = site.resolve_int(n)?;
            if n < 1 {
                return Ok(Value::Null);
            }
            let times = usize::try_from(n)
                .map_err(|_| site.invalid(format!("numberRepeats {} is too large", n)))?;
            build_container(site, ops, Cardinality::Ordered, times)
        }
        Expr::RecordEx(fields) => {
            let mut record = BTreeMap::new();
            for (field, value) in fields.iter().zip(ops) {
                if let Value::Single(v) = value {
                    record.insert(field.clone(), v.clone());
                }
            }
            Ok(Value::record(record))
        }
        Expr::ContainerSize => Ok(Value::integer(
            ops[0].as_container().map_or(0, |c| c.len() as i64),
        )),
        Expr::IsNull => Ok(Value::boolean(ops[0].is_null())),
        Expr::Index(n) => {
            let n = site.resolve_int(n)?;
            if n < 1 {
                return Err(site.invalid(format!("index must be at least 1, got {}", n)));
            }
            Ok(items(&ops[0])
                .get((n - 1) as usize)
                .cloned()
                .map(Value::Single)
                .unwrap_or(Value::Null))
        }
        Expr::FieldValue(field) => match &ops[0] {
            Value::Record(fields) => Ok(fields
                .get(field)
                .cloned()
                .map(Value::Single)
                .unwrap_or(Value::Null)),
            _ => Ok(Value::Null),
        },
        Expr::Random => {
            let members = items(&ops[0]);
            if members.is_empty() {
                return Ok(Value::Null);
            }
            let i = rng.gen_range(0..members.len());
            Ok(Value::Single(members[i].clone()))
        }
        Expr::Member => {
            let (needle, haystack) = single_and_container(site, ops)?;
            Ok(Value::boolean(haystack.iter().any(|v| v == needle)))
        }
        Expr::Delete => {
            let (needle, haystack) = single_and_container(site, ops)?;
            let remaining: Vec<SingleValue> =
                haystack.iter().filter(|v| *v != needle).cloned().collect();
            let card = ops[1].cardinality().unwrap_or(Cardinality::Multiple);
            let bt = needle.base_type();
            Value::container(card, bt, remaining).map_err(|e| site.invalid(e.to_string()))
        }
        Expr::Contains => {
            same_cardinality(site, ops)?;
            same_base_type(site, ops)?;
            let (outer, inner) = (items(&ops[0]), items(&ops[1]));
            let found = if matches!(ops[0], Value::Ordered(_)) {
                inner.is_empty()
                    || (inner.len() <= outer.len()
                        && outer.windows(inner.len()).any(|w| w == inner))
            } else {
                multiset_includes(outer, inner)
            };
            Ok(Value::boolean(found))
        }

        // Logic
        Expr::Not => Ok(Value::boolean(!boolean(&ops[0]))),
        Expr::And => Ok(three_valued(ops, false)),
        Expr::Or => Ok(three_valued(ops, true)),
        Expr::AnyN { min, max } => {
            let min = site.resolve_int(min)?;
            let max = site.resolve_int(max)?;
            let trues = ops.iter().filter(|v| v.as_bool() == Some(true)).count() as i64;
            let nulls = ops.iter().filter(|v| v.is_null()).count() as i64;
            if trues > max || trues + nulls < min {
                Ok(Value::boolean(false))
            } else if trues >= min && trues + nulls <= max {
                Ok(Value::boolean(true))
            } else {
                Ok(Value::Null)
            }
        }

        // Comparison
        Expr::Match => {
            same_cardinality(site, ops)?;
            if let (Value::Record(a), Value::Record(b)) = (&ops[0], &ops[1]) {
                let same_keys = a.keys().eq(b.keys());
                return Ok(Value::boolean(same_keys && a == b));
            }
            same_base_type(site, ops)?;
            Ok(Value::boolean(ops[0] == ops[1]))
        }
        Expr::Substring { case_sensitive } => {
            let (needle, haystack) = (text(&ops[0]), text(&ops[1]));
            Ok(Value::boolean(if *case_sensitive {
                haystack.contains(needle)
            } else {
                haystack.to_lowercase().contains(&needle.to_lowercase())
            }))
        }
        Expr::StringMatch {
            case_sensitive,
            substring,
        } => {
            let (a, b) = if *case_sensitive {
                (text(&ops[0]).to_string(), text(&ops[1]).to_string())
            } else {
                (text(&ops[0]).to_lowercase(), text(&ops[1]).to_lowercase())
            };
            Ok(Value::boolean(if *substring {
                a.contains(&b)
            } else {
                a == b
            }))
        }
        Expr::PatternMatch(pattern) => {
            let re = Regex::new(&format!("^(?:{})$", pattern))
                .map_err(|e| site.invalid(format!("invalid pattern: {}", e)))?;
            Ok(Value::boolean(re.is_match(text(&ops[0]))))
        }
        Expr::Equal {
            mode,
            tolerance,
            include_lower_bound,
            include_upper_bound,
        } => {
            let (x, y) = (number(&ops[0]).as_f64(), number(&ops[1]).as_f64());
            if *mode == ToleranceMode::Exact {
                return Ok(Value::boolean(x == y));
            }
            let t0 = tolerance
                .first()
                .ok_or_else(|| site.invalid("tolerance mode requires a tolerance"))?;
            let t0 = site.resolve_float(t0)?;
            let t1 = match tolerance.get(1) {
                Some(t) => site.resolve_float(t)?,
                None => t0,
            };
            let (lower, upper) = match mode {
                ToleranceMode::Absolute => (y - t0, y + t1),
                _ => (y * (1.0 - t0 / 100.0), y * (1.0 + t1 / 100.0)),
            };
            let above = if *include_lower_bound { x >= lower } else { x > lower };
            let below = if *include_upper_bound { x <= upper } else { x < upper };
            Ok(Value::boolean(above && below))
        }
        Expr::EqualRounded { mode, figures } => {
            let figures = site.resolve_int(figures)?;
            let (x, y) = (number(&ops[0]).as_f64(), number(&ops[1]).as_f64());
            numeric::equal_rounded(x, y, *mode, figures)
                .map(Value::boolean)
                .map_err(|e| site.invalid(e.to_string()))
        }
        Expr::Inside(shape) => Ok(Value::boolean(items(&ops[0]).iter().any(|p| match p {
            SingleValue::Point { x, y } => shape.contains(*x, *y),
            _ => false,
        }))),
        Expr::Lt => Ok(compare(ops, Ordering::is_lt)),
        Expr::Gt => Ok(compare(ops, Ordering::is_gt)),
        Expr::Lte => Ok(compare(ops, Ordering::is_le)),
        Expr::Gte => Ok(compare(ops, Ordering::is_ge)),
        Expr::DurationLt => Ok(compare_durations(ops, Ordering::is_lt)),
        Expr::DurationGte => Ok(compare_durations(ops, Ordering::is_ge)),

        // Arithmetic
        Expr::Sum => Ok(fold_numbers(ops, i64::checked_add, |a, b| a + b, 0)),
        Expr::Product => Ok(fold_numbers(ops, i64::checked_mul, |a, b| a * b, 1)),
        Expr::Subtract => Ok(match (number(&ops[0]), number(&ops[1])) {
            (Num::Int(a), Num::Int(b)) => a.checked_sub(b).map_or(Value::Null, Value::integer),
            (a, b) => Value::float(a.as_f64() - b.as_f64()),
        }),
        Expr::Divide => {
            let (x, y) = (number(&ops[0]).as_f64(), number(&ops[1]).as_f64());
            if y == 0.0 {
                return Ok(Value::Null);
            }
            Ok(Value::float(x / y))
        }
        Expr::Power => {
            let r = number(&ops[0]).as_f64().powf(number(&ops[1]).as_f64());
            Ok(finite_float(r))
        }
        Expr::IntegerDivide => Ok(int_pair(ops, numeric::floor_div)),
        Expr::IntegerModulus => Ok(int_pair(ops, numeric::floor_mod)),
        Expr::Truncate => Ok(match number(&ops[0]) {
            Num::Int(i) => Value::integer(i),
            Num::Float(f) => float_to_integer(f.trunc()),
        }),
        Expr::Round => Ok(match number(&ops[0]) {
            Num::Int(i) => Value::integer(i),
            Num::Float(f) => float_to_integer(numeric::round_half_up(f)),
        }),
        Expr::IntegerToFloat => Ok(ops[0].integer_to_float().unwrap_or(Value::Null)),
        Expr::RoundTo { mode, figures } => {
            let figures = site.resolve_int(figures)?;
            numeric::round_to(number(&ops[0]).as_f64(), *mode, figures)
                .map(Value::float)
                .map_err(|e| site.invalid(e.to_string()))
        }
        Expr::Max => Ok(extremum(ops, Ordering::Greater)),
        Expr::Min => Ok(extremum(ops, Ordering::Less)),
        Expr::Gcd => Ok(fold_integers(ops, numeric::gcd)),
        Expr::Lcm => Ok(fold_integers(ops, numeric::lcm)),
        Expr::StatsOperator(op) => Ok(stats(*op, &numbers(&ops[0]))),
        Expr::MathOperator(op) => Ok(math(*op, ops)),

        leaf => Err(site.invalid(format!("'{}' takes no operands", leaf.name()))),
    }
}

// ──────────────────────────────────────────────
// Operand helpers
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

/// Numeric view of an operand already checked to be a single number.
fn number(v: &Value) -> Num {
    match v.as_single() {
        Some(SingleValue::Integer(i)) => Num::Int(*i),
        Some(SingleValue::Float(f)) => Num::Float(*f),
        _ => Num::Float(f64::NAN),
    }
}

fn numbers(v: &Value) -> Vec<f64> {
    items(v).iter().filter_map(SingleValue::as_f64).collect()
}

fn items(v: &Value) -> &[SingleValue] {
    match v {
        Value::Single(s) => std::slice::from_ref(s),
        Value::Multiple(c) | Value::Ordered(c) => c.items(),
        Value::Null | Value::Record(_) => &[],
    }
}

fn boolean(v: &Value) -> bool {
    v.as_bool().unwrap_or(false)
}

fn text(v: &Value) -> &str {
    v.as_single().and_then(SingleValue::as_text).unwrap_or("")
}

fn finite_float(f: f64) -> Value {
    if f.is_finite() {
        Value::float(f)
    } else {
        Value::Null
    }
}

fn float_to_integer(f: f64) -> Value {
    // i64::MAX as f64 rounds up to 2^63, which is out of range.
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Value::integer(f as i64)
    } else {
        Value::Null
    }
}

/// Largest container `multiple`, `ordered` or `repeat` may build.
const MAX_CONTAINER_MEMBERS: usize = 1 << 20;

/// Flatten single/container operands into one container of a shared base
/// type, repeated `times` times. NULL operands are skipped.
fn build_container(
    site: &Site<'_>,
    ops: &[Value],
    cardinality: Cardinality,
    times: usize,
) -> Result<Value, AuthoringError> {
    let mut base_type = None;
    let mut members = Vec::new();
    for (i, op) in ops.iter().enumerate() {
        let Some(bt) = op.base_type() else {
            continue;
        };
        match base_type {
            None => base_type = Some(bt),
            Some(expected) if expected != bt => {
                return Err(site.base_type_violation(i, expected.as_str(), Some(bt)));
            }
            Some(_) => {}
        }
        members.extend(items(op).iter().cloned());
    }
    let Some(bt) = base_type else {
        return Ok(Value::Null);
    };
    if members.is_empty() {
        return Value::container(cardinality, bt, members).map_err(|e| site.invalid(e.to_string()));
    }
    let total = members
        .len()
        .checked_mul(times)
        .filter(|&total| total <= MAX_CONTAINER_MEMBERS)
        .ok_or_else(|| {
            site.invalid(format!(
                "{} copies of {} members exceeds the limit of {}",
                times,
                members.len(),
                MAX_CONTAINER_MEMBERS
            ))
        })?;
    let mut repeated = Vec::with_capacity(total);
    for _ in 0..times {
        repeated.extend(members.iter().cloned());
    }
    Value::container(cardinality, bt, repeated).map_err(|e| site.invalid(e.to_string()))
}

/// `member` / `delete` operands: a single value and a container of the
/// same base type.
fn single_and_container<'v>(
    site: &Site<'_>,
    ops: &'v [Value],
) -> Result<(&'v SingleValue, &'v [SingleValue]), AuthoringError> {
    let needle = match &ops[0] {
        Value::Single(v) => v,
        other => {
            return Err(site.cardinality_violation(
                0,
                &[Cardinality::Single],
                other.cardinality().unwrap_or(Cardinality::Single),
            ))
        }
    };
    let haystack = match &ops[1] {
        Value::Multiple(c) | Value::Ordered(c) => c,
        other => {
            return Err(site.cardinality_violation(
                1,
                &[Cardinality::Multiple, Cardinality::Ordered],
                other.cardinality().unwrap_or(Cardinality::Single),
            ))
        }
    };
    if haystack.base_type() != needle.base_type() {
        return Err(site.base_type_violation(
            1,
            needle.base_type().as_str(),
            Some(haystack.base_type()),
        ));
    }
    Ok((needle, haystack.items()))
}

fn same_cardinality(site: &Site<'_>, ops: &[Value]) -> Result<(), AuthoringError> {
    let (a, b) = (ops[0].cardinality(), ops[1].cardinality());
    match (a, b) {
        (Some(a), Some(b)) if a != b => Err(site.cardinality_violation(1, &[a], b)),
        _ => Ok(()),
    }
}

fn same_base_type(site: &Site<'_>, ops: &[Value]) -> Result<(), AuthoringError> {
    let (a, b) = (ops[0].base_type(), ops[1].base_type());
    match (a, b) {
        (Some(a), Some(b)) if a != b => Err(site.base_type_violation(1, a.as_str(), Some(b))),
        _ => Ok(()),
    }
}

/// Every member of `inner` appears in `outer` at least as often.
fn multiset_includes(outer: &[SingleValue], inner: &[SingleValue]) -> bool {
    let mut used = vec![false; outer.len()];
    inner.iter().all(|needle| {
        match outer
            .iter()
            .enumerate()
            .position(|(i, v)| !used[i] && v == needle)
        {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

/// `and` (dominant = false) / `or` (dominant = true) over true, false and
/// NULL: the dominant value wins, else any NULL gives NULL.
fn three_valued(ops: &[Value], dominant: bool) -> Value {
    if ops.iter().any(|v| v.as_bool() == Some(dominant)) {
        return Value::boolean(dominant);
    }
    if ops.iter().any(Value::is_null) {
        return Value::Null;
    }
    Value::boolean(!dominant)
}

fn compare(ops: &[Value], accept: fn(Ordering) -> bool) -> Value {
    let ordering = match (number(&ops[0]), number(&ops[1])) {
        (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
        (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
    };
    Value::boolean(ordering.is_some_and(accept))
}

fn compare_durations(ops: &[Value], accept: fn(Ordering) -> bool) -> Value {
    let seconds = |v: &Value| match v.as_single() {
        Some(SingleValue::Duration(s)) => *s,
        _ => f64::NAN,
    };
    let ordering = seconds(&ops[0]).partial_cmp(&seconds(&ops[1]));
    Value::boolean(ordering.is_some_and(accept))
}

/// Fold numeric operands: integer arithmetic while every operand is an
/// integer (overflow gives NULL), float arithmetic once any is a float.
fn fold_numbers(
    ops: &[Value],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
    identity: i64,
) -> Value {
    let nums: Vec<Num> = ops.iter().map(number).collect();
    if nums.iter().all(|n| matches!(n, Num::Int(_))) {
        let mut acc = identity;
        for n in nums {
            if let Num::Int(i) = n {
                match int_op(acc, i) {
                    Some(next) => acc = next,
                    None => return Value::Null,
                }
            }
        }
        Value::integer(acc)
    } else {
        let acc = nums
            .iter()
            .fold(identity as f64, |acc, n| float_op(acc, n.as_f64()));
        Value::float(acc)
    }
}

fn int_pair(ops: &[Value], f: fn(i64, i64) -> Option<i64>) -> Value {
    match (number(&ops[0]), number(&ops[1])) {
        (Num::Int(a), Num::Int(b)) => f(a, b).map_or(Value::Null, Value::integer),
        _ => Value::Null,
    }
}

fn fold_integers(ops: &[Value], f: fn(i64, i64) -> Option<i64>) -> Value {
    let mut values = ops
        .iter()
        .flat_map(|v| items(v).iter())
        .filter_map(SingleValue::as_integer);
    let Some(first) = values.next() else {
        return Value::Null;
    };
    let mut acc = match first.checked_abs() {
        Some(v) => v,
        None => return Value::Null,
    };
    for v in values {
        match f(acc, v) {
            Some(next) => acc = next,
            None => return Value::Null,
        }
    }
    Value::integer(acc)
}

/// `max` (wanted = Greater) / `min` (wanted = Less) across all members of
/// all operands.
fn extremum(ops: &[Value], wanted: Ordering) -> Value {
    let members: Vec<&SingleValue> = ops.iter().flat_map(|v| items(v).iter()).collect();
    if members.iter().any(|v| matches!(v, SingleValue::Float(_))) {
        let mut best: Option<f64> = None;
        for v in members.iter().filter_map(|v| v.as_f64()) {
            best = match best {
                Some(b) if v.partial_cmp(&b) != Some(wanted) => Some(b),
                _ => Some(v),
            };
        }
        best.map_or(Value::Null, Value::float)
    } else {
        let mut best: Option<i64> = None;
        for v in members.iter().filter_map(|v| v.as_integer()) {
            best = match best {
                Some(b) if v.cmp(&b) != wanted => Some(b),
                _ => Some(v),
            };
        }
        best.map_or(Value::Null, Value::integer)
    }
}

fn stats(op: StatsOp, xs: &[f64]) -> Value {
    let n = xs.len() as f64;
    if xs.is_empty() {
        return Value::Null;
    }
    let mean = xs.iter().sum::<f64>() / n;
    let squares = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    let result = match op {
        StatsOp::Mean => mean,
        StatsOp::PopVariance => squares / n,
        StatsOp::PopSd => (squares / n).sqrt(),
        StatsOp::SampleVariance | StatsOp::SampleSd if xs.len() < 2 => return Value::Null,
        StatsOp::SampleVariance => squares / (n - 1.0),
        StatsOp::SampleSd => (squares / (n - 1.0)).sqrt(),
    };
    finite_float(result)
}

fn math(op: MathOp, ops: &[Value]) -> Value {
    let first = number(&ops[0]);
    let x = first.as_f64();
    match op {
        MathOp::Floor => return float_to_integer(x.floor()),
        MathOp::Ceil => return float_to_integer(x.ceil()),
        MathOp::Signum => {
            if x.is_nan() {
                return Value::Null;
            }
            return Value::integer(if x > 0.0 {
                1
            } else if x < 0.0 {
                -1
            } else {
                0
            });
        }
        MathOp::Abs => {
            return match first {
                Num::Int(i) => i.checked_abs().map_or(Value::Null, Value::integer),
                Num::Float(f) => finite_float(f.abs()),
            }
        }
        _ => {}
    }
    let r = match op {
        MathOp::Sin => x.sin(),
        MathOp::Cos => x.cos(),
        MathOp::Tan => x.tan(),
        MathOp::Sec => 1.0 / x.cos(),
        MathOp::Csc => 1.0 / x.sin(),
        MathOp::Cot => 1.0 / x.tan(),
        MathOp::Asin => x.asin(),
        MathOp::Acos => x.acos(),
        MathOp::Atan => x.atan(),
        MathOp::Atan2 => x.atan2(number(&ops[1]).as_f64()),
        MathOp::Asec => (1.0 / x).acos(),
        MathOp::Acsc => (1.0 / x).asin(),
        MathOp::Acot => (1.0 / x).atan(),
        MathOp::Sinh => x.sinh(),
        MathOp::Cosh => x.cosh(),
        MathOp::Tanh => x.tanh(),
        MathOp::Sech => 1.0 / x.cosh(),
        MathOp::Csch => 1.0 / x.sinh(),
        MathOp::Coth => 1.0 / x.tanh(),
        MathOp::Log => x.log10(),
        MathOp::Ln => x.ln(),
        MathOp::Exp => x.exp(),
        MathOp::ToDegrees => x.to_degrees(),
        MathOp::ToRadians => x.to_radians(),
        MathOp::Floor | MathOp::Ceil | MathOp::Signum | MathOp::Abs => return Value::Null,
    };
    finite_float(r)
}
