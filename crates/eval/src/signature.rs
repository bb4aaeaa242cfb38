//! Operator signatures.
//!
//! Each non-leaf operator declares how many operands it takes, which
//! cardinalities and base types those operands may have, and whether a
//! NULL operand makes the whole result NULL. The evaluator checks every
//! non-NULL operand against the signature before combining.

use qti_core::{BaseType, Cardinality, Expr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => n == *k,
            Arity::AtLeast(k) => n >= *k,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Arity::Exactly(1) => "exactly 1 operand".to_string(),
            Arity::Exactly(k) => format!("exactly {} operands", k),
            Arity::AtLeast(k) => format!("at least {} operands", k),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseTypes {
    Any,
    Only(&'static [BaseType]),
    AnyExcept(&'static [BaseType]),
}

impl BaseTypes {
    pub fn accepts(&self, bt: BaseType) -> bool {
        match self {
            BaseTypes::Any => true,
            BaseTypes::Only(list) => list.contains(&bt),
            BaseTypes::AnyExcept(list) => !list.contains(&bt),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            BaseTypes::Any => "any".to_string(),
            BaseTypes::Only(list) => join(list.iter().map(|b| b.as_str())),
            BaseTypes::AnyExcept(list) => {
                format!("any except {}", join(list.iter().map(|b| b.as_str())))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub arity: Arity,
    pub cardinalities: &'static [Cardinality],
    pub base_types: BaseTypes,
    /// A NULL operand makes the result NULL without evaluating the rest.
    pub null_propagates: bool,
}

pub fn describe_cardinalities(list: &[Cardinality]) -> String {
    join(list.iter().map(|c| c.as_str()))
}

fn join<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(" or ")
}

const SINGLE: &[Cardinality] = &[Cardinality::Single];
const CONTAINERS: &[Cardinality] = &[Cardinality::Multiple, Cardinality::Ordered];
const NON_RECORD: &[Cardinality] = &[
    Cardinality::Single,
    Cardinality::Multiple,
    Cardinality::Ordered,
];
const ALL: &[Cardinality] = &Cardinality::ALL;

const NUMERIC: BaseTypes = BaseTypes::Only(&[BaseType::Integer, BaseType::Float]);
const INTEGER: BaseTypes = BaseTypes::Only(&[BaseType::Integer]);
const BOOLEAN: BaseTypes = BaseTypes::Only(&[BaseType::Boolean]);
const STRING: BaseTypes = BaseTypes::Only(&[BaseType::String]);
const DURATION: BaseTypes = BaseTypes::Only(&[BaseType::Duration]);
const POINT: BaseTypes = BaseTypes::Only(&[BaseType::Point]);
const NOT_FLOAT_OR_DURATION: BaseTypes =
    BaseTypes::AnyExcept(&[BaseType::Float, BaseType::Duration]);

fn sig(arity: Arity, cardinalities: &'static [Cardinality], base_types: BaseTypes) -> Signature {
    Signature {
        arity,
        cardinalities,
        base_types,
        null_propagates: true,
    }
}

fn null_tolerant(mut s: Signature) -> Signature {
    s.null_propagates = false;
    s
}

/// Signature of an operator, or `None` for leaf expressions.
pub fn signature(expr: &Expr) -> Option<Signature> {
    use Arity::{AtLeast, Exactly};
    let s = match expr {
        Expr::BaseValue(_)
        | Expr::Variable(_)
        | Expr::Correct(_)
        | Expr::Default(_)
        | Expr::MapResponse(_)
        | Expr::MapResponsePoint(_)
        | Expr::Null
        | Expr::RandomInteger { .. }
        | Expr::RandomFloat { .. }
        | Expr::MathConstant(_) => return None,

        Expr::Multiple => null_tolerant(sig(
            AtLeast(0),
            &[Cardinality::Single, Cardinality::Multiple],
            BaseTypes::Any,
        )),
        Expr::Ordered => null_tolerant(sig(
            AtLeast(0),
            &[Cardinality::Single, Cardinality::Ordered],
            BaseTypes::Any,
        )),
        Expr::Repeat(_) => null_tolerant(sig(
            AtLeast(1),
            &[Cardinality::Single, Cardinality::Ordered],
            BaseTypes::Any,
        )),
        Expr::RecordEx(_) => null_tolerant(sig(AtLeast(0), SINGLE, BaseTypes::Any)),
        Expr::ContainerSize => null_tolerant(sig(Exactly(1), CONTAINERS, BaseTypes::Any)),
        Expr::IsNull => null_tolerant(sig(Exactly(1), ALL, BaseTypes::Any)),
        Expr::And | Expr::Or | Expr::AnyN { .. } => {
            null_tolerant(sig(AtLeast(1), SINGLE, BOOLEAN))
        }

        Expr::Index(_) => sig(Exactly(1), &[Cardinality::Ordered], BaseTypes::Any),
        Expr::FieldValue(_) => sig(Exactly(1), &[Cardinality::Record], BaseTypes::Any),
        Expr::Random => sig(Exactly(1), CONTAINERS, BaseTypes::Any),
        Expr::Member | Expr::Delete => sig(Exactly(2), NON_RECORD, NOT_FLOAT_OR_DURATION),
        Expr::Contains => sig(
            Exactly(2),
            CONTAINERS,
            BaseTypes::AnyExcept(&[BaseType::Duration]),
        ),
        Expr::Substring { .. } | Expr::StringMatch { .. } => sig(Exactly(2), SINGLE, STRING),
        Expr::PatternMatch(_) => sig(Exactly(1), SINGLE, STRING),
        Expr::Not => sig(Exactly(1), SINGLE, BOOLEAN),
        Expr::Match => sig(Exactly(2), ALL, NOT_FLOAT_OR_DURATION),
        Expr::Equal { .. }
        | Expr::EqualRounded { .. }
        | Expr::Lt
        | Expr::Gt
        | Expr::Lte
        | Expr::Gte
        | Expr::Subtract
        | Expr::Divide
        | Expr::Power => sig(Exactly(2), SINGLE, NUMERIC),
        Expr::DurationLt | Expr::DurationGte => sig(Exactly(2), SINGLE, DURATION),
        Expr::Inside(_) => sig(Exactly(1), NON_RECORD, POINT),
        Expr::Sum | Expr::Product => sig(AtLeast(1), SINGLE, NUMERIC),
        Expr::IntegerDivide | Expr::IntegerModulus => sig(Exactly(2), SINGLE, INTEGER),
        Expr::Truncate | Expr::Round | Expr::RoundTo { .. } => sig(Exactly(1), SINGLE, NUMERIC),
        Expr::IntegerToFloat => sig(Exactly(1), SINGLE, INTEGER),
        Expr::Max | Expr::Min => sig(AtLeast(1), NON_RECORD, NUMERIC),
        Expr::Gcd | Expr::Lcm => sig(AtLeast(1), NON_RECORD, INTEGER),
        Expr::StatsOperator(_) => sig(Exactly(1), CONTAINERS, NUMERIC),
        Expr::MathOperator(op) => sig(Exactly(op.arity()), SINGLE, NUMERIC),
    };
    Some(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qti_core::MathOp;

    #[test]
    fn leaves_have_no_signature() {
        assert!(signature(&Expr::Null).is_none());
        assert!(signature(&Expr::Variable("X".into())).is_none());
    }

    #[test]
    fn sum_signature() {
        let s = signature(&Expr::Sum).unwrap();
        assert!(s.arity.accepts(1));
        assert!(!s.arity.accepts(0));
        assert_eq!(s.cardinalities, &[Cardinality::Single]);
        assert!(s.base_types.accepts(BaseType::Float));
        assert!(!s.base_types.accepts(BaseType::Boolean));
        assert!(s.null_propagates);
    }

    #[test]
    fn atan2_takes_two() {
        let s = signature(&Expr::MathOperator(MathOp::Atan2)).unwrap();
        assert_eq!(s.arity, Arity::Exactly(2));
        let s = signature(&Expr::MathOperator(MathOp::Sin)).unwrap();
        assert_eq!(s.arity, Arity::Exactly(1));
    }

    #[test]
    fn match_excludes_float() {
        let s = signature(&Expr::Match).unwrap();
        assert!(!s.base_types.accepts(BaseType::Float));
        assert!(s.base_types.accepts(BaseType::Identifier));
        assert_eq!(s.base_types.describe(), "any except float or duration");
    }

    #[test]
    fn null_tolerant_operators() {
        for e in [Expr::Multiple, Expr::IsNull, Expr::ContainerSize, Expr::And] {
            assert!(!signature(&e).unwrap().null_propagates, "{}", e.name());
        }
    }
}
