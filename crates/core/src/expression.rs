//! Expression trees.
//!
//! Every node is an [`ExprNode`]: an operator tag ([`Expr`]) carrying its
//! literal operands, plus the ids of its child expressions in order. Nodes
//! live in an [`ExprArena`]; [`ExprArena::push`] wires up the parent table
//! as children are attached.

use serde::{Deserialize, Serialize};

use crate::arena::{Arena, NodeId};
use crate::shape::Shape;
use crate::value::SingleValue;

pub type ExprId = NodeId<ExprNode>;
pub type ExprArena = Arena<ExprNode>;

#[derive(Debug, Clone, PartialEq)]
pub struct ExprNode {
    pub kind: Expr,
    pub children: Vec<ExprId>,
}

/// Integer operand given literally or by naming a template variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrVar {
    Int(i64),
    Var(String),
}

/// Float operand given literally or by naming a template variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FloatOrVar {
    Float(f64),
    Var(String),
}

impl IntOrVar {
    pub fn variable(&self) -> Option<&str> {
        match self {
            IntOrVar::Var(name) => Some(name),
            IntOrVar::Int(_) => None,
        }
    }
}

impl FloatOrVar {
    pub fn variable(&self) -> Option<&str> {
        match self {
            FloatOrVar::Var(name) => Some(name),
            FloatOrVar::Float(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToleranceMode {
    Exact,
    Absolute,
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundingMode {
    SignificantFigures,
    DecimalPlaces,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatsOp {
    Mean,
    SampleVariance,
    #[serde(rename = "sampleSD")]
    SampleSd,
    PopVariance,
    #[serde(rename = "popSD")]
    PopSd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MathOp {
    Sin,
    Cos,
    Tan,
    Sec,
    Csc,
    Cot,
    Asin,
    Acos,
    Atan,
    Atan2,
    Asec,
    Acsc,
    Acot,
    Sinh,
    Cosh,
    Tanh,
    Sech,
    Csch,
    Coth,
    Log,
    Ln,
    Exp,
    Abs,
    Signum,
    Floor,
    Ceil,
    ToDegrees,
    ToRadians,
}

impl MathOp {
    /// Number of operands the function takes.
    pub fn arity(&self) -> usize {
        match self {
            MathOp::Atan2 => 2,
            _ => 1,
        }
    }

    /// Functions whose result is an integer for integer-valued input.
    pub fn is_integer_valued(&self) -> bool {
        matches!(
            self,
            MathOp::Abs | MathOp::Signum | MathOp::Floor | MathOp::Ceil
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathConstant {
    Pi,
    E,
}

/// Operator tag and literal operands of an expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Leaves
    BaseValue(SingleValue),
    Variable(String),
    Correct(String),
    Default(String),
    MapResponse(String),
    MapResponsePoint(String),
    Null,
    RandomInteger {
        min: IntOrVar,
        max: IntOrVar,
        step: IntOrVar,
    },
    RandomFloat {
        min: FloatOrVar,
        max: FloatOrVar,
    },
    MathConstant(MathConstant),

    // Containers
    Multiple,
    Ordered,
    ContainerSize,
    IsNull,
    Index(IntOrVar),
    FieldValue(String),
    Random,
    Member,
    Delete,
    Contains,
    Repeat(IntOrVar),
    /// Field names, one per child.
    RecordEx(Vec<String>),

    // Logic
    Not,
    And,
    Or,
    AnyN {
        min: IntOrVar,
        max: IntOrVar,
    },

    // Comparison
    Match,
    Substring {
        case_sensitive: bool,
    },
    StringMatch {
        case_sensitive: bool,
        substring: bool,
    },
    PatternMatch(String),
    Equal {
        mode: ToleranceMode,
        /// One or two tolerances; a single one applies to both bounds.
        tolerance: Vec<FloatOrVar>,
        include_lower_bound: bool,
        include_upper_bound: bool,
    },
    EqualRounded {
        mode: RoundingMode,
        figures: IntOrVar,
    },
    Inside(Shape),
    Lt,
    Gt,
    Lte,
    Gte,
    DurationLt,
    DurationGte,

    // Arithmetic
    Sum,
    Product,
    Subtract,
    Divide,
    Power,
    IntegerDivide,
    IntegerModulus,
    Truncate,
    Round,
    IntegerToFloat,
    RoundTo {
        mode: RoundingMode,
        figures: IntOrVar,
    },
    Max,
    Min,
    Gcd,
    Lcm,
    StatsOperator(StatsOp),
    MathOperator(MathOp),
}

impl Expr {
    /// QTI element name of the operator.
    pub fn name(&self) -> &'static str {
        match self {
            Expr::BaseValue(_) => "baseValue",
            Expr::Variable(_) => "variable",
            Expr::Correct(_) => "correct",
            Expr::Default(_) => "default",
            Expr::MapResponse(_) => "mapResponse",
            Expr::MapResponsePoint(_) => "mapResponsePoint",
            Expr::Null => "null",
            Expr::RandomInteger { .. } => "randomInteger",
            Expr::RandomFloat { .. } => "randomFloat",
            Expr::MathConstant(_) => "mathConstant",
            Expr::Multiple => "multiple",
            Expr::Ordered => "ordered",
            Expr::ContainerSize => "containerSize",
            Expr::IsNull => "isNull",
            Expr::Index(_) => "index",
            Expr::FieldValue(_) => "fieldValue",
            Expr::Random => "random",
            Expr::Member => "member",
            Expr::Delete => "delete",
            Expr::Contains => "contains",
            Expr::Repeat(_) => "repeat",
            Expr::RecordEx(_) => "recordEx",
            Expr::Not => "not",
            Expr::And => "and",
            Expr::Or => "or",
            Expr::AnyN { .. } => "anyN",
            Expr::Match => "match",
            Expr::Substring { .. } => "substring",
            Expr::StringMatch { .. } => "stringMatch",
            Expr::PatternMatch(_) => "patternMatch",
            Expr::Equal { .. } => "equal",
            Expr::EqualRounded { .. } => "equalRounded",
            Expr::Inside(_) => "inside",
            Expr::Lt => "lt",
            Expr::Gt => "gt",
            Expr::Lte => "lte",
            Expr::Gte => "gte",
            Expr::DurationLt => "durationLT",
            Expr::DurationGte => "durationGTE",
            Expr::Sum => "sum",
            Expr::Product => "product",
            Expr::Subtract => "subtract",
            Expr::Divide => "divide",
            Expr::Power => "power",
            Expr::IntegerDivide => "integerDivide",
            Expr::IntegerModulus => "integerModulus",
            Expr::Truncate => "truncate",
            Expr::Round => "round",
            Expr::IntegerToFloat => "integerToFloat",
            Expr::RoundTo { .. } => "roundTo",
            Expr::Max => "max",
            Expr::Min => "min",
            Expr::Gcd => "gcd",
            Expr::Lcm => "lcm",
            Expr::StatsOperator(_) => "statsOperator",
            Expr::MathOperator(_) => "mathOperator",
        }
    }

    /// Template variables named by literal operands (`min`, `figures`, ...).
    pub fn operand_variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        match self {
            Expr::RandomInteger { min, max, step } => {
                out.extend(min.variable());
                out.extend(max.variable());
                out.extend(step.variable());
            }
            Expr::RandomFloat { min, max } => {
                out.extend(min.variable());
                out.extend(max.variable());
            }
            Expr::AnyN { min, max } => {
                out.extend(min.variable());
                out.extend(max.variable());
            }
            Expr::Index(n) | Expr::Repeat(n) => out.extend(n.variable()),
            Expr::EqualRounded { figures, .. } | Expr::RoundTo { figures, .. } => {
                out.extend(figures.variable())
            }
            Expr::Equal { tolerance, .. } => {
                out.extend(tolerance.iter().filter_map(FloatOrVar::variable))
            }
            _ => {}
        }
        out
    }
}

impl Arena<ExprNode> {
    /// Append a node and record it as the parent of each child.
    pub fn push(&mut self, kind: Expr, children: Vec<ExprId>) -> ExprId {
        let id = self.alloc(ExprNode {
            kind,
            children: children.clone(),
        });
        for child in children {
            self.set_parent(child, id);
        }
        id
    }

    /// Root-to-node path such as `sum/product[0]/variable[1]`, where the
    /// bracketed number is the node's position among its parent's children.
    pub fn path(&self, id: ExprId) -> String {
        let chain = self.ancestors(id);
        let mut segments = Vec::with_capacity(chain.len());
        for node_id in chain.iter().rev() {
            let Some(node) = self.get(*node_id) else {
                continue;
            };
            let position = self.parent(*node_id).and_then(|p| {
                self.get(p)
                    .and_then(|parent| parent.children.iter().position(|c| c == node_id))
            });
            match position {
                Some(i) => segments.push(format!("{}[{}]", node.kind.name(), i)),
                None => segments.push(node.kind.name().to_string()),
            }
        }
        segments.join("/")
    }
}
