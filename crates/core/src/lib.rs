//! qti-core: value model and item definitions for the QTI item runtime.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`Value`], [`SingleValue`], [`Container`] -- runtime values
//! - [`BaseType`], [`Cardinality`] -- value typing
//! - [`VariableDeclaration`] and its metadata ([`Mapping`], [`LookupTable`], ...)
//! - [`Expr`], [`ExprArena`] -- expression trees
//! - [`Rule`], [`RuleArena`] -- processing rule trees
//! - [`ItemDefinition`] -- declarations + trees, shared by sessions

pub mod arena;
pub mod declaration;
pub mod error;
pub mod expression;
pub mod item;
pub mod rule;
pub mod shape;
pub mod types;
pub mod value;

// ── Convenience re-exports ───────────────────────────────────────────

pub use arena::{Arena, NodeId};
pub use declaration::{
    AreaMapEntry, AreaMapping, InterpolationTableEntry, KindDetails, LookupTable, MapEntry,
    Mapping, MatchTableEntry, ResponseConstraints, VariableDeclaration, VariableKind,
};
pub use error::{ContainerError, DefinitionError, ParseError};
pub use expression::{
    Expr, ExprArena, ExprId, ExprNode, FloatOrVar, IntOrVar, MathConstant, MathOp, RoundingMode,
    StatsOp, ToleranceMode,
};
pub use item::{completion_status, ItemDefinition, COMPLETION_STATUS, DURATION, NUM_ATTEMPTS};
pub use rule::{ConditionBranch, Conditional, Rule, RuleArena, RuleId};
pub use shape::Shape;
pub use types::{BaseType, Cardinality};
pub use value::{multiset_eq, Container, FileData, SingleValue, Value};
