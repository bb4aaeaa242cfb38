//! Evaluation and session errors.
//!
//! [`AuthoringError`] means the item itself is broken: the tree asked an
//! operator to combine values it cannot take, or a rule wrote a value its
//! target cannot hold. [`SessionError`] means the caller drove the session
//! out of order or asked for something the delivery settings forbid.

use qti_core::{BaseType, Cardinality, DefinitionError, ParseError};

use crate::session::{CandidateAction, SessionState};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthoringError {
    #[error("{operator} at {path}: operand {operand} has cardinality {found}, expected {expected}")]
    CardinalityViolation {
        operator: String,
        operand: usize,
        path: String,
        expected: String,
        found: Cardinality,
    },

    #[error("{operator} at {path}: operand {operand} has base type {found}, expected {expected}")]
    BaseTypeViolation {
        operator: String,
        operand: usize,
        path: String,
        expected: String,
        found: String,
    },

    #[error("literal value: {0}")]
    Parse(#[from] ParseError),

    /// A rule could not assign its value.
    #[error("{rule} '{identifier}': {message}")]
    Processing {
        rule: String,
        identifier: String,
        message: String,
    },

    #[error("unknown variable '{identifier}' referenced at {path}")]
    UnknownVariable { identifier: String, path: String },

    #[error("response variable '{identifier}' has no {kind} for {operator}")]
    MissingMapping {
        identifier: String,
        operator: String,
        kind: String,
    },

    #[error("outcome variable '{identifier}' has no lookup table")]
    MissingLookupTable { identifier: String },

    #[error("{operator} at {path}: {message}")]
    InvalidOperand {
        operator: String,
        path: String,
        message: String,
    },
}

impl AuthoringError {
    pub(crate) fn base_type_name(bt: Option<BaseType>) -> String {
        match bt {
            Some(bt) => bt.to_string(),
            None => "record".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("cannot {action} while the session is {state}: {reason}")]
    IllegalStateTransition {
        action: String,
        state: SessionState,
        reason: String,
    },

    #[error("{0} is not permitted by the delivery settings")]
    ActionNotPermitted(CandidateAction),

    #[error(transparent)]
    Authoring(#[from] AuthoringError),

    #[error("invalid item definition: {0}")]
    Definition(#[from] DefinitionError),
}
