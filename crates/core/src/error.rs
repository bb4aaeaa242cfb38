//! Error types for the value model and item definitions.

use crate::types::{BaseType, Cardinality};

/// Literal text could not be turned into a value of the requested kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot parse '{text}' as {target}: {reason}")]
pub struct ParseError {
    /// What the text was being parsed as (a base type, cardinality, ...).
    pub target: String,
    pub text: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(target: impl Into<String>, text: &str, reason: impl Into<String>) -> Self {
        ParseError {
            target: target.into(),
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

/// A container or record could not be built from the given members.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContainerError {
    /// Members of a multiple/ordered container must share one base type.
    #[error("container of {expected} cannot hold a {found} value")]
    MixedBaseTypes { expected: BaseType, found: BaseType },

    /// Records only exist as a cardinality; containers never use it.
    #[error("cardinality {0} is not a container cardinality")]
    NotAContainer(Cardinality),
}

/// Structural problems found while assembling or resolving an item definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("variable '{identifier}' is declared more than once")]
    DuplicateVariable { identifier: String },

    #[error("variable '{identifier}' is reserved for the built-in {kind} variable")]
    ReservedIdentifier { identifier: String, kind: String },

    #[error("{context}: reference to undeclared variable '{identifier}'")]
    UnresolvedVariable { context: String, identifier: String },

    #[error("{context}: variable '{identifier}' is a {actual} variable, expected {expected}")]
    WrongVariableKind {
        context: String,
        identifier: String,
        expected: String,
        actual: String,
    },

    #[error("{context}: {message}")]
    Malformed { context: String, message: String },
}
