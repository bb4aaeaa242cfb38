//! Base types and cardinalities.
//!
//! Both enums parse only from their exact QTI spelling (`directedPair`,
//! never `DirectedPair` or `directed_pair`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Primitive kind of a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseType {
    Identifier,
    Boolean,
    Integer,
    Float,
    String,
    Point,
    Pair,
    DirectedPair,
    Duration,
    File,
    Uri,
}

impl BaseType {
    pub const ALL: [BaseType; 11] = [
        BaseType::Identifier,
        BaseType::Boolean,
        BaseType::Integer,
        BaseType::Float,
        BaseType::String,
        BaseType::Point,
        BaseType::Pair,
        BaseType::DirectedPair,
        BaseType::Duration,
        BaseType::File,
        BaseType::Uri,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BaseType::Identifier => "identifier",
            BaseType::Boolean => "boolean",
            BaseType::Integer => "integer",
            BaseType::Float => "float",
            BaseType::String => "string",
            BaseType::Point => "point",
            BaseType::Pair => "pair",
            BaseType::DirectedPair => "directedPair",
            BaseType::Duration => "duration",
            BaseType::File => "file",
            BaseType::Uri => "uri",
        }
    }

    /// Parse the QTI attribute spelling of a base type.
    pub fn parse(s: &str) -> Result<BaseType, ParseError> {
        BaseType::ALL
            .iter()
            .copied()
            .find(|bt| bt.as_str() == s)
            .ok_or_else(|| ParseError::new("baseType", s, "unknown base type"))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, BaseType::Integer | BaseType::Float)
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BaseType::parse(s)
    }
}

/// Shape of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    Single,
    /// Unordered multiset.
    Multiple,
    /// Sequence.
    Ordered,
    /// Keyed map of single values.
    Record,
}

impl Cardinality {
    pub const ALL: [Cardinality; 4] = [
        Cardinality::Single,
        Cardinality::Multiple,
        Cardinality::Ordered,
        Cardinality::Record,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::Single => "single",
            Cardinality::Multiple => "multiple",
            Cardinality::Ordered => "ordered",
            Cardinality::Record => "record",
        }
    }

    pub fn parse(s: &str) -> Result<Cardinality, ParseError> {
        Cardinality::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseError::new("cardinality", s, "unknown cardinality"))
    }

    /// Multiple and Ordered hold a list of single values of one base type.
    pub fn is_container(&self) -> bool {
        matches!(self, Cardinality::Multiple | Cardinality::Ordered)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cardinality {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cardinality::parse(s)
    }
}
