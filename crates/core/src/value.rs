//! Runtime values.
//!
//! A [`Value`] is NULL, a single scalar, a multiple/ordered container of
//! scalars sharing one base type, or a record of named scalars. Values are
//! immutable once built: operators always construct new values.
//!
//! Empty containers and empty records do not exist; the constructors
//! normalise them to [`Value::Null`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ContainerError, ParseError};
use crate::types::{BaseType, Cardinality};

// ──────────────────────────────────────────────
// Scalars
// ──────────────────────────────────────────────

/// Metadata of an uploaded file response. The content itself stays with
/// the collaborator that received the upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

/// A single-cardinality value.
#[derive(Debug, Clone)]
pub enum SingleValue {
    Identifier(String),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Point { x: i64, y: i64 },
    /// Unordered pair of identifiers.
    Pair(String, String),
    /// Ordered (source, destination) pair of identifiers.
    DirectedPair(String, String),
    /// Seconds.
    Duration(f64),
    File(FileData),
    Uri(String),
}

impl SingleValue {
    pub fn base_type(&self) -> BaseType {
        match self {
            SingleValue::Identifier(_) => BaseType::Identifier,
            SingleValue::Boolean(_) => BaseType::Boolean,
            SingleValue::Integer(_) => BaseType::Integer,
            SingleValue::Float(_) => BaseType::Float,
            SingleValue::String(_) => BaseType::String,
            SingleValue::Point { .. } => BaseType::Point,
            SingleValue::Pair(..) => BaseType::Pair,
            SingleValue::DirectedPair(..) => BaseType::DirectedPair,
            SingleValue::Duration(_) => BaseType::Duration,
            SingleValue::File(_) => BaseType::File,
            SingleValue::Uri(_) => BaseType::Uri,
        }
    }

    /// Parse literal text into a value of the given base type.
    pub fn parse(text: &str, base_type: BaseType) -> Result<SingleValue, ParseError> {
        let target = base_type.as_str();
        let trimmed = text.trim();
        match base_type {
            BaseType::String => Ok(SingleValue::String(text.to_string())),
            BaseType::Identifier => {
                check_identifier(trimmed, target)?;
                Ok(SingleValue::Identifier(trimmed.to_string()))
            }
            BaseType::Boolean => match trimmed {
                "true" | "1" => Ok(SingleValue::Boolean(true)),
                "false" | "0" => Ok(SingleValue::Boolean(false)),
                _ => Err(ParseError::new(target, text, "expected true, false, 1 or 0")),
            },
            BaseType::Integer => parse_integer(trimmed, target).map(SingleValue::Integer),
            BaseType::Float => parse_float(trimmed, target).map(SingleValue::Float),
            BaseType::Point => {
                let parts = split_exactly_two(trimmed, target)?;
                let x = parse_integer(parts.0, target)?;
                let y = parse_integer(parts.1, target)?;
                Ok(SingleValue::Point { x, y })
            }
            BaseType::Pair | BaseType::DirectedPair => {
                let (a, b) = split_exactly_two(trimmed, target)?;
                check_identifier(a, target)?;
                check_identifier(b, target)?;
                if base_type == BaseType::Pair {
                    Ok(SingleValue::Pair(a.to_string(), b.to_string()))
                } else {
                    Ok(SingleValue::DirectedPair(a.to_string(), b.to_string()))
                }
            }
            BaseType::Duration => {
                let seconds = parse_float(trimmed, target)?;
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(ParseError::new(
                        target,
                        text,
                        "duration must be a finite, non-negative number of seconds",
                    ));
                }
                Ok(SingleValue::Duration(seconds))
            }
            BaseType::Uri => {
                if trimmed.is_empty() {
                    return Err(ParseError::new(target, text, "uri must not be empty"));
                }
                Ok(SingleValue::Uri(trimmed.to_string()))
            }
            BaseType::File => Err(ParseError::new(
                target,
                text,
                "file values are supplied as uploaded file data, not text",
            )),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SingleValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SingleValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of an integer or float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SingleValue::Integer(i) => Some(*i as f64),
            SingleValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text view of string-like values (identifier, string, uri).
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SingleValue::Identifier(s) | SingleValue::String(s) | SingleValue::Uri(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SingleValue::Identifier(s) | SingleValue::String(s) | SingleValue::Uri(s) => {
                serde_json::json!(s)
            }
            SingleValue::Boolean(b) => serde_json::json!(b),
            SingleValue::Integer(i) => serde_json::json!(i),
            SingleValue::Float(f) | SingleValue::Duration(f) => {
                if f.is_finite() {
                    serde_json::json!(f)
                } else {
                    serde_json::json!(format_float(*f))
                }
            }
            SingleValue::Point { x, y } => serde_json::json!([x, y]),
            SingleValue::Pair(a, b) | SingleValue::DirectedPair(a, b) => serde_json::json!([a, b]),
            SingleValue::File(data) => serde_json::json!({
                "fileName": data.file_name,
                "contentType": data.content_type,
                "size": data.size,
            }),
        }
    }
}

impl PartialEq for SingleValue {
    fn eq(&self, other: &Self) -> bool {
        use SingleValue::*;
        match (self, other) {
            (Identifier(a), Identifier(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Point { x: x1, y: y1 }, Point { x: x2, y: y2 }) => x1 == x2 && y1 == y2,
            (Pair(a1, b1), Pair(a2, b2)) => (a1 == a2 && b1 == b2) || (a1 == b2 && b1 == a2),
            (DirectedPair(a1, b1), DirectedPair(a2, b2)) => a1 == a2 && b1 == b2,
            (Duration(a), Duration(b)) => a == b,
            (File(a), File(b)) => a == b,
            (Uri(a), Uri(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for SingleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SingleValue::Identifier(s) | SingleValue::String(s) | SingleValue::Uri(s) => {
                f.write_str(s)
            }
            SingleValue::Boolean(b) => write!(f, "{}", b),
            SingleValue::Integer(i) => write!(f, "{}", i),
            SingleValue::Float(v) | SingleValue::Duration(v) => f.write_str(&format_float(*v)),
            SingleValue::Point { x, y } => write!(f, "{} {}", x, y),
            SingleValue::Pair(a, b) | SingleValue::DirectedPair(a, b) => write!(f, "{} {}", a, b),
            SingleValue::File(data) => f.write_str(&data.file_name),
        }
    }
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "INF".to_string()
    } else if v == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        format!("{}", v)
    }
}

fn check_identifier(s: &str, target: &str) -> Result<(), ParseError> {
    if s.is_empty() {
        return Err(ParseError::new(target, s, "identifier must not be empty"));
    }
    if s.chars().any(char::is_whitespace) {
        return Err(ParseError::new(target, s, "identifier must not contain whitespace"));
    }
    Ok(())
}

fn parse_integer(s: &str, target: &str) -> Result<i64, ParseError> {
    s.parse::<i64>()
        .map_err(|e| ParseError::new(target, s, e.to_string()))
}

fn parse_float(s: &str, target: &str) -> Result<f64, ParseError> {
    match s {
        "INF" => return Ok(f64::INFINITY),
        "-INF" => return Ok(f64::NEG_INFINITY),
        "NaN" => return Ok(f64::NAN),
        _ => {}
    }
    // f64::from_str also accepts "inf"/"nan" spellings, which QTI does not.
    let numeric_chars = s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if s.is_empty() || !numeric_chars {
        return Err(ParseError::new(target, s, "not a number"));
    }
    s.parse::<f64>()
        .map_err(|e| ParseError::new(target, s, e.to_string()))
}

fn split_exactly_two<'a>(s: &'a str, target: &str) -> Result<(&'a str, &'a str), ParseError> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    match parts.as_slice() {
        [a, b] => Ok((*a, *b)),
        _ => Err(ParseError::new(
            target,
            s,
            format!("expected 2 space-separated parts, found {}", parts.len()),
        )),
    }
}

// ──────────────────────────────────────────────
// Containers
// ──────────────────────────────────────────────

/// Members of a multiple or ordered value. Never empty once wrapped in a
/// [`Value`].
#[derive(Debug, Clone)]
pub struct Container {
    base_type: BaseType,
    items: Vec<SingleValue>,
}

impl Container {
    pub fn new(base_type: BaseType, items: Vec<SingleValue>) -> Result<Container, ContainerError> {
        if let Some(bad) = items.iter().find(|v| v.base_type() != base_type) {
            return Err(ContainerError::MixedBaseTypes {
                expected: base_type,
                found: bad.base_type(),
            });
        }
        Ok(Container { base_type, items })
    }

    pub fn base_type(&self) -> BaseType {
        self.base_type
    }

    pub fn items(&self) -> &[SingleValue] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

}

/// Multiset comparison: same members with the same multiplicities.
pub fn multiset_eq(a: &[SingleValue], b: &[SingleValue]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    for x in a {
        let slot = b
            .iter()
            .enumerate()
            .position(|(i, y)| !used[i] && x == y);
        match slot {
            Some(i) => used[i] = true,
            None => return false,
        }
    }
    true
}

// ──────────────────────────────────────────────
// Values
// ──────────────────────────────────────────────

/// A runtime value of any cardinality, or NULL.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Single(SingleValue),
    Multiple(Container),
    Ordered(Container),
    Record(BTreeMap<String, SingleValue>),
}

impl Value {
    pub fn integer(i: i64) -> Value {
        Value::Single(SingleValue::Integer(i))
    }

    pub fn float(f: f64) -> Value {
        Value::Single(SingleValue::Float(f))
    }

    pub fn boolean(b: bool) -> Value {
        Value::Single(SingleValue::Boolean(b))
    }

    pub fn identifier(s: impl Into<String>) -> Value {
        Value::Single(SingleValue::Identifier(s.into()))
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::Single(SingleValue::String(s.into()))
    }

    pub fn point(x: i64, y: i64) -> Value {
        Value::Single(SingleValue::Point { x, y })
    }

    pub fn duration(seconds: f64) -> Value {
        Value::Single(SingleValue::Duration(seconds))
    }

    /// Build a multiple value; no members gives NULL.
    pub fn multiple(base_type: BaseType, items: Vec<SingleValue>) -> Result<Value, ContainerError> {
        Value::container(Cardinality::Multiple, base_type, items)
    }

    /// Build an ordered value; no members gives NULL.
    pub fn ordered(base_type: BaseType, items: Vec<SingleValue>) -> Result<Value, ContainerError> {
        Value::container(Cardinality::Ordered, base_type, items)
    }

    pub fn container(
        cardinality: Cardinality,
        base_type: BaseType,
        items: Vec<SingleValue>,
    ) -> Result<Value, ContainerError> {
        let container = Container::new(base_type, items)?;
        if container.is_empty() {
            return Ok(Value::Null);
        }
        match cardinality {
            Cardinality::Multiple => Ok(Value::Multiple(container)),
            Cardinality::Ordered => Ok(Value::Ordered(container)),
            other => Err(ContainerError::NotAContainer(other)),
        }
    }

    /// Build a record; no fields gives NULL.
    pub fn record(fields: BTreeMap<String, SingleValue>) -> Value {
        if fields.is_empty() {
            Value::Null
        } else {
            Value::Record(fields)
        }
    }

    /// Parse a value of any non-record cardinality from its member texts.
    ///
    /// No texts gives NULL. Single cardinality accepts at most one text.
    pub fn parse<S: AsRef<str>>(
        texts: &[S],
        cardinality: Cardinality,
        base_type: BaseType,
    ) -> Result<Value, ParseError> {
        if texts.is_empty() {
            return Ok(Value::Null);
        }
        match cardinality {
            Cardinality::Single => {
                if texts.len() > 1 {
                    return Err(ParseError::new(
                        base_type.as_str(),
                        &join_texts(texts),
                        format!("single cardinality accepts one value, got {}", texts.len()),
                    ));
                }
                SingleValue::parse(texts[0].as_ref(), base_type).map(Value::Single)
            }
            Cardinality::Multiple | Cardinality::Ordered => {
                let items = texts
                    .iter()
                    .map(|t| SingleValue::parse(t.as_ref(), base_type))
                    .collect::<Result<Vec<_>, _>>()?;
                // Every item was parsed as base_type, so the container is uniform.
                Value::container(cardinality, base_type, items).map_err(|e| {
                    ParseError::new(base_type.as_str(), &join_texts(texts), e.to_string())
                })
            }
            Cardinality::Record => Err(ParseError::new(
                "record",
                &join_texts(texts),
                "record values cannot be parsed from plain text",
            )),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Multiple(c) | Value::Ordered(c) => c.is_empty(),
            Value::Record(fields) => fields.is_empty(),
            Value::Single(_) => false,
        }
    }

    /// `None` for NULL.
    pub fn cardinality(&self) -> Option<Cardinality> {
        match self {
            Value::Null => None,
            Value::Single(_) => Some(Cardinality::Single),
            Value::Multiple(_) => Some(Cardinality::Multiple),
            Value::Ordered(_) => Some(Cardinality::Ordered),
            Value::Record(_) => Some(Cardinality::Record),
        }
    }

    /// `None` for NULL and for records, which have no single base type.
    pub fn base_type(&self) -> Option<BaseType> {
        match self {
            Value::Single(v) => Some(v.base_type()),
            Value::Multiple(c) | Value::Ordered(c) => Some(c.base_type()),
            Value::Null | Value::Record(_) => None,
        }
    }

    pub fn as_single(&self) -> Option<&SingleValue> {
        match self {
            Value::Single(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Multiple(c) | Value::Ordered(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_single().and_then(SingleValue::as_bool)
    }

    /// Widen a single integer to a float of the same magnitude.
    ///
    /// Returns `None` for anything other than a single integer; callers
    /// check cardinality and base type first.
    pub fn integer_to_float(&self) -> Option<Value> {
        match self {
            Value::Single(SingleValue::Integer(i)) => Some(Value::float(*i as f64)),
            _ => None,
        }
    }

    /// Members of a single or container value, as a slice-like list.
    pub fn members(&self) -> Vec<&SingleValue> {
        match self {
            Value::Single(v) => vec![v],
            Value::Multiple(c) | Value::Ordered(c) => c.items().iter().collect(),
            Value::Record(fields) => fields.values().collect(),
            Value::Null => Vec::new(),
        }
    }

    /// Render as JSON for snapshots and CLI output.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Single(v) => serde_json::json!({
                "cardinality": "single",
                "baseType": v.base_type().as_str(),
                "value": v.to_json(),
            }),
            Value::Multiple(c) | Value::Ordered(c) => {
                let items: Vec<serde_json::Value> = c.items().iter().map(|v| v.to_json()).collect();
                serde_json::json!({
                    "cardinality": self.cardinality().map(|c| c.as_str()),
                    "baseType": c.base_type().as_str(),
                    "value": items,
                })
            }
            Value::Record(fields) => {
                let mut map = serde_json::Map::new();
                for (k, v) in fields {
                    map.insert(
                        k.clone(),
                        serde_json::json!({
                            "baseType": v.base_type().as_str(),
                            "value": v.to_json(),
                        }),
                    );
                }
                serde_json::json!({
                    "cardinality": "record",
                    "value": serde_json::Value::Object(map),
                })
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Single(a), Value::Single(b)) => a == b,
            (Value::Multiple(a), Value::Multiple(b)) => {
                a.base_type() == b.base_type() && multiset_eq(a.items(), b.items())
            }
            (Value::Ordered(a), Value::Ordered(b)) => {
                a.base_type() == b.base_type() && a.items() == b.items()
            }
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => false,
        }
    }
}

impl From<SingleValue> for Value {
    fn from(v: SingleValue) -> Self {
        Value::Single(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Single(v) => write!(f, "{}", v),
            Value::Multiple(c) | Value::Ordered(c) => {
                let open = if matches!(self, Value::Ordered(_)) { "<" } else { "[" };
                let close = if matches!(self, Value::Ordered(_)) { ">" } else { "]" };
                f.write_str(open)?;
                for (i, v) in c.items().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str(close)
            }
            Value::Record(fields) => {
                f.write_str("{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

fn join_texts<S: AsRef<str>>(texts: &[S]) -> String {
    texts
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
