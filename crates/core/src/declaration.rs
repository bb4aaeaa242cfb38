//! Variable declarations.
//!
//! Declarations are built once per item and then shared read-only by every
//! session. The kind-specific metadata (correct response, mappings, lookup
//! tables, ...) lives in [`KindDetails`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shape::Shape;
use crate::types::{BaseType, Cardinality};
use crate::value::{SingleValue, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableKind {
    Template,
    Response,
    Outcome,
}

impl VariableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableKind::Template => "template",
            VariableKind::Response => "response",
            VariableKind::Outcome => "outcome",
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Response metadata
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: SingleValue,
    pub value: f64,
    /// Only meaningful for string keys.
    pub case_sensitive: bool,
}

/// Maps response values to scores for `mapResponse`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub entries: Vec<MapEntry>,
    pub default_value: f64,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
}

impl Mapping {
    /// Score for one response value, or `None` when no entry matches.
    pub fn lookup(&self, value: &SingleValue) -> Option<f64> {
        self.entries.iter().find_map(|entry| {
            let hit = match (&entry.key, value) {
                (SingleValue::String(k), SingleValue::String(v)) if !entry.case_sensitive => {
                    k.to_lowercase() == v.to_lowercase()
                }
                (k, v) => k == v,
            };
            hit.then_some(entry.value)
        })
    }

    pub fn clamp(&self, total: f64) -> f64 {
        clamp_bounds(total, self.lower_bound, self.upper_bound)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AreaMapEntry {
    pub shape: Shape,
    pub value: f64,
}

/// Maps point responses to scores for `mapResponsePoint`.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaMapping {
    pub entries: Vec<AreaMapEntry>,
    pub default_value: f64,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
}

impl AreaMapping {
    pub fn clamp(&self, total: f64) -> f64 {
        clamp_bounds(total, self.lower_bound, self.upper_bound)
    }
}

fn clamp_bounds(total: f64, lower: Option<f64>, upper: Option<f64>) -> f64 {
    let mut out = total;
    if let Some(lo) = lower {
        out = out.max(lo);
    }
    if let Some(hi) = upper {
        out = out.min(hi);
    }
    out
}

/// Limits a candidate's response must satisfy to count as valid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseConstraints {
    #[serde(default)]
    pub min_values: usize,
    /// `None` means unlimited.
    #[serde(default)]
    pub max_values: Option<usize>,
    /// Regular expression each string value must match in full.
    #[serde(default)]
    pub pattern_mask: Option<String>,
}

// ──────────────────────────────────────────────
// Outcome metadata
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct MatchTableEntry {
    pub source_value: i64,
    pub target_value: SingleValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationTableEntry {
    pub source_value: f64,
    /// Whether a source exactly equal to `source_value` matches this entry.
    pub include_boundary: bool,
    pub target_value: SingleValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupTable {
    Match {
        entries: Vec<MatchTableEntry>,
        default_value: Option<SingleValue>,
    },
    Interpolation {
        entries: Vec<InterpolationTableEntry>,
        default_value: Option<SingleValue>,
    },
}

impl LookupTable {
    /// Map a numeric source through the table. `None` means the table has
    /// no match and no default, which sets the outcome to NULL.
    pub fn lookup(&self, source: f64) -> Option<SingleValue> {
        match self {
            LookupTable::Match {
                entries,
                default_value,
            } => entries
                .iter()
                .find(|e| e.source_value as f64 == source)
                .map(|e| e.target_value.clone())
                .or_else(|| default_value.clone()),
            LookupTable::Interpolation {
                entries,
                default_value,
            } => entries
                .iter()
                .find(|e| {
                    if e.include_boundary {
                        e.source_value <= source
                    } else {
                        e.source_value < source
                    }
                })
                .map(|e| e.target_value.clone())
                .or_else(|| default_value.clone()),
        }
    }
}

// ──────────────────────────────────────────────
// Declarations
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum KindDetails {
    Template {
        param_variable: bool,
        math_variable: bool,
    },
    Response {
        correct_response: Value,
        mapping: Option<Mapping>,
        area_mapping: Option<AreaMapping>,
        constraints: ResponseConstraints,
    },
    Outcome {
        normal_minimum: Option<f64>,
        normal_maximum: Option<f64>,
        mastery_value: Option<f64>,
        lookup_table: Option<LookupTable>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub identifier: String,
    pub cardinality: Cardinality,
    /// Absent for record cardinality.
    pub base_type: Option<BaseType>,
    pub default_value: Value,
    pub details: KindDetails,
}

impl VariableDeclaration {
    pub fn template(
        identifier: impl Into<String>,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
    ) -> Self {
        Self::with_details(
            identifier,
            cardinality,
            base_type,
            KindDetails::Template {
                param_variable: false,
                math_variable: false,
            },
        )
    }

    pub fn response(
        identifier: impl Into<String>,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
    ) -> Self {
        Self::with_details(
            identifier,
            cardinality,
            base_type,
            KindDetails::Response {
                correct_response: Value::Null,
                mapping: None,
                area_mapping: None,
                constraints: ResponseConstraints::default(),
            },
        )
    }

    pub fn outcome(
        identifier: impl Into<String>,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
    ) -> Self {
        Self::with_details(
            identifier,
            cardinality,
            base_type,
            KindDetails::Outcome {
                normal_minimum: None,
                normal_maximum: None,
                mastery_value: None,
                lookup_table: None,
            },
        )
    }

    fn with_details(
        identifier: impl Into<String>,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
        details: KindDetails,
    ) -> Self {
        VariableDeclaration {
            identifier: identifier.into(),
            cardinality,
            base_type,
            default_value: Value::Null,
            details,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = value;
        self
    }

    pub fn with_correct_response(mut self, value: Value) -> Self {
        if let KindDetails::Response {
            correct_response, ..
        } = &mut self.details
        {
            *correct_response = value;
        }
        self
    }

    pub fn with_mapping(mut self, m: Mapping) -> Self {
        if let KindDetails::Response { mapping, .. } = &mut self.details {
            *mapping = Some(m);
        }
        self
    }

    pub fn with_area_mapping(mut self, m: AreaMapping) -> Self {
        if let KindDetails::Response { area_mapping, .. } = &mut self.details {
            *area_mapping = Some(m);
        }
        self
    }

    pub fn with_constraints(mut self, c: ResponseConstraints) -> Self {
        if let KindDetails::Response { constraints, .. } = &mut self.details {
            *constraints = c;
        }
        self
    }

    pub fn with_lookup_table(mut self, table: LookupTable) -> Self {
        if let KindDetails::Outcome { lookup_table, .. } = &mut self.details {
            *lookup_table = Some(table);
        }
        self
    }

    pub fn with_normal_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        if let KindDetails::Outcome {
            normal_minimum,
            normal_maximum,
            ..
        } = &mut self.details
        {
            *normal_minimum = min;
            *normal_maximum = max;
        }
        self
    }

    pub fn with_mastery_value(mut self, value: f64) -> Self {
        if let KindDetails::Outcome { mastery_value, .. } = &mut self.details {
            *mastery_value = Some(value);
        }
        self
    }

    pub fn with_template_flags(mut self, param: bool, math: bool) -> Self {
        if let KindDetails::Template {
            param_variable,
            math_variable,
        } = &mut self.details
        {
            *param_variable = param;
            *math_variable = math;
        }
        self
    }

    pub fn kind(&self) -> VariableKind {
        match self.details {
            KindDetails::Template { .. } => VariableKind::Template,
            KindDetails::Response { .. } => VariableKind::Response,
            KindDetails::Outcome { .. } => VariableKind::Outcome,
        }
    }

    /// Value the variable takes when reset: the declared default, or for
    /// an outcome without one, 0 for single integer/float and NULL otherwise.
    pub fn initial_value(&self) -> Value {
        if !self.default_value.is_null() || self.kind() != VariableKind::Outcome {
            return self.default_value.clone();
        }
        match (self.cardinality, self.base_type) {
            (Cardinality::Single, Some(BaseType::Integer)) => Value::integer(0),
            (Cardinality::Single, Some(BaseType::Float)) => Value::float(0.0),
            _ => Value::Null,
        }
    }

    pub fn correct_response(&self) -> Option<&Value> {
        match &self.details {
            KindDetails::Response {
                correct_response, ..
            } => Some(correct_response),
            _ => None,
        }
    }

    pub fn mapping(&self) -> Option<&Mapping> {
        match &self.details {
            KindDetails::Response { mapping, .. } => mapping.as_ref(),
            _ => None,
        }
    }

    pub fn area_mapping(&self) -> Option<&AreaMapping> {
        match &self.details {
            KindDetails::Response { area_mapping, .. } => area_mapping.as_ref(),
            _ => None,
        }
    }

    pub fn constraints(&self) -> Option<&ResponseConstraints> {
        match &self.details {
            KindDetails::Response { constraints, .. } => Some(constraints),
            _ => None,
        }
    }

    pub fn lookup_table(&self) -> Option<&LookupTable> {
        match &self.details {
            KindDetails::Outcome { lookup_table, .. } => lookup_table.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> SingleValue {
        SingleValue::Identifier(s.to_string())
    }

    #[test]
    fn outcome_initial_values() {
        let score = VariableDeclaration::outcome("SCORE", Cardinality::Single, Some(BaseType::Float));
        assert_eq!(score.initial_value(), Value::float(0.0));
        let count =
            VariableDeclaration::outcome("COUNT", Cardinality::Single, Some(BaseType::Integer));
        assert_eq!(count.initial_value(), Value::integer(0));
        let fb = VariableDeclaration::outcome(
            "FEEDBACK",
            Cardinality::Multiple,
            Some(BaseType::Identifier),
        );
        assert!(fb.initial_value().is_null());
        let resp =
            VariableDeclaration::response("RESPONSE", Cardinality::Single, Some(BaseType::Integer));
        assert!(resp.initial_value().is_null());
    }

    #[test]
    fn declared_default_wins() {
        let d = VariableDeclaration::outcome("SCORE", Cardinality::Single, Some(BaseType::Float))
            .with_default(Value::float(1.5));
        assert_eq!(d.initial_value(), Value::float(1.5));
    }

    #[test]
    fn builders_only_touch_matching_kind() {
        let d = VariableDeclaration::outcome("SCORE", Cardinality::Single, Some(BaseType::Float))
            .with_correct_response(Value::float(1.0));
        assert_eq!(d.correct_response(), None);
        assert_eq!(d.kind(), VariableKind::Outcome);
    }

    #[test]
    fn mapping_lookup_case_insensitive_strings() {
        let m = Mapping {
            entries: vec![
                MapEntry {
                    key: SingleValue::String("Paris".into()),
                    value: 2.0,
                    case_sensitive: false,
                },
                MapEntry {
                    key: ident("A"),
                    value: 1.0,
                    case_sensitive: true,
                },
            ],
            default_value: 0.0,
            lower_bound: None,
            upper_bound: Some(2.5),
        };
        assert_eq!(m.lookup(&SingleValue::String("PARIS".into())), Some(2.0));
        assert_eq!(m.lookup(&ident("A")), Some(1.0));
        assert_eq!(m.lookup(&ident("B")), None);
        assert_eq!(m.clamp(4.0), 2.5);
    }

    #[test]
    fn interpolation_respects_boundary() {
        let table = LookupTable::Interpolation {
            entries: vec![
                InterpolationTableEntry {
                    source_value: 10.0,
                    include_boundary: false,
                    target_value: ident("HIGH"),
                },
                InterpolationTableEntry {
                    source_value: 0.0,
                    include_boundary: true,
                    target_value: ident("LOW"),
                },
            ],
            default_value: None,
        };
        assert_eq!(table.lookup(10.0), Some(ident("LOW")));
        assert_eq!(table.lookup(11.0), Some(ident("HIGH")));
        assert_eq!(table.lookup(-1.0), None);
    }

    #[test]
    fn match_table_default() {
        let table = LookupTable::Match {
            entries: vec![MatchTableEntry {
                source_value: 1,
                target_value: ident("ONE"),
            }],
            default_value: Some(ident("OTHER")),
        };
        assert_eq!(table.lookup(1.0), Some(ident("ONE")));
        assert_eq!(table.lookup(2.0), Some(ident("OTHER")));
    }
}
