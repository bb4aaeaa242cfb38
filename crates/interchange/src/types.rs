//! Typed structs for the JSON item document.
//!
//! Declarations are fully typed. Processing rule lists are kept as raw
//! `serde_json::Value` trees here and lowered node by node in
//! [`crate::deserialize`], which needs to track a path for error messages
//! as it walks them.

use std::collections::BTreeMap;

use qti_core::{BaseType, Cardinality, ResponseConstraints, Shape, VariableKind};
use serde::{Deserialize, Serialize};

/// Top-level item document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDocument {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub adaptive: bool,
    #[serde(default)]
    pub declarations: Vec<DeclarationDoc>,
    #[serde(default)]
    pub template_processing: Vec<serde_json::Value>,
    #[serde(default)]
    pub response_processing: Vec<serde_json::Value>,
}

// ── Declarations ────────────────────────────────────────────────────

/// One variable declaration. Kind-specific fields are ignored on the
/// other kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationDoc {
    pub kind: VariableKind,
    pub identifier: String,
    pub cardinality: Cardinality,
    /// Omitted for record cardinality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_type: Option<BaseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<ValueDoc>,

    // Response variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_response: Option<ValueDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<MappingDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_mapping: Option<AreaMappingDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<ResponseConstraints>,

    // Outcome variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mastery_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_table: Option<MatchTableDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpolation_table: Option<InterpolationTableDoc>,

    // Template variables
    #[serde(default)]
    pub param_variable: bool,
    #[serde(default)]
    pub math_variable: bool,
}

/// A value as written in a document: one text for a single value, a list
/// of texts for a container, or typed fields for a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueDoc {
    Text(String),
    List(Vec<String>),
    Record(BTreeMap<String, FieldDoc>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDoc {
    pub base_type: BaseType,
    pub value: String,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDoc {
    pub entries: Vec<MapEntryDoc>,
    #[serde(default)]
    pub default_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntryDoc {
    pub key: String,
    pub value: f64,
    #[serde(default = "yes")]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaMappingDoc {
    pub entries: Vec<AreaMapEntryDoc>,
    #[serde(default)]
    pub default_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
}

/// `{"shape": "circle", "x": 10, "y": 10, "radius": 5, "value": 2.0}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaMapEntryDoc {
    #[serde(flatten)]
    pub shape: Shape,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTableDoc {
    pub entries: Vec<MatchEntryDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEntryDoc {
    pub source_value: i64,
    pub target_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolationTableDoc {
    pub entries: Vec<InterpolationEntryDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolationEntryDoc {
    pub source_value: f64,
    #[serde(default = "yes")]
    pub include_boundary: bool,
    pub target_value: String,
}
