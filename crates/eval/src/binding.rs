//! Response binding: raw candidate submissions to typed values.
//!
//! Each submitted identifier is parsed against its response declaration.
//! Identifiers that are undeclared, not response variables, built-ins, or
//! whose data does not parse are reported as bad and never written.

use std::collections::BTreeMap;

use qti_core::{
    BaseType, Cardinality, FileData, ItemDefinition, SingleValue, Value, VariableDeclaration,
    VariableKind, DURATION, NUM_ATTEMPTS,
};
use serde::{Deserialize, Serialize};

/// Raw response data as a delivery front end submits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// One text per submitted value (checkbox values, typed text, "x y" points).
    Strings(Vec<String>),
    File(FileData),
}

impl ResponseData {
    pub fn string(text: impl Into<String>) -> Self {
        ResponseData::Strings(vec![text.into()])
    }

    pub fn strings<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ResponseData::Strings(texts.into_iter().map(Into::into).collect())
    }
}

/// Parsed values plus the identifiers that could not be bound.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BindingOutcome {
    pub values: BTreeMap<String, Value>,
    pub bad_identifiers: Vec<String>,
}

/// Parse every submission in `responses` against `item`'s declarations.
pub fn bind_responses(
    item: &ItemDefinition,
    responses: &BTreeMap<String, ResponseData>,
) -> BindingOutcome {
    let mut outcome = BindingOutcome::default();
    for (identifier, data) in responses {
        match item
            .declaration(identifier)
            .filter(|decl| is_candidate_response(decl))
            .and_then(|decl| parse_response(decl, data))
        {
            Some(value) => {
                outcome.values.insert(identifier.clone(), value);
            }
            None => {
                tracing::debug!(identifier = %identifier, "bad response");
                outcome.bad_identifiers.push(identifier.clone());
            }
        }
    }
    outcome
}

fn is_candidate_response(decl: &VariableDeclaration) -> bool {
    decl.kind() == VariableKind::Response
        && decl.identifier != DURATION
        && decl.identifier != NUM_ATTEMPTS
}

fn parse_response(decl: &VariableDeclaration, data: &ResponseData) -> Option<Value> {
    let base_type = decl.base_type?;
    match data {
        ResponseData::File(file) => {
            (base_type == BaseType::File && decl.cardinality == Cardinality::Single)
                .then(|| Value::Single(SingleValue::File(file.clone())))
        }
        ResponseData::Strings(texts) => {
            if base_type == BaseType::File {
                return None;
            }
            // Blank entries mean "nothing chosen" rather than a value.
            let texts: Vec<&str> = texts
                .iter()
                .map(String::as_str)
                .filter(|t| !t.trim().is_empty())
                .collect();
            Value::parse(&texts, decl.cardinality, base_type).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> ItemDefinition {
        ItemDefinition::new(
            "binding",
            vec![
                VariableDeclaration::response(
                    "CHOICE",
                    Cardinality::Multiple,
                    Some(BaseType::Identifier),
                ),
                VariableDeclaration::response("NUM", Cardinality::Single, Some(BaseType::Integer)),
                VariableDeclaration::response("UPLOAD", Cardinality::Single, Some(BaseType::File)),
                VariableDeclaration::outcome("SCORE", Cardinality::Single, Some(BaseType::Float)),
            ],
        )
        .unwrap()
    }

    fn submit(pairs: Vec<(&str, ResponseData)>) -> BindingOutcome {
        let map = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        bind_responses(&item(), &map)
    }

    #[test]
    fn parses_declared_responses() {
        let out = submit(vec![
            ("CHOICE", ResponseData::strings(["A", "B"])),
            ("NUM", ResponseData::string("42")),
        ]);
        assert!(out.bad_identifiers.is_empty());
        assert_eq!(out.values["NUM"], Value::integer(42));
        assert_eq!(
            out.values["CHOICE"],
            Value::multiple(
                BaseType::Identifier,
                vec![
                    SingleValue::Identifier("B".into()),
                    SingleValue::Identifier("A".into())
                ]
            )
            .unwrap()
        );
    }

    #[test]
    fn unparseable_and_undeclared_are_bad() {
        let out = submit(vec![
            ("NUM", ResponseData::string("forty")),
            ("NOPE", ResponseData::string("1")),
            ("SCORE", ResponseData::string("1.0")),
            (NUM_ATTEMPTS, ResponseData::string("3")),
        ]);
        assert!(out.values.is_empty());
        assert_eq!(
            out.bad_identifiers,
            vec!["NOPE", "NUM", "SCORE", NUM_ATTEMPTS]
        );
    }

    #[test]
    fn blank_submission_binds_null() {
        let out = submit(vec![
            ("NUM", ResponseData::string("  ")),
            ("CHOICE", ResponseData::Strings(vec![])),
        ]);
        assert!(out.bad_identifiers.is_empty());
        assert_eq!(out.values["NUM"], Value::Null);
        assert_eq!(out.values["CHOICE"], Value::Null);
    }

    #[test]
    fn too_many_values_for_single_is_bad() {
        let out = submit(vec![("NUM", ResponseData::strings(["1", "2"]))]);
        assert_eq!(out.bad_identifiers, vec!["NUM"]);
    }

    #[test]
    fn file_responses() {
        let file = FileData {
            file_name: "essay.pdf".into(),
            content_type: "application/pdf".into(),
            size: 2048,
        };
        let out = submit(vec![
            ("UPLOAD", ResponseData::File(file.clone())),
            ("NUM", ResponseData::File(file.clone())),
        ]);
        assert_eq!(out.bad_identifiers, vec!["NUM"]);
        assert_eq!(
            out.values["UPLOAD"],
            Value::Single(SingleValue::File(file))
        );
    }

    #[test]
    fn response_data_deserializes_untagged() {
        let texts: ResponseData = serde_json::from_str(r#"["A", "B"]"#).unwrap();
        assert_eq!(texts, ResponseData::strings(["A", "B"]));
        let file: ResponseData = serde_json::from_str(
            r#"{"file_name": "a.txt", "content_type": "text/plain", "size": 3}"#,
        )
        .unwrap();
        assert!(matches!(file, ResponseData::File(_)));
    }
}
