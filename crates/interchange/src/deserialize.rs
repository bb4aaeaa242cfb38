//! Lowering of JSON item documents into [`ItemDefinition`]s.
//!
//! The main entry point is [`from_interchange`], which takes a
//! `&serde_json::Value` and produces an item with its expression and rule
//! trees laid out in the item's arenas.
//!
//! Expressions are objects tagged by `op` with their operands under
//! `children`; rules are objects tagged by `rule`. Errors carry the path
//! of the offending node, e.g.
//! `responseProcessing[0]/responseCondition/branches[0]/guard/match`.

use std::collections::BTreeMap;

use qti_core::{
    AreaMapEntry, AreaMapping, BaseType, Cardinality, ConditionBranch, Conditional,
    DefinitionError, Expr, ExprId, FloatOrVar, IntOrVar, InterpolationTableEntry,
    ItemDefinition, LookupTable, MapEntry, Mapping, MatchTableEntry, ParseError, RoundingMode,
    Rule, RuleId, SingleValue, ToleranceMode, Value, VariableDeclaration, VariableKind,
};
use serde::de::DeserializeOwned;

use crate::types::*;

/// Errors while reading an item document.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterchangeError {
    /// The JSON does not have the document shape at all.
    #[error("malformed item document: {0}")]
    Document(String),

    #[error("{context}: missing required field '{field}'")]
    MissingField { context: String, field: String },

    #[error("{context}: invalid '{field}': {message}")]
    InvalidField {
        context: String,
        field: String,
        message: String,
    },

    #[error("{context}: invalid '{field}': {source}")]
    InvalidValue {
        context: String,
        field: String,
        #[source]
        source: ParseError,
    },

    #[error("{path}: unknown expression operator '{name}'")]
    UnknownOperator { name: String, path: String },

    #[error("{path}: unknown rule '{name}'")]
    UnknownRule { name: String, path: String },

    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

/// Parse JSON text into an item.
pub fn from_json_str(text: &str) -> Result<ItemDefinition, InterchangeError> {
    let doc: serde_json::Value =
        serde_json::from_str(text).map_err(|e| InterchangeError::Document(e.to_string()))?;
    from_interchange(&doc)
}

/// Lower an item document into an [`ItemDefinition`].
///
/// References are not resolved here; call
/// [`ItemDefinition::check_references`] (session initialization does).
pub fn from_interchange(doc: &serde_json::Value) -> Result<ItemDefinition, InterchangeError> {
    let document: ItemDocument = serde_json::from_value(doc.clone())
        .map_err(|e| InterchangeError::Document(e.to_string()))?;
    lower(&document)
}

/// Lower an already-parsed document.
pub fn lower(document: &ItemDocument) -> Result<ItemDefinition, InterchangeError> {
    let declarations = document
        .declarations
        .iter()
        .map(lower_declaration)
        .collect::<Result<Vec<_>, _>>()?;

    let mut item = ItemDefinition::new(document.identifier.clone(), declarations)?
        .with_adaptive(document.adaptive);
    if let Some(title) = &document.title {
        item = item.with_title(title.clone());
    }

    item.template_processing =
        lower_rules(&mut item, &document.template_processing, "templateProcessing")?;
    item.response_processing =
        lower_rules(&mut item, &document.response_processing, "responseProcessing")?;

    tracing::debug!(
        item = %item.identifier,
        expressions = item.expressions.len(),
        rules = item.rules.len(),
        "item document lowered"
    );
    Ok(item)
}

// ── Declarations ────────────────────────────────────────────────────

fn lower_declaration(doc: &DeclarationDoc) -> Result<VariableDeclaration, InterchangeError> {
    let context = format!("declaration '{}'", doc.identifier);
    match (doc.cardinality, doc.base_type) {
        (Cardinality::Record, Some(_)) => {
            return Err(invalid(&context, "baseType", "record variables have no base type"))
        }
        (Cardinality::Record, None) | (_, Some(_)) => {}
        (_, None) => return Err(missing(&context, "baseType")),
    }

    let (card, bt) = (doc.cardinality, doc.base_type);
    let mut decl = match doc.kind {
        VariableKind::Template => VariableDeclaration::template(&doc.identifier, card, bt)
            .with_template_flags(doc.param_variable, doc.math_variable),
        VariableKind::Response => VariableDeclaration::response(&doc.identifier, card, bt),
        VariableKind::Outcome => VariableDeclaration::outcome(&doc.identifier, card, bt),
    };

    if let Some(v) = &doc.default_value {
        decl = decl.with_default(lower_value(&context, "defaultValue", v, card, bt)?);
    }

    match doc.kind {
        VariableKind::Response => {
            if let Some(v) = &doc.correct_response {
                decl = decl
                    .with_correct_response(lower_value(&context, "correctResponse", v, card, bt)?);
            }
            if let Some(m) = &doc.mapping {
                decl = decl.with_mapping(lower_mapping(&context, m, bt)?);
            }
            if let Some(m) = &doc.area_mapping {
                decl = decl.with_area_mapping(AreaMapping {
                    entries: m
                        .entries
                        .iter()
                        .map(|e| AreaMapEntry {
                            shape: e.shape.clone(),
                            value: e.value,
                        })
                        .collect(),
                    default_value: m.default_value,
                    lower_bound: m.lower_bound,
                    upper_bound: m.upper_bound,
                });
            }
            if let Some(c) = &doc.constraints {
                decl = decl.with_constraints(c.clone());
            }
        }
        VariableKind::Outcome => {
            decl = decl.with_normal_range(doc.normal_minimum, doc.normal_maximum);
            if let Some(m) = doc.mastery_value {
                decl = decl.with_mastery_value(m);
            }
            if let Some(table) = lower_lookup_table(&context, doc, bt)? {
                decl = decl.with_lookup_table(table);
            }
        }
        VariableKind::Template => {}
    }
    Ok(decl)
}

fn lower_value(
    context: &str,
    field: &str,
    doc: &ValueDoc,
    cardinality: Cardinality,
    base_type: Option<BaseType>,
) -> Result<Value, InterchangeError> {
    let parse_err = |source: ParseError| InterchangeError::InvalidValue {
        context: context.to_string(),
        field: field.to_string(),
        source,
    };
    match (doc, base_type) {
        (ValueDoc::Record(fields), None) => {
            let mut map = BTreeMap::new();
            for (name, f) in fields {
                map.insert(
                    name.clone(),
                    SingleValue::parse(&f.value, f.base_type).map_err(parse_err)?,
                );
            }
            Ok(Value::record(map))
        }
        (ValueDoc::Record(_), Some(_)) => Err(invalid(
            context,
            field,
            format!("record value given for a {} variable", cardinality),
        )),
        (_, None) => Err(invalid(context, field, "record values are objects of typed fields")),
        (ValueDoc::Text(text), Some(bt)) => {
            Value::parse(std::slice::from_ref(text), cardinality, bt).map_err(parse_err)
        }
        (ValueDoc::List(texts), Some(bt)) => {
            Value::parse(texts.as_slice(), cardinality, bt).map_err(parse_err)
        }
    }
}

fn lower_mapping(
    context: &str,
    doc: &MappingDoc,
    base_type: Option<BaseType>,
) -> Result<Mapping, InterchangeError> {
    let bt = base_type.ok_or_else(|| invalid(context, "mapping", "record variables cannot be mapped"))?;
    let entries = doc
        .entries
        .iter()
        .map(|e| {
            let key = SingleValue::parse(&e.key, bt).map_err(|source| {
                InterchangeError::InvalidValue {
                    context: context.to_string(),
                    field: "mapping".to_string(),
                    source,
                }
            })?;
            Ok(MapEntry {
                key,
                value: e.value,
                case_sensitive: e.case_sensitive,
            })
        })
        .collect::<Result<Vec<_>, InterchangeError>>()?;
    Ok(Mapping {
        entries,
        default_value: doc.default_value,
        lower_bound: doc.lower_bound,
        upper_bound: doc.upper_bound,
    })
}

fn lower_lookup_table(
    context: &str,
    doc: &DeclarationDoc,
    base_type: Option<BaseType>,
) -> Result<Option<LookupTable>, InterchangeError> {
    let target = |field: &str, text: &str| -> Result<SingleValue, InterchangeError> {
        let bt = base_type.ok_or_else(|| invalid(context, field, "record outcomes have no lookup table"))?;
        SingleValue::parse(text, bt).map_err(|source| InterchangeError::InvalidValue {
            context: context.to_string(),
            field: field.to_string(),
            source,
        })
    };
    match (&doc.match_table, &doc.interpolation_table) {
        (Some(_), Some(_)) => Err(invalid(
            context,
            "matchTable",
            "an outcome has at most one lookup table",
        )),
        (Some(t), None) => {
            let entries = t
                .entries
                .iter()
                .map(|e| {
                    Ok(MatchTableEntry {
                        source_value: e.source_value,
                        target_value: target("matchTable", &e.target_value)?,
                    })
                })
                .collect::<Result<Vec<_>, InterchangeError>>()?;
            let default_value = t
                .default_value
                .as_deref()
                .map(|d| target("matchTable", d))
                .transpose()?;
            Ok(Some(LookupTable::Match {
                entries,
                default_value,
            }))
        }
        (None, Some(t)) => {
            let entries = t
                .entries
                .iter()
                .map(|e| {
                    Ok(InterpolationTableEntry {
                        source_value: e.source_value,
                        include_boundary: e.include_boundary,
                        target_value: target("interpolationTable", &e.target_value)?,
                    })
                })
                .collect::<Result<Vec<_>, InterchangeError>>()?;
            let default_value = t
                .default_value
                .as_deref()
                .map(|d| target("interpolationTable", d))
                .transpose()?;
            Ok(Some(LookupTable::Interpolation {
                entries,
                default_value,
            }))
        }
        (None, None) => Ok(None),
    }
}

// ── Rules ───────────────────────────────────────────────────────────

fn lower_rules(
    item: &mut ItemDefinition,
    list: &[serde_json::Value],
    path: &str,
) -> Result<Vec<RuleId>, InterchangeError> {
    list.iter()
        .enumerate()
        .map(|(i, node)| lower_rule(item, node, &format!("{}[{}]", path, i)))
        .collect()
}

fn lower_rule(
    item: &mut ItemDefinition,
    node: &serde_json::Value,
    path: &str,
) -> Result<RuleId, InterchangeError> {
    let name = required_str(node, "rule", path)?;
    let here = format!("{}/{}", path, name);

    let rule = match name.as_str() {
        "setOutcomeValue" | "setTemplateValue" | "setCorrectResponse" | "setDefaultValue"
        | "lookupOutcomeValue" => {
            let identifier = required_str(node, "identifier", &here)?;
            let expression = node
                .get("expression")
                .ok_or_else(|| missing(&here, "expression"))?;
            let expr = lower_expr(item, expression, &here)?;
            match name.as_str() {
                "setOutcomeValue" => Rule::SetOutcomeValue { identifier, expr },
                "setTemplateValue" => Rule::SetTemplateValue { identifier, expr },
                "setCorrectResponse" => Rule::SetCorrectResponse { identifier, expr },
                "setDefaultValue" => Rule::SetDefaultValue { identifier, expr },
                _ => Rule::LookupOutcomeValue { identifier, expr },
            }
        }
        "responseCondition" | "templateCondition" => {
            let cond = lower_condition(item, node, &here)?;
            if name == "responseCondition" {
                Rule::ResponseCondition(cond)
            } else {
                Rule::TemplateCondition(cond)
            }
        }
        "exitResponse" => Rule::ExitResponse,
        "exitTemplate" => Rule::ExitTemplate,
        "templateConstraint" => {
            let expression = node
                .get("expression")
                .ok_or_else(|| missing(&here, "expression"))?;
            Rule::TemplateConstraint {
                expr: lower_expr(item, expression, &here)?,
            }
        }
        "responseProcessingFragment" => {
            let rules = lower_rules(item, array_field(node, "rules", &here)?, &format!("{}/rules", here))?;
            Rule::Fragment { rules }
        }
        _ => {
            return Err(InterchangeError::UnknownRule {
                name,
                path: path.to_string(),
            })
        }
    };
    Ok(item.rules.push(rule))
}

fn lower_condition(
    item: &mut ItemDefinition,
    node: &serde_json::Value,
    path: &str,
) -> Result<Conditional, InterchangeError> {
    let mut cond = Conditional::default();
    for (i, branch) in array_field(node, "branches", path)?.iter().enumerate() {
        let branch_path = format!("{}/branches[{}]", path, i);
        let guard_json = branch
            .get("guard")
            .ok_or_else(|| missing(&branch_path, "guard"))?;
        let guard = lower_expr(item, guard_json, &format!("{}/guard", branch_path))?;
        let rules = match branch.get("rules") {
            Some(_) => lower_rules(
                item,
                array_field(branch, "rules", &branch_path)?,
                &format!("{}/rules", branch_path),
            )?,
            None => Vec::new(),
        };
        cond.branches.push(ConditionBranch { guard, rules });
    }
    if node.get("otherwise").is_some() {
        cond.otherwise = lower_rules(
            item,
            array_field(node, "otherwise", path)?,
            &format!("{}/otherwise", path),
        )?;
    }
    Ok(cond)
}

// ── Expressions ─────────────────────────────────────────────────────

fn lower_expr(
    item: &mut ItemDefinition,
    node: &serde_json::Value,
    path: &str,
) -> Result<ExprId, InterchangeError> {
    let op = required_str(node, "op", path)?;
    let here = format!("{}/{}", path, op);
    let kind = expr_kind(&op, node, &here)?;

    let mut children = Vec::new();
    if node.get("children").is_some() {
        for (i, child) in array_field(node, "children", &here)?.iter().enumerate() {
            children.push(lower_expr(item, child, &format!("{}[{}]", here, i))?);
        }
    }
    Ok(item.expressions.push(kind, children))
}

fn expr_kind(op: &str, node: &serde_json::Value, path: &str) -> Result<Expr, InterchangeError> {
    let kind = match op {
        "baseValue" => {
            let base_type: BaseType = field(node, "baseType", path)?;
            let text = required_str(node, "value", path)?;
            let value = SingleValue::parse(&text, base_type).map_err(|source| {
                InterchangeError::InvalidValue {
                    context: path.to_string(),
                    field: "value".to_string(),
                    source,
                }
            })?;
            Expr::BaseValue(value)
        }
        "variable" => Expr::Variable(required_str(node, "identifier", path)?),
        "correct" => Expr::Correct(required_str(node, "identifier", path)?),
        "default" => Expr::Default(required_str(node, "identifier", path)?),
        "mapResponse" => Expr::MapResponse(required_str(node, "identifier", path)?),
        "mapResponsePoint" => Expr::MapResponsePoint(required_str(node, "identifier", path)?),
        "null" => Expr::Null,
        "randomInteger" => Expr::RandomInteger {
            min: opt_field(node, "min", path)?.unwrap_or(IntOrVar::Int(0)),
            max: field(node, "max", path)?,
            step: opt_field(node, "step", path)?.unwrap_or(IntOrVar::Int(1)),
        },
        "randomFloat" => Expr::RandomFloat {
            min: opt_field(node, "min", path)?.unwrap_or(FloatOrVar::Float(0.0)),
            max: field(node, "max", path)?,
        },
        "mathConstant" => Expr::MathConstant(field(node, "name", path)?),

        "multiple" => Expr::Multiple,
        "ordered" => Expr::Ordered,
        "containerSize" => Expr::ContainerSize,
        "isNull" => Expr::IsNull,
        "index" => Expr::Index(field(node, "n", path)?),
        "fieldValue" => Expr::FieldValue(required_str(node, "fieldIdentifier", path)?),
        "random" => Expr::Random,
        "member" => Expr::Member,
        "delete" => Expr::Delete,
        "contains" => Expr::Contains,
        "repeat" => Expr::Repeat(field(node, "numberRepeats", path)?),
        "recordEx" => Expr::RecordEx(field(node, "fields", path)?),

        "not" => Expr::Not,
        "and" => Expr::And,
        "or" => Expr::Or,
        "anyN" => Expr::AnyN {
            min: field(node, "min", path)?,
            max: field(node, "max", path)?,
        },

        "match" => Expr::Match,
        "substring" => Expr::Substring {
            case_sensitive: opt_field(node, "caseSensitive", path)?.unwrap_or(true),
        },
        "stringMatch" => Expr::StringMatch {
            case_sensitive: field(node, "caseSensitive", path)?,
            substring: opt_field(node, "substring", path)?.unwrap_or(false),
        },
        "patternMatch" => Expr::PatternMatch(required_str(node, "pattern", path)?),
        "equal" => Expr::Equal {
            mode: opt_field(node, "toleranceMode", path)?.unwrap_or(ToleranceMode::Exact),
            tolerance: opt_field(node, "tolerance", path)?.unwrap_or_default(),
            include_lower_bound: opt_field(node, "includeLowerBound", path)?.unwrap_or(true),
            include_upper_bound: opt_field(node, "includeUpperBound", path)?.unwrap_or(true),
        },
        "equalRounded" => Expr::EqualRounded {
            mode: opt_field(node, "roundingMode", path)?
                .unwrap_or(RoundingMode::SignificantFigures),
            figures: field(node, "figures", path)?,
        },
        "inside" => Expr::Inside(field(node, "shape", path)?),
        "lt" => Expr::Lt,
        "gt" => Expr::Gt,
        "lte" => Expr::Lte,
        "gte" => Expr::Gte,
        "durationLT" => Expr::DurationLt,
        "durationGTE" => Expr::DurationGte,

        "sum" => Expr::Sum,
        "product" => Expr::Product,
        "subtract" => Expr::Subtract,
        "divide" => Expr::Divide,
        "power" => Expr::Power,
        "integerDivide" => Expr::IntegerDivide,
        "integerModulus" => Expr::IntegerModulus,
        "truncate" => Expr::Truncate,
        "round" => Expr::Round,
        "integerToFloat" => Expr::IntegerToFloat,
        "roundTo" => Expr::RoundTo {
            mode: opt_field(node, "roundingMode", path)?
                .unwrap_or(RoundingMode::SignificantFigures),
            figures: field(node, "figures", path)?,
        },
        "max" => Expr::Max,
        "min" => Expr::Min,
        "gcd" => Expr::Gcd,
        "lcm" => Expr::Lcm,
        "statsOperator" => Expr::StatsOperator(field(node, "name", path)?),
        "mathOperator" => Expr::MathOperator(field(node, "name", path)?),

        _ => {
            return Err(InterchangeError::UnknownOperator {
                name: op.to_string(),
                path: path.to_string(),
            })
        }
    };
    Ok(kind)
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn missing(context: &str, field: &str) -> InterchangeError {
    InterchangeError::MissingField {
        context: context.to_string(),
        field: field.to_string(),
    }
}

fn invalid(context: &str, field: &str, message: impl Into<String>) -> InterchangeError {
    InterchangeError::InvalidField {
        context: context.to_string(),
        field: field.to_string(),
        message: message.into(),
    }
}

fn required_str(
    node: &serde_json::Value,
    name: &str,
    context: &str,
) -> Result<String, InterchangeError> {
    match node.get(name) {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(invalid(context, name, "expected a string")),
        None => Err(missing(context, name)),
    }
}

fn array_field<'a>(
    node: &'a serde_json::Value,
    name: &str,
    context: &str,
) -> Result<&'a Vec<serde_json::Value>, InterchangeError> {
    match node.get(name) {
        Some(serde_json::Value::Array(items)) => Ok(items),
        Some(_) => Err(invalid(context, name, "expected an array")),
        None => Err(missing(context, name)),
    }
}

fn field<T: DeserializeOwned>(
    node: &serde_json::Value,
    name: &str,
    context: &str,
) -> Result<T, InterchangeError> {
    opt_field(node, name, context)?.ok_or_else(|| missing(context, name))
}

fn opt_field<T: DeserializeOwned>(
    node: &serde_json::Value,
    name: &str,
    context: &str,
) -> Result<Option<T>, InterchangeError> {
    match node.get(name) {
        None => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| invalid(context, name, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal(response_processing: serde_json::Value) -> serde_json::Value {
        json!({
            "identifier": "item-1",
            "title": "Capital cities",
            "declarations": [
                {
                    "kind": "response",
                    "identifier": "RESPONSE",
                    "cardinality": "single",
                    "baseType": "identifier",
                    "correctResponse": "ChoiceA"
                },
                {
                    "kind": "outcome",
                    "identifier": "SCORE",
                    "cardinality": "single",
                    "baseType": "float"
                }
            ],
            "responseProcessing": response_processing
        })
    }

    #[test]
    fn lowers_match_correct_template() {
        let doc = minimal(json!([
            {
                "rule": "responseCondition",
                "branches": [{
                    "guard": {
                        "op": "match",
                        "children": [
                            { "op": "variable", "identifier": "RESPONSE" },
                            { "op": "correct", "identifier": "RESPONSE" }
                        ]
                    },
                    "rules": [{
                        "rule": "setOutcomeValue",
                        "identifier": "SCORE",
                        "expression": { "op": "baseValue", "baseType": "float", "value": "1" }
                    }]
                }],
                "otherwise": [{
                    "rule": "setOutcomeValue",
                    "identifier": "SCORE",
                    "expression": { "op": "baseValue", "baseType": "float", "value": "0" }
                }]
            }
        ]));
        let item = from_interchange(&doc).unwrap();
        assert_eq!(item.title, "Capital cities");
        assert_eq!(item.response_processing.len(), 1);
        assert_eq!(item.expressions.len(), 5);
        assert_eq!(item.rules.len(), 3);
        assert_eq!(
            item.declaration("RESPONSE").unwrap().correct_response(),
            Some(&Value::identifier("ChoiceA"))
        );
        item.check_references().unwrap();

        let Some(Rule::ResponseCondition(cond)) = item.rule(item.response_processing[0]) else {
            panic!("expected a response condition");
        };
        assert_eq!(item.expressions.path(cond.branches[0].guard), "match");
    }

    #[test]
    fn unknown_operator_reports_path() {
        let doc = minimal(json!([{
            "rule": "setOutcomeValue",
            "identifier": "SCORE",
            "expression": {
                "op": "sum",
                "children": [{ "op": "frobnicate" }]
            }
        }]));
        let err = from_interchange(&doc).unwrap_err();
        assert_eq!(
            err,
            InterchangeError::UnknownOperator {
                name: "frobnicate".into(),
                path: "responseProcessing[0]/setOutcomeValue/sum[0]/frobnicate".into(),
            }
        );
    }

    #[test]
    fn bad_literal_is_invalid_value() {
        let doc = minimal(json!([{
            "rule": "setOutcomeValue",
            "identifier": "SCORE",
            "expression": { "op": "baseValue", "baseType": "float", "value": "one" }
        }]));
        assert!(matches!(
            from_interchange(&doc),
            Err(InterchangeError::InvalidValue { .. })
        ));
    }

    #[test]
    fn missing_base_type_rejected() {
        let doc = json!({
            "identifier": "x",
            "declarations": [
                { "kind": "outcome", "identifier": "SCORE", "cardinality": "single" }
            ]
        });
        assert_eq!(
            from_interchange(&doc).unwrap_err(),
            InterchangeError::MissingField {
                context: "declaration 'SCORE'".into(),
                field: "baseType".into(),
            }
        );
    }

    #[test]
    fn duplicate_declaration_is_definition_error() {
        let doc = json!({
            "identifier": "x",
            "declarations": [
                { "kind": "outcome", "identifier": "SCORE", "cardinality": "single", "baseType": "float" },
                { "kind": "outcome", "identifier": "SCORE", "cardinality": "single", "baseType": "float" }
            ]
        });
        assert!(matches!(
            from_interchange(&doc),
            Err(InterchangeError::Definition(DefinitionError::DuplicateVariable { .. }))
        ));
    }

    #[test]
    fn mappings_and_tables() {
        let doc = json!({
            "identifier": "x",
            "declarations": [
                {
                    "kind": "response",
                    "identifier": "R",
                    "cardinality": "multiple",
                    "baseType": "string",
                    "mapping": {
                        "entries": [{ "key": "Paris", "value": 1.0, "caseSensitive": false }],
                        "defaultValue": 0.0,
                        "upperBound": 1.0
                    },
                    "constraints": { "minValues": 1, "patternMask": "[A-Za-z]+" }
                },
                {
                    "kind": "response",
                    "identifier": "P",
                    "cardinality": "single",
                    "baseType": "point",
                    "areaMapping": {
                        "entries": [{ "shape": "circle", "x": 5, "y": 5, "radius": 3, "value": 2.0 }]
                    }
                },
                {
                    "kind": "outcome",
                    "identifier": "GRADE",
                    "cardinality": "single",
                    "baseType": "identifier",
                    "matchTable": {
                        "entries": [{ "sourceValue": 1, "targetValue": "PASS" }],
                        "defaultValue": "FAIL"
                    }
                }
            ]
        });
        let item = from_interchange(&doc).unwrap();
        let r = item.declaration("R").unwrap();
        let mapping = r.mapping().unwrap();
        assert_eq!(mapping.lookup(&SingleValue::String("paris".into())), Some(1.0));
        assert_eq!(r.constraints().unwrap().min_values, 1);
        let area = item.declaration("P").unwrap().area_mapping().unwrap();
        assert!(area.entries[0].shape.contains(6, 6));
        let table = item.declaration("GRADE").unwrap().lookup_table().unwrap();
        assert_eq!(
            table.lookup(2.0),
            Some(SingleValue::Identifier("FAIL".into()))
        );
    }

    #[test]
    fn record_default_value() {
        let doc = json!({
            "identifier": "x",
            "declarations": [{
                "kind": "outcome",
                "identifier": "REC",
                "cardinality": "record",
                "defaultValue": {
                    "a": { "baseType": "integer", "value": "1" },
                    "b": { "baseType": "string", "value": "x" }
                }
            }]
        });
        let item = from_interchange(&doc).unwrap();
        let rec = &item.declaration("REC").unwrap().default_value;
        assert_eq!(rec.cardinality(), Some(Cardinality::Record));
    }

    #[test]
    fn not_json_is_document_error() {
        assert!(matches!(
            from_json_str("{ not json"),
            Err(InterchangeError::Document(_))
        ));
    }
}
