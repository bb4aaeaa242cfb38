//! Response validation against declared response constraints.

use qti_core::{ItemDefinition, VariableKind};
use regex::Regex;

use crate::error::AuthoringError;
use crate::store::VariableStore;

/// Identifiers of response variables whose bound value breaks its
/// constraints, in declaration order.
///
/// An unusable pattern mask is an authoring error, not a candidate one.
pub fn validate_responses(
    item: &ItemDefinition,
    store: &VariableStore,
) -> Result<Vec<String>, AuthoringError> {
    let mut invalid = Vec::new();
    for decl in item.declarations_of(VariableKind::Response) {
        let Some(constraints) = decl.constraints() else {
            continue;
        };
        let Some(value) = store.get(&decl.identifier) else {
            continue;
        };
        let members = value.members();
        let count = members.len();

        let mut ok = count >= constraints.min_values;
        if let Some(max) = constraints.max_values {
            ok &= count <= max;
        }
        if let Some(mask) = &constraints.pattern_mask {
            let re = Regex::new(&format!("^(?:{})$", mask)).map_err(|e| {
                AuthoringError::InvalidOperand {
                    operator: "patternMask".to_string(),
                    path: decl.identifier.clone(),
                    message: e.to_string(),
                }
            })?;
            ok &= members
                .iter()
                .all(|m| m.as_text().map_or(true, |t| re.is_match(t)));
        }

        if !ok {
            tracing::debug!(identifier = %decl.identifier, count, "invalid response");
            invalid.push(decl.identifier.clone());
        }
    }
    Ok(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qti_core::{
        BaseType, Cardinality, ResponseConstraints, SingleValue, Value, VariableDeclaration,
    };

    fn item() -> ItemDefinition {
        ItemDefinition::new(
            "validation",
            vec![
                VariableDeclaration::response(
                    "CHOICE",
                    Cardinality::Multiple,
                    Some(BaseType::Identifier),
                )
                .with_constraints(ResponseConstraints {
                    min_values: 1,
                    max_values: Some(2),
                    pattern_mask: None,
                }),
                VariableDeclaration::response("CODE", Cardinality::Single, Some(BaseType::String))
                    .with_constraints(ResponseConstraints {
                        min_values: 0,
                        max_values: None,
                        pattern_mask: Some("[A-Z]{3}".into()),
                    }),
                VariableDeclaration::response("FREE", Cardinality::Single, Some(BaseType::String)),
            ],
        )
        .unwrap()
    }

    fn ids(items: &[&str]) -> Vec<SingleValue> {
        items
            .iter()
            .map(|s| SingleValue::Identifier(s.to_string()))
            .collect()
    }

    #[test]
    fn null_breaks_min_values() {
        let item = item();
        let store = VariableStore::new(&item);
        assert_eq!(validate_responses(&item, &store).unwrap(), vec!["CHOICE"]);
    }

    #[test]
    fn count_within_bounds() {
        let item = item();
        let mut store = VariableStore::new(&item);
        store
            .set(
                "CHOICE",
                Value::multiple(BaseType::Identifier, ids(&["A", "B"])).unwrap(),
            )
            .unwrap();
        assert!(validate_responses(&item, &store).unwrap().is_empty());

        store
            .set(
                "CHOICE",
                Value::multiple(BaseType::Identifier, ids(&["A", "B", "C"])).unwrap(),
            )
            .unwrap();
        assert_eq!(validate_responses(&item, &store).unwrap(), vec!["CHOICE"]);
    }

    #[test]
    fn pattern_mask_is_anchored() {
        let item = item();
        let mut store = VariableStore::new(&item);
        store
            .set("CHOICE", Value::multiple(BaseType::Identifier, ids(&["A"])).unwrap())
            .unwrap();
        store.set("CODE", Value::string("ABCD")).unwrap();
        assert_eq!(validate_responses(&item, &store).unwrap(), vec!["CODE"]);
        store.set("CODE", Value::string("ABC")).unwrap();
        assert!(validate_responses(&item, &store).unwrap().is_empty());
    }

    #[test]
    fn bad_pattern_is_authoring_error() {
        let item = ItemDefinition::new(
            "broken",
            vec![
                VariableDeclaration::response("CODE", Cardinality::Single, Some(BaseType::String))
                    .with_constraints(ResponseConstraints {
                        min_values: 0,
                        max_values: None,
                        pattern_mask: Some("(".into()),
                    }),
            ],
        )
        .unwrap();
        let mut store = VariableStore::new(&item);
        store.set("CODE", Value::string("x")).unwrap();
        assert!(matches!(
            validate_responses(&item, &store),
            Err(AuthoringError::InvalidOperand { .. })
        ));
    }
}
