//! Per-session variable store.
//!
//! One [`Slot`] per declared variable, holding the current value and the
//! session-level overrides of the default value and correct response that
//! template processing may install. Every write goes through
//! [`conform`], which enforces the declared cardinality and base type.

use std::collections::BTreeMap;
use std::sync::Arc;

use qti_core::{
    BaseType, Cardinality, ItemDefinition, SingleValue, Value, VariableDeclaration, VariableKind,
};

/// Why a value could not be stored.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssignmentError {
    #[error("variable '{0}' is not declared")]
    Undeclared(String),

    #[error("value of cardinality {found} cannot be stored in a {expected} variable")]
    Cardinality {
        expected: Cardinality,
        found: Cardinality,
    },

    #[error("value of base type {found} cannot be stored in a {expected} variable")]
    BaseType { expected: String, found: String },
}

#[derive(Debug, Clone)]
pub struct Slot {
    pub declaration: Arc<VariableDeclaration>,
    pub value: Value,
    pub default_override: Option<Value>,
    pub correct_override: Option<Value>,
}

impl Slot {
    /// Default in force for this session: the override if set, else the
    /// declaration's initial value.
    pub fn effective_default(&self) -> Value {
        match &self.default_override {
            Some(v) => v.clone(),
            None => self.declaration.initial_value(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariableStore {
    slots: BTreeMap<String, Slot>,
}

impl VariableStore {
    /// Fresh store with every variable at its declared initial value.
    pub fn new(item: &ItemDefinition) -> Self {
        let slots = item
            .declarations()
            .map(|decl| {
                (
                    decl.identifier.clone(),
                    Slot {
                        declaration: Arc::clone(decl),
                        value: decl.initial_value(),
                        default_override: None,
                        correct_override: None,
                    },
                )
            })
            .collect();
        VariableStore { slots }
    }

    pub fn get(&self, identifier: &str) -> Option<&Value> {
        self.slots.get(identifier).map(|s| &s.value)
    }

    pub fn declaration(&self, identifier: &str) -> Option<&Arc<VariableDeclaration>> {
        self.slots.get(identifier).map(|s| &s.declaration)
    }

    pub fn default_value(&self, identifier: &str) -> Option<Value> {
        self.slots.get(identifier).map(Slot::effective_default)
    }

    pub fn correct_response(&self, identifier: &str) -> Option<Value> {
        let slot = self.slots.get(identifier)?;
        match &slot.correct_override {
            Some(v) => Some(v.clone()),
            None => slot.declaration.correct_response().cloned(),
        }
    }

    /// Type-checked write of the current value.
    pub fn set(&mut self, identifier: &str, value: Value) -> Result<(), AssignmentError> {
        let slot = self.slot_mut(identifier)?;
        slot.value = conform(&slot.declaration, value)?;
        Ok(())
    }

    pub fn set_default(&mut self, identifier: &str, value: Value) -> Result<(), AssignmentError> {
        let slot = self.slot_mut(identifier)?;
        slot.default_override = Some(conform(&slot.declaration, value)?);
        Ok(())
    }

    pub fn set_correct(&mut self, identifier: &str, value: Value) -> Result<(), AssignmentError> {
        let slot = self.slot_mut(identifier)?;
        slot.correct_override = Some(conform(&slot.declaration, value)?);
        Ok(())
    }

    fn slot_mut(&mut self, identifier: &str) -> Result<&mut Slot, AssignmentError> {
        self.slots
            .get_mut(identifier)
            .ok_or_else(|| AssignmentError::Undeclared(identifier.to_string()))
    }

    /// Put every variable of `kind` back to its effective default.
    pub fn reset_kind(&mut self, kind: VariableKind) {
        for slot in self.slots.values_mut() {
            if slot.declaration.kind() == kind {
                slot.value = slot.effective_default();
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Current values grouped by variable kind.
    pub fn to_json(&self) -> serde_json::Value {
        let mut groups: BTreeMap<&str, serde_json::Map<String, serde_json::Value>> =
            BTreeMap::new();
        for kind in [
            VariableKind::Template,
            VariableKind::Response,
            VariableKind::Outcome,
        ] {
            groups.insert(kind.as_str(), serde_json::Map::new());
        }
        for (id, slot) in &self.slots {
            if let Some(group) = groups.get_mut(slot.declaration.kind().as_str()) {
                group.insert(id.clone(), slot.value.to_json());
            }
        }
        let mut out = serde_json::Map::new();
        for (kind, group) in groups {
            out.insert(kind.to_string(), serde_json::Value::Object(group));
        }
        serde_json::Value::Object(out)
    }
}

/// Check `value` against the declaration, widening a single integer to a
/// float where the declaration asks for a float.
pub fn conform(decl: &VariableDeclaration, value: Value) -> Result<Value, AssignmentError> {
    let Some(found_card) = value.cardinality() else {
        return Ok(Value::Null);
    };
    if found_card != decl.cardinality {
        return Err(AssignmentError::Cardinality {
            expected: decl.cardinality,
            found: found_card,
        });
    }
    if found_card == Cardinality::Record {
        return Ok(value);
    }
    let found_bt = value.base_type();
    if found_bt == decl.base_type {
        return Ok(value);
    }
    if let (Some(BaseType::Float), Value::Single(SingleValue::Integer(i))) =
        (decl.base_type, &value)
    {
        return Ok(Value::float(*i as f64));
    }
    Err(AssignmentError::BaseType {
        expected: base_type_label(decl.base_type),
        found: base_type_label(found_bt),
    })
}

fn base_type_label(bt: Option<BaseType>) -> String {
    bt.map(|b| b.to_string())
        .unwrap_or_else(|| "record".to_string())
}
