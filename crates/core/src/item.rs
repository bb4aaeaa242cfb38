//! Item definitions.
//!
//! An [`ItemDefinition`] bundles the variable declarations of an assessment
//! item with its expression and rule arenas and the two top-level rule
//! lists (template processing and response processing). It is assembled
//! once, checked with [`ItemDefinition::check_references`], and then shared
//! by sessions through an `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::declaration::{VariableDeclaration, VariableKind};
use crate::error::DefinitionError;
use crate::expression::{Expr, ExprArena, ExprId, ExprNode};
use crate::rule::{Rule, RuleArena, RuleId};
use crate::types::{BaseType, Cardinality};
use crate::value::Value;

/// Built-in response variable accumulating candidate time in seconds.
pub const DURATION: &str = "duration";
/// Built-in response variable counting attempts.
pub const NUM_ATTEMPTS: &str = "numAttempts";
/// Built-in outcome variable tracking completion.
pub const COMPLETION_STATUS: &str = "completionStatus";

/// Values taken by the `completionStatus` built-in.
pub mod completion_status {
    pub const NOT_ATTEMPTED: &str = "not_attempted";
    pub const UNKNOWN: &str = "unknown";
    pub const COMPLETED: &str = "completed";
    pub const INCOMPLETE: &str = "incomplete";
}

fn built_in_declarations() -> Vec<VariableDeclaration> {
    vec![
        VariableDeclaration::response(DURATION, Cardinality::Single, Some(BaseType::Float))
            .with_default(Value::float(0.0)),
        VariableDeclaration::response(NUM_ATTEMPTS, Cardinality::Single, Some(BaseType::Integer))
            .with_default(Value::integer(0)),
        VariableDeclaration::outcome(
            COMPLETION_STATUS,
            Cardinality::Single,
            Some(BaseType::Identifier),
        )
        .with_default(Value::identifier(completion_status::NOT_ATTEMPTED)),
    ]
}

#[derive(Debug, Clone)]
pub struct ItemDefinition {
    pub identifier: String,
    pub title: String,
    /// Adaptive items keep outcomes between attempts and close on
    /// `completionStatus = completed` instead of on attempt count.
    pub adaptive: bool,
    declarations: Vec<Arc<VariableDeclaration>>,
    /// Identifier -> position in `declarations`.
    index: BTreeMap<String, usize>,
    pub expressions: ExprArena,
    pub rules: RuleArena,
    pub template_processing: Vec<RuleId>,
    pub response_processing: Vec<RuleId>,
}

impl ItemDefinition {
    /// Build an item with the given declarations plus the built-in
    /// variables. Arenas and rule lists start empty.
    pub fn new(
        identifier: impl Into<String>,
        declarations: Vec<VariableDeclaration>,
    ) -> Result<ItemDefinition, DefinitionError> {
        let mut item = ItemDefinition {
            identifier: identifier.into(),
            title: String::new(),
            adaptive: false,
            declarations: Vec::new(),
            index: BTreeMap::new(),
            expressions: ExprArena::new(),
            rules: RuleArena::new(),
            template_processing: Vec::new(),
            response_processing: Vec::new(),
        };
        let built_ins = built_in_declarations();
        for builtin in &built_ins {
            item.insert(builtin.clone());
        }
        for decl in declarations {
            if let Some(builtin) = built_ins.iter().find(|b| b.identifier == decl.identifier) {
                // Redeclaring a built-in is allowed only with its exact signature.
                let same_shape = builtin.kind() == decl.kind()
                    && builtin.cardinality == decl.cardinality
                    && builtin.base_type == decl.base_type;
                if !same_shape {
                    return Err(DefinitionError::ReservedIdentifier {
                        identifier: decl.identifier,
                        kind: builtin.kind().to_string(),
                    });
                }
                if let Some(&slot) = item.index.get(&builtin.identifier) {
                    item.declarations[slot] = Arc::new(decl);
                }
                continue;
            }
            if item.index.contains_key(&decl.identifier) {
                return Err(DefinitionError::DuplicateVariable {
                    identifier: decl.identifier,
                });
            }
            item.insert(decl);
        }
        Ok(item)
    }

    fn insert(&mut self, decl: VariableDeclaration) {
        self.index
            .insert(decl.identifier.clone(), self.declarations.len());
        self.declarations.push(Arc::new(decl));
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_adaptive(mut self, adaptive: bool) -> Self {
        self.adaptive = adaptive;
        self
    }

    pub fn declaration(&self, identifier: &str) -> Option<&Arc<VariableDeclaration>> {
        self.index.get(identifier).map(|&i| &self.declarations[i])
    }

    /// All declarations, built-ins first, then in declaration order.
    pub fn declarations(&self) -> impl Iterator<Item = &Arc<VariableDeclaration>> {
        self.declarations.iter()
    }

    pub fn declarations_of(
        &self,
        kind: VariableKind,
    ) -> impl Iterator<Item = &Arc<VariableDeclaration>> {
        self.declarations.iter().filter(move |d| d.kind() == kind)
    }

    pub fn expr(&self, id: ExprId) -> Option<&ExprNode> {
        self.expressions.get(id)
    }

    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id)
    }

    // ──────────────────────────────────────────────
    // Reference checks
    // ──────────────────────────────────────────────

    /// Verify that every node reachable from the two rule lists exists and
    /// that every variable they reference is declared with a suitable kind.
    pub fn check_references(&self) -> Result<(), DefinitionError> {
        for (phase, roots) in [
            ("templateProcessing", &self.template_processing),
            ("responseProcessing", &self.response_processing),
        ] {
            for &rule_id in roots {
                self.check_rule(phase, rule_id)?;
            }
        }
        Ok(())
    }

    fn check_rule(&self, phase: &str, id: RuleId) -> Result<(), DefinitionError> {
        let rule = self.rule(id).ok_or_else(|| DefinitionError::Malformed {
            context: phase.to_string(),
            message: format!("rule {:?} does not exist", id),
        })?;
        let context = format!("{}/{}", phase, rule.name());

        if let Some(target) = rule.target() {
            let allowed: &[VariableKind] = match rule {
                Rule::SetOutcomeValue { .. } | Rule::LookupOutcomeValue { .. } => {
                    &[VariableKind::Outcome]
                }
                Rule::SetTemplateValue { .. } => &[VariableKind::Template],
                Rule::SetCorrectResponse { .. } => &[VariableKind::Response],
                _ => &[VariableKind::Response, VariableKind::Outcome],
            };
            self.check_variable(&context, target, allowed)?;
        }
        if let Rule::ResponseCondition(c) | Rule::TemplateCondition(c) = rule {
            if c.branches.is_empty() {
                return Err(DefinitionError::Malformed {
                    context,
                    message: "condition has no if branch".to_string(),
                });
            }
        }
        for expr in rule.expressions() {
            self.check_expr(&context, expr)?;
        }
        for child in rule.child_rules() {
            self.check_rule(phase, child)?;
        }
        Ok(())
    }

    fn check_expr(&self, rule_context: &str, id: ExprId) -> Result<(), DefinitionError> {
        let node = self.expr(id).ok_or_else(|| DefinitionError::Malformed {
            context: rule_context.to_string(),
            message: format!("expression {:?} does not exist", id),
        })?;
        let context = format!("{} {}", rule_context, self.expressions.path(id));

        const ANY: &[VariableKind] = &[
            VariableKind::Template,
            VariableKind::Response,
            VariableKind::Outcome,
        ];
        match &node.kind {
            Expr::Variable(name) | Expr::Default(name) => {
                self.check_variable(&context, name, ANY)?;
            }
            Expr::Correct(name) | Expr::MapResponse(name) | Expr::MapResponsePoint(name) => {
                self.check_variable(&context, name, &[VariableKind::Response])?;
            }
            Expr::RecordEx(fields) if fields.len() != node.children.len() => {
                return Err(DefinitionError::Malformed {
                    context,
                    message: format!(
                        "recordEx names {} fields but has {} children",
                        fields.len(),
                        node.children.len()
                    ),
                });
            }
            _ => {}
        }
        for name in node.kind.operand_variables() {
            self.check_variable(&context, name, &[VariableKind::Template])?;
        }
        for &child in &node.children {
            self.check_expr(rule_context, child)?;
        }
        Ok(())
    }

    fn check_variable(
        &self,
        context: &str,
        identifier: &str,
        allowed: &[VariableKind],
    ) -> Result<(), DefinitionError> {
        let decl = self
            .declaration(identifier)
            .ok_or_else(|| DefinitionError::UnresolvedVariable {
                context: context.to_string(),
                identifier: identifier.to_string(),
            })?;
        if !allowed.contains(&decl.kind()) {
            let expected: Vec<&str> = allowed.iter().map(|k| k.as_str()).collect();
            return Err(DefinitionError::WrongVariableKind {
                context: context.to_string(),
                identifier: identifier.to_string(),
                expected: expected.join(" or "),
                actual: decl.kind().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::IntOrVar;
    use crate::value::SingleValue;

    fn score_item() -> ItemDefinition {
        ItemDefinition::new(
            "choice",
            vec![
                VariableDeclaration::response(
                    "RESPONSE",
                    Cardinality::Single,
                    Some(BaseType::Identifier),
                ),
                VariableDeclaration::outcome("SCORE", Cardinality::Single, Some(BaseType::Float)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn built_ins_are_declared() {
        let item = score_item();
        assert_eq!(
            item.declaration(DURATION).map(|d| d.kind()),
            Some(VariableKind::Response)
        );
        assert_eq!(
            item.declaration(COMPLETION_STATUS).map(|d| d.kind()),
            Some(VariableKind::Outcome)
        );
        assert_eq!(item.declarations_of(VariableKind::Outcome).count(), 2);
    }

    #[test]
    fn duplicate_declaration_rejected() {
        let err = ItemDefinition::new(
            "dup",
            vec![
                VariableDeclaration::outcome("SCORE", Cardinality::Single, Some(BaseType::Float)),
                VariableDeclaration::outcome("SCORE", Cardinality::Single, Some(BaseType::Float)),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateVariable { .. }));
    }

    #[test]
    fn built_in_with_wrong_shape_rejected() {
        let err = ItemDefinition::new(
            "bad",
            vec![VariableDeclaration::outcome(
                COMPLETION_STATUS,
                Cardinality::Single,
                Some(BaseType::String),
            )],
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::ReservedIdentifier { .. }));
    }

    #[test]
    fn check_references_accepts_valid_item() {
        let mut item = score_item();
        let v = item.expressions.push(Expr::Variable("RESPONSE".into()), vec![]);
        let c = item.expressions.push(Expr::Correct("RESPONSE".into()), vec![]);
        let m = item.expressions.push(Expr::Match, vec![v, c]);
        let rule = item.rules.push(Rule::SetOutcomeValue {
            identifier: "SCORE".into(),
            expr: m,
        });
        item.response_processing.push(rule);
        assert!(item.check_references().is_ok());
    }

    #[test]
    fn check_references_flags_undeclared_variable() {
        let mut item = score_item();
        let v = item.expressions.push(Expr::Variable("MISSING".into()), vec![]);
        let rule = item.rules.push(Rule::SetOutcomeValue {
            identifier: "SCORE".into(),
            expr: v,
        });
        item.response_processing.push(rule);
        let err = item.check_references().unwrap_err();
        assert_eq!(
            err,
            DefinitionError::UnresolvedVariable {
                context: "responseProcessing/setOutcomeValue variable".into(),
                identifier: "MISSING".into(),
            }
        );
    }

    #[test]
    fn check_references_flags_wrong_target_kind() {
        let mut item = score_item();
        let one = item
            .expressions
            .push(Expr::BaseValue(SingleValue::Float(1.0)), vec![]);
        let rule = item.rules.push(Rule::SetOutcomeValue {
            identifier: "RESPONSE".into(),
            expr: one,
        });
        item.response_processing.push(rule);
        assert!(matches!(
            item.check_references().unwrap_err(),
            DefinitionError::WrongVariableKind { .. }
        ));
    }

    #[test]
    fn operand_variables_must_be_template() {
        let mut item = score_item();
        let r = item.expressions.push(
            Expr::RandomInteger {
                min: IntOrVar::Int(0),
                max: IntOrVar::Var("SCORE".into()),
                step: IntOrVar::Int(1),
            },
            vec![],
        );
        let rule = item.rules.push(Rule::SetOutcomeValue {
            identifier: "SCORE".into(),
            expr: r,
        });
        item.response_processing.push(rule);
        assert!(matches!(
            item.check_references().unwrap_err(),
            DefinitionError::WrongVariableKind { .. }
        ));
    }
}
