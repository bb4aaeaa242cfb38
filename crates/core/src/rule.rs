//! Processing rule trees.
//!
//! Rules reference nested rules by [`RuleId`] and the expressions they
//! evaluate by [`ExprId`]. Both kinds of node are owned by the item's arenas.

use crate::arena::{Arena, NodeId};
use crate::expression::ExprId;

pub type RuleId = NodeId<Rule>;
pub type RuleArena = Arena<Rule>;

/// One `if` / `elseIf` arm of a condition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionBranch {
    pub guard: ExprId,
    pub rules: Vec<RuleId>,
}

/// `if` + `elseIf`* + optional `else`. An empty `otherwise` means no else.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Conditional {
    pub branches: Vec<ConditionBranch>,
    pub otherwise: Vec<RuleId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    ResponseCondition(Conditional),
    TemplateCondition(Conditional),
    SetOutcomeValue { identifier: String, expr: ExprId },
    SetTemplateValue { identifier: String, expr: ExprId },
    SetCorrectResponse { identifier: String, expr: ExprId },
    SetDefaultValue { identifier: String, expr: ExprId },
    LookupOutcomeValue { identifier: String, expr: ExprId },
    ExitResponse,
    ExitTemplate,
    /// Restart template processing when the expression is false or NULL.
    TemplateConstraint { expr: ExprId },
    /// `responseProcessingFragment`: a nested group of rules.
    Fragment { rules: Vec<RuleId> },
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::ResponseCondition(_) => "responseCondition",
            Rule::TemplateCondition(_) => "templateCondition",
            Rule::SetOutcomeValue { .. } => "setOutcomeValue",
            Rule::SetTemplateValue { .. } => "setTemplateValue",
            Rule::SetCorrectResponse { .. } => "setCorrectResponse",
            Rule::SetDefaultValue { .. } => "setDefaultValue",
            Rule::LookupOutcomeValue { .. } => "lookupOutcomeValue",
            Rule::ExitResponse => "exitResponse",
            Rule::ExitTemplate => "exitTemplate",
            Rule::TemplateConstraint { .. } => "templateConstraint",
            Rule::Fragment { .. } => "responseProcessingFragment",
        }
    }

    /// Directly nested rules, in execution order.
    pub fn child_rules(&self) -> Vec<RuleId> {
        match self {
            Rule::ResponseCondition(c) | Rule::TemplateCondition(c) => c
                .branches
                .iter()
                .flat_map(|b| b.rules.iter().copied())
                .chain(c.otherwise.iter().copied())
                .collect(),
            Rule::Fragment { rules } => rules.clone(),
            _ => Vec::new(),
        }
    }

    /// Root expressions evaluated by this rule (guards included).
    pub fn expressions(&self) -> Vec<ExprId> {
        match self {
            Rule::ResponseCondition(c) | Rule::TemplateCondition(c) => {
                c.branches.iter().map(|b| b.guard).collect()
            }
            Rule::SetOutcomeValue { expr, .. }
            | Rule::SetTemplateValue { expr, .. }
            | Rule::SetCorrectResponse { expr, .. }
            | Rule::SetDefaultValue { expr, .. }
            | Rule::LookupOutcomeValue { expr, .. }
            | Rule::TemplateConstraint { expr } => vec![*expr],
            Rule::ExitResponse | Rule::ExitTemplate | Rule::Fragment { .. } => Vec::new(),
        }
    }

    /// The variable this rule writes, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Rule::SetOutcomeValue { identifier, .. }
            | Rule::SetTemplateValue { identifier, .. }
            | Rule::SetCorrectResponse { identifier, .. }
            | Rule::SetDefaultValue { identifier, .. }
            | Rule::LookupOutcomeValue { identifier, .. } => Some(identifier),
            _ => None,
        }
    }
}

impl Arena<Rule> {
    /// Append a rule and record it as the parent of its nested rules.
    pub fn push(&mut self, rule: Rule) -> RuleId {
        let children = rule.child_rules();
        let id = self.alloc(rule);
        for child in children {
            self.set_parent(child, id);
        }
        id
    }
}
