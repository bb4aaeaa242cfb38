//! Processing reports.
//!
//! Every assignment made while running a rule list is recorded with the
//! rule that made it, so a caller can see exactly what persisted even when
//! a later rule failed.

use qti_core::{RuleId, Value};

use crate::rules::RuleOutcome;

/// One variable write performed by a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub identifier: String,
    pub value: Value,
    /// Rule element name (`setOutcomeValue`, `setDefaultValue`, ...).
    pub rule: &'static str,
    pub rule_id: RuleId,
}

/// Result of one response-processing (or template-processing) run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingReport {
    pub outcome: RuleOutcome,
    pub assignments: Vec<Assignment>,
}

impl ProcessingReport {
    /// Last value written to `identifier` during the run.
    pub fn last_value(&self, identifier: &str) -> Option<&Value> {
        self.assignments
            .iter()
            .rev()
            .find(|a| a.identifier == identifier)
            .map(|a| &a.value)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let assignments: Vec<serde_json::Value> = self
            .assignments
            .iter()
            .map(|a| {
                serde_json::json!({
                    "identifier": a.identifier,
                    "value": a.value.to_json(),
                    "rule": a.rule,
                    "ruleId": a.rule_id.index(),
                })
            })
            .collect();
        serde_json::json!({
            "outcome": self.outcome.as_str(),
            "assignments": assignments,
        })
    }
}

/// Collects assignments while rules execute.
#[derive(Debug, Clone, Default)]
pub struct ReportCollector {
    pub assignments: Vec<Assignment>,
}

impl ReportCollector {
    pub fn new() -> Self {
        ReportCollector {
            assignments: Vec::new(),
        }
    }

    pub fn record(&mut self, identifier: &str, value: Value, rule: &'static str, rule_id: RuleId) {
        self.assignments.push(Assignment {
            identifier: identifier.to_string(),
            value,
            rule,
            rule_id,
        });
    }

    pub fn into_report(self, outcome: RuleOutcome) -> ProcessingReport {
        ProcessingReport {
            outcome,
            assignments: self.assignments,
        }
    }
}
