//! QTI item runtime -- evaluates expression trees, runs processing rules
//! and drives item sessions.
//!
//! The runtime consumes an already-built [`qti_core::ItemDefinition`]
//! (from `qti-interchange` or constructed in code), binds candidate
//! responses, runs response processing, and exposes session snapshots.

pub mod binding;
pub mod error;
pub mod expr;
pub mod numeric;
pub mod report;
pub mod rules;
pub mod session;
pub mod signature;
pub mod store;
pub mod validation;

pub use binding::{BindingOutcome, ResponseData};
pub use error::{AuthoringError, SessionError};
pub use expr::{evaluate, EvalContext};
pub use report::{Assignment, ProcessingReport};
pub use rules::{execute, RuleOutcome};
pub use session::{
    initialize_session, BlockedReason, CandidateAction, DeliverySettings, ItemSession,
    Permissions, SessionSnapshot, SessionState,
};
pub use store::{AssignmentError, VariableStore};

use std::collections::BTreeMap;
use std::sync::Arc;

use qti_core::ItemDefinition;

/// Result of one complete candidate attempt.
#[derive(Debug, Clone)]
pub struct AttemptResult {
    pub bad_identifiers: Vec<String>,
    pub invalid_identifiers: Vec<String>,
    /// `None` when binding or validation stopped the attempt.
    pub report: Option<ProcessingReport>,
    pub snapshot: SessionSnapshot,
}

/// Start a session and run a single attempt with `responses`.
///
/// This is the top-level API for one-shot scoring. Hosts that keep a
/// session across requests use [`initialize_session`] and the
/// [`ItemSession`] transitions directly.
pub fn run_attempt(
    item: Arc<ItemDefinition>,
    responses: &BTreeMap<String, ResponseData>,
    settings: DeliverySettings,
    seed: u64,
) -> Result<AttemptResult, SessionError> {
    let mut session = initialize_session(item, settings, seed)?;
    submit(&mut session, responses)
}

/// Bind, validate and process `responses` on an interacting session.
///
/// Stops after binding or validation when those report problems; the
/// identifiers are returned instead of an error since they are the
/// candidate's to fix.
pub fn submit(
    session: &mut ItemSession,
    responses: &BTreeMap<String, ResponseData>,
) -> Result<AttemptResult, SessionError> {
    let bad_identifiers = session.bind_responses(responses)?;
    if !bad_identifiers.is_empty() {
        return Ok(AttemptResult {
            bad_identifiers,
            invalid_identifiers: Vec::new(),
            report: None,
            snapshot: session.snapshot(),
        });
    }
    let invalid_identifiers = session.validate_responses()?;
    if !invalid_identifiers.is_empty() {
        return Ok(AttemptResult {
            bad_identifiers,
            invalid_identifiers,
            report: None,
            snapshot: session.snapshot(),
        });
    }
    let report = session.process_responses()?;
    Ok(AttemptResult {
        bad_identifiers,
        invalid_identifiers,
        report: Some(report),
        snapshot: session.snapshot(),
    })
}

impl AttemptResult {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "badResponseIdentifiers": self.bad_identifiers,
            "invalidResponseIdentifiers": self.invalid_identifiers,
            "processing": self.report.as_ref().map(ProcessingReport::to_json),
            "session": self.snapshot.to_json(),
        })
    }
}

// ──────────────────────────────────────────────
// Integration tests
// ──────────────────────────────────────────────
