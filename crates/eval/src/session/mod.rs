//! Item session state machine.
//!
//! ```text
//!   NotInitialized ──initialize──▶ Interacting ──close / attempts used──▶ Closed
//!          ▲                         │   ▲                                  │
//!          └──────── reinitialize ───┘   └──────────── reset ───────────────┘
//! ```
//!
//! Within `Interacting` each attempt runs bind → validate → process. A
//! transition either completes or returns an error with the session
//! untouched; the one exception is response processing, whose rules keep
//! the assignments they made before failing.

mod permissions;


pub use permissions::{compute_permissions, BlockedReason, CandidateAction, Permissions};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use qti_core::{
    completion_status, ItemDefinition, Value, VariableKind, COMPLETION_STATUS, DURATION,
    NUM_ATTEMPTS,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::binding::{self, ResponseData};
use crate::error::{AuthoringError, SessionError};
use crate::report::{ProcessingReport, ReportCollector};
use crate::rules::{self, RuleOutcome};
use crate::store::VariableStore;
use crate::validation;

/// Template processing is restarted at most this many times while a
/// template constraint keeps failing.
pub const MAX_TEMPLATE_TRIES: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    NotInitialized,
    Interacting,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NotInitialized => "notInitialized",
            SessionState::Interacting => "interacting",
            SessionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery configuration supplied by the host.
///
/// `max_attempts == 0` means unlimited. Adaptive items ignore it and close
/// when `completionStatus` becomes `completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeliverySettings {
    pub max_attempts: u32,
    pub allow_close: bool,
    pub allow_reset_when_interacting: bool,
    pub allow_reset_when_closed: bool,
    pub allow_reinit_when_interacting: bool,
    pub allow_reinit_when_closed: bool,
    pub allow_solution_when_interacting: bool,
    pub allow_solution_when_closed: bool,
    pub allow_playback: bool,
    pub allow_source: bool,
    pub allow_result: bool,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        DeliverySettings {
            max_attempts: 1,
            allow_close: true,
            allow_reset_when_interacting: false,
            allow_reset_when_closed: false,
            allow_reinit_when_interacting: false,
            allow_reinit_when_closed: false,
            allow_solution_when_interacting: false,
            allow_solution_when_closed: false,
            allow_playback: false,
            allow_source: false,
            allow_result: false,
        }
    }
}

/// Progress of the current attempt through bind → validate → process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseStage {
    Idle,
    Bound,
    BindFailed,
    Validated,
    ValidationFailed,
}

/// Point-in-time copy of everything a renderer or persistence layer reads.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub item: String,
    pub state: SessionState,
    pub attempt_count: u32,
    pub completed_attempts: u32,
    pub solution_requested: bool,
    pub permissions: Permissions,
    pub values: BTreeMap<String, Value>,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> serde_json::Value {
        let values: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::json!({
            "item": self.item,
            "state": self.state.as_str(),
            "attemptCount": self.attempt_count,
            "completedAttempts": self.completed_attempts,
            "solutionRequested": self.solution_requested,
            "permissions": self.permissions.to_json(),
            "values": values,
        })
    }
}

/// A candidate's session on one item.
///
/// The definition is shared; everything mutable lives here and is only
/// changed through `&mut self` transitions.
#[derive(Debug, Clone)]
pub struct ItemSession {
    item: Arc<ItemDefinition>,
    settings: DeliverySettings,
    rng: StdRng,
    state: SessionState,
    stage: ResponseStage,
    attempt_count: u32,
    completed_attempts: u32,
    solution_requested: bool,
    store: VariableStore,
}

/// Resolve `item`, create a session for it and initialize it.
pub fn initialize_session(
    item: Arc<ItemDefinition>,
    settings: DeliverySettings,
    seed: u64,
) -> Result<ItemSession, SessionError> {
    item.check_references()?;
    let mut session = ItemSession::new(item, settings, seed);
    session.initialize()?;
    Ok(session)
}

impl ItemSession {
    /// A session in `NotInitialized`. Most callers want
    /// [`initialize_session`].
    pub fn new(item: Arc<ItemDefinition>, settings: DeliverySettings, seed: u64) -> Self {
        let store = VariableStore::new(&item);
        ItemSession {
            item,
            settings,
            rng: StdRng::seed_from_u64(seed),
            state: SessionState::NotInitialized,
            stage: ResponseStage::Idle,
            attempt_count: 0,
            completed_attempts: 0,
            solution_requested: false,
            store,
        }
    }

    // ──────────────────────────────────────────────
    // Transitions
    // ──────────────────────────────────────────────

    /// Run template processing and enter `Interacting` with attempt 1.
    pub fn initialize(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::NotInitialized {
            return Err(self.illegal("initialize", "the session is already initialized"));
        }
        let store = self.fresh_store()?;
        self.begin(store);
        Ok(())
    }

    /// Parse and store submitted responses. Returns the bad identifiers;
    /// their values are not written.
    pub fn bind_responses(
        &mut self,
        responses: &BTreeMap<String, ResponseData>,
    ) -> Result<Vec<String>, SessionError> {
        self.require_interacting("bind responses")?;
        let mut outcome = binding::bind_responses(&self.item, responses);
        for (identifier, value) in outcome.values {
            if self.store.set(&identifier, value).is_err() {
                outcome.bad_identifiers.push(identifier);
            }
        }
        outcome.bad_identifiers.sort();
        self.stage = if outcome.bad_identifiers.is_empty() {
            ResponseStage::Bound
        } else {
            tracing::info!(bad = ?outcome.bad_identifiers, "bad responses submitted");
            ResponseStage::BindFailed
        };
        Ok(outcome.bad_identifiers)
    }

    /// Check bound responses against their constraints. Returns the invalid
    /// identifiers; bound values stay in place either way.
    pub fn validate_responses(&mut self) -> Result<Vec<String>, SessionError> {
        self.require_interacting("validate responses")?;
        match self.stage {
            ResponseStage::Bound | ResponseStage::Validated | ResponseStage::ValidationFailed => {}
            ResponseStage::Idle => {
                return Err(self.illegal("validate responses", "no responses have been bound"))
            }
            ResponseStage::BindFailed => {
                return Err(self.illegal(
                    "validate responses",
                    "the last bind reported bad responses",
                ))
            }
        }
        let invalid = validation::validate_responses(&self.item, &self.store)?;
        self.stage = if invalid.is_empty() {
            ResponseStage::Validated
        } else {
            tracing::info!(invalid = ?invalid, "invalid responses submitted");
            ResponseStage::ValidationFailed
        };
        Ok(invalid)
    }

    /// Run response processing for the current attempt.
    ///
    /// On an authoring error the rules' earlier assignments remain but the
    /// attempt is not counted.
    pub fn process_responses(&mut self) -> Result<ProcessingReport, SessionError> {
        self.require_interacting("process responses")?;
        if self.stage != ResponseStage::Validated {
            return Err(self.illegal(
                "process responses",
                "responses have not been bound and validated",
            ));
        }

        if !self.item.adaptive {
            let status = self.store.get(COMPLETION_STATUS).cloned();
            self.store.reset_kind(VariableKind::Outcome);
            if let Some(status) = status {
                self.set_builtin(COMPLETION_STATUS, status)?;
            }
        }

        let previous_attempts = self.store.get(NUM_ATTEMPTS).cloned().unwrap_or(Value::Null);
        let completed = self.completed_attempts + 1;
        self.set_builtin(NUM_ATTEMPTS, Value::integer(i64::from(completed)))?;

        let mut collector = ReportCollector::new();
        let item = Arc::clone(&self.item);
        let outcome = match rules::execute(
            &item.response_processing,
            &item,
            &mut self.store,
            &mut self.rng,
            &mut collector,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "response processing failed");
                self.set_builtin(NUM_ATTEMPTS, previous_attempts)?;
                return Err(e.into());
            }
        };
        let report = collector.into_report(outcome);

        if report.last_value(COMPLETION_STATUS).is_none()
            && self.completion_status() == Some(completion_status::NOT_ATTEMPTED)
        {
            self.set_builtin(COMPLETION_STATUS, Value::identifier(completion_status::UNKNOWN))?;
        }

        self.completed_attempts = completed;
        self.stage = ResponseStage::Idle;
        if self.attempts_exhausted() {
            tracing::info!(attempts = completed, "attempts used, closing session");
            self.state = SessionState::Closed;
        } else {
            self.attempt_count = completed + 1;
        }
        tracing::debug!(outcome = report.outcome.as_str(), attempt = completed, "responses processed");
        Ok(report)
    }

    /// End the session on the candidate's request.
    pub fn close(&mut self) -> Result<(), SessionError> {
        self.ensure_permitted(CandidateAction::Close)?;
        self.state = SessionState::Closed;
        self.stage = ResponseStage::Idle;
        tracing::debug!("session closed");
        Ok(())
    }

    /// Put responses and outcomes back to their defaults and start over at
    /// attempt 1, keeping the template values.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.ensure_permitted(CandidateAction::Reset)?;
        self.store.reset_kind(VariableKind::Response);
        self.store.reset_kind(VariableKind::Outcome);
        self.state = SessionState::Interacting;
        self.stage = ResponseStage::Idle;
        self.attempt_count = 1;
        self.completed_attempts = 0;
        self.solution_requested = false;
        tracing::debug!("session reset");
        Ok(())
    }

    /// Return to `NotInitialized` and initialize again, rerunning template
    /// processing with fresh overrides.
    pub fn reinitialize(&mut self) -> Result<(), SessionError> {
        self.ensure_permitted(CandidateAction::Reinit)?;
        let store = self.fresh_store()?;
        self.state = SessionState::NotInitialized;
        tracing::debug!("session reinitializing");
        self.begin(store);
        Ok(())
    }

    /// Flag the session as having shown the solution and return the
    /// correct responses in force.
    pub fn request_solution(&mut self) -> Result<BTreeMap<String, Value>, SessionError> {
        self.ensure_permitted(CandidateAction::Solution)?;
        self.solution_requested = true;
        Ok(self
            .item
            .declarations_of(VariableKind::Response)
            .filter_map(|decl| {
                self.store
                    .correct_response(&decl.identifier)
                    .map(|v| (decl.identifier.clone(), v))
            })
            .collect())
    }

    /// Add candidate time to the `duration` built-in.
    pub fn record_elapsed(&mut self, elapsed: Duration) -> Result<(), SessionError> {
        self.require_interacting("record elapsed time")?;
        let current = self
            .store
            .get(DURATION)
            .and_then(Value::as_single)
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        self.set_builtin(DURATION, Value::float(current + elapsed.as_secs_f64()))
    }

    /// Fails unless `action` is allowed right now. `IllegalStateTransition`
    /// when the state rules it out, `ActionNotPermitted` when the delivery
    /// settings do.
    pub fn ensure_permitted(&self, action: CandidateAction) -> Result<(), SessionError> {
        match self.permissions().blocked.get(&action) {
            None => Ok(()),
            Some(BlockedReason::DisabledByDelivery) => {
                tracing::debug!(action = %action, "action not permitted");
                Err(SessionError::ActionNotPermitted(action))
            }
            Some(BlockedReason::WrongState { .. }) => Err(self.illegal(
                action.as_str(),
                "the action is not available in this state",
            )),
        }
    }

    // ──────────────────────────────────────────────
    // Accessors
    // ──────────────────────────────────────────────

    pub fn item(&self) -> &Arc<ItemDefinition> {
        &self.item
    }

    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of the current attempt, starting at 1 after initialization.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn completed_attempts(&self) -> u32 {
        self.completed_attempts
    }

    pub fn solution_requested(&self) -> bool {
        self.solution_requested
    }

    pub fn value(&self, identifier: &str) -> Option<&Value> {
        self.store.get(identifier)
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn permissions(&self) -> Permissions {
        compute_permissions(&self.settings, self.state)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            item: self.item.identifier.clone(),
            state: self.state,
            attempt_count: self.attempt_count,
            completed_attempts: self.completed_attempts,
            solution_requested: self.solution_requested,
            permissions: self.permissions(),
            values: self
                .store
                .iter()
                .map(|(id, slot)| (id.to_string(), slot.value.clone()))
                .collect(),
        }
    }

    // ──────────────────────────────────────────────
    // Internals
    // ──────────────────────────────────────────────

    /// A store with template processing applied and responses and outcomes
    /// at their (possibly overridden) defaults.
    fn fresh_store(&mut self) -> Result<VariableStore, AuthoringError> {
        let item = Arc::clone(&self.item);
        let mut tries = 0;
        loop {
            tries += 1;
            let mut store = VariableStore::new(&item);
            let mut collector = ReportCollector::new();
            let outcome = rules::execute(
                &item.template_processing,
                &item,
                &mut store,
                &mut self.rng,
                &mut collector,
            )?;
            if outcome == RuleOutcome::TemplateConstraintFailed && tries < MAX_TEMPLATE_TRIES {
                tracing::debug!(tries, "template constraint failed, retrying");
                continue;
            }
            if outcome == RuleOutcome::TemplateConstraintFailed {
                tracing::warn!(tries, "template constraint still failing, keeping last values");
            }
            store.reset_kind(VariableKind::Response);
            store.reset_kind(VariableKind::Outcome);
            return Ok(store);
        }
    }

    fn begin(&mut self, store: VariableStore) {
        self.store = store;
        self.state = SessionState::Interacting;
        self.stage = ResponseStage::Idle;
        self.attempt_count = 1;
        self.completed_attempts = 0;
        self.solution_requested = false;
        tracing::debug!(item = %self.item.identifier, "session interacting");
    }

    fn attempts_exhausted(&self) -> bool {
        if self.item.adaptive {
            self.completion_status() == Some(completion_status::COMPLETED)
        } else {
            self.settings.max_attempts > 0 && self.completed_attempts >= self.settings.max_attempts
        }
    }

    fn completion_status(&self) -> Option<&str> {
        self.store
            .get(COMPLETION_STATUS)
            .and_then(Value::as_single)
            .and_then(|v| v.as_text())
    }

    fn set_builtin(&mut self, identifier: &str, value: Value) -> Result<(), SessionError> {
        self.store
            .set(identifier, value)
            .map_err(|e| AuthoringError::Processing {
                rule: "session".to_string(),
                identifier: identifier.to_string(),
                message: e.to_string(),
            })
            .map_err(SessionError::from)
    }

    fn require_interacting(&self, action: &str) -> Result<(), SessionError> {
        if self.state == SessionState::Interacting {
            Ok(())
        } else {
            Err(self.illegal(action, "the session is not interacting"))
        }
    }

    fn illegal(&self, action: &str, reason: &str) -> SessionError {
        tracing::debug!(action, state = %self.state, reason, "illegal transition");
        SessionError::IllegalStateTransition {
            action: action.to_string(),
            state: self.state,
            reason: reason.to_string(),
        }
    }
}
