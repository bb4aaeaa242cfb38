//! Candidate action permissions: which actions the delivery settings allow
//! in the session's current state, and why the others are blocked.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DeliverySettings, SessionState};

/// Actions a candidate (or the delivery front end acting for them) may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CandidateAction {
    Close,
    Reset,
    Reinit,
    Solution,
    Playback,
    Source,
    Result,
}

impl CandidateAction {
    pub const ALL: [CandidateAction; 7] = [
        CandidateAction::Close,
        CandidateAction::Reset,
        CandidateAction::Reinit,
        CandidateAction::Solution,
        CandidateAction::Playback,
        CandidateAction::Source,
        CandidateAction::Result,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateAction::Close => "close",
            CandidateAction::Reset => "reset",
            CandidateAction::Reinit => "reinit",
            CandidateAction::Solution => "solution",
            CandidateAction::Playback => "playback",
            CandidateAction::Source => "source",
            CandidateAction::Result => "result",
        }
    }
}

impl std::fmt::Display for CandidateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an action is not available right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BlockedReason {
    /// The delivery settings never allow it in this state.
    DisabledByDelivery,
    /// The action has no meaning in the current state.
    WrongState { state: SessionState },
}

/// Allowed actions plus the reason each other action is blocked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Permissions {
    pub allowed: Vec<CandidateAction>,
    pub blocked: BTreeMap<CandidateAction, BlockedReason>,
}

impl Permissions {
    pub fn allows(&self, action: CandidateAction) -> bool {
        self.allowed.contains(&action)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let blocked: serde_json::Map<String, serde_json::Value> = self
            .blocked
            .iter()
            .map(|(action, reason)| {
                (
                    action.as_str().to_string(),
                    serde_json::to_value(reason).unwrap_or(serde_json::Value::Null),
                )
            })
            .collect();
        serde_json::json!({
            "allowed": self.allowed.iter().map(|a| a.as_str()).collect::<Vec<_>>(),
            "blocked": blocked,
        })
    }
}

/// Compute the action flags for a session in `state`.
///
/// Pure function of the settings and the state.
pub fn compute_permissions(settings: &DeliverySettings, state: SessionState) -> Permissions {
    let mut permissions = Permissions::default();
    for action in CandidateAction::ALL {
        match check_action(settings, state, action) {
            None => permissions.allowed.push(action),
            Some(reason) => {
                permissions.blocked.insert(action, reason);
            }
        }
    }
    permissions
}

fn check_action(
    settings: &DeliverySettings,
    state: SessionState,
    action: CandidateAction,
) -> Option<BlockedReason> {
    use SessionState::{Closed, Interacting, NotInitialized};

    let wrong_state = Some(BlockedReason::WrongState { state });
    let flag = match (action, state) {
        (CandidateAction::Close, Interacting) => settings.allow_close,
        (CandidateAction::Close, _) => return wrong_state,

        (CandidateAction::Reset, Interacting) => settings.allow_reset_when_interacting,
        (CandidateAction::Reset, Closed) => settings.allow_reset_when_closed,
        (CandidateAction::Reinit, Interacting) => settings.allow_reinit_when_interacting,
        (CandidateAction::Reinit, Closed) => settings.allow_reinit_when_closed,
        (CandidateAction::Solution, Interacting) => settings.allow_solution_when_interacting,
        (CandidateAction::Solution, Closed) => settings.allow_solution_when_closed,
        (CandidateAction::Reset | CandidateAction::Reinit | CandidateAction::Solution, NotInitialized) => {
            return wrong_state
        }

        (CandidateAction::Playback, NotInitialized) | (CandidateAction::Result, NotInitialized) => {
            return wrong_state
        }
        (CandidateAction::Playback, _) => settings.allow_playback,
        (CandidateAction::Result, _) => settings.allow_result,
        (CandidateAction::Source, _) => settings.allow_source,
    };
    if flag {
        None
    } else {
        Some(BlockedReason::DisabledByDelivery)
    }
}
