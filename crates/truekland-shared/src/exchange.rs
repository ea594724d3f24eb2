//! Exchange lifecycle rules.
//!
//! ```text
//! pending ──accept (receiver)──► accepted ──complete (either)──► completed
//!    │                              │
//!    ├──reject (receiver)──► rejected
//!    │                              │
//!    └──cancel (proposer)──► cancelled ◄──cancel (either)──┘
//! ```
//!
//! This module only decides whether a move is legal for a given actor. The
//! store applies it as a compare-and-set on the current status, so two
//! racing moves from the same state cannot both succeed.

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;
use crate::types::ExchangeStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeAction {
    Accept,
    Reject,
    Complete,
    Cancel,
}

/// The actor's side of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Proposer,
    Receiver,
}

impl ExchangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeAction::Accept => "accept",
            ExchangeAction::Reject => "reject",
            ExchangeAction::Complete => "complete",
            ExchangeAction::Cancel => "cancel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accept" => Some(ExchangeAction::Accept),
            "reject" => Some(ExchangeAction::Reject),
            "complete" => Some(ExchangeAction::Complete),
            "cancel" => Some(ExchangeAction::Cancel),
            _ => None,
        }
    }

    pub fn target(&self) -> ExchangeStatus {
        match self {
            ExchangeAction::Accept => ExchangeStatus::Accepted,
            ExchangeAction::Reject => ExchangeStatus::Rejected,
            ExchangeAction::Complete => ExchangeStatus::Completed,
            ExchangeAction::Cancel => ExchangeStatus::Cancelled,
        }
    }
}

/// Resolve `action` by `role` against the `current` status.
///
/// Returns the status to move to, or why the move is refused.
pub fn plan_transition(
    current: ExchangeStatus,
    action: ExchangeAction,
    role: Role,
) -> Result<ExchangeStatus, TransitionError> {
    if current.is_terminal() {
        return Err(TransitionError::Terminal(current));
    }

    let illegal = TransitionError::Illegal {
        action: action.as_str(),
        from: current,
    };

    match (current, action) {
        (ExchangeStatus::Pending, ExchangeAction::Accept | ExchangeAction::Reject) => {
            if role != Role::Receiver {
                return Err(TransitionError::WrongRole {
                    action: action.as_str(),
                    required: "receiver",
                });
            }
        }
        (ExchangeStatus::Pending, ExchangeAction::Cancel) => {
            if role != Role::Proposer {
                return Err(TransitionError::WrongRole {
                    action: action.as_str(),
                    required: "proposer",
                });
            }
        }
        (ExchangeStatus::Accepted, ExchangeAction::Complete | ExchangeAction::Cancel) => {}
        _ => return Err(illegal),
    }

    Ok(action.target())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExchangeAction::*;
    use ExchangeStatus::*;

    #[test]
    fn receiver_answers_pending() {
        assert_eq!(plan_transition(Pending, Accept, Role::Receiver), Ok(Accepted));
        assert_eq!(plan_transition(Pending, Reject, Role::Receiver), Ok(Rejected));
    }

    #[test]
    fn proposer_cannot_accept_own_proposal() {
        assert!(matches!(
            plan_transition(Pending, Accept, Role::Proposer),
            Err(TransitionError::WrongRole { required: "receiver", .. })
        ));
    }

    #[test]
    fn only_proposer_withdraws_pending() {
        assert_eq!(plan_transition(Pending, Cancel, Role::Proposer), Ok(Cancelled));
        assert!(plan_transition(Pending, Cancel, Role::Receiver).is_err());
    }

    #[test]
    fn completion_requires_acceptance() {
        assert!(matches!(
            plan_transition(Pending, Complete, Role::Receiver),
            Err(TransitionError::Illegal { .. })
        ));
        assert_eq!(plan_transition(Accepted, Complete, Role::Proposer), Ok(Completed));
        assert_eq!(plan_transition(Accepted, Cancel, Role::Receiver), Ok(Cancelled));
    }

    #[test]
    fn accepted_cannot_be_accepted_again() {
        assert!(plan_transition(Accepted, Accept, Role::Receiver).is_err());
    }

    #[test]
    fn terminal_states_are_final() {
        for status in [Rejected, Completed, Cancelled] {
            for action in [Accept, Reject, Complete, Cancel] {
                for role in [Role::Proposer, Role::Receiver] {
                    assert_eq!(
                        plan_transition(status, action, role),
                        Err(TransitionError::Terminal(status))
                    );
                }
            }
        }
    }

    #[test]
    fn action_names_round_trip() {
        for action in [Accept, Reject, Complete, Cancel] {
            assert_eq!(ExchangeAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(ExchangeAction::parse("approve"), None);
    }
}
