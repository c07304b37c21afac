//! Stage lifecycle as one explicit state enum and one transition function.
//!
//! The observed behavior this replaces tracked the lifecycle in two loosely
//! related booleans, which admitted reachable-but-unintended combinations
//! (not running, not stopped). Every state change is validated against
//! [`transition`], either up front (commands) or by guarding on the current
//! state (poll outcomes, which only ever move `Running` to a terminal
//! state).

use crate::error::StageControlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum StageState {
    /// Mounted, no start command issued yet.
    Idle,
    /// Remote computation running, both polling loops active.
    Running,
    /// Explicitly stopped by the user; resumable without losing epochs.
    Stopped,
    /// Epochs reached total. Terminal; no resume is offered.
    Completed,
    /// A polling or command failure ended observation. Terminal.
    Faulted,
}

impl StageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::Completed | StageState::Faulted)
    }

    /// Advancing to the next stage (one-shot inference) is only offered once
    /// the run is no longer running.
    pub fn can_advance(&self) -> bool {
        matches!(self, StageState::Stopped | StageState::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum StageEvent {
    Start,
    Stop,
    Resume,
    /// Progress poll reported `current_epoch >= total_epoch`.
    Complete,
    /// Authorization or transport failure while observing the run.
    Fault,
}

/// The single transition function of the stage lifecycle.
pub fn transition(state: StageState, event: StageEvent) -> Result<StageState, StageControlError> {
    use StageEvent::*;
    use StageState::*;

    match (state, event) {
        (Idle, Start) => Ok(Running),
        (Running, Stop) => Ok(Stopped),
        (Stopped, Resume) => Ok(Running),
        (Running, Complete) => Ok(Completed),
        (Running, Fault) | (Idle, Fault) => Ok(Faulted),
        (from, event) => Err(StageControlError::InvalidTransition { from, event }),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::StageEvent::*;
    use super::StageState::*;
    use super::*;

    #[rstest]
    #[case(Idle, Start, Running)]
    #[case(Running, Stop, Stopped)]
    #[case(Stopped, Resume, Running)]
    #[case(Running, Complete, Completed)]
    #[case(Running, Fault, Faulted)]
    #[case(Idle, Fault, Faulted)]
    fn legal_transitions(#[case] from: StageState, #[case] event: StageEvent, #[case] to: StageState) {
        assert_eq!(transition(from, event).unwrap(), to);
    }

    #[rstest]
    #[case(Idle, Stop)]
    #[case(Idle, Resume)]
    #[case(Running, Start)]
    #[case(Running, Resume)]
    #[case(Stopped, Stop)]
    #[case(Completed, Resume)]
    #[case(Completed, Start)]
    #[case(Faulted, Resume)]
    #[case(Faulted, Start)]
    fn illegal_transitions_are_rejected(#[case] from: StageState, #[case] event: StageEvent) {
        assert!(matches!(
            transition(from, event),
            Err(StageControlError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn terminal_states_offer_no_way_out() {
        for state in [Completed, Faulted] {
            assert!(state.is_terminal());
            for event in [Start, Stop, Resume, Complete, Fault] {
                assert!(transition(state, event).is_err());
            }
        }
    }

    #[test]
    fn advance_is_gated_on_stopped_or_completed() {
        assert!(Stopped.can_advance());
        assert!(Completed.can_advance());
        assert!(!Idle.can_advance());
        assert!(!Running.can_advance());
        assert!(!Faulted.can_advance());
    }
}
