use upres_job_client_interface::JobClientError;

use crate::state::{StageEvent, StageState};

#[derive(Debug, thiserror::Error)]
pub enum StageControlError {
    #[error(transparent)]
    Client(#[from] JobClientError),

    #[error("Cannot apply {event} while stage is {from}")]
    InvalidTransition { from: StageState, event: StageEvent },

    #[error("Advance is only available once the stage is stopped or completed (currently {state})")]
    AdvanceUnavailable { state: StageState },
}
