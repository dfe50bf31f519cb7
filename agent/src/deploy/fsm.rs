//! Finite state machine of one deployer run

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

/// Phase of a deployer run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Reading the deployment record and its site
    Loading,

    /// Resolving the project and application ids
    Resolving,

    /// Fetching the remote application
    Fetching,

    /// Choosing the action
    Deciding,

    /// Issuing the mutating call
    Executing,

    /// Polling until the remote state converges
    Converging,

    Succeeded,

    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

/// Run event
#[derive(Debug, Clone)]
pub enum RunEvent {
    Loaded,
    Resolved,
    Fetched,
    Decided,
    /// The remote state already matches, nothing to execute
    NoChange,
    Executed,
    Converged,
    Fail(String),
}

/// Run FSM
#[derive(Debug, Clone)]
pub struct RunFsm {
    state: RunState,
    error: Option<String>,
}

impl RunFsm {
    /// Create a new FSM in loading state
    pub fn new() -> Self {
        Self {
            state: RunState::Loading,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: RunEvent) -> Result<(), AgentError> {
        let new_state = match (self.state, &event) {
            (RunState::Loading, RunEvent::Loaded) => RunState::Resolving,
            (RunState::Resolving, RunEvent::Resolved) => RunState::Fetching,
            (RunState::Fetching, RunEvent::Fetched) => RunState::Deciding,
            (RunState::Deciding, RunEvent::Decided) => RunState::Executing,
            (RunState::Deciding, RunEvent::NoChange) => RunState::Succeeded,
            (RunState::Executing, RunEvent::Executed) => RunState::Converging,
            (RunState::Converging, RunEvent::Converged) => RunState::Succeeded,

            (state, RunEvent::Fail(err)) if !state.is_terminal() => {
                self.error = Some(err.clone());
                RunState::Failed
            }

            (state, event) => {
                return Err(AgentError::Internal(format!(
                    "Invalid transition: {:?} -> {:?}",
                    state, event
                )));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for RunFsm {
    fn default() -> Self {
        Self::new()
    }
}
