//! Lifecycle state machine of a dynamic instance
//!
//! All state changes go through [`Lifecycle::apply`]; an event that is not
//! valid in the current state is rejected and leaves the state untouched.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    TearingDown,
    Resolving,
    Building,
    CacheLookupOrCompile,
    Mounting,
    ContextBinding,
    Mounted,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::TearingDown => "tearing down",
            LifecycleState::Resolving => "resolving",
            LifecycleState::Building => "building",
            LifecycleState::CacheLookupOrCompile => "cache lookup or compile",
            LifecycleState::Mounting => "mounting",
            LifecycleState::ContextBinding => "context binding",
            LifecycleState::Mounted => "mounted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Inputs changed; a new build starts
    Change,
    TornDown,
    Resolved,
    Built,
    Compiled,
    Instantiated,
    Bound,
    /// The in-flight build failed
    Failed,
    Dispose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid lifecycle transition: {event:?} while {state}")]
pub struct LifecycleError {
    pub state: LifecycleState,
    pub event: LifecycleEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: LifecycleState::Idle,
        }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Apply `event`, returning the new state
    pub fn apply(&mut self, event: LifecycleEvent) -> Result<LifecycleState, LifecycleError> {
        let next = transition(self.state, event).ok_or(LifecycleError {
            state: self.state,
            event,
        })?;
        self.state = next;
        Ok(next)
    }
}

/// The transition table
///
/// A change may interrupt any build still waiting on resolution or
/// compilation; mounting and binding run without suspension points and
/// cannot be interrupted.
pub fn transition(state: LifecycleState, event: LifecycleEvent) -> Option<LifecycleState> {
    use LifecycleEvent as E;
    use LifecycleState as S;

    let next = match (state, event) {
        (_, E::Dispose) => S::Idle,
        (S::TearingDown, E::Change) => S::TearingDown,
        (
            S::Idle | S::Mounted | S::Resolving | S::Building | S::CacheLookupOrCompile,
            E::Change,
        ) => S::TearingDown,
        (S::TearingDown, E::TornDown) => S::Resolving,
        (S::Resolving, E::Resolved) => S::Building,
        (S::Building, E::Built) => S::CacheLookupOrCompile,
        (S::CacheLookupOrCompile, E::Compiled) => S::Mounting,
        (S::Mounting, E::Instantiated) => S::ContextBinding,
        (S::ContextBinding, E::Bound) => S::Mounted,
        (
            S::Resolving | S::Building | S::CacheLookupOrCompile | S::Mounting | S::ContextBinding,
            E::Failed,
        ) => S::Idle,
        _ => return None,
    };
    Some(next)
}
