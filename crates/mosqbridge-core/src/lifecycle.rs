//! Plugin instance lifecycle state machine

use serde::{Deserialize, Serialize};

/// Lifecycle states of a single plugin instance
///
/// State transitions:
/// ```text
/// Uninitialized → Initializing → Active → CleaningUp → Terminated
///                      │                                   ↑
///                      └───────────────────────────────────┘ (init rolled back)
/// ```
///
/// No state is re-enterable. A terminated instance is never reused; the
/// broker loads a fresh instance for any later activation.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Instance exists, init not yet called
    #[default]
    Uninitialized = 0,
    /// Options are being parsed and events attached
    Initializing = 1,
    /// Events are being dispatched to handlers
    Active = 2,
    /// Events are being detached and the context released
    CleaningUp = 3,
    /// Instance is finished
    Terminated = 4,
}

impl LifecycleState {
    /// Check if this state can transition to the target state
    pub fn can_transition_to(&self, target: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, target),
            (Uninitialized, Initializing)
                | (Initializing, Active)
                | (Active, CleaningUp)
                | (CleaningUp, Terminated)
                // Init failed and was rolled back
                | (Initializing, Terminated)
        )
    }

    /// Check if events may be dispatched in this state
    pub fn can_dispatch(&self) -> bool {
        matches!(self, LifecycleState::Active)
    }

    /// Check if the instance is in its terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Terminated)
    }

    /// Decode a value produced by `self as u8`
    ///
    /// Unknown values decode as `Terminated`, the safest state to assume.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Uninitialized,
            1 => LifecycleState::Initializing,
            2 => LifecycleState::Active,
            3 => LifecycleState::CleaningUp,
            _ => LifecycleState::Terminated,
        }
    }

    /// Get a human-readable description of this state
    pub fn description(&self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "Plugin is loaded but not initialized",
            LifecycleState::Initializing => "Plugin is attaching to broker events",
            LifecycleState::Active => "Plugin is receiving broker events",
            LifecycleState::CleaningUp => "Plugin is detaching from broker events",
            LifecycleState::Terminated => "Plugin has terminated",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Uninitialized => write!(f, "Uninitialized"),
            LifecycleState::Initializing => write!(f, "Initializing"),
            LifecycleState::Active => write!(f, "Active"),
            LifecycleState::CleaningUp => write!(f, "CleaningUp"),
            LifecycleState::Terminated => write!(f, "Terminated"),
        }
    }
}
