//! Slice lifecycle (spec §3).

use serde::{Deserialize, Serialize};

/// Lifecycle state of a slice. `Deactivated` is terminal and only allows
/// deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceState {
    /// Registered but not yet being activated.
    Pending,
    /// Configuration is being pushed to agents.
    Activating,
    /// Fully configured and serving traffic.
    Active,
    /// Torn down; terminal.
    Deactivated,
}

impl SliceState {
    /// Whether a transition from `self` to `next` is legal.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use SliceState::{Activating, Active, Deactivated, Pending};
        matches!(
            (self, next),
            (Pending, Activating)
                | (Activating, Active)
                | (Activating, Deactivated)
                | (Active, Deactivated)
                | (Active, Activating)
        )
    }
}
