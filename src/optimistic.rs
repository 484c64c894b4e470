//! Optimistic cheat-flag toggle, modeled as an explicit state machine
//! instead of ad hoc DOM mutation: apply locally, then confirm or revert
//! based on the server response. UI toolkits render `displayed()`; the
//! transport calls `confirm`/`reject` when the update settles.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    /// Local and server state agree.
    Applied,
    /// Toggled locally, server response outstanding.
    Pending,
    /// Server rejected the toggle; the displayed value was reverted.
    RolledBack,
}

#[derive(Debug, Clone)]
pub struct FlagToggle {
    displayed: bool,
    committed: bool,
    state: ToggleState,
}

impl FlagToggle {
    pub fn new(flagged: bool) -> Self {
        FlagToggle {
            displayed: flagged,
            committed: flagged,
            state: ToggleState::Applied,
        }
    }

    pub fn displayed(&self) -> bool {
        self.displayed
    }

    pub fn state(&self) -> ToggleState {
        self.state
    }

    /// Flip the displayed value immediately and report what should be sent
    /// to the server. A toggle is refused while one is pending (it must
    /// settle first) and after a rollback until it is acknowledged.
    pub fn toggle(&mut self) -> Option<bool> {
        if self.state != ToggleState::Applied {
            return None;
        }
        self.displayed = !self.displayed;
        self.state = ToggleState::Pending;
        Some(self.displayed)
    }

    /// Server accepted the pending value.
    pub fn confirm(&mut self) {
        if self.state == ToggleState::Pending {
            self.committed = self.displayed;
            self.state = ToggleState::Applied;
        }
    }

    /// Server rejected the pending value; revert to the last committed one.
    pub fn reject(&mut self) {
        if self.state == ToggleState::Pending {
            self.displayed = self.committed;
            self.state = ToggleState::RolledBack;
        }
    }

    /// A rolled-back toggle may be retried; this re-arms the machine.
    pub fn acknowledge_rollback(&mut self) {
        if self.state == ToggleState::RolledBack {
            self.state = ToggleState::Applied;
        }
    }
}
