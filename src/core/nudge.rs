//! Nudges shown when the user drifts out of focus.

use crate::detection::FocusState;
use serde::{Deserialize, Serialize};

/// A short message tied to a focus state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nudge {
    pub state: FocusState,
    pub title: String,
    pub message: String,
}

impl Nudge {
    pub fn for_state(state: FocusState) -> Self {
        let (title, message) = match state {
            FocusState::Focused => (
                "Great Focus!",
                "You've been focused for several minutes. Keep it up!",
            ),
            FocusState::Drowsy => (
                "Take a Break",
                "Looks like you need a 5-minute break to recharge.",
            ),
            FocusState::Distracted => ("Stay Focused", "Eyes back on the prize! You can do this."),
            FocusState::Stressed => (
                "Relax",
                "Take a deep breath and try to relax your shoulders.",
            ),
        };
        Self {
            state,
            title: title.to_string(),
            message: message.to_string(),
        }
    }
}

/// Decides which transitions deserve a nudge.
#[derive(Debug, Clone)]
pub struct NudgePolicy {
    enabled: bool,
    last_state: FocusState,
}

impl NudgePolicy {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last_state: FocusState::Focused,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Feed the latest observed state. A change into any non-focused state
    /// produces a nudge while the policy is enabled.
    pub fn observe(&mut self, state: FocusState) -> Option<Nudge> {
        let changed = state != self.last_state;
        self.last_state = state;

        if self.enabled && changed && !state.is_focused() {
            Some(Nudge::for_state(state))
        } else {
            None
        }
    }
}

impl Default for NudgePolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nudge_text() {
        let nudge = Nudge::for_state(FocusState::Drowsy);
        assert_eq!(nudge.title, "Take a Break");
        assert!(nudge.message.contains("break"));
    }

    #[test]
    fn test_only_transitions_into_unfocused_states_nudge() {
        let mut policy = NudgePolicy::default();

        assert!(policy.observe(FocusState::Focused).is_none());
        let nudge = policy.observe(FocusState::Distracted).unwrap();
        assert_eq!(nudge.state, FocusState::Distracted);
        assert!(policy.observe(FocusState::Distracted).is_none());
        assert!(policy.observe(FocusState::Focused).is_none());
        assert!(policy.observe(FocusState::Stressed).is_some());
    }

    #[test]
    fn test_disabled_policy_is_silent_but_tracks_state() {
        let mut policy = NudgePolicy::new(false);
        assert!(policy.observe(FocusState::Drowsy).is_none());

        policy.set_enabled(true);
        // Still drowsy, so no change and no nudge.
        assert!(policy.observe(FocusState::Drowsy).is_none());
    }
}
