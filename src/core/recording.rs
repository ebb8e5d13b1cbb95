//! When an observation becomes a timeline event.
//!
//! Only transitions are recorded: an observation in the state the session is
//! already in is dropped. The event log is therefore a run-length encoding of
//! the state step function, with no two consecutive events sharing a state.

use crate::detection::FocusState;

/// What should happen with a newly observed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDecision {
    /// The state changed; append an event entering `to`.
    Append { from: FocusState, to: FocusState },
    /// Same state as recorded; nothing to do.
    Unchanged,
}

/// Decide whether observing `observed` while in `current` records an event.
pub fn decide(current: FocusState, observed: FocusState) -> RecordDecision {
    if current == observed {
        RecordDecision::Unchanged
    } else {
        RecordDecision::Append {
            from: current,
            to: observed,
        }
    }
}
