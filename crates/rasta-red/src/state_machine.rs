//! Per-channel state machine.
//!
//! Each redundancy channel is either `Closed` (initial) or `Up`. No event
//! is invalid in any state: events irrelevant to the current state are
//! silently ignored, so the transition function is total.

/// State of one redundancy channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Up,
}

/// Event fed into a channel's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Close,
    SendData,
    ReceiveData,
    DeferTimeout,
}

/// Side effect the layer executes when taking a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    /// Reset the channel's runtime state (taken on both open and close).
    Reinit,
    ProcessReceived,
    Send,
    DeferTimeout,
}

/// The transition table: next state and side effect for a state/event pair.
pub(crate) fn transition(state: ChannelState, event: ChannelEvent) -> (ChannelState, Action) {
    match (state, event) {
        (ChannelState::Closed, ChannelEvent::Open) => (ChannelState::Up, Action::Reinit),
        (ChannelState::Closed, _) => (ChannelState::Closed, Action::None),

        (ChannelState::Up, ChannelEvent::Close) => (ChannelState::Closed, Action::Reinit),
        (ChannelState::Up, ChannelEvent::ReceiveData) => (ChannelState::Up, Action::ProcessReceived),
        (ChannelState::Up, ChannelEvent::SendData) => (ChannelState::Up, Action::Send),
        (ChannelState::Up, ChannelEvent::DeferTimeout) => (ChannelState::Up, Action::DeferTimeout),
        (ChannelState::Up, ChannelEvent::Open) => (ChannelState::Up, Action::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_state_transitions() {
        assert_eq!(
            transition(ChannelState::Closed, ChannelEvent::Open),
            (ChannelState::Up, Action::Reinit)
        );
        for event in [
            ChannelEvent::Close,
            ChannelEvent::SendData,
            ChannelEvent::ReceiveData,
            ChannelEvent::DeferTimeout,
        ] {
            assert_eq!(
                transition(ChannelState::Closed, event),
                (ChannelState::Closed, Action::None),
                "{event:?}"
            );
        }
    }

    #[test]
    fn up_state_transitions() {
        assert_eq!(
            transition(ChannelState::Up, ChannelEvent::Close),
            (ChannelState::Closed, Action::Reinit)
        );
        assert_eq!(
            transition(ChannelState::Up, ChannelEvent::SendData),
            (ChannelState::Up, Action::Send)
        );
        assert_eq!(
            transition(ChannelState::Up, ChannelEvent::ReceiveData),
            (ChannelState::Up, Action::ProcessReceived)
        );
        assert_eq!(
            transition(ChannelState::Up, ChannelEvent::DeferTimeout),
            (ChannelState::Up, Action::DeferTimeout)
        );
        assert_eq!(
            transition(ChannelState::Up, ChannelEvent::Open),
            (ChannelState::Up, Action::None)
        );
    }
}
